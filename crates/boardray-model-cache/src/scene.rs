//! Imported model scene graphs.
//!
//! A [`SceneGraph`] is what importers produce and what is persisted to the
//! disk cache. It keeps the file's node hierarchy; [`RenderModel`] is the
//! flattened, world-space form handed to the scene assembler.

use boardray_math::{Aabb3, Point3, Rgb, Transform, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// Surface parameters of one material slot, in sRGB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshMaterial {
    /// Material name from the source file.
    pub name: String,
    /// Diffuse color.
    pub diffuse: Rgb,
    /// Ambient color.
    pub ambient: Rgb,
    /// Emissive color.
    pub emissive: Rgb,
    /// Specular color.
    pub specular: Rgb,
    /// Shininess in `[0, 1]`.
    pub shininess: f64,
    /// Transparency in `[0, 1]`, 0 = opaque.
    pub transparency: f64,
}

impl Default for MeshMaterial {
    fn default() -> Self {
        Self {
            name: "default".into(),
            diffuse: Rgb::gray(0.6),
            ambient: Rgb::gray(0.05),
            emissive: Rgb::BLACK,
            specular: Rgb::gray(0.2),
            shininess: 0.2,
            transparency: 0.0,
        }
    }
}

/// Indexed triangle mesh in node-local coordinates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    /// Vertex positions.
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex normals (same length as `positions`).
    pub normals: Vec<[f32; 3]>,
    /// Optional per-vertex colors (empty, or same length as `positions`).
    pub colors: Vec<[f32; 3]>,
    /// Triangle indices, three per triangle.
    pub indices: Vec<u32>,
    /// Index into [`SceneGraph::materials`].
    pub material: usize,
}

impl Mesh {
    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// A node of the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    /// Node name.
    pub name: String,
    /// Local transform, column-major.
    pub transform: [f64; 16],
    /// Meshes attached to this node.
    pub meshes: Vec<usize>,
    /// Child nodes.
    pub children: Vec<usize>,
}

impl SceneNode {
    /// A node with an identity transform.
    pub fn new(name: impl Into<String>) -> Self {
        let mut transform = [0.0; 16];
        for i in 0..4 {
            transform[i * 5] = 1.0;
        }
        Self {
            name: name.into(),
            transform,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// A parsed model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneGraph {
    /// All nodes; `root` indexes into this.
    pub nodes: Vec<SceneNode>,
    /// Root node index.
    pub root: usize,
    /// All meshes.
    pub meshes: Vec<Mesh>,
    /// Material table.
    pub materials: Vec<MeshMaterial>,
}

impl SceneGraph {
    /// A graph with a single root node holding `meshes`.
    pub fn single_node(name: &str, meshes: Vec<Mesh>, materials: Vec<MeshMaterial>) -> Self {
        let mut root = SceneNode::new(name);
        root.meshes = (0..meshes.len()).collect();
        Self {
            nodes: vec![root],
            root: 0,
            meshes,
            materials,
        }
    }

    /// Check every index in the graph and reject cycles.
    pub fn validate(&self) -> Result<(), ImportError> {
        if self.root >= self.nodes.len() {
            return Err(ImportError::malformed("root node out of range"));
        }
        for (i, mesh) in self.meshes.iter().enumerate() {
            let n = mesh.positions.len();
            if mesh.normals.len() != n {
                return Err(ImportError::malformed(format!("mesh {i}: normal count mismatch")));
            }
            if !mesh.colors.is_empty() && mesh.colors.len() != n {
                return Err(ImportError::malformed(format!("mesh {i}: color count mismatch")));
            }
            if mesh.indices.len() % 3 != 0 {
                return Err(ImportError::malformed(format!("mesh {i}: partial triangle")));
            }
            if mesh.indices.iter().any(|&idx| idx as usize >= n) {
                return Err(ImportError::malformed(format!("mesh {i}: index out of range")));
            }
            if mesh.material >= self.materials.len() {
                return Err(ImportError::malformed(format!("mesh {i}: material out of range")));
            }
        }
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(n) = stack.pop() {
            if std::mem::replace(&mut visited[n], true) {
                return Err(ImportError::malformed("node hierarchy is not a tree"));
            }
            let node = &self.nodes[n];
            if node.meshes.iter().any(|&m| m >= self.meshes.len()) {
                return Err(ImportError::malformed(format!("node {n}: mesh out of range")));
            }
            for &c in &node.children {
                if c >= self.nodes.len() {
                    return Err(ImportError::malformed(format!("node {n}: child out of range")));
                }
                stack.push(c);
            }
        }
        Ok(())
    }

    /// Total triangle count over all meshes.
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }
}

/// A mesh placed in model space.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMesh {
    /// Positions after the node hierarchy was applied.
    pub positions: Vec<Point3>,
    /// Unit normals after the node hierarchy was applied.
    pub normals: Vec<Vec3>,
    /// Per-vertex colors, if the source had them.
    pub colors: Option<Vec<Rgb>>,
    /// Triangles.
    pub triangles: Vec<[u32; 3]>,
    /// Index into [`RenderModel::materials`].
    pub material: usize,
}

/// Flattened, renderable form of a [`SceneGraph`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderModel {
    /// One entry per mesh instance in the hierarchy.
    pub meshes: Vec<RenderMesh>,
    /// Material table (shared by index with the scene graph).
    pub materials: Vec<MeshMaterial>,
    /// Bounds of all positions.
    pub bbox: Aabb3,
}

impl RenderModel {
    /// Walk the hierarchy and bake node transforms into the vertices.
    pub fn from_scene(scene: &SceneGraph) -> Self {
        let mut meshes = Vec::new();
        let mut bbox = Aabb3::empty();
        let mut stack = vec![(scene.root, Transform::identity())];

        while let Some((n, parent)) = stack.pop() {
            let node = &scene.nodes[n];
            let world = parent.then(&Transform::from_column_slice(&node.transform));
            for &m in &node.meshes {
                let mesh = &scene.meshes[m];
                let positions: Vec<Point3> = mesh
                    .positions
                    .iter()
                    .map(|p| world.apply_point(&Point3::new(p[0] as f64, p[1] as f64, p[2] as f64)))
                    .collect();
                for p in &positions {
                    bbox.include_point(p);
                }
                let normals = mesh
                    .normals
                    .iter()
                    .map(|v| {
                        let n = world.apply_normal(&Vec3::new(v[0] as f64, v[1] as f64, v[2] as f64));
                        n.try_normalize(1e-12).unwrap_or(n)
                    })
                    .collect();
                let colors = (!mesh.colors.is_empty()).then(|| {
                    mesh.colors
                        .iter()
                        .map(|c| Rgb::new(c[0] as f64, c[1] as f64, c[2] as f64))
                        .collect()
                });
                meshes.push(RenderMesh {
                    positions,
                    normals,
                    colors,
                    triangles: mesh
                        .indices
                        .chunks_exact(3)
                        .map(|t| [t[0], t[1], t[2]])
                        .collect(),
                    material: mesh.material,
                });
            }
            for &c in node.children.iter().rev() {
                stack.push((c, world.clone()));
            }
        }

        Self {
            meshes,
            materials: scene.materials.clone(),
            bbox,
        }
    }

    /// Total triangle count.
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.triangles.len()).sum()
    }
}
