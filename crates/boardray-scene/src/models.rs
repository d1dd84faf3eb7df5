//! Placement of footprint models.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use boardray_math::{Rgb, Transform, Vec3};
use boardray_model_cache::{ContentHash, ModelCache, RenderMesh, RenderModel};
use boardray_raytrace::{MaterialId, Object3D, Primitive, SceneContainer, Triangle};
use boardray_shapes::BoardItemId;
use tracing::debug;

use crate::board::{Board, Footprint, ModelPlacement};
use crate::model_materials::{cad_color, combined_transparency, flat_material, ModelMaterialCache};
use crate::settings::{MaterialMode, SceneSettings};

/// Footprint placement in board space: translate to the footprint anchor
/// at the model height of its face, rotate by its orientation, turn over
/// when flipped, and scale model millimetres to board units.
pub fn footprint_transform(board: &Board, footprint: &Footprint) -> Transform {
    let [x, y] = footprint.position;
    let mut m = Transform::translation(x, y, board.model_z(footprint.flipped));
    if footprint.orientation != 0.0 {
        m = m.then(&Transform::rotation_z(footprint.orientation.to_radians()));
    }
    if footprint.flipped {
        m = m
            .then(&Transform::rotation_y(PI))
            .then(&Transform::rotation_z(PI));
    }
    m.then(&Transform::uniform_scale(board.stackup().units_per_mm))
}

/// Per-model placement inside a footprint. Rotations are applied Z first
/// and in the negative sense, as model libraries specify them.
pub fn model_transform(footprint: &Transform, placement: &ModelPlacement) -> Transform {
    let [ox, oy, oz] = placement.offset;
    let [rx, ry, rz] = placement.rotation;
    let [sx, sy, sz] = placement.scale;
    footprint
        .then(&Transform::translation(ox, oy, oz))
        .then(&Transform::rotation_z(-rz.to_radians()))
        .then(&Transform::rotation_y(-ry.to_radians()))
        .then(&Transform::rotation_x(-rx.to_radians()))
        .then(&Transform::scale(sx, sy, sz))
}

/// Where a model file is looked up. Relative names are taken from the
/// model directory when one is configured.
pub fn resolve_model_path(filename: &str, model_dir: Option<&Path>) -> PathBuf {
    let path = Path::new(filename);
    match model_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

/// How model triangles get their materials.
#[derive(Debug)]
pub enum ModelShading<'a> {
    /// Full materials, derived through the memo.
    Derived(&'a mut ModelMaterialCache),
    /// One flat material for every triangle, no transparency.
    Flat,
}

/// Counts of one model pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelStats {
    /// Model instances added to the scene.
    pub placed: usize,
    /// Model instances whose file could not be loaded.
    pub missing: usize,
    /// Triangles added.
    pub triangles: usize,
    /// Triangles or meshes dropped as invalid.
    pub skipped: usize,
}

/// Adds footprint models to a scene.
pub struct ModelPlacer<'a> {
    cache: &'a ModelCache,
    model_dir: Option<&'a Path>,
    settings: &'a SceneSettings,
    shading: ModelShading<'a>,
    registered: HashMap<ContentHash, Vec<MaterialId>>,
    flat: Option<MaterialId>,
    stats: ModelStats,
}

impl<'a> ModelPlacer<'a> {
    /// A placer for one reload.
    pub fn new(
        cache: &'a ModelCache,
        model_dir: Option<&'a Path>,
        settings: &'a SceneSettings,
        shading: ModelShading<'a>,
    ) -> Self {
        Self {
            cache,
            model_dir,
            settings,
            shading,
            registered: HashMap::new(),
            flat: None,
            stats: ModelStats::default(),
        }
    }

    /// Place the models of every visible footprint of `board`.
    pub fn place_board(mut self, scene: &mut SceneContainer, board: &Board) -> ModelStats {
        for footprint in board.footprints() {
            if footprint.models.is_empty() || !self.settings.flags.shows_footprint(footprint.kind) {
                continue;
            }
            let fp_matrix = footprint_transform(board, footprint);
            for placement in &footprint.models {
                self.place(scene, footprint, &fp_matrix, placement);
            }
        }
        debug!(
            placed = self.stats.placed,
            missing = self.stats.missing,
            triangles = self.stats.triangles,
            "models placed"
        );
        self.stats
    }

    fn place(
        &mut self,
        scene: &mut SceneContainer,
        footprint: &Footprint,
        fp_matrix: &Transform,
        placement: &ModelPlacement,
    ) {
        if placement.opacity <= f64::from(f32::EPSILON) || !placement.show || placement.filename.is_empty() {
            return;
        }
        let opacity = placement.opacity.min(1.0);
        let path = resolve_model_path(&placement.filename, self.model_dir);
        // the cache logs why a load failed
        let Some(entry) = self.cache.load(&path) else {
            debug!(file = %path.display(), item = ?footprint.item, "footprint model skipped");
            self.stats.missing += 1;
            return;
        };
        let model = entry.render_model();
        let materials = self.materials_for(scene, entry.hash(), &model);
        let matrix = model_transform(fp_matrix, placement);
        let item = footprint.item.map(BoardItemId);

        for mesh in &model.meshes {
            if mesh.material >= model.materials.len() {
                self.stats.skipped += 1;
                continue;
            }
            self.add_mesh(scene, &model, mesh, &matrix, &materials, opacity, item);
        }
        self.stats.placed += 1;
    }

    /// Scene material ids for each material slot of a model.
    fn materials_for(
        &mut self,
        scene: &mut SceneContainer,
        hash: &ContentHash,
        model: &RenderModel,
    ) -> Vec<MaterialId> {
        match &mut self.shading {
            ModelShading::Flat => {
                let id = *self.flat.get_or_insert_with(|| scene.add_material(flat_material()));
                vec![id; model.materials.len()]
            }
            ModelShading::Derived(memo) => self
                .registered
                .entry(*hash)
                .or_insert_with(|| {
                    memo.get_or_derive(hash, &model.materials)
                        .iter()
                        .map(|m| scene.add_material(m.clone()))
                        .collect()
                })
                .clone(),
        }
    }

    fn surface_color(&self, c: &Rgb) -> Rgb {
        match self.settings.material_mode {
            MaterialMode::CadMode => cad_color(c).to_linear(),
            _ => c.to_linear(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add_mesh(
        &mut self,
        scene: &mut SceneContainer,
        model: &RenderModel,
        mesh: &RenderMesh,
        matrix: &Transform,
        materials: &[MaterialId],
        opacity: f64,
        item: Option<BoardItemId>,
    ) {
        let source = &model.materials[mesh.material];
        let material = materials[mesh.material];
        let transparency = match self.shading {
            ModelShading::Derived(_) => Some(combined_transparency(source.transparency, opacity)),
            ModelShading::Flat => None,
        };
        let color = self.surface_color(&source.diffuse);
        let normal_matrix = matrix.normal_matrix();
        let vertex_count = mesh.positions.len().min(mesh.normals.len());

        for &[i0, i1, i2] in &mesh.triangles {
            let idx = [i0 as usize, i1 as usize, i2 as usize];
            if idx.iter().any(|&i| i >= vertex_count) {
                self.stats.skipped += 1;
                continue;
            }
            let v = idx.map(|i| matrix.apply_point(&mesh.positions[i]));
            let n = idx.map(|i| {
                (normal_matrix * mesh.normals[i])
                    .try_normalize(1e-12)
                    .unwrap_or_else(Vec3::zeros)
            });
            // winding is reversed relative to the mesh
            let Some(mut tri) = Triangle::with_normals([v[0], v[2], v[1]], [n[0], n[2], n[1]]) else {
                self.stats.skipped += 1;
                continue;
            };
            if let Some(colors) = &mesh.colors {
                if idx.iter().all(|&i| i < colors.len()) {
                    let c = idx.map(|i| self.surface_color(&colors[i]));
                    tri.set_vertex_colors([c[0], c[2], c[1]]);
                }
            }
            let mut object = Object3D::new(Primitive::Triangle(tri), material, color).with_item(item);
            if let Some(t) = transparency {
                object = object.with_transparency(t);
            }
            scene.add(object);
            self.stats.triangles += 1;
        }
    }
}
