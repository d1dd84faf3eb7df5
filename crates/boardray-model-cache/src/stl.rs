//! STL reader (ASCII and binary).

use std::path::Path;

use boardray_math::Vec3;

use crate::error::ImportError;
use crate::importer::ModelImporter;
use crate::scene::{Mesh, MeshMaterial, SceneGraph};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Importer for `.stl` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct StlImporter;

impl ModelImporter for StlImporter {
    fn name(&self) -> &str {
        "stl"
    }

    fn extensions(&self) -> &[&str] {
        &["stl"]
    }

    fn import(&self, path: &Path) -> Result<SceneGraph, ImportError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("stl");
        parse_stl(&bytes, name)
    }
}

/// Parse STL bytes into a single-node scene graph.
pub fn parse_stl(bytes: &[u8], name: &str) -> Result<SceneGraph, ImportError> {
    let facets = if is_binary(bytes) {
        parse_binary(bytes)?
    } else if bytes.trim_ascii_start().starts_with(b"solid") {
        parse_ascii(bytes)?
    } else {
        return Err(ImportError::malformed("neither ASCII nor binary STL"));
    };
    if facets.is_empty() {
        return Err(ImportError::malformed("no facets"));
    }

    let mut mesh = Mesh::default();
    for (normal, verts) in facets {
        let normal = facet_normal(normal, &verts);
        for v in verts {
            mesh.indices.push(mesh.positions.len() as u32);
            mesh.positions.push(v);
            mesh.normals.push(normal);
        }
    }
    let scene = SceneGraph::single_node(name, vec![mesh], vec![MeshMaterial::default()]);
    scene.validate()?;
    Ok(scene)
}

type Facet = ([f32; 3], [[f32; 3]; 3]);

fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN + 4 {
        return false;
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    bytes.len() == HEADER_LEN + 4 + count * FACET_LEN
}

fn read_vec(chunk: &[u8]) -> [f32; 3] {
    let f = |i: usize| f32::from_le_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]]);
    [f(0), f(4), f(8)]
}

fn parse_binary(bytes: &[u8]) -> Result<Vec<Facet>, ImportError> {
    let facets = bytes[HEADER_LEN + 4..]
        .chunks_exact(FACET_LEN)
        .map(|c| {
            (
                read_vec(&c[0..12]),
                [read_vec(&c[12..24]), read_vec(&c[24..36]), read_vec(&c[36..48])],
            )
        })
        .collect::<Vec<_>>();
    if facets
        .iter()
        .any(|(_, vs)| vs.iter().flatten().any(|x| !x.is_finite()))
    {
        return Err(ImportError::malformed("non-finite vertex"));
    }
    Ok(facets)
}

fn parse_ascii(bytes: &[u8]) -> Result<Vec<Facet>, ImportError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ImportError::malformed(e.to_string()))?;
    let mut tokens = text.split_ascii_whitespace();
    let mut facets = Vec::new();
    let mut normal = [0.0f32; 3];
    let mut verts: Vec<[f32; 3]> = Vec::with_capacity(3);

    while let Some(tok) = tokens.next() {
        match tok {
            "normal" => normal = read3(&mut tokens)?,
            "vertex" => verts.push(read3(&mut tokens)?),
            "endfacet" => {
                if verts.len() != 3 {
                    return Err(ImportError::malformed(format!(
                        "facet {} has {} vertices",
                        facets.len(),
                        verts.len()
                    )));
                }
                facets.push((normal, [verts[0], verts[1], verts[2]]));
                verts.clear();
                normal = [0.0; 3];
            }
            _ => {}
        }
    }
    if !verts.is_empty() {
        return Err(ImportError::malformed("unterminated facet"));
    }
    Ok(facets)
}

fn read3(tokens: &mut std::str::SplitAsciiWhitespace<'_>) -> Result<[f32; 3], ImportError> {
    let mut v = [0.0f32; 3];
    for slot in &mut v {
        let tok = tokens
            .next()
            .ok_or_else(|| ImportError::malformed("unexpected end of file"))?;
        *slot = tok
            .parse()
            .map_err(|_| ImportError::malformed(format!("bad number '{tok}'")))?;
    }
    Ok(v)
}

/// The stored facet normal, or the winding normal when it is missing.
fn facet_normal(stored: [f32; 3], verts: &[[f32; 3]; 3]) -> [f32; 3] {
    let n = Vec3::new(stored[0] as f64, stored[1] as f64, stored[2] as f64);
    if n.norm() > 1e-6 {
        let n = n.normalize();
        return [n.x as f32, n.y as f32, n.z as f32];
    }
    let p = |i: usize| Vec3::new(verts[i][0] as f64, verts[i][1] as f64, verts[i][2] as f64);
    let n = (p(1) - p(0)).cross(&(p(2) - p(0)));
    match n.try_normalize(1e-12) {
        Some(n) => [n.x as f32, n.y as f32, n.z as f32],
        None => [0.0, 0.0, 1.0],
    }
}
