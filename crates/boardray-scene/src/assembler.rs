//! Scene reload orchestration.
//!
//! A [`SceneAssembler`] owns the inputs of a reload (board, settings,
//! model cache) and the last published [`Scene`]. Each call to
//! [`SceneAssembler::reload`] builds a fresh scene from scratch; a reload
//! started later supersedes any reload still running, and only the latest
//! one publishes its result.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use boardray_math::Aabb3;
use boardray_model_cache::ModelCache;
use boardray_raytrace::{PrimitiveKind, Ray, SceneContainer, SceneHit};
use tracing::{debug, info};

use crate::board::Board;
use crate::environment::{add_backdrop, add_board_body, add_lights, build_outline, OutlinePieces};
use crate::error::Result;
use crate::holes::{add_pad_barrels, add_via_barrels};
use crate::layers::{add_layers, add_masks, add_plated_pads};
use crate::materials::{BoardMaterial, BoardMaterials};
use crate::model_materials::ModelMaterialCache;
use crate::models::{ModelPlacer, ModelShading};
use crate::reporter::{report, Reporter};
use crate::settings::SceneSettings;

/// What one reload produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneStats {
    /// Objects per primitive kind.
    pub by_kind: BTreeMap<PrimitiveKind, usize>,
    /// Layer items stored as CSG composites.
    pub composites: usize,
    /// Shapes, barrels and triangles dropped as invalid.
    pub skipped: usize,
    /// Model instances placed.
    pub models_placed: usize,
    /// Model instances whose file could not be loaded.
    pub models_missing: usize,
    /// Lights in the scene.
    pub lights: usize,
    /// Wall time of the reload.
    pub elapsed: Duration,
}

impl SceneStats {
    /// Objects of every kind.
    pub fn objects(&self) -> usize {
        self.by_kind.values().sum()
    }
}

/// A finished, immutable scene.
#[derive(Debug)]
pub struct Scene {
    generation: u64,
    container: SceneContainer,
    stats: SceneStats,
    reduced: bool,
}

impl Scene {
    /// Reload generation that produced this scene. Later reloads have
    /// larger generations.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The objects, materials, lights and BVH.
    pub fn container(&self) -> &SceneContainer {
        &self.container
    }

    /// Counts of the reload.
    pub fn stats(&self) -> &SceneStats {
        &self.stats
    }

    /// Whether only copper, plated pads and models were loaded.
    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.container.len()
    }

    /// Whether the scene has no objects.
    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }

    /// Bounds of every object.
    pub fn bbox(&self) -> &Aabb3 {
        self.container.bbox()
    }

    /// Closest hit along `ray` within `[t_min, t_max]`.
    pub fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<SceneHit> {
        self.container.intersect(ray, t_min, t_max)
    }
}

/// Builds scenes from a board, settings and a model cache.
pub struct SceneAssembler {
    cache: Arc<ModelCache>,
    model_dir: RwLock<Option<PathBuf>>,
    board: RwLock<Option<Arc<Board>>>,
    settings: RwLock<Arc<SceneSettings>>,
    model_materials: Mutex<ModelMaterialCache>,
    generation: AtomicU64,
    current: RwLock<Option<Arc<Scene>>>,
}

impl std::fmt::Debug for SceneAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneAssembler")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("has_board", &self.board().is_some())
            .finish_non_exhaustive()
    }
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(PoisonError::into_inner) = value;
}

impl SceneAssembler {
    /// An assembler with default settings and no board.
    pub fn new(cache: Arc<ModelCache>) -> Self {
        Self {
            cache,
            model_dir: RwLock::new(None),
            board: RwLock::new(None),
            settings: RwLock::new(Arc::new(SceneSettings::default())),
            model_materials: Mutex::new(ModelMaterialCache::new()),
            generation: AtomicU64::new(0),
            current: RwLock::new(None),
        }
    }

    /// The model cache.
    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// Attach the board the next reload uses.
    pub fn set_board(&self, board: impl Into<Arc<Board>>) {
        write(&self.board, Some(board.into()));
    }

    /// The attached board.
    pub fn board(&self) -> Option<Arc<Board>> {
        read(&self.board)
    }

    /// Replace the settings the next reload uses. Invalid settings are
    /// rejected and the previous ones kept.
    pub fn set_settings(&self, settings: SceneSettings) -> Result<()> {
        settings.validate()?;
        write(&self.settings, Arc::new(settings));
        Ok(())
    }

    /// Current settings.
    pub fn settings(&self) -> Arc<SceneSettings> {
        read(&self.settings)
    }

    /// Directory relative model filenames are resolved against.
    pub fn set_model_dir(&self, dir: Option<PathBuf>) {
        write(&self.model_dir, dir);
    }

    /// The last published scene.
    pub fn current(&self) -> Option<Arc<Scene>> {
        read(&self.current)
    }

    /// Generation of the most recently started reload.
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Materials derived so far for the current material key.
    pub fn model_materials_len(&self) -> usize {
        self.model_materials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Build a new scene from the attached board and current settings.
    ///
    /// With `reduced`, only copper layers, plated pads and models (with a
    /// flat material) are loaded; the board body, masks, barrels, backdrop
    /// and lights are left out.
    ///
    /// Returns the published scene, or `None` when a later reload started
    /// before this one finished. Superseded reloads stop at the next phase
    /// boundary and leave the current scene untouched.
    ///
    /// # Panics
    ///
    /// Panics if no board is attached.
    pub fn reload(&self, reporter: Option<&dyn Reporter>, reduced: bool) -> Option<Arc<Scene>> {
        let board = self
            .board()
            .unwrap_or_else(|| panic!("SceneAssembler::reload called without a board"));
        let settings = self.settings();
        let model_dir = read(&self.model_dir);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let start = Instant::now();

        let (container, stats) =
            self.build(&board, &settings, model_dir.as_deref(), reporter, reduced, generation)?;

        let elapsed = start.elapsed();
        let stats = SceneStats { elapsed, ..stats };
        report(reporter, &format!("Reload time {:.3} s", elapsed.as_secs_f64()));

        let scene = Arc::new(Scene {
            generation,
            container,
            stats,
            reduced,
        });

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if self.is_superseded(generation) {
            debug!(generation, "reload finished after a newer one started");
            return None;
        }
        info!(
            generation,
            objects = scene.len(),
            lights = scene.stats.lights,
            reduced,
            elapsed_ms = elapsed.as_millis() as u64,
            "scene published"
        );
        *current = Some(Arc::clone(&scene));
        Some(scene)
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn checkpoint(&self, generation: u64, phase: &str) -> Option<()> {
        if self.is_superseded(generation) {
            debug!(generation, phase, "reload superseded");
            None
        } else {
            Some(())
        }
    }

    fn build(
        &self,
        board: &Board,
        settings: &SceneSettings,
        model_dir: Option<&Path>,
        reporter: Option<&dyn Reporter>,
        reduced: bool,
        generation: u64,
    ) -> Option<(SceneContainer, SceneStats)> {
        let units_per_mm = board.stackup().units_per_mm;
        let mut stats = SceneStats {
            skipped: board.skipped(),
            ..SceneStats::default()
        };

        report(reporter, "Load Raytracing: board");
        let mut scene = SceneContainer::new(board.arena().clone());
        let ids = BoardMaterials::new(settings, units_per_mm).register(&mut scene);

        let pieces = if reduced {
            OutlinePieces::empty()
        } else {
            build_outline(&mut scene, board)
        };
        if !reduced && settings.flags.show_board_body && !pieces.fragments.is_empty() {
            let body = add_board_body(
                &mut scene,
                board,
                &pieces,
                ids.get(BoardMaterial::Epoxy),
                settings.colors.board_body.rgb().to_linear(),
            );
            stats.composites += body.slabs.composites;
        }
        self.checkpoint(generation, "board")?;

        report(reporter, "Load Raytracing: layers");
        let layers = add_layers(&mut scene, board, settings, &pieces.anti_outline, &ids, reduced);
        let pads = add_plated_pads(&mut scene, board, settings, &pieces.anti_outline, &ids);
        stats.composites += layers.composites + pads.composites;

        if !reduced {
            let masks = add_masks(&mut scene, board, settings, &pieces.fragments, &ids);
            let copper = ids.get(BoardMaterial::Copper);
            let vias = add_via_barrels(&mut scene, board, settings, copper);
            let barrels = add_pad_barrels(&mut scene, board, settings, &pieces.anti_outline, copper);
            stats.composites += masks.composites + barrels.composites;
            stats.skipped += vias.skipped + barrels.skipped;
        }
        self.checkpoint(generation, "layers")?;

        report(reporter, "Loading 3D models");
        let models = if reduced {
            ModelPlacer::new(&self.cache, model_dir, settings, ModelShading::Flat).place_board(&mut scene, board)
        } else {
            let mut memo = self
                .model_materials
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            memo.prepare(settings.model_material_key(), units_per_mm);
            ModelPlacer::new(&self.cache, model_dir, settings, ModelShading::Derived(&mut memo))
                .place_board(&mut scene, board)
        };
        stats.models_placed = models.placed;
        stats.models_missing = models.missing;
        stats.skipped += models.skipped;
        self.checkpoint(generation, "models")?;

        if !reduced {
            if settings.flags.backfloor {
                add_backdrop(
                    &mut scene,
                    board,
                    ids.get(BoardMaterial::Floor),
                    settings.colors.background_top.to_linear(),
                );
            }
            stats.lights = add_lights(&mut scene, board, settings);
        }

        scene.build_bvh(settings.bvh.leaf_size, settings.bvh.split);
        stats.by_kind = scene.count_by_kind();
        debug!(
            objects = scene.len(),
            composites = stats.composites,
            skipped = stats.skipped,
            "scene built"
        );
        Some((scene, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::two_layer_board;
    use crate::reporter::CollectingReporter;

    fn assembler() -> SceneAssembler {
        let a = SceneAssembler::new(Arc::new(ModelCache::default()));
        a.set_board(Board::from_description(two_layer_board()).unwrap());
        a
    }

    #[test]
    fn test_reload_reports_phases_in_order() {
        let a = assembler();
        let r = CollectingReporter::new();
        let scene = a.reload(Some(&r), false).unwrap();
        let phases = r.phases();
        assert_eq!(
            &phases[..3],
            ["Load Raytracing: board", "Load Raytracing: layers", "Loading 3D models"]
        );
        assert!(phases[3].starts_with("Reload time "));
        assert_eq!(scene.generation(), 1);
        assert!(!scene.is_empty());
        assert!(scene.stats().lights >= 1);
        assert_eq!(scene.stats().objects(), scene.len());
    }

    #[test]
    fn test_reload_publishes_current() {
        let a = assembler();
        assert!(a.current().is_none());
        let first = a.reload(None, false).unwrap();
        let second = a.reload(None, false).unwrap();
        assert_eq!(second.generation(), first.generation() + 1);
        assert_eq!(a.current().unwrap().generation(), second.generation());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let a = assembler();
        let mut s = SceneSettings::default();
        s.bvh.leaf_size = 0;
        assert!(a.set_settings(s).is_err());
        assert_eq!(a.settings().bvh.leaf_size, SceneSettings::default().bvh.leaf_size);
    }

    #[test]
    #[should_panic(expected = "without a board")]
    fn test_reload_without_board_panics() {
        let a = SceneAssembler::new(Arc::new(ModelCache::default()));
        a.reload(None, false);
    }
}
