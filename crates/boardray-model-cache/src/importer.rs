//! Pluggable model importers.

use std::path::Path;

use tracing::debug;

use crate::error::ImportError;
use crate::scene::SceneGraph;

/// A model file format reader.
pub trait ModelImporter: Send + Sync {
    /// Short human-readable name.
    fn name(&self) -> &str;

    /// Lowercase file extensions handled, without the dot.
    fn extensions(&self) -> &[&str];

    /// Whether this importer accepts `path`. Defaults to an extension match.
    fn can_import(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.extensions().contains(&e.as_str()))
    }

    /// Parse `path` into a scene graph.
    fn import(&self, path: &Path) -> Result<SceneGraph, ImportError>;

    /// Release any resources held between imports.
    fn close(&self) {}
}

/// Ordered list of importers; the first one accepting a file wins.
#[derive(Default)]
pub struct ImporterRegistry {
    importers: Vec<Box<dyn ModelImporter>>,
}

impl ImporterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in importers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::stl::StlImporter));
        registry
    }

    /// Append an importer. Earlier registrations take precedence.
    pub fn register(&mut self, importer: Box<dyn ModelImporter>) {
        debug!(importer = importer.name(), "registered model importer");
        self.importers.push(importer);
    }

    /// First importer that accepts `path`.
    pub fn find(&self, path: &Path) -> Option<&dyn ModelImporter> {
        self.importers
            .iter()
            .find(|i| i.can_import(path))
            .map(|i| i.as_ref())
    }

    /// Close every importer.
    pub fn close_all(&self) {
        for importer in &self.importers {
            importer.close();
        }
    }

    /// Number of registered importers.
    pub fn len(&self) -> usize {
        self.importers.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.importers.is_empty()
    }
}

impl std::fmt::Debug for ImporterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.importers.iter().map(|i| i.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Named(&'static str, &'static [&'static str]);

    impl ModelImporter for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn extensions(&self) -> &[&str] {
            self.1
        }
        fn import(&self, path: &Path) -> Result<SceneGraph, ImportError> {
            Err(ImportError::UnsupportedFormat(path.to_path_buf()))
        }
    }

    #[test]
    fn test_first_accepting_importer_wins() {
        let mut registry = ImporterRegistry::new();
        registry.register(Box::new(Named("first", &["wrl"])));
        registry.register(Box::new(Named("second", &["wrl", "stl"])));
        let wrl = PathBuf::from("/models/R_0603.WRL");
        let stl = PathBuf::from("/models/R_0603.stl");
        assert_eq!(registry.find(&wrl).map(|i| i.name()), Some("first"));
        assert_eq!(registry.find(&stl).map(|i| i.name()), Some("second"));
        assert!(registry.find(Path::new("/models/R_0603.step")).is_none());
    }

    #[test]
    fn test_defaults_include_stl() {
        let registry = ImporterRegistry::with_defaults();
        assert!(registry.find(Path::new("part.STL")).is_some());
    }
}
