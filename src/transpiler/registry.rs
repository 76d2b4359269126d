//! Backend lookup table
//!
//! The table is an explicit value: [`Registry::builtin`] fills it with every
//! backend shipped in this crate and callers pass it to whatever needs a
//! lookup. Names are matched case-insensitively.

use std::collections::HashMap;

use super::error::{TranspileError, TranspileResult};
use super::{Backend, BashBackend, GalaxyBackend, NextflowBackend, PythonBackend, RBackend};

/// Constructor of a fresh backend instance.
pub type BackendConstructor = fn() -> Box<dyn Backend>;

/// Everything needed to pick and build a backend.
#[derive(Clone)]
pub struct BackendDescriptor {
    /// Lowercase registry name.
    pub name: &'static str,
    /// Output file extension, without the dot.
    pub extension: &'static str,
    /// Human-readable target name.
    pub display: &'static str,
    constructor: BackendConstructor,
}

impl BackendDescriptor {
    /// Describe a backend.
    pub fn new(
        name: &'static str,
        extension: &'static str,
        display: &'static str,
        constructor: BackendConstructor,
    ) -> Self {
        Self {
            name,
            extension,
            display,
            constructor,
        }
    }

    /// Build a fresh backend instance.
    pub fn create(&self) -> Box<dyn Backend> {
        (self.constructor)()
    }
}

impl std::fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("name", &self.name)
            .field("extension", &self.extension)
            .field("display", &self.display)
            .finish()
    }
}

/// Table from lowercase backend name to descriptor.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    backends: HashMap<String, BackendDescriptor>,
}

impl Registry {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding every backend in this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(BackendDescriptor::new("bash", "sh", "BASH", || {
            Box::new(BashBackend::new())
        }));
        registry.register(BackendDescriptor::new("python", "py", "Python", || {
            Box::new(PythonBackend::new())
        }));
        registry.register(BackendDescriptor::new("r", "R", "R", || {
            Box::new(RBackend::new())
        }));
        registry.register(BackendDescriptor::new(
            "nextflow",
            "nf",
            "NextFlow",
            || Box::new(NextflowBackend::new()),
        ));
        registry.register(BackendDescriptor::new("galaxy", "xml", "Galaxy", || {
            Box::new(GalaxyBackend::new())
        }));
        registry
    }

    /// Add a backend. A later registration under the same name wins.
    pub fn register(&mut self, descriptor: BackendDescriptor) {
        let name = descriptor.name.to_lowercase();
        if self.backends.insert(name, descriptor).is_some() {
            tracing::debug!("backend registration replaced an earlier one");
        }
    }

    /// Look up a backend by name, ignoring case.
    pub fn get(&self, name: &str) -> TranspileResult<&BackendDescriptor> {
        self.backends
            .get(&name.to_lowercase())
            .ok_or_else(|| TranspileError::UnsupportedLanguage(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.backends.values().map(|d| d.name).collect();
        names.sort_unstable();
        names
    }

    /// Registered descriptors, sorted by name.
    pub fn descriptors(&self) -> Vec<&BackendDescriptor> {
        let mut descriptors: Vec<&BackendDescriptor> = self.backends.values().collect();
        descriptors.sort_unstable_by_key(|d| d.name);
        descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lists_every_backend() {
        let registry = Registry::builtin();
        assert_eq!(
            registry.names(),
            vec!["bash", "galaxy", "nextflow", "python", "r"]
        );
    }

    #[test]
    fn lookup_ignores_case() {
        let registry = Registry::builtin();
        let descriptor = registry.get("Python").expect("python");
        assert_eq!(descriptor.extension, "py");
        assert_eq!(descriptor.display, "Python");
        assert_eq!(descriptor.create().name(), "python");
        assert_eq!(registry.get("R").expect("r").extension, "R");
    }

    #[test]
    fn unknown_language_names_the_attempt() {
        let err = Registry::builtin().get("cobol").unwrap_err();
        assert_eq!(err.to_string(), "unsupported language 'cobol'");
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = Registry::builtin();
        registry.register(BackendDescriptor::new("bash", "bash", "Shell", || {
            Box::new(BashBackend::new())
        }));
        assert_eq!(registry.get("bash").expect("bash").extension, "bash");
        assert_eq!(registry.names().len(), 5);
    }
}
