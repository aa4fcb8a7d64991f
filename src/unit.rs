//! Compilation units.
//!
//! A unit is one named source text (a module or form file) together with
//! its content hash and the names of the units it refers to. Units are
//! immutable: editing a file produces a new unit that supersedes the old one.

use crate::deps::{DependencyExtractor, DependencyGraph};
use std::time::SystemTime;
use vbstudio_core::ContentHash;

/// One named source text submitted for compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationUnit {
    id: String,
    source: String,
    hash: ContentHash,
    dependencies: Vec<String>,
    last_modified: SystemTime,
}

impl CompilationUnit {
    /// Create a unit, hashing the source and extracting dependencies with
    /// `extractor`.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        extractor: &dyn DependencyExtractor,
    ) -> Self {
        let id = id.into();
        let source = source.into();
        let hash = ContentHash::of(&source);
        let dependencies = extractor.extract(&id, &source);

        Self {
            id,
            source,
            hash,
            dependencies,
            last_modified: SystemTime::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// Ids of the units this one refers to, without duplicates or itself.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    /// Rewrite dependency names to the ids `graph` knows them by, so that
    /// `form2` becomes `Form2`. Names the graph cannot resolve are kept as
    /// written.
    pub fn resolve_dependencies(&mut self, graph: &DependencyGraph) {
        for dep in &mut self.dependencies {
            if let Some(id) = graph.resolve(dep) {
                if id != dep.as_str() {
                    *dep = id.to_string();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::PatternExtractor;

    #[test]
    fn same_source_same_hash() {
        let extractor = PatternExtractor::new();
        let a = CompilationUnit::new("Module1", "Dim x", &extractor);
        let b = CompilationUnit::new("Module2", "Dim x", &extractor);
        let c = CompilationUnit::new("Module1", "Dim y", &extractor);

        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn dependencies_are_extracted_on_creation() {
        let extractor = PatternExtractor::new();
        let unit = CompilationUnit::new("Form1", "Sub Go()\n  Form2.Show\nEnd Sub", &extractor);
        assert_eq!(unit.id(), "Form1");
        assert_eq!(unit.dependencies(), ["Form2".to_string()]);
        assert!(unit.last_modified() <= SystemTime::now());
    }

    #[test]
    fn dependencies_resolve_to_known_ids() {
        let extractor = PatternExtractor::new();
        let target = CompilationUnit::new("Form2", "Dim x", &extractor);
        let mut unit = CompilationUnit::new("Form1", "Load form2\nLoad Form9", &extractor);

        let mut graph = DependencyGraph::new();
        graph.insert(&target);
        unit.resolve_dependencies(&graph);

        assert_eq!(unit.dependencies(), ["Form2".to_string(), "Form9".to_string()]);
    }
}
