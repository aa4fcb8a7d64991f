//! Dependency extraction and scheduling.
//!
//! Dependencies are found by pattern matching over the source text, not by
//! name resolution. The result may over- or under-approximate what a unit
//! really uses; the cache only checks that each dependency is present.
//!
//! Recognized forms, where `X` is the dependency:
//!
//! | form              | example                 |
//! |-------------------|-------------------------|
//! | `Load X`          | `Load Form2`            |
//! | `Unload X`        | `Unload Form2`          |
//! | `X.Show`/`X.Hide` | `frmAbout.Show`         |
//! | `Call X.Y`        | `Call Module1.Init`     |
//! | `X.Y(...)`        | `x = modMath.Sum(1, 2)` |
//! | `'#uses X`        | `'#uses Globals`        |
//!
//! The member-access forms only count when `X` looks like a unit name (see
//! [`DEFAULT_UNIT_NAME_PATTERN`]). `Load`, `Unload` and `'#uses` accept any
//! name but `Me`.

use crate::unit::CompilationUnit;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::LazyLock;

/// Names that look like a form, module or class by naming convention.
pub const DEFAULT_UNIT_NAME_PATTERN: &str = r"^(?:Form|frm|Module|mod|Class|cls)[A-Za-z0-9_]*$";

const NAME: &str = r"([A-Za-z_][A-Za-z0-9_]*)";

static LOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?im)^[ \t]*(?:Load|Unload)[ \t]+{NAME}")).expect("constant pattern")
});
static SHOW_HIDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b{NAME}\.(?i:Show|Hide)\b")).expect("constant pattern")
});
static CALL_MEMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i:\bCall)[ \t]+{NAME}\.[A-Za-z_]")).expect("constant pattern")
});
static MEMBER_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b{NAME}\.[A-Za-z_][A-Za-z0-9_]*[ \t]*\(")).expect("constant pattern")
});
static USES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*'#uses[ \t]+([A-Za-z_][A-Za-z0-9_.]*)").expect("constant pattern")
});

/// Finds the ids of the units a source refers to.
///
/// Implementations must not return `unit_id` itself or the same id twice.
pub trait DependencyExtractor: Send + Sync {
    fn extract(&self, unit_id: &str, source: &str) -> Vec<String>;
}

/// The default regex-based extractor.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    unit_name: Regex,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self {
            unit_name: Regex::new(DEFAULT_UNIT_NAME_PATTERN).expect("constant pattern"),
        }
    }

    /// Use a different notion of what a unit name looks like for the
    /// member-access forms.
    pub fn with_unit_name_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            unit_name: Regex::new(pattern)?,
        })
    }

    fn looks_like_unit(&self, name: &str) -> bool {
        self.unit_name.is_match(name)
    }
}

impl DependencyExtractor for PatternExtractor {
    fn extract(&self, unit_id: &str, source: &str) -> Vec<String> {
        // (offset, name) so results come out in source order
        let mut found: Vec<(usize, &str)> = Vec::new();

        let mut collect = |regex: &Regex, needs_unit_name: bool| {
            for caps in regex.captures_iter(source) {
                let Some(name) = caps.get(1) else { continue };
                let text = name.as_str();
                if text.eq_ignore_ascii_case("Me") {
                    continue;
                }
                if needs_unit_name && !self.looks_like_unit(text) {
                    continue;
                }
                found.push((name.start(), text));
            }
        };

        collect(&*LOAD, false);
        collect(&*USES, false);
        collect(&*SHOW_HIDE, true);
        collect(&*CALL_MEMBER, true);
        collect(&*MEMBER_CALL, true);

        found.sort_by_key(|(offset, _)| *offset);

        let mut seen = FxHashSet::default();
        found
            .into_iter()
            .filter(|(_, name)| !name.eq_ignore_ascii_case(unit_id))
            .filter(|(_, name)| seen.insert(name.to_ascii_lowercase()))
            .map(|(_, name)| name.to_string())
            .collect()
    }
}

/// Unit id to the ids it depends on. Directed and possibly cyclic.
///
/// Dependency names are matched to unit ids ignoring ASCII case, so
/// `Load form2` refers to the unit `Form2`.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: FxHashMap<String, Vec<String>>,
    /// Lowercased id to the id as inserted.
    folded: FxHashMap<String, String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_units<'a>(units: impl IntoIterator<Item = &'a CompilationUnit>) -> Self {
        let mut graph = Self::new();
        for unit in units {
            graph.insert(unit);
        }
        graph
    }

    /// Record a unit's dependencies, replacing any previous entry for it.
    pub fn insert(&mut self, unit: &CompilationUnit) {
        self.folded
            .insert(unit.id().to_ascii_lowercase(), unit.id().to_string());
        self.edges
            .insert(unit.id().to_string(), unit.dependencies().to_vec());
    }

    /// The id of the unit `name` refers to: an exact match first, then one
    /// that differs only in case.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.edges.get_key_value(name) {
            return Some(key.as_str());
        }
        self.folded
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn dependencies_of(&self, id: &str) -> Option<&[String]> {
        self.edges.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    /// Number of units in the graph.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.edges.clear();
        self.folded.clear();
    }

    /// Order `roots` so that every id comes after the ids it depends on.
    ///
    /// Depth-first, dependencies before dependents. Ids not in the graph are
    /// skipped, so only graph members appear in the result, each once. A
    /// visited set ends the walk on cycles; the order among the members of
    /// a cycle follows discovery.
    pub fn topological_order<'a>(&self, roots: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut order = Vec::new();

        for root in roots {
            self.visit(root, &mut visited, &mut order);
        }
        order
    }

    fn visit<'g>(&'g self, id: &str, visited: &mut FxHashSet<&'g str>, order: &mut Vec<String>) {
        let Some((key, deps)) = self.resolve(id).and_then(|id| self.edges.get_key_value(id)) else {
            return;
        };
        if !visited.insert(key.as_str()) {
            return;
        }

        // Explicit stack of (node, its dependencies, next index) keeps deep
        // chains off the call stack
        let mut stack: Vec<(&'g str, &'g [String], usize)> =
            vec![(key.as_str(), deps.as_slice(), 0)];
        while let Some(top) = stack.last_mut() {
            let (node, deps, next) = *top;
            match deps.get(next) {
                Some(dep) => {
                    top.2 += 1;
                    let target = self.resolve(dep).and_then(|id| self.edges.get_key_value(id));
                    if let Some((dep_key, dep_deps)) = target {
                        if visited.insert(dep_key.as_str()) {
                            stack.push((dep_key.as_str(), dep_deps.as_slice(), 0));
                        }
                    }
                }
                None => {
                    order.push(node.to_string());
                    stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(id: &str, source: &str) -> Vec<String> {
        PatternExtractor::new().extract(id, source)
    }

    fn unit(id: &str, source: &str) -> CompilationUnit {
        CompilationUnit::new(id, source, &PatternExtractor::new())
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|x| x == id).unwrap()
    }

    #[test]
    fn load_and_unload() {
        assert_eq!(extract("Main", "Load Form2\nUnload Form3\nUnload Me"), ["Form2", "Form3"]);
    }

    #[test]
    fn show_and_hide_need_unit_like_names() {
        assert_eq!(extract("Main", "frmAbout.Show\nText1.Hide\nMe.Hide"), ["frmAbout"]);
    }

    #[test]
    fn member_calls() {
        let source = "Call Module1.Init\nx = modMath.Sum(1, 2)\n\
                      y = Text1.Text\nz = List1.AddItem(3)";
        assert_eq!(extract("Main", source), ["Module1", "modMath"]);
    }

    #[test]
    fn uses_directive() {
        let source = "'#uses Globals\n  '#uses Shared.bas\nDim x";
        assert_eq!(extract("Main", source), ["Globals", "Shared.bas"]);
    }

    #[test]
    fn self_and_duplicates_removed() {
        let source = "Form1.Show\nForm2.Show\nLoad Form2\nform2.Hide";
        assert_eq!(extract("Form1", source), ["Form2"]);
    }

    #[test]
    fn results_follow_source_order() {
        let source = "x = modB.F(1)\nLoad FormA";
        assert_eq!(extract("Main", source), ["modB", "FormA"]);
    }

    #[test]
    fn custom_unit_name_pattern() {
        let extractor = PatternExtractor::with_unit_name_pattern(r"^Lib").unwrap();
        assert_eq!(extractor.extract("Main", "LibA.Show\nForm1.Show"), ["LibA"]);
        assert!(PatternExtractor::with_unit_name_pattern("(").is_err());
    }

    #[test]
    fn dependencies_come_first() {
        let units = [
            unit("Form1", "Load Form2\nCall Module1.Init"),
            unit("Form2", "Call Module1.Init"),
            unit("Module1", "Dim x"),
        ];
        let graph = DependencyGraph::from_units(&units);
        let order = graph.topological_order(units.iter().map(|u| u.id()));

        assert_eq!(order.len(), 3);
        assert!(position(&order, "Module1") < position(&order, "Form2"));
        assert!(position(&order, "Form2") < position(&order, "Form1"));
    }

    #[test]
    fn transitive_dependencies_precede() {
        let units = [
            unit("Module1", "'#uses Module2"),
            unit("Module2", "'#uses Module3"),
            unit("Module3", "'#uses Module4"),
            unit("Module4", ""),
        ];
        let graph = DependencyGraph::from_units(&units);
        let order = graph.topological_order(["Module1"]);
        assert_eq!(order, ["Module4", "Module3", "Module2", "Module1"]);
    }

    #[test]
    fn cycles_terminate() {
        let units = [
            unit("ModuleA", "'#uses ModuleB"),
            unit("ModuleB", "'#uses ModuleC"),
            unit("ModuleC", "'#uses ModuleA"),
        ];
        let graph = DependencyGraph::from_units(&units);
        let order = graph.topological_order(units.iter().map(|u| u.id()));

        assert_eq!(order.len(), 3);
        assert_eq!(order, ["ModuleC", "ModuleB", "ModuleA"]);
    }

    #[test]
    fn missing_targets_are_skipped() {
        let units = [unit("Form1", "Load Form9")];
        let graph = DependencyGraph::from_units(&units);
        assert_eq!(graph.topological_order(["Form1", "Nowhere"]), ["Form1"]);
        assert_eq!(graph.dependencies_of("Form1"), Some(&["Form9".to_string()][..]));
    }

    #[test]
    fn names_resolve_ignoring_case() {
        let units = [unit("Form1", "Load form2"), unit("Form2", "Dim x")];
        let graph = DependencyGraph::from_units(&units);

        assert_eq!(graph.resolve("FORM2"), Some("Form2"));
        assert_eq!(graph.resolve("Form9"), None);
        assert_eq!(graph.topological_order(["Form1", "Form2"]), ["Form2", "Form1"]);
    }

    #[test]
    fn long_chains_do_not_overflow() {
        let units: Vec<CompilationUnit> = (0..5_000)
            .map(|i| unit(&format!("Module{}", i), &format!("'#uses Module{}", i + 1)))
            .collect();
        let graph = DependencyGraph::from_units(&units);
        let order = graph.topological_order(["Module0"]);
        assert_eq!(order.len(), 5_000);
        assert_eq!(order[0], "Module4999");
    }

    #[test]
    fn insert_replaces() {
        let mut graph = DependencyGraph::new();
        graph.insert(&unit("Form1", "Load Form2"));
        graph.insert(&unit("Form1", "Dim x"));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.dependencies_of("Form1"), Some(&[][..]));
    }
}
