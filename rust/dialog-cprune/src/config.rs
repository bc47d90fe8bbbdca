//! Configuration for collaborative pruning.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Configuration of the [`Pruner`](crate::Pruner) and the exploit/explore
/// protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    /// Number of nearest-neighbor entries consulted per example. `None` (or
    /// zero) predicts from every pattern recorded so far.
    pub max_num_neighbors: Option<usize>,

    /// File of precomputed neighbors, one `<id>\t<id>,<id>,...` line per
    /// example.
    pub neighbor_file_path: Option<PathBuf>,

    /// Number of top-ranked patterns whose rules enter the mini-grammar
    /// (default: all).
    pub max_predicted_patterns: Option<usize>,

    /// Derivation cap of the exploit search (default: 5000)
    pub max_derivations: usize,

    /// Early-stopping cap of the explore search (default: 50000)
    pub max_explore_derivations: usize,

    /// Number of explore searches allowed per data group (default: unbounded)
    pub max_exploration_iters: Option<usize>,

    /// Whether synthesized templates are decomposed into one rule per
    /// subtree (default: true)
    pub enable_template_decomposition: bool,

    /// Canonicalization of patterns
    pub pattern: PatternConfig,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            max_num_neighbors: None,
            neighbor_file_path: None,
            max_predicted_patterns: None,
            max_derivations: 5000,
            max_explore_derivations: 50000,
            max_exploration_iters: None,
            enable_template_decomposition: true,
            pattern: PatternConfig::default(),
        }
    }
}

impl PruningConfig {
    /// Restrict prediction to the first `count` neighbors of each example
    pub fn with_max_num_neighbors(mut self, count: usize) -> Self {
        self.max_num_neighbors = Some(count);
        self
    }

    /// Read neighbors from `path`
    pub fn with_neighbor_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.neighbor_file_path = Some(path.into());
        self
    }

    pub fn with_max_predicted_patterns(mut self, count: usize) -> Self {
        self.max_predicted_patterns = Some(count);
        self
    }

    pub fn with_max_derivations(mut self, count: usize) -> Self {
        self.max_derivations = count;
        self
    }

    pub fn with_max_explore_derivations(mut self, count: usize) -> Self {
        self.max_explore_derivations = count;
        self
    }

    pub fn with_max_exploration_iters(mut self, count: usize) -> Self {
        self.max_exploration_iters = Some(count);
        self
    }

    pub fn with_template_decomposition(mut self, enable: bool) -> Self {
        self.enable_template_decomposition = enable;
        self
    }

    pub fn with_pattern(mut self, pattern: PatternConfig) -> Self {
        self.pattern = pattern;
        self
    }
}

/// Rewrites that turn an indexed formula into a canonical pattern.
///
/// Defaults target table question answering: cell properties are elided and
/// the row relations that survive abstraction are shortened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Names starting with any of these prefixes are property predicates,
    /// removed before abstraction.
    pub property_prefixes: Vec<String>,

    /// Names replaced by another name.
    pub renames: IndexMap<String, String>,

    /// Names replaced by a formula, written as an s-expression.
    pub expansions: IndexMap<String, String>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        let renames = [
            ("fb:row.row.next", "@next"),
            ("fb:type.object.type", "@type"),
            ("fb:type.row", "@row"),
            ("<", "@compare"),
            ("<=", "@compare"),
            (">", "@compare"),
            (">=", "@compare"),
        ];
        let expansions = [(
            "fb:row.row.index",
            "(@R (lambda x ((@R @index) (var x))))",
        )];

        Self {
            property_prefixes: vec!["fb:cell.cell.".to_string()],
            renames: renames
                .into_iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            expansions: expansions
                .into_iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

impl PatternConfig {
    pub fn with_property_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.property_prefixes.push(prefix.into());
        self
    }

    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    pub fn with_expansion(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.expansions.insert(from.into(), to.into());
        self
    }
}
