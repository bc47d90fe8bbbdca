//! Precomputed nearest neighbors.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::{PruningError, PruningResult};

/// Nearest-neighbor lists keyed by example id, closest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Neighbors {
    neighbors: HashMap<String, Vec<String>>,
}

impl Neighbors {
    /// Read a neighbor file of `<id>\t<id>,<id>,...` lines.
    pub fn load(path: &Path) -> PruningResult<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| PruningError::NeighborFile {
                path: path.to_path_buf(),
                source,
            })?;
        let neighbors = Self::parse(&contents)?;
        info!(path = %path.display(), examples = neighbors.len(), "loaded neighbors");
        Ok(neighbors)
    }

    /// Parse neighbor lines. A later line for the same id replaces an
    /// earlier one.
    pub fn parse(contents: &str) -> PruningResult<Self> {
        let mut neighbors = HashMap::new();
        for (index, line) in contents.lines().enumerate() {
            let malformed = |reason| PruningError::MalformedNeighborLine {
                line: index + 1,
                content: line.to_string(),
                reason,
            };

            let Some((id, list)) = line.split_once('\t') else {
                return Err(malformed("expected a tab after the example id"));
            };
            if list.contains('\t') {
                return Err(malformed("more than one tab"));
            }
            if id.is_empty() {
                return Err(malformed("empty example id"));
            }
            let list: Vec<String> = list.split(',').map(str::to_string).collect();
            if list.iter().any(String::is_empty) {
                return Err(malformed("empty neighbor id"));
            }
            neighbors.insert(id.to_string(), list);
        }
        Ok(Self { neighbors })
    }

    /// The neighbors of `id`, empty if it has none.
    pub fn get(&self, id: &str) -> &[String] {
        self.neighbors.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}
