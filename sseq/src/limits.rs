// Centralized ingestion limits to harden against untrusted documents

use serde::{Deserialize, Serialize};

// Document size caps
pub const MAX_CLASSES: usize = 200_000;
pub const MAX_EDGES: usize = 400_000;
pub const MAX_NODE_TEMPLATES: usize = 10_000;
pub const MAX_PAGE_LIST_ENTRIES: usize = 10_000;
pub const MAX_NODES_PER_CLASS: usize = 1_000;

// Bidegree bounds
pub const COORD_MIN: i32 = -1_000_000;
pub const COORD_MAX: i32 = 1_000_000;

#[inline]
pub fn in_coord_bounds(v: i32) -> bool { (COORD_MIN..=COORD_MAX).contains(&v) }

/// Runtime view of the caps above; settings may tighten or relax them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_classes: usize,
    pub max_edges: usize,
    pub max_node_templates: usize,
    pub max_page_list_entries: usize,
    pub max_nodes_per_class: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_classes: MAX_CLASSES,
            max_edges: MAX_EDGES,
            max_node_templates: MAX_NODE_TEMPLATES,
            max_page_list_entries: MAX_PAGE_LIST_ENTRIES,
            max_nodes_per_class: MAX_NODES_PER_CLASS,
        }
    }
}
