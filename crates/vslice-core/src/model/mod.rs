/// Data model for the vSlice item tree.
///
/// Re-exports the arena-allocated tree, its records and supporting types.
pub mod columns;
pub mod format;
pub mod item_record;
pub mod item_tree;
pub mod tree_node;

pub use columns::{standard, ColumnDef, ColumnKind, ColumnLayout};
pub use item_record::{parse_number, FieldValue, ItemRecord};
pub use item_tree::ItemTree;
pub use tree_node::{NodeIndex, NodeStats, TreeNode};

use parking_lot::Mutex;
use std::sync::Arc;

/// A tree shared between the scan owner and its readers.
///
/// Recalculation takes the lock for its whole duration, so two
/// recalculations of the same tree never interleave.
pub type SharedTree = Arc<Mutex<ItemTree>>;
