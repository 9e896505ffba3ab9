/// Read-only queries over a recalculated tree.

pub mod common_values;
pub mod details;

pub use common_values::common_values;
pub use details::{detail_items, DetailItem, NodeDetails};
