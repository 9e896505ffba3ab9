/// vSlice session: the state behind an interactive frontend.
///
/// This crate holds the scan lifecycle, filter editing and recalculation
/// scheduling a frontend drives. Business logic lives in `vslice-core`.
pub mod filters;
pub mod state;

pub use filters::FilterEditor;
pub use state::{AppPhase, AppState, DetailRow, DetailView};
