//! Client-side replica of the library, refreshed by deltas.

mod local_db;
mod refresh;
mod view;

pub use local_db::{ApplyStats, LibraryIndexes, LocalDb};
pub use refresh::{DeltaSource, LocalReplica, RefreshOutcome};
pub use view::LibraryView;
