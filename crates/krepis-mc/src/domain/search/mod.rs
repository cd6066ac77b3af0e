//! Search layer: visited states, session context, depth-first driver

pub mod context;
pub mod dfs;
pub mod report;
pub mod state_set;

pub use context::{CancelToken, SearchContext};
pub use dfs::DepthFirstSearch;
pub use report::{SearchOutcome, SearchReport, SearchStats, Violation, ViolationKind};
pub use state_set::StateSet;
