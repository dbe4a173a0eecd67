pub mod rationale;
pub mod service;

pub use rationale::{capabilities_from_ranks, selection_reason};
pub use service::{RouterService, TOP_K};
