pub mod engine;
pub mod scoring;

/// Number of skill axes a model is ranked on.
pub const SKILL_COUNT: usize = 5;

/// Skill axes in rank-vector order.
pub const SKILLS: [&str; SKILL_COUNT] = ["math", "code", "if", "expert", "safety"];

pub use engine::{AbilityMatrix, CapabilityEngine, CapabilitySink, NullSink};
pub use scoring::{SCALE, capability_row};
