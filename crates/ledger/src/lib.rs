pub mod merkle;
pub mod sink;
pub mod trust;

pub use merkle::{canonical_json, merkle_root, sha256_hex};
pub use sink::{PerformanceReport, RecordSink, ViolationReport};
pub use trust::{Severity, TrustInputs, recompute_trust};
