//! Pairwise matching, clustering and resolution of duplicate records.

pub mod audit;
pub mod blocking;
pub mod cancel;
pub mod cluster;
pub mod matcher;
pub mod merge;
pub mod similarity;
pub mod workflow;

pub use audit::{AuditAction, AuditEvent, AuditSink, MemoryAuditLog, TracingAuditSink};
pub use cancel::CancelToken;
pub use cluster::{Detection, DetectionOutcome, DuplicateClusterer};
pub use matcher::RecordMatcher;
pub use merge::merge_records;
pub use similarity::{Scorer, scorer_for};
pub use workflow::ResolutionWorkflow;
