// Detection pipeline — sharded, single-writer event processing.
//
// Events are partitioned by user across a fixed number of shards; each
// shard is one tokio task that owns its users' profiles outright. Events
// for the same user are therefore processed in arrival order and never
// concurrently, while different users proceed in parallel with no locks.

pub mod detector;
pub mod shards;
pub mod stats;

pub use detector::Detector;
pub use shards::{Pipeline, PipelineOptions};
pub use stats::{EngineStats, StatsSnapshot};
