pub mod engine;

pub use engine::{annualized_rate, SnapshotEngine};
