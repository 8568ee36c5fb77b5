//! The adaptive slow-write limiter: protects a replicated command pipeline
//! from individual slow operations by tracking per-(cmd,table) cost
//! histograms and refusing offenders in a half-open pattern.

#![warn(missing_docs)]

pub mod config;
pub mod limiter;
pub mod metrics;

pub use config::LimiterConfig;
pub use limiter::{SlowLimiter, HEAVY_THRESHOLD, MAX_SLOW, MID_THRESHOLD, SMALL_THRESHOLD};
pub use metrics::{LimiterMetrics, NoopMetrics, SlowBucket};
