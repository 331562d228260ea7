pub mod aggregators;
pub mod metrics_service;
pub mod scheduler;
pub mod staking;

pub use metrics_service::{Adapters, MetricsService, MetricsSettings};
pub use scheduler::{RefreshJob, Scheduler};
