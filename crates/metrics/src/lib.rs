//! Marketing performance metrics — multi-level ROI rollups and A/B
//! incrementality estimates.

pub mod incrementality;
pub mod roi;

pub use incrementality::{estimate_lift, LiftResult, Sample};
pub use roi::{compute_roi, AggregatedMetrics, AggregationLevel, RoiReport};
