//! A/B incrementality — lift between a test and a control group using a
//! normal approximation for the difference of two proportions.

use roi_core::{RoiError, RoiResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Critical values for the supported significance levels. Any other alpha
/// falls back to the 0.05 entry.
const Z_TABLE: [(f64, f64); 3] = [(0.10, 1.64), (0.05, 1.96), (0.01, 2.58)];
const DEFAULT_Z: f64 = 1.96;

/// Floor applied to the control rate when computing relative lift.
const MIN_CONTROL_RATE: f64 = 1e-9;

/// Exposed users and conversions of one experiment arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub conversions: u64,
    pub users: u64,
}

impl Sample {
    pub fn new(conversions: u64, users: u64) -> Self {
        Self { conversions, users }
    }

    fn rate(&self) -> f64 {
        self.conversions as f64 / self.users as f64
    }
}

/// Lift estimate plus the incremental financials that could be derived
/// from the supplied inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftResult {
    pub incremental_conversions: f64,
    pub incremental_cost_per_conversion: Option<f64>,
    pub incremental_revenue: Option<f64>,
    pub incremental_roi: Option<f64>,
    /// Relative lift of the test rate over the control rate.
    pub lift: f64,
    pub standard_error: f64,
    /// Critical value used for the confidence interval.
    pub z_score: f64,
    /// Bounds on the absolute rate difference.
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl LiftResult {
    /// Whether the confidence interval excludes zero.
    pub fn is_significant(&self) -> bool {
        self.ci_lower > 0.0 || self.ci_upper < 0.0
    }
}

/// Critical value for a two-sided interval at `alpha`.
pub fn z_from_alpha(alpha: f64) -> f64 {
    match Z_TABLE.iter().find(|(a, _)| *a == alpha) {
        Some((_, z)) => *z,
        None => {
            warn!(
                alpha,
                fallback = DEFAULT_Z,
                "Unsupported alpha, using the 0.05 critical value"
            );
            DEFAULT_Z
        }
    }
}

/// Estimate lift of `test` over `control`.
///
/// `incremental_revenue` needs `revenue_per_conversion`;
/// `incremental_cost_per_conversion` needs `spend_increment` and a non-zero
/// incremental conversion count; `incremental_roi` needs both inputs and a
/// non-zero spend increment. Unmet preconditions leave the field `None`.
pub fn estimate_lift(
    test: Sample,
    control: Sample,
    spend_increment: Option<f64>,
    revenue_per_conversion: Option<f64>,
    alpha: f64,
) -> RoiResult<LiftResult> {
    validate_sample("test", test)?;
    validate_sample("control", control)?;

    let p_test = test.rate();
    let p_control = control.rate();
    let lift = (p_test - p_control) / p_control.max(MIN_CONTROL_RATE);

    let se = (p_test * (1.0 - p_test) / test.users as f64
        + p_control * (1.0 - p_control) / control.users as f64)
        .sqrt();

    let z = z_from_alpha(alpha).abs();

    let diff = p_test - p_control;
    let ci_lower = diff - z * se;
    let ci_upper = diff + z * se;

    let incremental_conversions = diff * test.users as f64;

    let incremental_revenue = revenue_per_conversion.map(|rpc| incremental_conversions * rpc);
    let incremental_cost_per_conversion = spend_increment
        .filter(|_| incremental_conversions != 0.0)
        .map(|spend| spend / incremental_conversions);
    let incremental_roi = match (incremental_revenue, spend_increment) {
        (Some(revenue), Some(spend)) if spend != 0.0 => Some((revenue - spend) / spend),
        _ => None,
    };

    debug!(p_test, p_control, lift, se, z, "Lift estimated");

    Ok(LiftResult {
        incremental_conversions,
        incremental_cost_per_conversion,
        incremental_revenue,
        incremental_roi,
        lift,
        standard_error: se,
        z_score: z,
        ci_lower,
        ci_upper,
    })
}

fn validate_sample(arm: &str, sample: Sample) -> RoiResult<()> {
    if sample.users == 0 {
        return Err(RoiError::InvalidSample(format!(
            "{arm} group must have a positive number of users"
        )));
    }
    if sample.conversions > sample.users {
        return Err(RoiError::InvalidSample(format!(
            "{arm} group has {} conversions but only {} users",
            sample.conversions, sample.users
        )));
    }
    Ok(())
}
