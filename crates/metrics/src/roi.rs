//! ROI rollups at overall, channel, and channel+campaign level.

use std::collections::HashMap;
use std::hash::Hash;

use roi_core::config::validate_cogs_pct;
use roi_core::types::{CanonicalRecord, RecordBatch};
use roi_core::{RoiError, RoiResult};
use serde::{Deserialize, Serialize};
use tracing::info;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Grouping key a row of metrics was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationLevel {
    Overall,
    Channel,
    ChannelCampaign,
}

impl AggregationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overall => "overall",
            Self::Channel => "channel",
            Self::ChannelCampaign => "channel_campaign",
        }
    }
}

/// Summed totals and derived ratios for one group.
///
/// Ratios are `None` when their denominator is zero or the quotient is not
/// finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub level: AggregationLevel,
    pub channel: Option<String>,
    pub campaign: Option<String>,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub conversions: f64,
    pub revenue: f64,
    /// `revenue / spend`.
    pub mer: Option<f64>,
    /// `revenue / spend`; reported separately from `mer`.
    pub roas: Option<f64>,
    /// `revenue * cogs_pct`.
    pub cogs: f64,
    /// `revenue - cogs - spend`.
    pub net_profit: f64,
    /// `net_profit / spend`.
    pub net_roi: Option<f64>,
    /// `spend / conversions`.
    pub cac: Option<f64>,
    /// `spend / net_profit`.
    pub payback_days: Option<f64>,
}

/// The three rollups produced by [`compute_roi`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiReport {
    pub overall: AggregatedMetrics,
    pub by_channel: Vec<AggregatedMetrics>,
    pub by_channel_campaign: Vec<AggregatedMetrics>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    spend: f64,
    impressions: f64,
    clicks: f64,
    conversions: f64,
    revenue: f64,
}

impl Totals {
    fn add(&mut self, record: &CanonicalRecord) {
        self.spend += record.spend;
        self.impressions += record.impressions;
        self.clicks += record.clicks;
        self.conversions += record.conversions;
        self.revenue += record.revenue;
    }

    fn into_metrics(
        self,
        level: AggregationLevel,
        channel: Option<String>,
        campaign: Option<String>,
        cogs_pct: f64,
    ) -> RoiResult<AggregatedMetrics> {
        let cogs = self.revenue * cogs_pct;
        let net_profit = self.revenue - cogs - self.spend;

        let sums = [
            ("spend", self.spend),
            ("impressions", self.impressions),
            ("clicks", self.clicks),
            ("conversions", self.conversions),
            ("revenue", self.revenue),
            ("net_profit", net_profit),
        ];
        if let Some((name, _)) = sums.iter().find(|(_, v)| !v.is_finite()) {
            return Err(RoiError::NumericOverflow(format!(
                "{name} overflowed for {} group {}",
                level.as_str(),
                group_label(channel.as_deref(), campaign.as_deref()),
            )));
        }

        Ok(AggregatedMetrics {
            level,
            channel,
            campaign,
            spend: self.spend,
            impressions: self.impressions,
            clicks: self.clicks,
            conversions: self.conversions,
            revenue: self.revenue,
            mer: safe_div(self.revenue, self.spend),
            roas: safe_div(self.revenue, self.spend),
            cogs,
            net_profit,
            net_roi: safe_div(net_profit, self.spend),
            cac: safe_div(self.spend, self.conversions),
            payback_days: safe_div(self.spend, net_profit),
        })
    }
}

fn group_label(channel: Option<&str>, campaign: Option<&str>) -> String {
    match (channel, campaign) {
        (Some(channel), Some(campaign)) => format!("{channel}/{campaign}"),
        (Some(channel), None) => channel.to_string(),
        _ => "(all)".to_string(),
    }
}

/// Totals per key, iterated in first-seen order.
struct GroupedTotals<K> {
    index: HashMap<K, usize>,
    groups: Vec<(K, Totals)>,
}

impl<K: Eq + Hash + Clone> GroupedTotals<K> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    fn add(&mut self, key: K, record: &CanonicalRecord) {
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.groups.push((key.clone(), Totals::default()));
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[idx].1.add(record);
    }

    fn into_groups(self) -> Vec<(K, Totals)> {
        self.groups
    }
}

fn safe_div(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator).filter(|q| q.is_finite())
}

/// Compute ROI metrics overall, by channel, and by channel+campaign.
///
/// Groups appear in the order their key is first seen in the batch. An empty
/// batch is an [`RoiError::EmptyBatch`]; `cogs_pct` outside `[0, 1]` is a
/// [`RoiError::Configuration`]; a group whose sums or net profit exceed the
/// `f64` range is an [`RoiError::NumericOverflow`].
pub fn compute_roi(batch: &RecordBatch, cogs_pct: f64) -> RoiResult<RoiReport> {
    validate_cogs_pct(cogs_pct)?;
    if batch.is_empty() {
        return Err(RoiError::EmptyBatch(
            "No data provided for ROI computation.".to_string(),
        ));
    }

    let mut overall = Totals::default();
    let mut by_channel = GroupedTotals::new();
    let mut by_campaign = GroupedTotals::new();

    for record in batch {
        overall.add(record);
        by_channel.add(record.channel.as_str(), record);
        by_campaign.add((record.channel.as_str(), record.campaign.as_str()), record);
    }

    let report = RoiReport {
        overall: overall.into_metrics(AggregationLevel::Overall, None, None, cogs_pct)?,
        by_channel: by_channel
            .into_groups()
            .into_iter()
            .map(|(channel, totals)| {
                totals.into_metrics(
                    AggregationLevel::Channel,
                    Some(channel.to_string()),
                    None,
                    cogs_pct,
                )
            })
            .collect::<RoiResult<_>>()?,
        by_channel_campaign: by_campaign
            .into_groups()
            .into_iter()
            .map(|((channel, campaign), totals)| {
                totals.into_metrics(
                    AggregationLevel::ChannelCampaign,
                    Some(channel.to_string()),
                    Some(campaign.to_string()),
                    cogs_pct,
                )
            })
            .collect::<RoiResult<_>>()?,
    };

    info!(
        rows = batch.len(),
        channels = report.by_channel.len(),
        campaigns = report.by_channel_campaign.len(),
        spend = report.overall.spend,
        revenue = report.overall.revenue,
        "ROI computed"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use roi_core::types::Metric;

    fn record(channel: &str, campaign: &str, spend: f64, conversions: f64, revenue: f64) -> CanonicalRecord {
        CanonicalRecord {
            date: NaiveDate::from_ymd_opt(2024, 5, 1),
            channel: channel.to_string(),
            campaign: campaign.to_string(),
            spend,
            impressions: 1_000.0,
            clicks: 20.0,
            conversions,
            revenue,
        }
    }

    fn sample_batch() -> RecordBatch {
        RecordBatch::from(vec![
            record("Search", "Brand", 100.0, 10.0, 500.0),
            record("Social", "Prospecting", 200.0, 4.0, 300.0),
            record("Search", "Generic", 50.0, 0.0, 0.0),
            record("Search", "Brand", 100.0, 5.0, 250.0),
            record("Email", "Newsletter", 0.0, 3.0, 90.0),
        ])
    }

    #[test]
    fn test_overall_metrics() {
        let report = compute_roi(&sample_batch(), 0.4).unwrap();
        let overall = &report.overall;

        assert_eq!(overall.level, AggregationLevel::Overall);
        assert_eq!(overall.channel, None);
        assert!((overall.spend - 450.0).abs() < 1e-9);
        assert!((overall.revenue - 1_140.0).abs() < 1e-9);
        assert!((overall.cogs - 456.0).abs() < 1e-9);
        assert!((overall.net_profit - 234.0).abs() < 1e-9);
        assert!((overall.mer.unwrap() - 1_140.0 / 450.0).abs() < 1e-9);
        assert_eq!(overall.mer, overall.roas);
        assert!((overall.net_roi.unwrap() - 0.52).abs() < 1e-9);
        assert!((overall.cac.unwrap() - 450.0 / 22.0).abs() < 1e-9);
        assert!((overall.payback_days.unwrap() - 450.0 / 234.0).abs() < 1e-9);
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let report = compute_roi(&sample_batch(), 0.4).unwrap();

        let channels: Vec<_> = report
            .by_channel
            .iter()
            .map(|m| m.channel.as_deref().unwrap())
            .collect();
        assert_eq!(channels, vec!["Search", "Social", "Email"]);

        let campaigns: Vec<_> = report
            .by_channel_campaign
            .iter()
            .map(|m| (m.channel.as_deref().unwrap(), m.campaign.as_deref().unwrap()))
            .collect();
        assert_eq!(
            campaigns,
            vec![
                ("Search", "Brand"),
                ("Social", "Prospecting"),
                ("Search", "Generic"),
                ("Email", "Newsletter"),
            ]
        );

        let brand = &report.by_channel_campaign[0];
        assert_eq!(brand.level, AggregationLevel::ChannelCampaign);
        assert!((brand.spend - 200.0).abs() < 1e-9);
        assert!((brand.conversions - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_sums_are_conserved_across_levels() {
        let batch = sample_batch();
        let report = compute_roi(&batch, 0.25).unwrap();

        for metric in Metric::ALL {
            let pick = |m: &AggregatedMetrics| match metric {
                Metric::Spend => m.spend,
                Metric::Impressions => m.impressions,
                Metric::Clicks => m.clicks,
                Metric::Conversions => m.conversions,
                Metric::Revenue => m.revenue,
            };
            let channel_sum: f64 = report.by_channel.iter().map(pick).sum();
            let campaign_sum: f64 = report.by_channel_campaign.iter().map(pick).sum();
            assert!((channel_sum - pick(&report.overall)).abs() < 1e-9);
            assert!((campaign_sum - pick(&report.overall)).abs() < 1e-9);
            assert!((batch.total(metric) - pick(&report.overall)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_denominators_yield_none() {
        let report = compute_roi(&sample_batch(), 0.4).unwrap();

        let email = &report.by_channel[2];
        assert_eq!(email.spend, 0.0);
        assert_eq!(email.mer, None);
        assert_eq!(email.roas, None);
        assert_eq!(email.net_roi, None);
        assert!(email.cac.is_some());

        let generic = &report.by_channel_campaign[2];
        assert_eq!(generic.conversions, 0.0);
        assert_eq!(generic.cac, None);
        assert!((generic.net_profit + 50.0).abs() < 1e-9);
        assert!((generic.payback_days.unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_net_profit_has_no_payback() {
        // revenue 200, cogs 50%, spend 100 -> net profit 0
        let batch = RecordBatch::from(vec![record("Display", "Retargeting", 100.0, 2.0, 200.0)]);
        let report = compute_roi(&batch, 0.5).unwrap();
        assert_eq!(report.overall.net_profit, 0.0);
        assert_eq!(report.overall.payback_days, None);
        assert_eq!(report.overall.net_roi, Some(0.0));
    }

    #[test]
    fn test_null_dates_do_not_affect_grouping() {
        let mut undated = record("Search", "Brand", 10.0, 1.0, 30.0);
        undated.date = None;
        let batch = RecordBatch::from(vec![record("Search", "Brand", 10.0, 1.0, 30.0), undated]);

        let report = compute_roi(&batch, 0.4).unwrap();
        assert_eq!(report.by_channel_campaign.len(), 1);
        assert!((report.by_channel_campaign[0].spend - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_inputs_yield_finite_metrics() {
        let batch = RecordBatch::from(vec![
            record("Search", "Brand", f64::NAN, 2.0, 100.0),
            record("Search", "Brand", 50.0, f64::INFINITY, f64::NEG_INFINITY),
        ]);
        let report = compute_roi(&batch, 0.4).unwrap();

        let overall = &report.overall;
        assert!((overall.spend - 50.0).abs() < 1e-9);
        assert!((overall.conversions - 2.0).abs() < 1e-9);
        assert!((overall.revenue - 100.0).abs() < 1e-9);
        for metrics in report
            .by_channel
            .iter()
            .chain(&report.by_channel_campaign)
            .chain(std::iter::once(overall))
        {
            for value in [metrics.mer, metrics.roas, metrics.net_roi, metrics.cac, metrics.payback_days]
                .into_iter()
                .flatten()
            {
                assert!(value.is_finite());
            }
        }
    }

    #[test]
    fn test_overflowing_sums_are_rejected() {
        let batch = RecordBatch::from(vec![
            record("Search", "Brand", 1e308, 1.0, 1e308),
            record("Search", "Brand", 1e308, 1.0, 1e308),
        ]);
        let err = compute_roi(&batch, 0.4).unwrap_err();
        assert!(matches!(err, RoiError::NumericOverflow(_)));
    }

    #[test]
    fn test_overflowing_net_profit_is_rejected() {
        // each sum is finite, revenue - spend is not
        let batch = RecordBatch::from(vec![record("Search", "Brand", -1e308, 1.0, 1e308)]);
        let err = compute_roi(&batch, 0.0).unwrap_err();
        assert!(matches!(err, RoiError::NumericOverflow(_)));
    }

    #[test]
    fn test_safe_div_drops_non_finite_quotients() {
        assert_eq!(safe_div(1.0, 0.0), None);
        assert_eq!(safe_div(1e308, 1e-300), None);
        assert_eq!(safe_div(-1e308, 1e-300), None);
        assert!((safe_div(3.0, 2.0).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let err = compute_roi(&RecordBatch::default(), 0.4).unwrap_err();
        assert!(matches!(err, RoiError::EmptyBatch(_)));
    }

    #[test]
    fn test_invalid_cogs_pct_is_rejected() {
        let err = compute_roi(&sample_batch(), -0.1).unwrap_err();
        assert!(matches!(err, RoiError::Configuration(_)));
    }

    #[test]
    fn test_level_serializes_snake_case() {
        let json = serde_json::to_string(&AggregationLevel::ChannelCampaign).unwrap();
        assert_eq!(json, "\"channel_campaign\"");
        assert_eq!(AggregationLevel::ChannelCampaign.as_str(), "channel_campaign");
    }
}
