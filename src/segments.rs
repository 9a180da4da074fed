//! Segment characterization: labels, traits and summary statistics
//!
//! Takes the clusters a fitted model produced and turns each one into a
//! campaign-facing [`Segment`]: aggregate behavior means, an archetype label
//! picked by priority-ordered threshold rules, and send-time/subject-line
//! hints.

use serde::Serialize;
use tracing::debug;

use crate::data::CustomerProfile;
use crate::features::extract_features;
use crate::model::{fit_kmeans, KMeansModel};

/// Fixed subject-line hint; a historical-performance lookup would go here.
const BEST_SUBJECT_LINE: &str = "Urgency + Discount";

/// Send-time fallback for segments with no members.
const DEFAULT_SEND_TIME: &str = "Monday 9am";

/// Tunable knobs for segment discovery.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Number of segments to discover.
    pub segment_count: usize,
    /// Iteration cap for the clustering loop.
    pub max_iterations: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            segment_count: 5,
            max_iterations: 100,
        }
    }
}

/// A discovered customer segment with its campaign-facing summary.
///
/// Immutable once produced; serialized camelCase for the dashboard API
/// consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub name: String,
    pub description: String,
    pub customer_count: usize,
    pub characteristics: Vec<String>,
    /// Mean member health score, rounded to 1 decimal.
    pub health_score: f64,
    /// Mean open rate as an integer percentage.
    pub avg_engagement: i64,
    pub best_subject_line: String,
    pub best_send_time: String,
}

/// Aggregate behavior means over one cluster's members.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentAggregates {
    pub avg_open_rate: f64,
    pub avg_purchase_freq: f64,
    pub avg_discount: f64,
    pub avg_health: f64,
}

impl SegmentAggregates {
    fn from_members(members: &[&CustomerProfile]) -> Self {
        let n = members.len() as f64;
        let mut sums = SegmentAggregates::default();
        for member in members {
            sums.avg_open_rate += member.open_rate;
            sums.avg_purchase_freq += member.purchase_frequency;
            sums.avg_discount += member.discount_threshold;
            sums.avg_health += member.health_score;
        }
        SegmentAggregates {
            avg_open_rate: sums.avg_open_rate / n,
            avg_purchase_freq: sums.avg_purchase_freq / n,
            avg_discount: sums.avg_discount / n,
            avg_health: sums.avg_health / n,
        }
    }
}

/// The five recognized segment archetypes, in rule priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentProfile {
    DealHunters,
    Browsers,
    Loyalists,
    Dormant,
    Occasionals,
}

impl SegmentProfile {
    /// Archetypes in evaluation order; the first whose rule matches wins.
    pub const ALL: [SegmentProfile; 5] = [
        SegmentProfile::DealHunters,
        SegmentProfile::Browsers,
        SegmentProfile::Loyalists,
        SegmentProfile::Dormant,
        SegmentProfile::Occasionals,
    ];

    /// Pick the archetype for a cluster's aggregate behavior.
    ///
    /// Rules are checked in priority order even where thresholds overlap, so
    /// a high-discount, highly-engaged cluster is always "The Deal Hunters"
    /// no matter which later rules would also fire.
    pub fn classify(aggregates: &SegmentAggregates) -> SegmentProfile {
        Self::ALL
            .into_iter()
            .find(|profile| profile.matches(aggregates))
            .unwrap_or(SegmentProfile::Occasionals)
    }

    fn matches(self, agg: &SegmentAggregates) -> bool {
        match self {
            SegmentProfile::DealHunters => agg.avg_discount > 0.2 && agg.avg_open_rate > 0.6,
            SegmentProfile::Browsers => agg.avg_open_rate > 0.7 && agg.avg_purchase_freq < 0.3,
            SegmentProfile::Loyalists => agg.avg_purchase_freq > 0.5,
            SegmentProfile::Dormant => agg.avg_open_rate < 0.3,
            SegmentProfile::Occasionals => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SegmentProfile::DealHunters => "The Deal Hunters",
            SegmentProfile::Browsers => "The Browsers",
            SegmentProfile::Loyalists => "The Loyalists",
            SegmentProfile::Dormant => "The Dormant",
            SegmentProfile::Occasionals => "The Occasionals",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SegmentProfile::DealHunters => {
                "Only buy on sale, highly engaged with promotional content"
            }
            SegmentProfile::Browsers => "High engagement but low purchase rate",
            SegmentProfile::Loyalists => "Regular customers who buy at full price",
            SegmentProfile::Dormant => "Low engagement, needs re-activation",
            SegmentProfile::Occasionals => "Moderate engagement and purchase patterns",
        }
    }

    /// The archetype's fixed trait list; the deal-hunter entry interpolates
    /// the observed average discount percentage.
    pub fn characteristics(self, agg: &SegmentAggregates) -> Vec<String> {
        match self {
            SegmentProfile::DealHunters => vec![
                format!(
                    "Only buy on sale (avg {}% off)",
                    (agg.avg_discount * 100.0).round() as i64
                ),
                "Browse weekends, buy Mondays".to_string(),
                "Best subject: 'Last Chance' + urgency".to_string(),
            ],
            SegmentProfile::Browsers => vec![
                "High engagement but low purchase rate".to_string(),
                "Love product details, comparisons".to_string(),
                "Best time: Evenings (8-10pm)".to_string(),
            ],
            SegmentProfile::Loyalists => vec![
                "Regular full-price buyers".to_string(),
                "Respond to new arrivals".to_string(),
                "High lifetime value".to_string(),
            ],
            SegmentProfile::Dormant => vec![
                "Low engagement overall".to_string(),
                "Need personalized re-engagement".to_string(),
                "Risk of churn".to_string(),
            ],
            SegmentProfile::Occasionals => vec![
                "Moderate engagement".to_string(),
                "Occasional purchases".to_string(),
                "Opportunity for growth".to_string(),
            ],
        }
    }
}

/// Build the segment summary for one cluster.
///
/// `members` must be the cluster's customers in their original input order:
/// the send time deliberately takes the first member's preference rather
/// than a mode, matching the upstream behavior.
pub fn characterize_cluster(index: usize, members: &[&CustomerProfile]) -> Segment {
    if members.is_empty() {
        // Zero members leave every aggregate undefined; upstream those
        // undefined values fail all threshold comparisons and fall through
        // to the catch-all archetype.
        let aggregates = SegmentAggregates::default();
        return Segment {
            id: format!("segment-{index}"),
            name: SegmentProfile::Occasionals.name().to_string(),
            description: SegmentProfile::Occasionals.description().to_string(),
            customer_count: 0,
            characteristics: SegmentProfile::Occasionals.characteristics(&aggregates),
            health_score: 0.0,
            avg_engagement: 0,
            best_subject_line: BEST_SUBJECT_LINE.to_string(),
            best_send_time: DEFAULT_SEND_TIME.to_string(),
        };
    }

    let aggregates = SegmentAggregates::from_members(members);
    let profile = SegmentProfile::classify(&aggregates);
    debug!(
        segment = index,
        members = members.len(),
        archetype = profile.name(),
        "characterized cluster"
    );

    Segment {
        id: format!("segment-{index}"),
        name: profile.name().to_string(),
        description: profile.description().to_string(),
        customer_count: members.len(),
        characteristics: profile.characteristics(&aggregates),
        health_score: round_to_tenth(aggregates.avg_health),
        avg_engagement: (aggregates.avg_open_rate * 100.0).round() as i64,
        best_subject_line: BEST_SUBJECT_LINE.to_string(),
        best_send_time: members[0].best_open_time.clone(),
    }
}

/// Characterize every cluster of a fitted model, in cluster index order.
///
/// `customers` must be the same sequence, in the same order, that the
/// model's features were extracted from.
pub fn characterize(model: &KMeansModel, customers: &[CustomerProfile]) -> Vec<Segment> {
    (0..model.n_clusters)
        .map(|cluster| {
            let members: Vec<&CustomerProfile> = customers
                .iter()
                .zip(model.labels.iter())
                .filter(|(_, label)| **label == cluster)
                .map(|(customer, _)| customer)
                .collect();
            characterize_cluster(cluster, &members)
        })
        .collect()
}

/// Run the full segmentation pipeline: extract features, cluster, and
/// characterize each cluster into a labeled segment.
///
/// An empty customer list yields an empty segment list ("no data available",
/// not a failure); fewer customers than the configured segment count yields
/// `min(segment_count, customers.len())` segments.
pub fn discover_segments(
    customers: &[CustomerProfile],
    config: &SegmentationConfig,
) -> crate::Result<Vec<Segment>> {
    if customers.is_empty() {
        return Ok(Vec::new());
    }

    let feature_set = extract_features(customers)?;
    let model = fit_kmeans(&feature_set, config.segment_count, config.max_iterations)?;
    Ok(characterize(&model, customers))
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
