//! SegmentForge: behavior-based customer segmentation and campaign personalization
//!
//! Ports the segment-discovery core of an email-marketing personalization
//! dashboard: customers with aggregated engagement behaviors are partitioned
//! into named segments via K-Means over five behavioral dimensions, and each
//! segment is labeled and characterized for campaign targeting.

pub mod cli;
pub mod data;
pub mod features;
pub mod model;
pub mod personalization;
pub mod segments;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{CsvEventSource, CustomerProfile, CustomerSource, HealthWeights, JsonProfileSource};
pub use features::{extract_features, FeatureSet, FEATURE_DIMS};
pub use model::{fit_kmeans, KMeansModel};
pub use personalization::{generate_recommendation, Recommendation};
pub use segments::{characterize, discover_segments, Segment, SegmentProfile, SegmentationConfig};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
