//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::features::FEATURE_DIMS;

/// Customer segmentation and campaign personalization from engagement data
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input file: a `.json` profile export or a `.csv`
    /// engagement-event export
    #[arg(short, long, env = "SEGMENTFORGE_INPUT", default_value = "customers.json")]
    pub input: String,

    /// Number of segments to discover
    #[arg(short = 'k', long, default_value = "5")]
    pub clusters: usize,

    /// Maximum iterations for the clustering loop
    #[arg(long, default_value = "100")]
    pub max_iters: usize,

    /// Output path for the segment scatter plot
    #[arg(short, long, default_value = "segments.png")]
    pub output: String,

    /// Optional path to export the discovered segments as JSON
    #[arg(short, long)]
    pub export: Option<String>,

    /// Prediction mode: provide behavior values as a comma-separated string
    /// "open_rate,click_rate,purchase_frequency,discount_threshold,avg_cart_value"
    #[arg(short, long)]
    pub predict: Option<String>,

    /// Recommendation mode: customer id to build a campaign preview for
    #[arg(short, long)]
    pub recommend: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse behavior values from the predict string.
    /// Expected format: "open_rate,click_rate,purchase_frequency,discount_threshold,avg_cart_value"
    pub fn parse_behavior_values(&self) -> crate::Result<Option<[f64; FEATURE_DIMS]>> {
        let Some(ref predict_str) = self.predict else {
            return Ok(None);
        };

        let parts: Vec<&str> = predict_str.split(',').collect();
        if parts.len() != FEATURE_DIMS {
            anyhow::bail!(
                "predict values must be in format 'open_rate,click_rate,purchase_frequency,discount_threshold,avg_cart_value'"
            );
        }

        let mut values = [0.0; FEATURE_DIMS];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid behavior value: {}", part))?;
        }

        Ok(Some(values))
    }
}
