//! Behavioral feature extraction for clustering

use ndarray::Array2;

use crate::data::CustomerProfile;

/// Number of behavioral dimensions used for clustering distance.
pub const FEATURE_DIMS: usize = 5;

/// Feature matrix paired with the customer ids owning each row.
///
/// Owned by a single clustering run; rows are in the same order as the
/// customer list they were extracted from.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Behavioral features, one row per customer: open rate, click rate,
    /// purchase frequency, discount threshold, average cart value.
    pub features: Array2<f64>,
    /// Customer id for each feature row.
    pub customer_ids: Vec<String>,
}

impl FeatureSet {
    /// Number of feature rows.
    pub fn len(&self) -> usize {
        self.customer_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customer_ids.is_empty()
    }
}

/// Project customers onto the five clustering dimensions, in input order.
///
/// Values are taken as-is: cart value (tens to hundreds of currency units) is
/// mixed with rates in [0, 1], so it dominates Euclidean distance. That
/// weighting matches the upstream system and is deliberately left unscaled.
/// NaN or negative inputs are passed through unchanged.
pub fn extract_features(customers: &[CustomerProfile]) -> crate::Result<FeatureSet> {
    if customers.is_empty() {
        anyhow::bail!("cannot extract features from an empty customer list");
    }

    let mut flat = Vec::with_capacity(customers.len() * FEATURE_DIMS);
    let mut customer_ids = Vec::with_capacity(customers.len());

    for customer in customers {
        flat.extend_from_slice(&[
            customer.open_rate,
            customer.click_rate,
            customer.purchase_frequency,
            customer.discount_threshold,
            customer.avg_cart_value,
        ]);
        customer_ids.push(customer.id.clone());
    }

    let features = Array2::from_shape_vec((customers.len(), FEATURE_DIMS), flat)?;

    Ok(FeatureSet {
        features,
        customer_ids,
    })
}
