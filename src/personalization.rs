//! Per-customer campaign recommendations
//!
//! Builds a campaign preview for a single customer: a subject line in the
//! style the customer responds to, their preferred send time, and simple
//! engagement forecasts derived from historical rates.

use serde::Serialize;

use crate::data::CustomerProfile;

/// Campaign recommendation for one customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub customer_id: String,
    pub subject_line: String,
    pub send_time: String,
    pub products: Vec<String>,
    /// Confidence in the recommendation, as an integer percentage.
    pub confidence: i64,
    /// Forecast open rate as an integer percentage, capped at 95.
    pub expected_open_rate: i64,
    /// Forecast conversion as an integer percentage.
    pub expected_conversion: i64,
}

/// Generate a campaign recommendation for a customer.
pub fn generate_recommendation(customer: &CustomerProfile) -> Recommendation {
    Recommendation {
        customer_id: customer.id.clone(),
        subject_line: generate_subject_line(customer),
        send_time: customer.best_open_time.clone(),
        products: select_products(customer),
        confidence: calculate_confidence(customer),
        expected_open_rate: predict_open_rate(customer),
        expected_conversion: predict_conversion(customer),
    }
}

/// Pick a subject line from the customer's preferred style templates.
///
/// The template index is a stable function of the customer id rather than a
/// random draw, so repeated runs produce the same campaign preview.
fn generate_subject_line(customer: &CustomerProfile) -> String {
    let name = customer.first_name.as_deref().unwrap_or("");
    let discount = (customer.discount_threshold * 100.0).round() as i64;

    let templates: [String; 3] = match customer.subject_line_style.as_str() {
        "curiosity" => [
            format!("{name}, you won't believe this..."),
            "Something special inside".to_string(),
            "Your personalized picks are here".to_string(),
        ],
        "personal" => [
            format!("{name}, we picked these for you"),
            format!("Recommended just for {name}"),
            "Your wishlist items are on sale".to_string(),
        ],
        // urgency doubles as the fallback style
        _ => [
            format!("{name}, {discount}% off ends tonight"),
            "Last chance: Your favorites on sale".to_string(),
            "Flash sale just for you 🔥".to_string(),
        ],
    };

    let pick = customer.id.bytes().map(usize::from).sum::<usize>() % templates.len();
    templates[pick].clone()
}

fn select_products(_customer: &CustomerProfile) -> Vec<String> {
    // Catalog-aware selection needs browsing history, which this core does
    // not ingest; the upstream system stubs it the same way.
    vec![
        "Product A".to_string(),
        "Product B".to_string(),
        "Product C".to_string(),
    ]
}

fn calculate_confidence(customer: &CustomerProfile) -> i64 {
    let data_quality: f64 = if customer.open_rate > 0.0 { 0.8 } else { 0.4 };
    let history_depth: f64 = 0.9;
    (((data_quality + history_depth) / 2.0) * 100.0).round() as i64
}

fn predict_open_rate(customer: &CustomerProfile) -> i64 {
    let boost = if customer.health_score > 7.0 { 0.1 } else { 0.0 };
    ((((customer.open_rate + boost) * 100.0).round()) as i64).min(95)
}

fn predict_conversion(customer: &CustomerProfile) -> i64 {
    (customer.click_rate * 0.5 * 100.0).round() as i64
}
