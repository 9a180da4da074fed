//! Customer data model and input sources
//!
//! The engine itself never talks to a CRM; callers construct a
//! [`CustomerSource`] and hand the fetched profiles to the pipeline. Two
//! sources ship with the CLI: a JSON profile export in the CRM's nested
//! shape, and an engagement-event CSV that gets aggregated per customer.

use std::collections::BTreeMap;
use std::fs;

use anyhow::Context;
use chrono::{DateTime, Datelike, Timelike};
use indexmap::IndexMap;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A customer with aggregated engagement behaviors and preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    /// Overall account health in [0, 10].
    pub health_score: f64,
    /// Display label like "Monday 9am"; never enters clustering distance.
    pub best_open_time: String,
    /// Subject-line style the customer responds to: urgency, curiosity or personal.
    pub subject_line_style: String,
    pub open_rate: f64,
    pub click_rate: f64,
    pub purchase_frequency: f64,
    /// Fraction of discount the customer typically waits for before buying.
    pub discount_threshold: f64,
    pub avg_cart_value: f64,
}

/// Supplies customer profiles to the segmentation pipeline.
///
/// Constructed and owned by the caller; the engine stays a pure
/// transformation over whatever the source returns.
pub trait CustomerSource {
    fn fetch_customers(&self) -> crate::Result<Vec<CustomerProfile>>;
}

// ---------------------------------------------------------------------------
// JSON profile export

/// Profile record in the CRM export's nested shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileExport {
    id: String,
    email: String,
    first_name: Option<String>,
    health_score: f64,
    preferences: ProfilePreferences,
    behaviors: ProfileBehaviors,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfilePreferences {
    best_open_time: String,
    subject_line_style: String,
    discount_threshold: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileBehaviors {
    avg_open_rate: f64,
    avg_click_rate: f64,
    purchase_frequency: f64,
    avg_cart_value: f64,
}

impl From<ProfileExport> for CustomerProfile {
    fn from(export: ProfileExport) -> Self {
        CustomerProfile {
            id: export.id,
            email: export.email,
            first_name: export.first_name,
            health_score: export.health_score,
            best_open_time: export.preferences.best_open_time,
            subject_line_style: export.preferences.subject_line_style,
            open_rate: export.behaviors.avg_open_rate,
            click_rate: export.behaviors.avg_click_rate,
            purchase_frequency: export.behaviors.purchase_frequency,
            discount_threshold: export.preferences.discount_threshold,
            avg_cart_value: export.behaviors.avg_cart_value,
        }
    }
}

/// Reads a JSON array of profiles in the CRM export shape and flattens it.
#[derive(Debug)]
pub struct JsonProfileSource {
    path: String,
}

impl JsonProfileSource {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }
}

impl CustomerSource for JsonProfileSource {
    fn fetch_customers(&self) -> crate::Result<Vec<CustomerProfile>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read profile export {}", self.path))?;
        let exports: Vec<ProfileExport> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid profile export {}", self.path))?;

        debug!(count = exports.len(), path = %self.path, "parsed profile export");
        Ok(exports.into_iter().map(CustomerProfile::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Engagement-event CSV

/// Weights for the blended health score derived from event history.
#[derive(Debug, Clone)]
pub struct HealthWeights {
    pub weight_opens: f64,
    pub weight_clicks: f64,
    pub weight_purchases: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            weight_opens: 0.4,
            weight_clicks: 0.3,
            weight_purchases: 0.3,
        }
    }
}

/// Aggregates an engagement-event CSV export into per-customer profiles.
///
/// Expected columns: `customer_id, email, first_name, event_type, timestamp,
/// order_value, discount_fraction, subject_line_style`, where `event_type`
/// is one of `delivered`, `open`, `click`, `purchase`. Customers come out in
/// first-seen order, which is what downstream centroid seeding keys off.
#[derive(Debug)]
pub struct CsvEventSource {
    path: String,
    weights: HealthWeights,
}

impl CsvEventSource {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            weights: HealthWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: HealthWeights) -> Self {
        self.weights = weights;
        self
    }
}

impl CustomerSource for CsvEventSource {
    fn fetch_customers(&self) -> crate::Result<Vec<CustomerProfile>> {
        load_event_csv(&self.path, &self.weights)
    }
}

/// Running per-customer event counters, keyed by weekday/hour for opens.
#[derive(Debug, Default)]
struct EventTally {
    email: String,
    first_name: Option<String>,
    subject_line_style: Option<String>,
    delivered: u32,
    opens: u32,
    clicks: u32,
    purchases: u32,
    order_total: f64,
    discount_total: f64,
    /// (days from Monday, hour) -> open count; BTreeMap so ties resolve to
    /// the earliest slot in the week.
    open_slots: BTreeMap<(u32, u32), u32>,
}

impl EventTally {
    fn into_profile(self, id: String, weights: &HealthWeights) -> CustomerProfile {
        let delivered = f64::from(self.delivered);
        let (open_rate, click_rate, purchase_frequency) = if self.delivered > 0 {
            (
                f64::from(self.opens) / delivered,
                f64::from(self.clicks) / delivered,
                f64::from(self.purchases) / delivered,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        let (discount_threshold, avg_cart_value) = if self.purchases > 0 {
            (
                self.discount_total / f64::from(self.purchases),
                self.order_total / f64::from(self.purchases),
            )
        } else {
            (0.0, 0.0)
        };

        let best_open_time = self
            .open_slots
            .iter()
            .fold(None::<((u32, u32), u32)>, |best, (&slot, &count)| {
                match best {
                    Some((_, best_count)) if count <= best_count => best,
                    _ => Some((slot, count)),
                }
            })
            .map(|((day, hour), _)| format_open_slot(day, hour))
            .unwrap_or_else(|| "Monday 9am".to_string());

        // Blended 0-10 health score: weighted engagement factors, with
        // purchase frequency saturating at 0.5.
        let purchase_factor = (purchase_frequency * 2.0).min(1.0);
        let health_score = 10.0
            * (weights.weight_opens * open_rate
                + weights.weight_clicks * click_rate
                + weights.weight_purchases * purchase_factor);

        CustomerProfile {
            id,
            email: self.email,
            first_name: self.first_name,
            health_score,
            best_open_time,
            subject_line_style: self.subject_line_style.unwrap_or_else(|| "urgency".to_string()),
            open_rate,
            click_rate,
            purchase_frequency,
            discount_threshold,
            avg_cart_value,
        }
    }
}

/// Render a weekday/hour bucket as a send-time label, e.g. "Monday 9am".
fn format_open_slot(days_from_monday: u32, hour: u32) -> String {
    let weekday = match days_from_monday {
        0 => "Monday",
        1 => "Tuesday",
        2 => "Wednesday",
        3 => "Thursday",
        4 => "Friday",
        5 => "Saturday",
        _ => "Sunday",
    };
    let hour_label = match hour {
        0 => "12am".to_string(),
        h if h < 12 => format!("{h}am"),
        12 => "12pm".to_string(),
        h => format!("{}pm", h - 12),
    };
    format!("{weekday} {hour_label}")
}

fn load_event_csv(path: &str, weights: &HealthWeights) -> crate::Result<Vec<CustomerProfile>> {
    let df = LazyCsvReader::new(path)
        .finish()?
        .filter(col("customer_id").is_not_null())
        .collect()?;

    if df.height() == 0 {
        anyhow::bail!("no engagement events found in {path}");
    }

    let ids: Vec<Option<&str>> = df.column("customer_id")?.utf8()?.into_iter().collect();
    let emails: Vec<Option<&str>> = df.column("email")?.utf8()?.into_iter().collect();
    let first_names: Vec<Option<&str>> = df.column("first_name")?.utf8()?.into_iter().collect();
    let event_types: Vec<Option<&str>> = df.column("event_type")?.utf8()?.into_iter().collect();
    let timestamps: Vec<Option<&str>> = df.column("timestamp")?.utf8()?.into_iter().collect();
    let order_values: Vec<Option<f64>> = df.column("order_value")?.f64()?.into_iter().collect();
    let discounts: Vec<Option<f64>> = df
        .column("discount_fraction")?
        .f64()?
        .into_iter()
        .collect();
    let styles: Vec<Option<&str>> = df
        .column("subject_line_style")?
        .utf8()?
        .into_iter()
        .collect();

    let mut tallies: IndexMap<String, EventTally> = IndexMap::new();

    for row in 0..df.height() {
        let Some(id) = ids[row] else { continue };
        let tally = tallies.entry(id.to_string()).or_default();

        if tally.email.is_empty() {
            if let Some(email) = emails[row] {
                tally.email = email.to_string();
            }
        }
        if tally.first_name.is_none() {
            tally.first_name = first_names[row].map(str::to_string);
        }
        if tally.subject_line_style.is_none() {
            tally.subject_line_style = styles[row].map(str::to_string);
        }

        match event_types[row] {
            Some("delivered") => tally.delivered += 1,
            Some("open") => {
                tally.opens += 1;
                let slot = timestamps[row]
                    .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                    .map(|ts| (ts.weekday().num_days_from_monday(), ts.hour()));
                if let Some(slot) = slot {
                    *tally.open_slots.entry(slot).or_insert(0) += 1;
                }
            }
            Some("click") => tally.clicks += 1,
            Some("purchase") => {
                tally.purchases += 1;
                tally.order_total += order_values[row].unwrap_or(0.0);
                tally.discount_total += discounts[row].unwrap_or(0.0);
            }
            other => {
                debug!(row, event_type = ?other, "skipping unrecognized event");
            }
        }
    }

    debug!(
        customers = tallies.len(),
        events = df.height(),
        "aggregated engagement events"
    );

    Ok(tallies
        .into_iter()
        .map(|(id, tally)| tally.into_profile(id, weights))
        .collect())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::CustomerProfile;

    /// Minimal profile fixture with the five behavior fields spelled out.
    pub fn test_customer(
        id: &str,
        open_rate: f64,
        click_rate: f64,
        purchase_frequency: f64,
        discount_threshold: f64,
        avg_cart_value: f64,
    ) -> CustomerProfile {
        CustomerProfile {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            first_name: None,
            health_score: 5.0,
            best_open_time: "Monday 9am".to_string(),
            subject_line_style: "urgency".to_string(),
            open_rate,
            click_rate,
            purchase_frequency,
            discount_threshold,
            avg_cart_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_events_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "customer_id,email,first_name,event_type,timestamp,order_value,discount_fraction,subject_line_style"
        )
        .unwrap();

        // alice: 4 delivered, 3 opens on Monday 9am, 1 click, 2 purchases
        writeln!(file, "cust-a,alice@example.com,Alice,delivered,2024-01-01T08:00:00Z,,,urgency").unwrap();
        writeln!(file, "cust-a,alice@example.com,Alice,delivered,2024-01-02T08:00:00Z,,,urgency").unwrap();
        writeln!(file, "cust-a,alice@example.com,Alice,delivered,2024-01-03T08:00:00Z,,,urgency").unwrap();
        writeln!(file, "cust-a,alice@example.com,Alice,delivered,2024-01-04T08:00:00Z,,,urgency").unwrap();
        writeln!(file, "cust-a,alice@example.com,Alice,open,2024-01-01T09:15:00Z,,,urgency").unwrap();
        writeln!(file, "cust-a,alice@example.com,Alice,open,2024-01-08T09:40:00Z,,,urgency").unwrap();
        writeln!(file, "cust-a,alice@example.com,Alice,open,2024-01-09T20:10:00Z,,,urgency").unwrap();
        writeln!(file, "cust-a,alice@example.com,Alice,click,2024-01-01T09:20:00Z,,,urgency").unwrap();
        writeln!(file, "cust-a,alice@example.com,Alice,purchase,2024-01-01T10:00:00Z,40.0,0.2,urgency").unwrap();
        writeln!(file, "cust-a,alice@example.com,Alice,purchase,2024-01-08T10:00:00Z,60.0,0.3,urgency").unwrap();

        // bob: 2 delivered, no engagement
        writeln!(file, "cust-b,bob@example.com,Bob,delivered,2024-01-01T08:00:00Z,,,curiosity").unwrap();
        writeln!(file, "cust-b,bob@example.com,Bob,delivered,2024-01-02T08:00:00Z,,,curiosity").unwrap();

        file
    }

    #[test]
    fn test_csv_event_aggregation() {
        let file = create_test_events_csv();
        let source = CsvEventSource::new(file.path().to_str().unwrap());

        let customers = source.fetch_customers().unwrap();

        assert_eq!(customers.len(), 2);
        // First-seen order is preserved for deterministic downstream seeding.
        assert_eq!(customers[0].id, "cust-a");
        assert_eq!(customers[1].id, "cust-b");

        let alice = &customers[0];
        assert_eq!(alice.email, "alice@example.com");
        assert_eq!(alice.first_name.as_deref(), Some("Alice"));
        assert!((alice.open_rate - 0.75).abs() < 1e-9);
        assert!((alice.click_rate - 0.25).abs() < 1e-9);
        assert!((alice.purchase_frequency - 0.5).abs() < 1e-9);
        assert!((alice.discount_threshold - 0.25).abs() < 1e-9);
        assert!((alice.avg_cart_value - 50.0).abs() < 1e-9);
        // Two of three opens land in the Monday 9am bucket.
        assert_eq!(alice.best_open_time, "Monday 9am");

        let bob = &customers[1];
        assert_eq!(bob.open_rate, 0.0);
        assert_eq!(bob.avg_cart_value, 0.0);
        assert_eq!(bob.best_open_time, "Monday 9am");
        assert_eq!(bob.subject_line_style, "curiosity");
    }

    #[test]
    fn test_csv_health_score_weighting() {
        let file = create_test_events_csv();
        let source = CsvEventSource::new(file.path().to_str().unwrap());

        let customers = source.fetch_customers().unwrap();
        let alice = &customers[0];

        // 10 * (0.4 * 0.75 + 0.3 * 0.25 + 0.3 * min(0.5 * 2, 1)) = 6.75
        assert!((alice.health_score - 6.75).abs() < 1e-9);
        assert_eq!(customers[1].health_score, 0.0);
    }

    #[test]
    fn test_json_profile_flattening() {
        let raw = r#"[
            {
                "id": "prof-1",
                "email": "casey@example.com",
                "firstName": "Casey",
                "healthScore": 7.5,
                "preferences": {
                    "bestOpenTime": "Tuesday 8pm",
                    "subjectLineStyle": "personal",
                    "contentFormat": "image-heavy",
                    "discountThreshold": 0.25
                },
                "behaviors": {
                    "avgOpenRate": 0.65,
                    "avgClickRate": 0.3,
                    "purchaseFrequency": 0.4,
                    "avgCartValue": 88.0
                }
            }
        ]"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(raw.as_bytes()).unwrap();

        let source = JsonProfileSource::new(file.path().to_str().unwrap());
        let customers = source.fetch_customers().unwrap();

        assert_eq!(customers.len(), 1);
        let casey = &customers[0];
        assert_eq!(casey.id, "prof-1");
        assert_eq!(casey.first_name.as_deref(), Some("Casey"));
        assert_eq!(casey.best_open_time, "Tuesday 8pm");
        assert_eq!(casey.subject_line_style, "personal");
        assert_eq!(casey.discount_threshold, 0.25);
        assert_eq!(casey.open_rate, 0.65);
        assert_eq!(casey.avg_cart_value, 88.0);
    }

    #[test]
    fn test_format_open_slot_labels() {
        assert_eq!(format_open_slot(0, 9), "Monday 9am");
        assert_eq!(format_open_slot(1, 0), "Tuesday 12am");
        assert_eq!(format_open_slot(4, 12), "Friday 12pm");
        assert_eq!(format_open_slot(6, 20), "Sunday 8pm");
    }
}
