//! Visualization functions using Plotters for segment analysis

use plotters::prelude::*;

use crate::features::FeatureSet;
use crate::model::KMeansModel;
use crate::segments::Segment;

/// Color palette for different segments
const SEGMENT_COLORS: [RGBColor; 5] = [RED, BLUE, GREEN, YELLOW, MAGENTA];

/// Create a scatter plot of customers colored by segment
///
/// Plots purchase frequency against average cart value (the two dimensions
/// campaign planners reason about most), with centroid markers per segment.
pub fn create_segment_scatter(
    feature_set: &FeatureSet,
    model: &KMeansModel,
    output_path: &str,
    plot_title: Option<&str>,
) -> crate::Result<()> {
    let title =
        plot_title.unwrap_or("Customer Segments: Purchase Frequency vs Cart Value");

    let features = &feature_set.features;
    let labels = &model.labels;

    // Purchase frequency is column 2, cart value column 4.
    let frequency_values: Vec<f64> = features.column(2).to_vec();
    let cart_values: Vec<f64> = features.column(4).to_vec();

    let freq_min = frequency_values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let freq_max = frequency_values
        .iter()
        .fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let cart_min = cart_values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let cart_max = cart_values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

    // Pad the bounds so single-valued axes still form a valid range.
    let freq_pad = ((freq_max - freq_min) * 0.05).max(0.05);
    let cart_pad = ((cart_max - cart_min) * 0.05).max(1.0);
    let freq_range = (freq_min - freq_pad)..(freq_max + freq_pad);
    let cart_range = (cart_min - cart_pad)..(cart_max + cart_pad);

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(freq_range, cart_range)?;

    chart
        .configure_mesh()
        .x_desc("Purchase Frequency")
        .y_desc("Avg Cart Value")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    // Plot customers colored by segment
    for (i, (&freq, &cart)) in frequency_values.iter().zip(cart_values.iter()).enumerate() {
        let segment = labels[i];
        let color = if segment < SEGMENT_COLORS.len() {
            SEGMENT_COLORS[segment]
        } else {
            BLACK // Fallback color
        };

        chart.draw_series(std::iter::once(Circle::new((freq, cart), 4, color.filled())))?;
    }

    // Plot centroids as larger squares
    let half_freq = freq_pad * 0.5;
    let half_cart = cart_pad * 0.5;
    for (segment_id, centroid_row) in model.centroids.outer_iter().enumerate() {
        let freq_centroid = centroid_row[2];
        let cart_centroid = centroid_row[4];
        let color = if segment_id < SEGMENT_COLORS.len() {
            SEGMENT_COLORS[segment_id]
        } else {
            BLACK
        };

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [
                    (freq_centroid - half_freq, cart_centroid - half_cart),
                    (freq_centroid + half_freq, cart_centroid + half_cart),
                ],
                color.filled(),
            )))?
            .label(format!("Segment {} Centroid", segment_id))
            .legend(move |(x, y)| Rectangle::new([(x, y), (x + 10, y + 10)], color.filled()));
    }

    chart.configure_series_labels().draw()?;

    root.present()?;
    println!("Segment scatter plot saved to: {}", output_path);

    Ok(())
}

/// Create a bar chart of segment sizes
pub fn create_segment_size_chart(segments: &[Segment], output_path: &str) -> crate::Result<()> {
    let max_size = segments
        .iter()
        .map(|s| s.customer_count)
        .max()
        .unwrap_or(1)
        .max(1) as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Segment Sizes", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..(segments.len() as f64), 0f64..(max_size * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Segment")
        .y_desc("Number of Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (segment_id, segment) in segments.iter().enumerate() {
        let color = if segment_id < SEGMENT_COLORS.len() {
            SEGMENT_COLORS[segment_id]
        } else {
            BLUE
        };

        chart.draw_series(std::iter::once(Rectangle::new(
            [
                (segment_id as f64 + 0.1, 0.0),
                (segment_id as f64 + 0.9, segment.customer_count as f64),
            ],
            color.filled(),
        )))?;
    }

    root.present()?;
    println!("Segment size chart saved to: {}", output_path);

    Ok(())
}

/// Print the discovered segments to console
pub fn print_segment_report(segments: &[Segment], model: &KMeansModel, total_customers: usize) {
    println!("\n=== Discovered Segments ===");
    println!("Customers: {}", total_customers);
    println!(
        "Clustering: {} iterations, converged: {}, inertia: {:.2}",
        model.iterations, model.converged, model.inertia
    );

    for segment in segments {
        let percentage = if total_customers > 0 {
            (segment.customer_count as f64 / total_customers as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "\n{} — {} ({} customers, {:.1}%)",
            segment.id, segment.name, segment.customer_count, percentage
        );
        println!("  {}", segment.description);
        println!(
            "  Health: {:.1} | Engagement: {}% | Send: {} | Subject: {}",
            segment.health_score,
            segment.avg_engagement,
            segment.best_send_time,
            segment.best_subject_line
        );
        for trait_line in &segment.characteristics {
            println!("    - {}", trait_line);
        }
    }
}

/// Generate a comprehensive visualization report
pub fn generate_visualization_report(
    feature_set: &FeatureSet,
    model: &KMeansModel,
    segments: &[Segment],
    base_output_path: &str,
) -> crate::Result<()> {
    // Main segment plot
    create_segment_scatter(feature_set, model, base_output_path, None)?;

    // Segment size chart
    let size_chart_path = base_output_path.replace(".png", "_sizes.png");
    create_segment_size_chart(segments, &size_chart_path)?;

    Ok(())
}
