//! SegmentForge: customer segmentation and campaign personalization CLI
//!
//! This is the main entrypoint that orchestrates data loading, segment
//! discovery, reporting, visualization, prediction and recommendations.

use std::fs;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use segmentforge::{
    characterize, extract_features, fit_kmeans, generate_recommendation, viz, Args,
    CsvEventSource, CustomerProfile, CustomerSource, JsonProfileSource, FEATURE_DIMS,
};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.verbose {
        println!("SegmentForge - Customer Segmentation & Personalization");
        println!("======================================================\n");
    }

    let customers = load_customers(&args)?;

    if let Some(behavior) = args.parse_behavior_values()? {
        run_prediction_mode(&args, &customers, behavior)?;
    } else if let Some(customer_id) = args.recommend.clone() {
        run_recommendation_mode(&customers, &customer_id)?;
    } else {
        run_full_pipeline(&args, &customers)?;
    }

    Ok(())
}

/// Build the data source the caller asked for and fetch the customer list.
///
/// The source is constructed here and handed down; the engine itself never
/// owns a connection to customer data.
fn load_customers(args: &Args) -> Result<Vec<CustomerProfile>> {
    let source: Box<dyn CustomerSource> = if args.input.ends_with(".csv") {
        Box::new(CsvEventSource::new(&args.input))
    } else {
        Box::new(JsonProfileSource::new(&args.input))
    };

    let customers = source.fetch_customers()?;
    info!(count = customers.len(), input = %args.input, "loaded customers");
    Ok(customers)
}

/// Run prediction mode for a hypothetical customer's behavior values
fn run_prediction_mode(
    args: &Args,
    customers: &[CustomerProfile],
    behavior: [f64; FEATURE_DIMS],
) -> Result<()> {
    println!("=== Prediction Mode ===");
    println!(
        "Input behavior: open={}, click={}, purchase={}, discount={}, cart={}",
        behavior[0], behavior[1], behavior[2], behavior[3], behavior[4]
    );

    if customers.is_empty() {
        anyhow::bail!("no customers available to fit a model against");
    }

    let start_time = Instant::now();

    let feature_set = extract_features(customers)?;
    let model = fit_kmeans(&feature_set, args.clusters, args.max_iters)?;
    let segments = characterize(&model, customers);

    let cluster = model.predict(&behavior);
    let segment = &segments[cluster];
    let elapsed = start_time.elapsed();

    println!("\n✓ Closest segment: {} ({})", segment.name, segment.id);
    println!("  {}", segment.description);
    println!(
        "  {} existing customers, health {:.1}, engagement {}%",
        segment.customer_count, segment.health_score, segment.avg_engagement
    );
    println!("  Processing time: {:.2}s", elapsed.as_secs_f64());

    Ok(())
}

/// Run recommendation mode for a single known customer
fn run_recommendation_mode(customers: &[CustomerProfile], customer_id: &str) -> Result<()> {
    println!("=== Recommendation Mode ===");

    let customer = customers
        .iter()
        .find(|c| c.id == customer_id)
        .ok_or_else(|| anyhow::anyhow!("no customer with id '{customer_id}' in the input"))?;

    let recommendation = generate_recommendation(customer);

    println!("\n✓ Campaign preview for {}", customer_id);
    println!("  Subject line: {}", recommendation.subject_line);
    println!("  Send time: {}", recommendation.send_time);
    println!("  Products: {}", recommendation.products.join(", "));
    println!(
        "  Expected open rate: {}% | Expected conversion: {}% | Confidence: {}%",
        recommendation.expected_open_rate,
        recommendation.expected_conversion,
        recommendation.confidence
    );

    Ok(())
}

/// Run the full segmentation pipeline
fn run_full_pipeline(args: &Args, customers: &[CustomerProfile]) -> Result<()> {
    println!("=== Segment Discovery ===\n");

    if customers.is_empty() {
        println!("No customer data available.");
        return Ok(());
    }

    let start_time = Instant::now();

    // Step 1: Extract behavior features
    if args.verbose {
        println!("Step 1: Extracting behavior features");
        println!("  Customers: {}", customers.len());
    }

    let feature_set = extract_features(customers)?;

    // Step 2: Cluster
    if args.verbose {
        println!("\nStep 2: Fitting K-Means model");
        println!("  Number of segments: {}", args.clusters);
        println!("  Max iterations: {}", args.max_iters);
    }

    let model_start = Instant::now();
    let model = fit_kmeans(&feature_set, args.clusters, args.max_iters)?;
    let model_time = model_start.elapsed();

    println!("✓ Model fitted successfully");
    if args.verbose {
        println!("  Fitting time: {:.2}s", model_time.as_secs_f64());
        println!(
            "  Iterations: {} (converged: {})",
            model.iterations, model.converged
        );
        println!("  Inertia: {:.2}", model.inertia);
    }

    // Step 3: Characterize segments and report
    let segments = characterize(&model, customers);
    viz::print_segment_report(&segments, &model, customers.len());

    // Step 4: Export
    if let Some(export_path) = &args.export {
        fs::write(export_path, serde_json::to_string_pretty(&segments)?)?;
        println!("\nSegments exported to: {}", export_path);
    }

    // Step 5: Visualize
    if args.verbose {
        println!("\nStep 3: Generating visualizations");
        println!("  Output file: {}", args.output);
    }

    viz::generate_visualization_report(&feature_set, &model, &segments, &args.output)?;

    let total_time = start_time.elapsed();
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());
    println!("Main plot saved to: {}", args.output);
    println!(
        "Segment sizes saved to: {}",
        args.output.replace(".png", "_sizes.png")
    );

    Ok(())
}
