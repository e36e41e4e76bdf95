//! Cost Estimator
//!
//! Prices AWS resources against locally stored public price list documents.
//! Estimates, windowed actuals and recommendations are printed as JSON on stdout.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_pricing::RecommendationRequest;
use eyre::Result;
use std::path::PathBuf;
use tracing::info;

mod commands;
mod config;

use commands::{App, parse_arn, parse_tag, print_json, read_input};
use config::Config;

#[derive(Parser)]
#[command(name = "cost-estimator")]
#[command(about = "Estimate AWS resource costs from public price list files")]
struct Cli {
    /// Region the price index serves (overrides PRICING_REGION)
    #[arg(long, global = true)]
    pricing_region: Option<String>,

    /// Price list files to index (overrides PRICING_CATALOG_PATH)
    #[arg(short, long, global = true, value_delimiter = ',')]
    catalog: Option<Vec<PathBuf>>,

    /// CPU utilization (0-1) for carbon estimates of untagged instances
    #[arg(long, global = true)]
    utilization: Option<f64>,

    /// Dump Prometheus metrics to stderr when done
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the price index and show per-service counts
    Status,

    /// Projected monthly cost of a resource
    Estimate {
        /// JSON resource file, or - for stdin
        #[arg(short, long, default_value = "-")]
        input: String,
    },

    /// Cost of a resource over a time window, pro-rated from list prices
    Actual {
        /// JSON resource file, or - for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Window start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// Window end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
    },

    /// Cost-saving recommendations for a resource
    Recommend {
        /// Resource type (ec2, ebs, ...)
        #[arg(short = 't', long)]
        resource_type: String,

        /// Instance type or volume type
        #[arg(short, long)]
        sku: String,

        /// Resource region; defaults to the pricing region
        #[arg(short, long)]
        region: Option<String>,

        /// Resource attributes as key=value, repeatable
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },

    /// Parse an ARN without loading any pricing data
    ParseArn {
        arn: String,
    },
}

fn main() -> Result<()> {
    install_color_eyre();

    let cli = Cli::parse();
    let config = Config::from_env()?.with_overrides(cli.pricing_region, cli.catalog);
    init_tracing(&config.environment);

    observability::init_metrics();

    match cli.command {
        Commands::ParseArn { arn } => print_json(&parse_arn(&arn)?)?,

        Commands::Status => {
            let app = App::new(&config.pricing)?;
            let status = app.status()?;
            info!(
                entries = status.total_entries,
                services = status.services.len(),
                "Price index ready"
            );
            print_json(&status)?;
        }

        Commands::Estimate { input } => {
            let app = App::new(&config.pricing)?.with_utilization(cli.utilization);
            let resource = read_input(&input)?;
            print_json(&app.estimate(&resource)?)?;
        }

        Commands::Actual { input, start, end } => {
            let app = App::new(&config.pricing)?.with_utilization(cli.utilization);
            let resource = read_input(&input)?;
            print_json(&app.actual(&resource, start, end)?)?;
        }

        Commands::Recommend {
            resource_type,
            sku,
            region,
            tags,
        } => {
            let app = App::new(&config.pricing)?;
            let mut request = RecommendationRequest::new(resource_type, sku);
            if let Some(region) = region {
                request = request.with_region(region);
            }
            for (key, value) in tags {
                request = request.with_tag(key, value);
            }
            print_json(&app.recommend(&request)?)?;
        }
    }

    if cli.print_metrics {
        eprintln!("{}", observability::render_metrics());
    }

    Ok(())
}
