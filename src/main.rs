use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sift_client::models::filter::FilterPartition;
use sift_client::models::image::ImageUpload;
use sift_client::services::filters;
use sift_client::{AnalysisJobClient, ClientConfig, ClientError, FilterSelection, Phase};

#[derive(Parser, Debug)]
#[command(name = "sift", version, about = "Check a food label against dietary filters")]
struct Cli {
    /// Analysis service base URL (overrides API_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the supported dietary filters
    Filters,
    /// Check whether the analysis service is up
    Health,
    /// Upload a label image and evaluate it against the given filters
    Scan {
        /// Label image (jpg, png, heic, heif, gif, bmp, webp)
        image: PathBuf,

        /// Filter identifier, repeatable (see `sift filters`)
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    describe_metrics();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn describe_metrics() {
    metrics::describe_counter!(
        "sift_jobs_submitted_total",
        "Label images submitted for ingredient extraction"
    );
    metrics::describe_counter!(
        "sift_jobs_completed_total",
        "Jobs that reached a complete analysis result"
    );
    metrics::describe_counter!(
        "sift_jobs_failed_total",
        "Jobs that ended in an error, by failure reason"
    );
    metrics::describe_counter!("sift_status_polls_total", "Status polls sent to the service");
    metrics::describe_histogram!(
        "sift_analysis_duration_seconds",
        metrics::Unit::Seconds,
        "Time from analysis request to stored results"
    );
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.api_base_url = base_url;
        config = config.validated()?;
    }

    match cli.command {
        Command::Filters => {
            list_filters(cli.json)?;
            Ok(())
        }
        Command::Health => {
            let client = AnalysisJobClient::from_config(&config)?;
            let report = client.health().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} (model initialized: {}, database ready: {})",
                    report.status, report.model_initialized, report.database_ready
                );
            }
            if report.is_healthy() {
                Ok(())
            } else {
                Err(format!("service is {}", report.status).into())
            }
        }
        Command::Scan { image, filters } => {
            let client = AnalysisJobClient::from_config(&config)?;
            scan(&client, image, &filters, cli.json).await
        }
    }
}

fn list_filters(json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(filters::list_filters())?);
        return Ok(());
    }
    for filter in filters::list_filters() {
        println!("{:<12} {}", filter.id, filter.display_name);
    }
    Ok(())
}

async fn scan(
    client: &AnalysisJobClient,
    image: PathBuf,
    filter_ids: &[String],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Unknown filters are rejected before anything is uploaded
    let selection = FilterSelection::with_checked(filter_ids.iter().map(String::as_str))?;
    let upload = ImageUpload::from_path(&image).await?;

    let mut updates = client.subscribe();
    let progress = tokio::spawn(async move {
        let mut last = Phase::Idle;
        while updates.changed().await.is_ok() {
            let phase = updates.borrow_and_update().phase();
            if phase != last {
                eprintln!("... {}", phase);
                last = phase;
            }
        }
    });

    let result = run_job(client, upload, &selection).await;
    progress.abort();

    let partition = match result {
        Ok(partition) => partition,
        Err(e) if e.is_recoverable() => return Err(format!("{}", e).into()),
        Err(e) if e.is_contract_violation() => {
            return Err(format!("{} (client and service versions may not match)", e).into())
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&partition)?);
    } else {
        print_partition(&partition);
    }
    Ok(())
}

async fn run_job(
    client: &AnalysisJobClient,
    upload: ImageUpload,
    selection: &FilterSelection,
) -> Result<FilterPartition, ClientError> {
    let job = client.submit_upload(upload).await?;
    eprintln!("Ingredients: {}", job.ingredients().join(", "));

    client.request_analysis(selection).await?;
    client.results()
}

fn print_partition(partition: &FilterPartition) {
    if !partition.failed.is_empty() {
        println!("Failed filters:");
        for failed in &partition.failed {
            if failed.failed_ingredients.is_empty() {
                println!("  ✗ {}", failed.filter.display_name);
            } else {
                println!(
                    "  ✗ {} ({})",
                    failed.filter.display_name,
                    failed.failed_ingredients.join(", ")
                );
            }
        }
    }
    if !partition.passed.is_empty() {
        println!("Passed filters:");
        for passed in &partition.passed {
            println!("  ✓ {}", passed.display_name);
        }
    }
}
