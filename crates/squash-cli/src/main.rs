//! Squash - CI job ingestion and metric evaluation CLI
//!
//! The `squash` command operates directly on a Squash store.
//!
//! ## Commands
//!
//! - `metric`: Register, show and list metric definitions
//! - `job`: Submit a CI job report, show a stored job, list jobs
//! - `evaluate`: Score a value against a metric's thresholds

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use squash_core::{
    HttpPushTransport, JobId, JobRecord, JobReport, Metric, MetricDefinition, NotifierConfig,
    SquashCore,
};
use squash_state::{StoreConfig, SurrealHandle, SurrealJobRepository, SurrealMetricRepository};
use tracing::{info, Level};

const DEFAULT_DB_URL: &str = "surrealkv://.squash/db";

#[derive(Parser)]
#[command(name = "squash")]
#[command(author = "Squash Developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CI job ingestion and quality metric evaluation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Store URL (mem://, surrealkv://path, ws://host)
    #[arg(long, global = true, env = "SQUASH_DB_URL", default_value = DEFAULT_DB_URL)]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage metric definitions
    Metric {
        #[command(subcommand)]
        action: MetricAction,
    },

    /// Submit and inspect CI jobs
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Evaluate a value against a registered metric
    Evaluate {
        /// Metric code
        code: String,

        /// Measured value
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
}

#[derive(Subcommand)]
enum MetricAction {
    /// Register a metric, replacing any existing definition with the same code
    Add {
        /// Short unique code, e.g. AM1
        code: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(short, long, default_value = "")]
        units: String,

        /// Comparison operator giving the "better than" direction
        #[arg(short, long, default_value = "<")]
        condition: String,

        #[arg(long, allow_negative_numbers = true)]
        minimum: f64,

        #[arg(long, allow_negative_numbers = true)]
        design: f64,

        #[arg(long, allow_negative_numbers = true)]
        stretch: f64,

        #[arg(long, allow_negative_numbers = true)]
        user: f64,
    },

    /// Show one metric definition
    Show {
        code: String,
    },

    /// List all metric definitions
    List,
}

#[derive(Subcommand)]
enum JobAction {
    /// Submit a job report (JSON file, or '-' for stdin)
    Submit {
        report: PathBuf,
    },

    /// Show a stored job with its packages, measurements and verdicts
    Show {
        job_id: String,
    },

    /// List stored jobs, newest first
    List {
        /// Maximum number of jobs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    squash_core::telemetry::init_tracing(cli.json, level);

    let core = open_core(&cli.db).await?;
    let outcome = run(&core, cli.command).await;
    core.shutdown().await;
    outcome
}

async fn open_core(db_url: &str) -> Result<SquashCore> {
    let mut store = StoreConfig::from_env(db_url).context("Invalid store configuration")?;
    store.url = db_url.to_string();
    let handle = Arc::new(
        SurrealHandle::connect(store)
            .await
            .context("Failed to connect to Squash database")?,
    );

    let notifier = NotifierConfig::from_env().context("Invalid notifier configuration")?;
    let transport = HttpPushTransport::new(notifier.push_url.clone())
        .context("Failed to create push transport")?;

    SquashCore::open(
        Arc::new(SurrealMetricRepository::new(handle.clone())),
        Arc::new(SurrealJobRepository::new(handle)),
        Arc::new(transport),
        notifier,
    )
    .await
    .context("Failed to load metric registry")
}

async fn run(core: &SquashCore, command: Commands) -> Result<()> {
    match command {
        Commands::Metric { action } => match action {
            MetricAction::Add {
                code,
                description,
                units,
                condition,
                minimum,
                design,
                stretch,
                user,
            } => {
                let definition = MetricDefinition {
                    code,
                    description,
                    units,
                    condition: Some(condition),
                    minimum,
                    design,
                    stretch,
                    user,
                };
                cmd_metric_add(core, definition).await
            }
            MetricAction::Show { code } => cmd_metric_show(core, &code).await,
            MetricAction::List => cmd_metric_list(core).await,
        },
        Commands::Job { action } => match action {
            JobAction::Submit { report } => cmd_job_submit(core, &report).await,
            JobAction::Show { job_id } => cmd_job_show(core, &job_id).await,
            JobAction::List { limit } => cmd_job_list(core, limit).await,
        },
        Commands::Evaluate { code, value } => cmd_evaluate(core, &code, value).await,
    }
}

async fn cmd_metric_add(core: &SquashCore, definition: MetricDefinition) -> Result<()> {
    let metric = core
        .register_metric(definition)
        .await
        .context("Failed to register metric")?;
    println!("Registered metric {}", metric.code);
    print_metric(&metric);
    Ok(())
}

async fn cmd_metric_show(core: &SquashCore, code: &str) -> Result<()> {
    let metric = core.get_metric(code).await?;
    print_metric(&metric);
    Ok(())
}

async fn cmd_metric_list(core: &SquashCore) -> Result<()> {
    let metrics = core.list_metrics().await;
    if metrics.is_empty() {
        println!("No metrics registered. Add one with 'squash metric add'.");
        return Ok(());
    }

    println!(
        "{:<16} {:>4} {:>10} {:>10} {:>10} {:>10}  units",
        "code", "cond", "minimum", "design", "stretch", "user"
    );
    for m in metrics {
        println!(
            "{:<16} {:>4} {:>10} {:>10} {:>10} {:>10}  {}",
            m.code, m.condition, m.minimum, m.design, m.stretch, m.user, m.units
        );
    }
    Ok(())
}

async fn cmd_job_submit(core: &SquashCore, path: &Path) -> Result<()> {
    let report = load_report(path)?;
    let job_id = core
        .submit_job(report)
        .await
        .context("Job submission failed")?;
    info!(job_id = %job_id, "job submitted");

    println!("Job {}", job_id);
    for (code, verdict) in core.job_verdicts(&job_id).await? {
        println!("  {:<16} {}", code, verdict);
    }
    Ok(())
}

async fn cmd_job_show(core: &SquashCore, job_id: &str) -> Result<()> {
    let job_id = JobId(job_id.to_string());
    let job = core.get_job(&job_id).await?;
    let verdicts = core.job_verdicts(&job_id).await?;

    print_job_header(&job);
    if !job.packages.is_empty() {
        println!("Packages:");
        for p in &job.packages {
            println!(
                "  {:<24} {} {} {}",
                p.name, p.git_commit, p.git_branch, p.build_version
            );
        }
    }
    if !job.measurements.is_empty() {
        println!("Measurements:");
        for m in &job.measurements {
            let verdict = verdicts
                .get(&m.metric)
                .map(|v| v.to_string())
                .unwrap_or_default();
            println!("  {:<16} {:>12}  {}", m.metric, m.value, verdict);
        }
    }
    Ok(())
}

async fn cmd_job_list(core: &SquashCore, limit: usize) -> Result<()> {
    let jobs = core.list_jobs().await?;
    if jobs.is_empty() {
        println!("No jobs recorded.");
        return Ok(());
    }
    for job in jobs.iter().take(limit) {
        print_job_header(job);
        println!();
    }
    Ok(())
}

async fn cmd_evaluate(core: &SquashCore, code: &str, value: f64) -> Result<()> {
    let verdict = core.evaluate_value(code, value).await?;
    println!("{} = {} -> {}", code, value, verdict);
    Ok(())
}

fn load_report(path: &Path) -> Result<JobReport> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read job report from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job report {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Job report is not valid JSON")
}

fn print_metric(m: &Metric) {
    println!("code:        {}", m.code);
    if !m.description.is_empty() {
        println!("description: {}", m.description);
    }
    if !m.units.is_empty() {
        println!("units:       {}", m.units);
    }
    println!("condition:   {}", m.condition);
    println!(
        "thresholds:  minimum {} / design {} / stretch {} / user {}",
        m.minimum, m.design, m.stretch, m.user
    );
}

fn print_job_header(job: &JobRecord) {
    println!("job {}", job.job_id);
    println!("Name:    {} #{}", job.name, job.build);
    println!("Status:  {}", job.status);
    println!("Runtime: {}", job.runtime.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("URL:     {}", job.url);
}
