use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use jobflow_core::app::{App, AppBuilder, ExecutorRegistry};
use jobflow_core::domain::{JobSpec, JobStatus};
use jobflow_core::impls::SimulatedDurations;
use jobflow_core::{JobflowConfig, RetryPlacement};

#[derive(Parser)]
#[command(name = "jobflow")]
#[command(about = "Queue-backed job orchestrator with bounded retry and a dead-letter queue")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "JOBFLOW_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API, the workers and the reaper
    Serve {
        /// Address to listen on
        #[arg(long, env = "JOBFLOW_BIND", default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Number of worker instances
        #[arg(short, long, env = "JOBFLOW_WORKERS", default_value_t = 1)]
        workers: usize,

        /// Do not run the lease reaper
        #[arg(long)]
        no_reaper: bool,

        #[command(flatten)]
        runtime: RuntimeArgs,
    },

    /// Submit a handful of sample jobs, run them to completion and print the result
    Demo {
        /// Number of worker instances
        #[arg(short, long, default_value_t = 2)]
        workers: usize,

        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 30)]
        wait_secs: u64,

        #[command(flatten)]
        runtime: RuntimeArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Placement {
    Front,
    Back,
}

impl From<Placement> for RetryPlacement {
    fn from(p: Placement) -> Self {
        match p {
            Placement::Front => RetryPlacement::Front,
            Placement::Back => RetryPlacement::Back,
        }
    }
}

#[derive(Args)]
struct RuntimeArgs {
    #[arg(long, env = "JOBFLOW_QUEUE", default_value = "job:queue")]
    queue_name: String,

    #[arg(long, env = "JOBFLOW_DLQ", default_value = "job:dlq")]
    dlq_name: String,

    /// maxRetries for submissions that do not set one
    #[arg(long, env = "JOBFLOW_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Period between worker cycles
    #[arg(long, env = "JOBFLOW_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    /// How long one cycle waits for a job id
    #[arg(long, env = "JOBFLOW_POP_TIMEOUT_MS", default_value_t = 1000)]
    pop_timeout_ms: u64,

    /// Upper bound on one execution attempt
    #[arg(long, env = "JOBFLOW_EXECUTION_TIMEOUT_SECS", default_value_t = 30)]
    execution_timeout_secs: u64,

    /// Which end of the main queue a retried job goes to
    #[arg(long, env = "JOBFLOW_RETRY_PLACEMENT", value_enum, default_value = "front")]
    retry_placement: Placement,

    /// How long a job may stay RUNNING before the reaper fails the attempt
    #[arg(long, env = "JOBFLOW_LEASE_TIMEOUT_SECS", default_value_t = 300)]
    lease_timeout_secs: u64,

    #[arg(long, env = "JOBFLOW_REAPER_INTERVAL_SECS", default_value_t = 30)]
    reaper_interval_secs: u64,

    /// Browser origins allowed to call the API (comma separated, empty disables CORS)
    #[arg(
        long = "cors-origin",
        env = "JOBFLOW_CORS_ORIGIN",
        value_delimiter = ',',
        default_value = "http://localhost:5173"
    )]
    cors_origins: Vec<String>,

    /// Skip the simulated work delays of the built-in executors
    #[arg(long, env = "JOBFLOW_INSTANT")]
    instant: bool,

    /// Keep queues and job records in Redis so several processes can share
    /// them (e.g. redis://localhost:6379)
    #[cfg(feature = "redis-backend")]
    #[arg(long, env = "JOBFLOW_REDIS_URL")]
    redis_url: Option<String>,

    /// Key prefix for job records in Redis
    #[cfg(feature = "redis-backend")]
    #[arg(long, env = "JOBFLOW_REDIS_PREFIX", default_value = "job")]
    redis_prefix: String,
}

impl RuntimeArgs {
    fn config(&self) -> JobflowConfig {
        JobflowConfig {
            queue_name: self.queue_name.clone(),
            dlq_name: self.dlq_name.clone(),
            default_max_retries: self.max_retries,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            pop_timeout: Duration::from_millis(self.pop_timeout_ms),
            execution_timeout: Duration::from_secs(self.execution_timeout_secs),
            retry_placement: self.retry_placement.into(),
            lease_timeout: Duration::from_secs(self.lease_timeout_secs),
            reaper_interval: Duration::from_secs(self.reaper_interval_secs),
            cors_origins: self
                .cors_origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }

    fn durations(&self) -> SimulatedDurations {
        if self.instant {
            SimulatedDurations::instant()
        } else {
            SimulatedDurations::default()
        }
    }

    async fn build_app(&self) -> Result<App> {
        #[allow(unused_mut)]
        let mut builder = AppBuilder::new()
            .config(self.config())
            .registry(ExecutorRegistry::with_builtins(self.durations()));

        // キューだけ Redis にすると、他プロセスはレコードを読めない。両方まとめて切り替える
        #[cfg(feature = "redis-backend")]
        if let Some(url) = &self.redis_url {
            use jobflow_core::impls::{RedisJobStore, RedisQueueChannel};
            use jobflow_core::ports::{SystemClock, UlidGenerator};
            use std::sync::Arc;

            let queue = RedisQueueChannel::connect(url)
                .await
                .with_context(|| format!("failed to connect to {url}"))?;
            let ids = Arc::new(UlidGenerator::new(Arc::new(SystemClock)));
            let store = RedisJobStore::connect(url, &self.redis_prefix, ids)
                .await
                .with_context(|| format!("failed to connect to {url}"))?;
            tracing::info!(%url, prefix = %self.redis_prefix, "using redis queue and record store");
            builder = builder.queue(Arc::new(queue)).store(Arc::new(store));
        }

        builder.build().context("failed to build app")
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve {
            bind,
            workers,
            no_reaper,
            runtime,
        } => serve(bind, workers, !no_reaper, runtime).await,
        Command::Demo {
            workers,
            wait_secs,
            runtime,
        } => demo(workers, Duration::from_secs(wait_secs), runtime).await,
    }
}

async fn serve(bind: SocketAddr, workers: usize, reaper: bool, runtime: RuntimeArgs) -> Result<()> {
    let app = runtime.build_app().await?;

    let mut group = app.worker_group(workers);
    if reaper {
        group = group.with_reaper(app.reaper());
    }
    tracing::info!(workers, reaper, "workers started");

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(%bind, "listening");

    axum::serve(listener, jobflow_core::http::router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    tracing::info!("shutting down workers");
    group.shutdown_and_join().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}

/// サンプルジョブを投入して、全部が終端状態になるまで待つ
async fn demo(workers: usize, wait: Duration, runtime: RuntimeArgs) -> Result<()> {
    let app = runtime.build_app().await?;
    let submitter = app.submitter();

    let samples = [
        JobSpec::new("email").with_payload(r#"{"to":"ops@example.com"}"#),
        JobSpec::new("report").with_payload(r#"{"period":"2024-Q1"}"#),
        JobSpec::new("data-processing"),
        JobSpec::new("fail").with_max_retries(2),
        JobSpec::new("thumbnail"),
    ];
    for spec in samples {
        let job = submitter.submit(spec).await?;
        println!("submitted {} ({})", job.id, job.job_type);
    }

    let group = app.worker_group(workers);

    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let jobs = submitter.list_all().await?;
        if jobs.iter().all(|j| j.is_terminal()) {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!("gave up waiting for jobs to finish");
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    group.shutdown_and_join().await;

    let mut jobs = submitter.list_all().await?;
    jobs.reverse();
    for job in &jobs {
        let error = job.error_message.as_deref().unwrap_or("-");
        println!(
            "{} {:<16} {:<9} retries={}/{} error={}",
            job.id,
            job.job_type,
            job.status.as_str(),
            job.retry_count, job.max_retries, error
        );
    }

    let stats = app.stats().snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    let failed = stats.count(JobStatus::Failed);
    tracing::info!(completed = stats.completed_jobs, failed, "demo finished");
    Ok(())
}
