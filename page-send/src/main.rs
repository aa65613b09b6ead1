//! page-send - Background daemon for the publishing queue
//!
//! Drains pending publish jobs and executes scheduled posts whose time
//! has arrived.

use clap::Parser;
use libpagecast::publisher::GraphPublisherFactory;
use libpagecast::{Config, Database, GraphClient, JobProcessor, Result, ScheduleExecutor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "page-send")]
#[command(version)]
#[command(about = "Background daemon for the publishing queue")]
#[command(long_about = "\
page-send - Background daemon for the publishing queue

DESCRIPTION:
    page-send is a long-running daemon that drains the Pagecast queue.
    Each poll it settles pending publish jobs (fanning each one out to
    its targets) and executes scheduled posts whose time has passed.

    Jobs are taken with a lease, so several page-send processes can run
    against the same database without publishing anything twice.

USAGE:
    # Run in foreground (logs to stderr)
    page-send

    # Run with custom poll interval
    page-send --poll-interval 30

    # Enable verbose logging
    page-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes current poll)

CONFIGURATION:
    Configuration file: ~/.config/pagecast/config.toml
    Database location: ~/.local/share/pagecast/pagecast.db

    [scheduling]
    poll_interval = 60  # seconds between polls

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error

For more information, visit: https://github.com/pagecast/pagecast
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check the queue (default: 60)")]
    poll_interval: Option<u64>,

    /// User id owning the queue
    #[arg(long, env = "PAGECAST_USER", default_value = "default")]
    user: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Drain the queue once and exit (for testing)")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Load configuration
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    info!("page-send daemon starting");

    // Set up graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    // Determine poll interval
    let poll_interval = cli
        .poll_interval
        .or_else(|| config.scheduling.as_ref().map(|s| s.poll_interval))
        .unwrap_or(60);
    info!("Poll interval: {}s", poll_interval);

    let client = GraphClient::new(&config.graph);
    let factory = Arc::new(GraphPublisherFactory::new(client));
    let processor = JobProcessor::new(
        db.clone(),
        factory.clone(),
        format!("page-send-{}", uuid::Uuid::new_v4()),
    );
    let executor = ScheduleExecutor::new(db.clone(), factory);

    // Main daemon loop
    if cli.once {
        // Run once for testing
        drain_queue(&processor, &executor, &cli.user).await;
        info!("page-send: drained queue once, exiting");
    } else {
        // Normal daemon mode
        run_daemon_loop(&processor, &executor, &cli.user, poll_interval, shutdown).await;
    }

    info!("page-send daemon stopped");
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libpagecast::PagecastError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    // Spawn thread to handle signals
    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

/// Main daemon loop
async fn run_daemon_loop(
    processor: &JobProcessor,
    executor: &ScheduleExecutor,
    user: &str,
    poll_interval: u64,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        // Check for shutdown signal
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        drain_queue(processor, executor, user).await;

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

/// One poll: settle pending jobs, then execute due scheduled posts.
/// Errors are logged and the daemon keeps going.
async fn drain_queue(processor: &JobProcessor, executor: &ScheduleExecutor, user: &str) {
    match processor.process_pending_jobs(user).await {
        Ok(0) => {}
        Ok(n) => info!("Settled {} job(s)", n),
        Err(e) => error!("Error processing jobs: {}", e),
    }

    match executor.execute_due_posts(user).await {
        Ok(report) if report.published + report.failed > 0 => {
            info!(
                "Scheduled posts: {} published, {} failed",
                report.published, report.failed
            );
        }
        Ok(_) => {}
        Err(e) => error!("Error executing scheduled posts: {}", e),
    }
}
