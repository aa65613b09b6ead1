//! page-post - Publish media to connected Pages and Business Accounts

use clap::Parser;
use libpagecast::publisher::GraphPublisherFactory;
use libpagecast::types::{PostJob, ScheduledPost};
use libpagecast::{
    Config, Database, GraphClient, JobProcessor, MediaType, PagecastError, Result,
};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "page-post")]
#[command(version)]
#[command(about = "Publish media to connected Pages and Business Accounts")]
#[command(long_about = "\
page-post - Publish media to connected Pages and Business Accounts

DESCRIPTION:
    page-post creates a publish job for a media URL and fans it out to the
    selected connected accounts. Each target settles independently; one
    failing target never blocks the others.

    With --schedule the post is stored in the queue instead and published
    by the page-send daemon when its time arrives.

USAGE EXAMPLES:
    # Publish an image to every connected account
    page-post https://cdn.example.com/launch.jpg --caption \"Launch day\"

    # Publish a video to specific accounts
    page-post https://cdn.example.com/teaser.mp4 --media-type video \\
        --targets acct-1,acct-2

    # Schedule for later
    page-post https://cdn.example.com/launch.jpg --schedule \"tomorrow 9am\"

CONFIGURATION:
    Configuration file: ~/.config/pagecast/config.toml
    Database location: ~/.local/share/pagecast/pagecast.db

    Override with environment variables:
        PAGECAST_CONFIG  - Path to config file
        PAGECAST_USER    - User id owning the accounts

EXIT CODES:
    0 - All targets published
    1 - One or more targets failed
    2 - Database or configuration error
    3 - Invalid input (bad media type, time format, etc.)

For more information, visit: https://github.com/pagecast/pagecast
")]
struct Cli {
    /// Public URL of the media to publish
    media_url: String,

    /// Caption attached to the post
    #[arg(short, long)]
    caption: Option<String>,

    /// Media type: image or video
    #[arg(short, long, default_value = "image")]
    media_type: String,

    /// Target account ids (comma-separated; all publishable accounts if omitted)
    #[arg(short, long)]
    targets: Option<String>,

    /// Schedule for later instead of publishing now (e.g. "2h", "tomorrow 9am")
    #[arg(short, long)]
    schedule: Option<String>,

    /// User id owning the accounts
    #[arg(long, env = "PAGECAST_USER", default_value = "default")]
    user: String,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("error")
            .with_writer(std::io::stderr)
            .init();
    }

    // Run the main logic and handle errors
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.format != "text" && cli.format != "json" {
        return Err(PagecastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            cli.format
        )));
    }

    let media_type =
        MediaType::from_str(&cli.media_type).map_err(PagecastError::InvalidInput)?;

    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    let targets = resolve_targets(&db, &cli.user, cli.targets.as_deref()).await?;

    match &cli.schedule {
        Some(schedule) => {
            let scheduled_at = libpagecast::scheduling::parse_schedule(schedule)?;
            let post = ScheduledPost::new(
                cli.user.clone(),
                cli.caption.clone(),
                cli.media_url.clone(),
                media_type,
                targets,
                scheduled_at.timestamp(),
            );
            db.create_scheduled_post(&post).await?;

            if cli.format == "json" {
                println!(
                    "{}",
                    serde_json::json!({
                        "id": post.id,
                        "scheduled_at": post.scheduled_at,
                        "targets": post.target_ids.len(),
                    })
                );
            } else {
                println!(
                    "Scheduled {} for {} ({} target(s))",
                    post.id,
                    scheduled_at.format("%Y-%m-%d %H:%M UTC"),
                    post.target_ids.len()
                );
            }
            Ok(())
        }
        None => {
            let job = PostJob::new(
                cli.user.clone(),
                cli.caption.clone(),
                cli.media_url.clone(),
                media_type,
            );
            db.create_post_job(&job, &targets).await?;

            let client = GraphClient::new(&config.graph);
            let factory = Arc::new(GraphPublisherFactory::new(client));
            let processor = JobProcessor::new(
                db.clone(),
                factory,
                format!("page-post-{}", uuid::Uuid::new_v4()),
            );

            let settled = processor
                .process_job(&cli.user, &job.id)
                .await?
                .ok_or_else(|| {
                    PagecastError::NotFound(format!("Job {} was taken by another worker", job.id))
                })?;

            print_outcome(&settled, &cli.format);

            if settled.job.failure_count > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Expand the --targets argument, defaulting to every publishable account
async fn resolve_targets(
    db: &Database,
    user: &str,
    targets: Option<&str>,
) -> Result<Vec<String>> {
    match targets {
        Some(list) => {
            let ids: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if ids.is_empty() {
                return Err(PagecastError::InvalidInput(
                    "Target list is empty".to_string(),
                ));
            }
            Ok(ids)
        }
        None => {
            let accounts = db.list_social_accounts(user).await?;
            let ids: Vec<String> = accounts
                .iter()
                .filter(|a| a.is_publishable())
                .map(|a| a.id.clone())
                .collect();
            if ids.is_empty() {
                return Err(PagecastError::NotFound(
                    "No publishable accounts connected. Run page-auth first".to_string(),
                ));
            }
            Ok(ids)
        }
    }
}

fn print_outcome(settled: &libpagecast::JobWithTargets, format: &str) {
    if format == "json" {
        let targets: Vec<serde_json::Value> = settled
            .targets
            .iter()
            .map(|t| {
                serde_json::json!({
                    "account_id": t.account_id,
                    "status": t.status.map(|s| s.as_str()),
                    "post_id": t.post_id,
                    "error": t.error_message,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "job_id": settled.job.id,
                "status": settled.job.status.as_str(),
                "success_count": settled.job.success_count,
                "failure_count": settled.job.failure_count,
                "targets": targets,
            }))
            .unwrap_or_default()
        );
        return;
    }

    for target in &settled.targets {
        match (&target.post_id, &target.error_message) {
            (Some(post_id), _) => println!("{} | ok | {}", target.account_id, post_id),
            (None, Some(error)) => println!("{} | failed | {}", target.account_id, error),
            (None, None) => println!("{} | pending |", target.account_id),
        }
    }
    println!(
        "{}: {} succeeded, {} failed",
        settled.job.id, settled.job.success_count, settled.job.failure_count
    );
}
