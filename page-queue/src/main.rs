//! page-queue - Inspect and manage the publishing queue
//!
//! Unix-style tool for the scheduled post queue and the job history.

use clap::{Parser, Subcommand};
use libpagecast::types::ScheduleStatus;
use libpagecast::{Config, Database, PagecastError, Result, ScheduledPost};

#[derive(Parser, Debug)]
#[command(name = "page-queue")]
#[command(version)]
#[command(about = "Inspect and manage the publishing queue")]
#[command(long_about = "\
page-queue - Inspect and manage the publishing queue

DESCRIPTION:
    page-queue is a Unix-style tool for the Pagecast publishing queue.
    Use it to list scheduled posts, cancel them, inspect a settled job's
    per-target results, or view queue statistics.

COMMANDS:
    list        List scheduled posts
    cancel      Cancel a scheduled post
    job         Show a job and its per-target results
    stats       Show queue statistics

USAGE EXAMPLES:
    # List all scheduled posts
    page-queue list

    # List posts in JSON format
    page-queue list --format json

    # Cancel a specific post
    page-queue cancel <POST_ID>

    # Inspect a job's per-target results
    page-queue job <JOB_ID>

    # View queue statistics
    page-queue stats

CONFIGURATION:
    Configuration file: ~/.config/pagecast/config.toml
    Database location: ~/.local/share/pagecast/pagecast.db

    Override with environment variables:
        PAGECAST_CONFIG  - Path to config file
        PAGECAST_USER    - User id owning the accounts

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Not found
    3 - Invalid input (bad id, format, etc.)

For more information, visit: https://github.com/pagecast/pagecast
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// User id owning the queue
    #[arg(long, global = true, env = "PAGECAST_USER", default_value = "default")]
    user: String,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List scheduled posts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Only show posts that already failed
        #[arg(long)]
        failed: bool,
    },

    /// Cancel a scheduled post
    Cancel {
        /// Post ID to cancel
        post_id: String,
    },

    /// Show a job and its per-target results
    Job {
        /// Job ID to inspect
        job_id: String,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show queue statistics
    Stats,
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
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    match cli.command {
        Commands::List { format, failed } => {
            cmd_list(&db, &cli.user, &format, failed).await?;
        }
        Commands::Cancel { post_id } => {
            cmd_cancel(&db, &cli.user, &post_id).await?;
        }
        Commands::Job { job_id, format } => {
            cmd_job(&db, &cli.user, &job_id, &format).await?;
        }
        Commands::Stats => {
            cmd_stats(&db, &cli.user).await?;
        }
    }

    Ok(())
}

/// List scheduled posts
async fn cmd_list(db: &Database, user: &str, format: &str, failed_only: bool) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(PagecastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }

    let mut posts = db.list_scheduled_posts(user).await?;
    if failed_only {
        posts.retain(|p| p.status == ScheduleStatus::Failed);
    }

    if format == "json" {
        output_list_json(&posts);
    } else {
        output_list_text(&posts);
    }

    Ok(())
}

/// Output posts as JSON
fn output_list_json(posts: &[ScheduledPost]) {
    let json: Vec<serde_json::Value> = posts
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id,
                "media_url": p.media_url,
                "media_type": p.media_type.as_str(),
                "targets": p.target_ids,
                "scheduled_at": p.scheduled_at,
                "status": p.status.as_str(),
                "error": p.error_message,
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&json).unwrap_or_default()
    );
}

/// Output posts as human-readable text
fn output_list_text(posts: &[ScheduledPost]) {
    use chrono::Utc;

    if posts.is_empty() {
        return;
    }

    let now = Utc::now().timestamp();

    for post in posts {
        let when = match post.status {
            ScheduleStatus::Failed => "failed".to_string(),
            ScheduleStatus::Scheduled => format_time_until(now, post.scheduled_at),
        };

        println!(
            "{} | {} | {} target(s) | {}",
            post.id,
            truncate_content(&post.media_url, 50),
            post.target_ids.len(),
            when
        );
    }
}

/// Truncate content to max length with ellipsis; counts characters, not
/// bytes, so multibyte URLs never split mid-character
fn truncate_content(content: &str, max_len: usize) -> String {
    if content.chars().count() <= max_len {
        content.to_string()
    } else {
        let cut: String = content.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}

/// Format time until scheduled time in human-readable format
fn format_time_until(now: i64, scheduled_at: i64) -> String {
    let diff = scheduled_at - now;

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}

/// Cancel a scheduled post
async fn cmd_cancel(db: &Database, user: &str, post_id: &str) -> Result<()> {
    let post = db
        .get_scheduled_post(user, post_id)
        .await?
        .ok_or_else(|| PagecastError::NotFound(format!("Scheduled post {}", post_id)))?;

    db.delete_scheduled_post(user, &post.id).await?;
    println!("Cancelled {}", post.id);
    Ok(())
}

/// Show a job and its per-target results
async fn cmd_job(db: &Database, user: &str, job_id: &str, format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(PagecastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }

    let loaded = db
        .get_job_with_targets(user, job_id)
        .await?
        .ok_or_else(|| PagecastError::NotFound(format!("Job {}", job_id)))?;

    if format == "json" {
        let targets: Vec<serde_json::Value> = loaded
            .targets
            .iter()
            .map(|t| {
                serde_json::json!({
                    "position": t.position,
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
                "id": loaded.job.id,
                "status": loaded.job.status.as_str(),
                "media_url": loaded.job.media_url,
                "success_count": loaded.job.success_count,
                "failure_count": loaded.job.failure_count,
                "completed_at": loaded.job.completed_at,
                "targets": targets,
            }))
            .unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "{} | {} | {} succeeded, {} failed",
        loaded.job.id,
        loaded.job.status.as_str(),
        loaded.job.success_count,
        loaded.job.failure_count
    );
    for target in &loaded.targets {
        match (&target.post_id, &target.error_message) {
            (Some(post_id), _) => println!("  {} | ok | {}", target.account_id, post_id),
            (None, Some(error)) => println!("  {} | failed | {}", target.account_id, error),
            (None, None) => println!("  {} | pending |", target.account_id),
        }
    }
    Ok(())
}

/// Show queue statistics
async fn cmd_stats(db: &Database, user: &str) -> Result<()> {
    let posts = db.list_scheduled_posts(user).await?;
    let pending_jobs = db.list_pending_jobs(user).await?;

    let scheduled = posts
        .iter()
        .filter(|p| p.status == ScheduleStatus::Scheduled)
        .count();
    let failed = posts.len() - scheduled;

    println!("scheduled: {}", scheduled);
    println!("failed:    {}", failed);
    println!("pending:   {}", pending_jobs.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_content_unchanged() {
        assert_eq!(truncate_content("short", 50), "short");
    }

    #[test]
    fn test_truncate_long_content_gets_ellipsis() {
        let long = "a".repeat(60);
        let truncated = truncate_content(&long, 50);
        assert_eq!(truncated.len(), 53);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_truncate_multibyte_content_keeps_whole_chars() {
        // 25-byte prefix then two-byte characters; byte 50 falls inside one
        let url = format!("https://cdn.example.com/p{}", "é".repeat(60));
        let truncated = truncate_content(&url, 50);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 53);
    }

    #[test]
    fn test_format_time_until() {
        assert_eq!(format_time_until(1_000, 500), "overdue");
        assert_eq!(format_time_until(1_000, 1_030), "in <1 minute");
        assert_eq!(format_time_until(1_000, 1_000 + 120), "in 2 minutes");
        assert_eq!(format_time_until(1_000, 1_000 + 3_600), "in 1 hour");
        assert_eq!(format_time_until(1_000, 1_000 + 3 * 86_400), "in 3 days");
    }
}
