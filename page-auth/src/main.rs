//! page-auth - Connect accounts and manage platform credentials

use clap::{Parser, Subcommand};
use libpagecast::auth::{build_auth_url, generate_state, verify_state, AuthManager};
use libpagecast::types::ApiCredential;
use libpagecast::{Config, Database, GraphClient, PagecastError, PlatformKind, Result};
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "page-auth")]
#[command(version)]
#[command(about = "Connect accounts and manage platform credentials")]
#[command(long_about = "\
page-auth - Connect accounts and manage platform credentials

DESCRIPTION:
    page-auth manages the OAuth side of Pagecast: registering your app's
    credentials, generating the authorization URL, completing the code
    exchange, and keeping page tokens fresh.

COMMANDS:
    set       Store app credentials for a platform
    url       Print the authorization URL to open in a browser
    connect   Complete the flow with the authorization code
    accounts  List connected accounts
    status    Check stored token health
    refresh   Refresh page tokens for connected accounts

USAGE EXAMPLES:
    # Store app credentials
    page-auth set facebook --app-id 1234 --app-secret s3cret

    # Start the flow (prints URL and state)
    page-auth url instagram --redirect-uri https://localhost/callback

    # Finish the flow with the code from the callback
    page-auth connect instagram --code AQD... --state default:x9k2 \\
        --redirect-uri https://localhost/callback

    # Inspect what got connected
    page-auth accounts

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
    3 - Invalid input

For more information, visit: https://github.com/pagecast/pagecast
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// User id owning the credentials
    #[arg(long, global = true, env = "PAGECAST_USER", default_value = "default")]
    user: String,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store app credentials for a platform
    Set {
        /// Platform: facebook or instagram
        platform: String,

        /// App id from the developer console
        #[arg(long)]
        app_id: String,

        /// App secret from the developer console
        #[arg(long)]
        app_secret: String,
    },

    /// Print the authorization URL to open in a browser
    Url {
        /// Platform: facebook or instagram
        platform: String,

        /// Redirect URI registered with the app
        #[arg(long)]
        redirect_uri: String,
    },

    /// Complete the flow with the authorization code
    Connect {
        /// Platform: facebook or instagram
        platform: String,

        /// Authorization code from the callback
        #[arg(long)]
        code: String,

        /// State parameter from the callback
        #[arg(long)]
        state: String,

        /// Redirect URI used to start the flow
        #[arg(long)]
        redirect_uri: String,
    },

    /// List connected accounts
    Accounts {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check stored token health
    Status {
        /// Platform: facebook or instagram
        platform: String,
    },

    /// Refresh page tokens for connected accounts
    Refresh {
        /// Platform: facebook or instagram
        platform: String,
    },
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
    let client = GraphClient::new(&config.graph);
    let manager = AuthManager::new(db.clone(), client);

    match cli.command {
        Commands::Set {
            platform,
            app_id,
            app_secret,
        } => {
            let platform = parse_platform(&platform)?;
            let credential =
                ApiCredential::new(cli.user.clone(), platform, app_id, app_secret, None);
            db.upsert_api_credential(&credential).await?;
            println!("Stored {} credentials", platform);
        }

        Commands::Url {
            platform,
            redirect_uri,
        } => {
            let platform = parse_platform(&platform)?;
            let credential = db
                .get_api_credential(&cli.user, platform)
                .await?
                .ok_or_else(|| {
                    PagecastError::NotFound(format!(
                        "No API credentials configured for {}. Run page-auth set first",
                        platform
                    ))
                })?;

            let state = generate_state(&cli.user);
            let url = build_auth_url(&credential.app_id, &redirect_uri, &state, platform);
            println!("{}", url);
            eprintln!("state: {}", state);
        }

        Commands::Connect {
            platform,
            code,
            state,
            redirect_uri,
        } => {
            let platform = parse_platform(&platform)?;
            if !verify_state(&state, &cli.user) {
                return Err(PagecastError::InvalidInput(
                    "State parameter does not match this user".to_string(),
                ));
            }

            let resolved = manager
                .connect(&cli.user, platform, &code, &redirect_uri)
                .await?;

            println!("Connected as {}", resolved.username);
            if let Some(page) = &resolved.facebook_page_name {
                println!("  page: {}", page);
            }
            if let Some(ig) = &resolved.instagram_id {
                println!("  business account: {}", ig);
            }
            if !resolved.is_publishable() {
                println!("  note: no page token resolved; connection is read-only");
            }
        }

        Commands::Accounts { format } => {
            let accounts = db.list_social_accounts(&cli.user).await?;
            if format == "json" {
                let json: Vec<serde_json::Value> = accounts
                    .iter()
                    .map(|a| {
                        serde_json::json!({
                            "id": a.id,
                            "platform": a.platform.as_str(),
                            "account_id": a.account_id,
                            "display_name": a.display_name,
                            "publishable": a.is_publishable(),
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_default()
                );
            } else {
                for account in &accounts {
                    println!(
                        "{} | {} | {} | {}",
                        account.id,
                        account.platform,
                        account.display_name,
                        if account.is_publishable() {
                            "publishable"
                        } else {
                            "read-only"
                        }
                    );
                }
            }
        }

        Commands::Status { platform } => {
            let platform = parse_platform(&platform)?;
            let health = manager.check_token_health(&cli.user, platform).await?;
            if health.is_valid {
                println!("{}: token valid", platform);
            } else {
                println!(
                    "{}: token invalid ({})",
                    platform,
                    health.error.unwrap_or_else(|| "unknown reason".to_string())
                );
                std::process::exit(1);
            }
        }

        Commands::Refresh { platform } => {
            let platform = parse_platform(&platform)?;
            let refreshed = manager.refresh_account_tokens(&cli.user, platform).await?;
            println!("Refreshed {} account(s)", refreshed);
        }
    }

    Ok(())
}

fn parse_platform(input: &str) -> Result<PlatformKind> {
    PlatformKind::from_str(input).map_err(PagecastError::InvalidInput)
}
