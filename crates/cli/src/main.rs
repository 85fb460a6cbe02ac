use std::process;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ganttview_cli::{CliResult, Command, Context};
use ganttview_core::{ApiClient, ClientConfig, DisplayTimezone};

/// Environment variable name for the dashboard base URL
const BASE_URL_ENV: &str = "GANTTVIEW_BASE_URL";

/// Environment variable name for the session cookie
const SESSION_COOKIE_ENV: &str = "GANTTVIEW_SESSION_COOKIE";

/// ganttview - Gantt timelines of workflow task instances
#[derive(Parser)]
#[command(name = "gv")]
#[command(version = "0.1.0")]
#[command(about = "Gantt timelines of workflow task instances", long_about = None)]
struct Args {
    /// Base URL of the dashboard (can also be set via GANTTVIEW_BASE_URL env var)
    #[arg(long, global = true, env = BASE_URL_ENV, default_value = "http://localhost:8080/")]
    base_url: String,

    /// Session cookie sent with every request
    #[arg(long, global = true, env = SESSION_COOKIE_ENV, hide_env_values = true)]
    cookie: Option<String>,

    /// Timezone for displayed and typed dates (local, utc)
    #[arg(long, global = true, default_value = "local")]
    timezone: DisplayTimezone,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Command>,
}

/// Initialize logging from the RUST_LOG environment variable
///
/// Examples:
/// - `RUST_LOG=debug` - show requests and cache activity
/// - `RUST_LOG=ganttview_core=trace` - everything from the core crate
/// - unset - warnings and errors only
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Build the command context from the global arguments.
fn build_context(args: &Args) -> CliResult<Context> {
    let config = ClientConfig::new(&args.base_url)?
        .with_session_cookie(args.cookie.clone())
        .with_timeout(Duration::from_secs(args.timeout));
    debug!(base_url = %config.base_url, "Using dashboard");

    Ok(Context {
        client: ApiClient::new(config)?,
        timezone: args.timezone,
        now: Utc::now(),
    })
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run_app().await {
        eprintln!("error: {}", e.full_message());
        process::exit(1);
    }
}

/// Main application logic - separated for testability
async fn run_app() -> CliResult<()> {
    let args = Args::parse();
    run_with_args(&args).await
}

/// Run the application with the given arguments
async fn run_with_args(args: &Args) -> CliResult<()> {
    let ctx = build_context(args)?;

    match &args.command {
        Some(cmd) => {
            let result = cmd.execute(&ctx).await?;
            println!("{}", result);
        }
        None => {
            println!("ganttview: gantt timelines of task instances");
            println!("Use 'gv --help' for usage information.");
        }
    }

    Ok(())
}
