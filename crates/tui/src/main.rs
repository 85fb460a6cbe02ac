//! Entry point for the ganttview TUI application.

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ganttview_core::{ApiClient, ClientConfig, DisplayTimezone};
use ganttview_tui::{App, AppOptions, TuiError, TuiResult};

/// Terminal gantt timeline of task instances
#[derive(Parser)]
#[command(name = "gv-tui")]
#[command(version = "0.1.0")]
#[command(about = "Terminal gantt timeline of task instances", long_about = None)]
struct Args {
    /// Base URL of the dashboard
    #[arg(long, env = "GANTTVIEW_BASE_URL", default_value = "http://localhost:8080/")]
    base_url: String,

    /// Session cookie sent with every request
    #[arg(long, env = "GANTTVIEW_SESSION_COOKIE", hide_env_values = true)]
    cookie: Option<String>,

    /// Timezone for displayed and typed dates (local, utc)
    #[arg(long, default_value = "local")]
    timezone: DisplayTimezone,

    /// Initial filter query string, e.g. "time_range=2h&num_runs=25"
    #[arg(long, default_value = "")]
    query: String,

    /// Refetch the current window every N seconds
    #[arg(long, value_name = "SECONDS")]
    auto_refresh: Option<u64>,

    /// Open the gantt view of this dag
    #[arg(long)]
    dag_id: Option<String>,

    /// Dag run to select when opening the dag view
    #[arg(long, requires = "dag_id")]
    run_id: Option<String>,

    /// Log file (defaults to <cache dir>/ganttview/tui.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ganttview")
        .join("tui.log")
}

/// Initialize logging into a file; the terminal belongs to the UI.
///
/// Filtered by `RUST_LOG`, `warn` by default.
fn init_logging(path: PathBuf) -> TuiResult<()> {
    let open = || -> std::io::Result<File> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        File::options().create(true).append(true).open(&path)
    };
    let file = open().map_err(|source| TuiError::LogFile {
        path: path.display().to_string(),
        source,
    })?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> TuiResult<()> {
    let args = Args::parse();
    init_logging(args.log_file.unwrap_or_else(default_log_path))?;

    let config = ClientConfig::new(&args.base_url)?.with_session_cookie(args.cookie);
    info!(base_url = %config.base_url, "Starting TUI");
    let client = ApiClient::new(config)?;

    let options = AppOptions {
        query: args.query,
        timezone: args.timezone,
        auto_refresh: args.auto_refresh.map(Duration::from_secs),
        dag_id: args.dag_id,
        run_id: args.run_id,
    };

    let mut app = App::new(Arc::new(client), options);
    app.run()
}
