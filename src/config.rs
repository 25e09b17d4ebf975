use clap::Parser;
use std::path::PathBuf;

/// Server configuration, from command-line flags with environment fallbacks.
#[derive(Debug, Clone, Parser)]
#[command(name = "sheetstore")]
#[command(about = "Spreadsheet backend with transactional row and column ordering")]
pub struct AppConfig {
    /// Interface to bind
    #[arg(long, env = "SHEETSTORE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "SHEETSTORE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// JSON snapshot rewritten on every commit. Without it the store is
    /// purely in-memory.
    #[arg(long, env = "SHEETSTORE_SNAPSHOT_PATH")]
    pub snapshot_path: Option<PathBuf>,

    /// Tracing filter directives
    #[arg(long, env = "RUST_LOG", default_value = "sheetstore=debug,tower_http=info")]
    pub log_filter: String,
}

impl AppConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sharing grants live next to the store snapshot: `sheets.json` keeps
    /// its grants in `sheets.grants.json`.
    pub fn grants_path(&self) -> Option<PathBuf> {
        self.snapshot_path
            .as_ref()
            .map(|path| path.with_extension("grants.json"))
    }
}
