//! TalentBridge - Job-matching platform backend
//! Mission: Connect candidates, enterprises and administrators behind role-based auth

use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;
use talentbridge_backend::{
    config::{Cli, Command},
    server,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(config) => server::serve(config).await,
        Command::CreateAdmin(args) => server::create_admin(args).await,
    }
}

/// Initialize tracing with enhanced observability
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "talentbridge_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate's own .env when launched from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
