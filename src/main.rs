//! # ClientChain — Referral Automation Server
//!
//! Runs the workflow engine and its HTTP operator surface: trigger dispatch,
//! durable wait-suspension, policy-gated messaging, and the credit ledger.
//!
//! Usage:
//!   clientchain                      # Start gateway (default 127.0.0.1:8420)
//!   clientchain --port 9000          # Custom port
//!   clientchain --seed-templates     # Install the built-in workflow presets and exit

use anyhow::Result;
use clap::Parser;
use clientchain_core::config::ClientChainConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "clientchain",
    version,
    about = "🔗 ClientChain — referral automation engine"
)]
struct Cli {
    /// Path to config file (default: ~/.clientchain/config.toml)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Bind host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds between reconciliation sweeps (overrides config)
    #[arg(long)]
    sweep_interval: Option<u64>,

    /// Install the built-in workflow templates and exit
    #[arg(long)]
    seed_templates: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "clientchain=debug,tower_http=debug"
    } else {
        "clientchain=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => ClientChainConfig::load_from(path)?,
        None => ClientChainConfig::load()?,
    };
    if let Some(host) = cli.host {
        config.gateway.host = host;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(interval) = cli.sweep_interval {
        config.engine.sweep_interval_secs = interval;
    }

    if cli.seed_templates {
        let db = clientchain_engine::AutomationDb::open(
            &config.engine.data_dir().join("automation.db"),
        )?;
        println!("🔗 ClientChain — installing workflow templates\n");
        for template in clientchain_engine::template_catalog() {
            let def = clientchain_engine::apply_template(&db, template.key)?;
            println!("   ✅ {} ({})", def.name, def.id);
        }
        return Ok(());
    }

    println!("🔗 ClientChain v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "   🌐 Gateway:   http://{}:{}",
        config.gateway.host, config.gateway.port
    );
    println!("   🗄️  Data Dir:  {}", config.engine.data_dir().display());
    println!("   🔄 Sweep:     every {}s", config.engine.sweep_interval_secs);
    println!(
        "   📱 Twilio:    {}",
        if config.twilio.is_configured() { "configured" } else { "recording only" }
    );
    println!(
        "   ✉️  SendGrid:  {}",
        if config.sendgrid.is_configured() { "configured" } else { "recording only" }
    );
    println!();

    clientchain_gateway::start(&config).await
}
