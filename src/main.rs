//! Wolfelect - Consul-Backed Leader Election Daemon
//!
//! Small host around the elector library: polls Consul on the configured
//! interval and logs leadership transitions until interrupted.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfelect::config::ElectorConfig;
use wolfelect::elector::{ControlledUnit, Elector, TerminationHandler};
use wolfelect::error::Result;

/// Wolfelect - Consul-backed leader election
#[derive(Parser)]
#[command(name = "wolfelect")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolfelect.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the elector until interrupted
    Run,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfelect.toml")]
        output: PathBuf,

        /// Name of the role to contest
        #[arg(long, default_value = "my-service")]
        service_name: String,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run => run(cli.config).await,
        Commands::Init {
            output,
            service_name,
        } => run_init(output, service_name),
        Commands::Validate => run_validate(cli.config),
    }
}

fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Controlled unit that only announces leadership transitions. Hosts
/// embedding the library supply their own unit wrapping real work.
struct LoggingUnit {
    running: AtomicBool,
}

#[async_trait]
impl ControlledUnit for LoggingUnit {
    async fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Leadership acquired, unit started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Leadership lost, unit stopped");
        Ok(())
    }

    async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Process-fatal escalation for the daemon
struct ExitHandler;

#[async_trait]
impl TerminationHandler for ExitHandler {
    async fn terminate(&self) {
        tracing::error!("No Consul session and island mode disallowed, exiting");
        std::process::exit(1);
    }
}

/// Run the elector until ctrl-c
async fn run(config_path: PathBuf) -> Result<()> {
    let config = ElectorConfig::from_file(&config_path)?;
    tracing::info!(
        "Contesting leadership for role {} via {}",
        config.session.service_name,
        config.consul.url
    );

    let unit = Arc::new(LoggingUnit {
        running: AtomicBool::new(false),
    });
    let elector = Arc::new(Elector::from_config(&config, unit, Arc::new(ExitHandler)).await?);

    let poll_loop = {
        let elector = Arc::clone(&elector);
        tokio::spawn(async move { elector.run().await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");

    elector.on_shutdown().await;
    poll_loop.abort();

    tracing::info!("Wolfelect shutdown complete");
    Ok(())
}

/// Write a template configuration file
fn run_init(output: PathBuf, service_name: String) -> Result<()> {
    let template = format!(
        r#"# Wolfelect configuration

[consul]
url = "http://127.0.0.1:8500"
# username = "ops"
# password = "secret"
request_timeout_secs = 10

[session]
service_name = "{service_name}"
ttl_secs = 60
lock_delay_secs = 0
# Keep running the unit when Consul is unreachable
allow_island_mode = true

[retry]
max_tries = 5
base_period_secs = 2.0
backoff_multiplier = 1.5

[poll]
initial_delay_secs = 1
interval_secs = 5

[logging]
level = "info"
"#
    );

    std::fs::write(&output, template)?;
    println!("Configuration written to {}", output.display());
    Ok(())
}

/// Parse and validate a configuration file
fn run_validate(config_path: PathBuf) -> Result<()> {
    let config = ElectorConfig::from_file(&config_path)?;
    println!("Configuration OK");
    println!("  Role:          {}", config.session.service_name);
    println!("  Consul:        {}", config.consul.url);
    println!("  Session TTL:   {} s", config.session.ttl_secs);
    println!("  Poll interval: {} s", config.poll.interval_secs);
    println!("  Island mode:   {}", config.session.allow_island_mode);
    Ok(())
}
