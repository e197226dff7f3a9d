//! FreeIPA Exporter
//!
//! Prometheus exporter for FreeIPA directory servers.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     FreeIPA Exporter                       │
//! ├───────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌─────────────┐  │
//! │  │  HTTP server │───▶│   Snapshot   │───▶│ Aggregator  │  │
//! │  │  (/metrics)  │    │    Cache     │    │ (LDAP × N)  │  │
//! │  └──────────────┘    └──────────────┘    └─────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```

use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ipa_exporter::adapters::LdapProbe;
use ipa_exporter::config::{parse_host_list, DEFAULT_BIND_DN};
use ipa_exporter::{build_cache, server, Credentials, ExporterConfig, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// FreeIPA Exporter - Prometheus metrics for FreeIPA servers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IPA DNS domain, e.g. example.com
    #[arg(long, env = "FREEIPA_DOMAIN")]
    domain: String,

    /// Bind DN
    #[arg(long, env = "FREEIPA_BIND_DN", default_value = DEFAULT_BIND_DN)]
    bind_dn: String,

    /// Bind password
    #[arg(long, env = "FREEIPA_BIND_PW", hide_env_values = true)]
    bind_password: String,

    /// Comma-separated list of FreeIPA hosts
    #[arg(long, env = "FREEIPA_HOSTS")]
    hosts: String,

    /// Cache TTL in seconds
    #[arg(long, env = "CACHE_TTL", default_value = "60")]
    cache_ttl: u64,

    /// Exporter port
    #[arg(long, env = "EXPORTER_PORT", default_value = "9189")]
    port: u16,

    /// Exporter listen address
    #[arg(long, env = "EXPORTER_LISTEN_ADDRESS", default_value = "0.0.0.0")]
    listen_address: IpAddr,

    /// LDAP network timeout in seconds
    #[arg(long, env = "PROBE_TIMEOUT_SECONDS", default_value = "3")]
    probe_timeout: u64,

    /// Number of hosts scraped at once
    #[arg(long, env = "SCRAPE_CONCURRENCY", default_value = "1")]
    scrape_concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn to_config(&self) -> ExporterConfig {
        let credentials = Credentials::new(&self.domain, &self.bind_dn, &self.bind_password);
        let mut config = ExporterConfig::new(parse_host_list(&self.hosts), credentials);
        config.cache_ttl = Duration::from_secs(self.cache_ttl);
        config.probe_timeout = Duration::from_secs(self.probe_timeout);
        config.scrape_concurrency = self.scrape_concurrency;
        config.listen_addr = SocketAddr::new(self.listen_address, self.port);
        config
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    match run(args.to_config()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ExporterConfig) -> Result<()> {
    config.validate()?;

    info!("Starting FreeIPA exporter");
    info!("  Domain: {}", config.credentials.domain);
    info!("  Hosts: {}", config.hosts.join(", "));
    info!("  Cache TTL: {}s", config.cache_ttl.as_secs());
    info!("  Probe timeout: {}s", config.probe_timeout.as_secs());
    info!("  Scrape concurrency: {}", config.scrape_concurrency);

    let probe = Arc::new(LdapProbe::new(config.probe_timeout));
    let cache = Arc::new(build_cache(&config, probe));

    server::serve(config.listen_addr, cache, shutdown_signal()).await?;

    info!("Exporter shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "ldap3=warn"] {
        if let Ok(directive) = directive.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
