//! Process bootstrap: flags, configuration, wiring, serve loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use quota_proxy::broker::{AuthBroker, PermissiveBroker, QuotaBroker};
use quota_proxy::config::{self, validation, ProxyConfig};
use quota_proxy::discover::JsonDiscoverer;
use quota_proxy::http::HttpServer;
use quota_proxy::lifecycle::Shutdown;
use quota_proxy::load_balancer::{LoadBalancer, RandomRouter};
use quota_proxy::net::Listener;
use quota_proxy::observability::{logging, metrics};
use quota_proxy::proxy::{self, RetryPolicy, ServiceHandler};
use quota_proxy::routing;

#[derive(Parser)]
#[command(name = "quota-proxy")]
#[command(about = "Authenticating, quota-metering reverse proxy", long_about = None)]
struct Args {
    /// Path to the TOML settings file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the permissive broker (instead of the quota authorizer).
    #[arg(long)]
    permissive: bool,

    /// Default provider key for the quota authorizer.
    #[arg(long)]
    provider_key: Option<String>,

    /// Comma separated label:key pairs of alternative provider keys.
    #[arg(long)]
    provider_key_alt: Option<String>,

    /// File to load services from.
    #[arg(long)]
    services_file: Option<PathBuf>,

    /// File to load backends from.
    #[arg(long)]
    backends_file: Option<PathBuf>,
}

fn parse_provider_alternatives(raw: &str) -> Result<HashMap<String, String>, String> {
    let mut map = HashMap::new();
    for pair in raw.split(',').filter(|p| !p.is_empty()) {
        match pair.split_once(':') {
            Some((label, key)) if !label.is_empty() && !key.is_empty() => {
                map.insert(label.to_string(), key.to_string());
            }
            _ => return Err(format!("invalid label:key pair '{pair}'")),
        }
    }
    Ok(map)
}

fn apply_overrides(config: &mut ProxyConfig, args: &Args) -> Result<(), String> {
    if args.permissive {
        config.broker.permissive = true;
    }
    if let Some(key) = &args.provider_key {
        config.broker.provider_key = key.clone();
    }
    if let Some(alts) = &args.provider_key_alt {
        config.broker.provider_key_alternatives = parse_provider_alternatives(alts)?;
    }
    if let Some(path) = &args.services_file {
        config.discovery.services_file = path.display().to_string();
    }
    if let Some(path) = &args.backends_file {
        config.discovery.backends_file = path.display().to_string();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => ProxyConfig::default(),
    };
    apply_overrides(&mut config, &args)?;

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "quota-proxy starting");

    validation::validate_config(&config).map_err(|errs| {
        errs.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    })?;

    let services = config::load_services(std::path::Path::new(&config.discovery.services_file))?;
    let backends = config::load_backends(std::path::Path::new(&config.discovery.backends_file))?;
    validation::validate_topology(&services, &backends).map_err(|errs| {
        errs.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    })?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    error = %e,
                    "failed to parse metrics address"
                );
            }
        }
    }

    let quota_broker = if config.broker.permissive {
        tracing::warn!("using the permissive broker, every request is allowed");
        None
    } else {
        Some(Arc::new(QuotaBroker::new(
            config.broker.provider_key.clone(),
            config.broker.provider_key_alternatives.clone(),
            config.broker.authorize_url.clone(),
            config.broker.report_url.clone(),
        )?))
    };
    let broker: Arc<dyn AuthBroker> = match &quota_broker {
        Some(broker) => broker.clone(),
        None => Arc::new(PermissiveBroker),
    };

    let client = proxy::build_client(Duration::from_secs(config.timeouts.connect_secs));
    let retry = RetryPolicy {
        max_attempts: config.retries.max_attempts,
        pause: Duration::from_millis(config.retries.pause_ms),
    };
    let fetch_interval = Duration::from_secs(config.balancer.fetch_interval_secs);

    let mut handlers = Vec::new();
    let mut balancers = Vec::new();
    for (name, conf) in &services {
        let discoverer = JsonDiscoverer {
            path: config.discovery.backends_file.clone().into(),
            name: name.clone(),
        };
        let balancer = Arc::new(
            LoadBalancer::start(
                name.clone(),
                Box::new(discoverer),
                Box::new(RandomRouter::new()),
                fetch_interval,
            )
            .await?,
        );
        balancers.push(balancer.clone());

        handlers.push(Arc::new(ServiceHandler::new(
            name.clone(),
            conf.path.clone(),
            client.clone(),
            broker.clone(),
            balancer,
            retry,
        )));
    }

    let router = routing::build_router(handlers, quota_broker, &config.admin.path);
    let server = HttpServer::new(router, &config);
    let listener = Listener::bind(
        &config.listener.bind_address,
        config.listener.max_connections,
    )
    .await?;

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        signal.trigger_on_signal().await;
    });

    server.run(listener, server_shutdown).await?;

    for balancer in &balancers {
        balancer.stop().await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}
