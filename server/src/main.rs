use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tower::{ServiceBuilder, ServiceExt};

// Error tracing
use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gateway::AppState;
use gateway::handlers::http::routes;
use gateway::security::PasswordHasher;
use gateway::tower_middle::TimeoutLayer;
use shared::config::load_config;
use shared::types::HashConfig;

#[derive(Debug, Parser)]
#[command(name = "gateway", version, about = "Forward-auth gateway")]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "GATEWAY_CONFIG", default_value = "config.toml")]
    config: String,

    /// Log level, overrides the configuration file
    #[arg(short, long)]
    log: Option<String>,

    /// Print the hash of a password for the configuration file and exit
    #[arg(long, value_name = "PASSWORD")]
    hash: Option<String>,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_hash(args: &Args, password: &str) -> Result<()> {
    let cost = match load_config(&args.config) {
        Ok(config) => config.auth.hash,
        Err(e) => {
            warn!("Using default hash cost: {}", e);
            HashConfig::default()
        }
    };
    let hasher = PasswordHasher::new(&cost)?;
    println!("{}", hasher.hash(password)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(password) = &args.hash {
        init_tracing(args.log.as_deref().unwrap_or("warn"));
        return print_hash(&args, password);
    }

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    init_tracing(args.log.as_deref().unwrap_or(&config.log.level));

    let addr: SocketAddr = config
        .server
        .addr()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.addr()))?;
    let timeout = Duration::from_secs(config.server.request_timeout_secs);

    let state = AppState::from_config(config)?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::task::spawn(async move {
            let svc = ServiceBuilder::new()
                .layer(TimeoutLayer::new(timeout))
                .service(tower::service_fn(move |req: Request<Incoming>| {
                    routes::handle(req, state.clone())
                }));

            let service = service_fn(move |mut req: Request<Incoming>| {
                req.extensions_mut().insert(peer);
                svc.clone().oneshot(req)
            });

            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await
            {
                warn!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}
