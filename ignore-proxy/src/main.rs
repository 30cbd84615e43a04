use clap::Parser;
use ignore_proxy::{ConfigLoader, ConfigValidator, EventServer, IgnoreContext};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tls-ignore-proxy")]
#[command(about = "Collects TLS interception failures into a persistent ignore list")]
struct Args {
    /// Config file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Unix domain socket path to listen on
    #[arg(long, short = 's')]
    socket: Option<PathBuf>,

    /// Registry database file
    #[arg(long, short = 'd')]
    database: Option<PathBuf>,

    /// Additional host to always ignore (can be used multiple times)
    #[arg(long = "ignore-host", value_name = "PATTERN")]
    ignore_hosts: Vec<String>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let env_filter = if args.verbose {
        EnvFilter::from_default_env()
            .add_directive(tracing_subscriber::filter::LevelFilter::DEBUG.into())
    } else {
        EnvFilter::from_default_env()
            .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = ConfigLoader::load_or_default(args.config)?;
    if let Some(socket) = args.socket {
        config.proxy.socket = socket;
    }
    if let Some(database) = args.database {
        config.registry.database = database;
    }
    config.proxy.ignore_hosts.extend(args.ignore_hosts);
    ConfigValidator::validate(&config)?;

    let ctx = IgnoreContext::open(&config)?;
    let server = EventServer::bind(&config.proxy.socket, ctx.collector)?;

    server
        .serve_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Stopped");
    Ok(())
}
