//! replikv: a small replicated key-value store served over TCP.
//!
//! This is the main entry point for the replikv server.

use replikv::{Config, Server, VERSION};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args);

    if cli.help {
        print_help();
        return Ok(());
    }
    if cli.version {
        println!("replikv {VERSION}");
        return Ok(());
    }

    let mut config = Config::default();
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(peer_port) = cli.peer_port {
        config.peer_port = peer_port;
    }
    if let Some(peers) = cli.peers {
        config.peers = peers
            .split(',')
            .filter(|peer| !peer.is_empty())
            .map(str::to_string)
            .collect();
    }

    // Initialize logging
    let level = cli.loglevel.unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_target(false).init();

    info!(
        "replikv {} starting on {} (peers on {})",
        VERSION,
        config.client_addr(),
        config.peer_addr()
    );
    if config.peers.is_empty() {
        info!("no peers configured, running standalone");
    } else {
        info!("replicating to {}", config.peers.join(", "));
    }

    let server = Arc::new(Server::new(config));

    // Handle shutdown signals
    let server_clone = server.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("received shutdown signal");
        server_clone.shutdown();
    });

    server.run().await?;

    Ok(())
}

/// CLI arguments
struct CliArgs {
    bind: Option<String>,
    port: Option<u16>,
    peer_port: Option<u16>,
    peers: Option<String>,
    loglevel: Option<String>,
    help: bool,
    version: bool,
}

fn parse_args(args: &[String]) -> CliArgs {
    let mut cli = CliArgs {
        bind: None,
        port: None,
        peer_port: None,
        peers: None,
        loglevel: None,
        help: false,
        version: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                i += 1;
                cli.bind = args.get(i).cloned();
            }
            "--port" | "-p" => {
                i += 1;
                cli.port = args.get(i).and_then(|s| s.parse().ok());
            }
            "--peer-port" => {
                i += 1;
                cli.peer_port = args.get(i).and_then(|s| s.parse().ok());
            }
            "--peers" => {
                i += 1;
                cli.peers = args.get(i).cloned();
            }
            "--loglevel" => {
                i += 1;
                cli.loglevel = args.get(i).cloned();
            }
            "--help" | "-h" => {
                cli.help = true;
            }
            "--version" | "-v" => {
                cli.version = true;
            }
            arg => {
                eprintln!("Unknown option: {arg}");
                cli.help = true;
            }
        }
        i += 1;
    }

    cli
}

fn print_help() {
    println!(
        r"replikv {VERSION} - a small replicated key-value store

USAGE:
    replikv [OPTIONS]

OPTIONS:
    -b, --bind <ADDR>        Bind address (default: 127.0.0.1)
    -p, --port <PORT>        Port for client connections (default: 8000)
        --peer-port <PORT>   Port for peer connections (default: 8001)
        --peers <ADDRS>      Comma-separated peer-listener addresses of the
                             other servers to replicate to
        --loglevel <LEVEL>   Log level (error, warn, info, debug, trace)
    -h, --help               Print this help message
    -v, --version            Print version information

EXAMPLES:
    replikv                                         Standalone server
    replikv -p 8002 --peer-port 8003 \
        --peers localhost:8001,localhost:8005       One of three replicas
"
    );
}
