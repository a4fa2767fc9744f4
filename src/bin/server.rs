//! Quietgate server binary.
//!
//! Usage: quietgate-server [-c <config.toml>]
//!
//! Every setting can also come from the environment: QG_LISTEN_ADDR,
//! QG_LISTEN_PORT, QG_TUNNEL_HOST, QG_TUNNEL_PORT, QG_WEB_SERVER and
//! QG_SECRET. Environment variables override the file.

use std::env;

use quietgate::server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut config = match args.get(1).map(String::as_str) {
        None => ServerConfig::default(),
        Some("-c") | Some("--config") => {
            let path = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
            ServerConfig::load(path)?
        }
        Some("-h") | Some("--help") => {
            print_usage();
            return Ok(());
        }
        Some(other) => {
            print_usage();
            anyhow::bail!("unknown option: {}", other);
        }
    };

    config.overlay_env()?;
    config.validate()?;

    tracing::info!("listening on {}", config.listen_socket_addr());
    tracing::info!(
        "tunnel backend {}:{}, web backend {}",
        config.tunnel_host,
        config.tunnel_port,
        config.web_server_addr
    );

    let server = Server::bind(config).await?;
    tracing::info!("proof key fingerprint {}", server.key_fingerprint());

    server.run().await?;
    Ok(())
}

fn print_usage() {
    println!(
        r#"quietgate-server - traffic-camouflage relay

USAGE:
    quietgate-server [OPTIONS]

OPTIONS:
    -c, --config <FILE>  Path to TOML configuration file
    -h, --help           Print help information

ENVIRONMENT:
    QG_LISTEN_ADDR   Public listen address         (default 0.0.0.0)
    QG_LISTEN_PORT   Public listen port            (default 443)
    QG_TUNNEL_HOST   Tunnel backend host           (default 127.0.0.1)
    QG_TUNNEL_PORT   Tunnel backend port           (default 8388)
    QG_WEB_SERVER    Camouflage web server host:port
    QG_SECRET        Shared secret for proof verification
    RUST_LOG         Log filter (default "info")

Environment variables override the configuration file.
"#
    );
}
