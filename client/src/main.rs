mod command;
mod session;

use anyhow::{Context, Result};
use bind_shared::transport::{
    SerialConfig, SerialConnector, TcpConnector, TransportConnector, TransportStream,
    DEFAULT_BAUD_RATE,
};
use clap::{Parser, Subcommand};
use command::Provisioner;
use session::DeviceLink;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Operator side of the bind link
#[derive(Parser, Debug)]
#[command(name = "bind-client", version)]
struct Args {
    /// Device address to connect to over TCP
    #[arg(long, conflicts_with = "serial", required_unless_present = "serial")]
    tcp: Option<String>,

    /// Serial port the device is attached to
    #[arg(long)]
    serial: Option<String>,

    /// Serial line speed
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Seconds to wait for each response (no limit by default)
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug, Clone)]
enum Action {
    /// Print the device's software version
    Version,
    /// Push credentials and config from a local directory
    Bind {
        /// Directory holding gs.key, drone.key and optional wifibroadcast.cfg / bind.yaml
        #[arg(long, default_value = ".")]
        source_dir: PathBuf,
    },
    /// Remove the device's credential key
    Unbind,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let timeout = args.timeout.map(Duration::from_secs);

    if let Some(port) = &args.serial {
        let connector = SerialConnector::new(SerialConfig {
            port: port.clone(),
            baud_rate: args.baud,
        });
        run(&connector, &args.action, timeout).await
    } else {
        let address = args.tcp.as_deref().context("no device address given")?;
        run(&TcpConnector::new(address), &args.action, timeout).await
    }
}

async fn run<C: TransportConnector>(
    connector: &C,
    action: &Action,
    timeout: Option<Duration>,
) -> Result<()> {
    let stream = connector
        .connect()
        .await
        .with_context(|| format!("failed to reach device via {}", connector.name()))?;
    info!("Connected via {}", connector.name());

    let mut provisioner = Provisioner::new(DeviceLink::new(stream).with_timeout(timeout));

    let result = match action {
        Action::Version => provisioner
            .probe_version()
            .await
            .map(|version| println!("{}", version)),
        Action::Bind { source_dir } => provisioner.bind(source_dir).await,
        Action::Unbind => provisioner.unbind().await,
    };

    let mut stream = provisioner.into_link().into_inner();
    if let Err(e) = stream.shutdown().await {
        warn!("Failed to close {} link: {}", connector.name(), e);
    }

    result
}
