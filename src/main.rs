mod command;
mod config;
mod session;
mod store;
mod version;

use anyhow::{bail, Context, Result};
use bind_shared::transport::{
    SerialConfig, SerialConnector, StdioConnector, TcpAcceptor, TransportConnector,
    TransportStream, DEFAULT_BAUD_RATE,
};
use clap::Parser;
use command::CommandExecutor;
use config::{DeviceConfig, Layout, DEFAULT_CONFIG_DIR};
use std::path::PathBuf;
use std::sync::Arc;
use version::{CommandVersion, PackageVersion, VersionSource};

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Device side of the bind link: answers VERSION, BIND and UNBIND
#[derive(Parser, Debug)]
#[command(name = "bind-device", version)]
struct Args {
    /// Directory holding wifibroadcast.cfg and the credential files
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,

    /// Config section replaced on BIND
    #[arg(long, default_value = bind_shared::limits::MERGED_SECTION)]
    section: String,

    /// Program (and arguments) printing the installed software version
    #[arg(long)]
    version_cmd: Option<String>,

    /// Listen for TCP connections on this address
    #[arg(long, conflicts_with_all = ["serial", "stdio"])]
    listen: Option<String>,

    /// Serve on a serial port
    #[arg(long, conflicts_with = "stdio")]
    serial: Option<String>,

    /// Serial line speed
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Serve on stdin/stdout (default when no other transport is given)
    #[arg(long)]
    stdio: bool,
}

impl Args {
    fn device_config(&self) -> Result<DeviceConfig> {
        let version_command = match &self.version_cmd {
            Some(cmd) => {
                let argv: Vec<String> = cmd.split_whitespace().map(String::from).collect();
                if argv.is_empty() {
                    bail!("--version-cmd is empty");
                }
                Some(argv)
            }
            None => None,
        };

        Ok(DeviceConfig {
            layout: Layout::new(&self.config_dir),
            section: self.section.clone(),
            version_command,
        })
    }
}

#[tokio::main]
async fn main() {
    // stdout may be the link itself
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    if let Err(e) = start(Args::parse()).await {
        error!("Bind device stopped: {:#}", e);
        std::process::exit(1);
    }
}

async fn start(args: Args) -> Result<()> {
    let config = args.device_config()?;

    let version_source: Arc<dyn VersionSource> = match &config.version_command {
        Some(argv) => Arc::new(CommandVersion::from_argv(argv)?),
        None => Arc::new(PackageVersion),
    };

    let executor = CommandExecutor::new(config, version_source);

    info!("Bind device starting");
    info!("  Config dir: {}", executor.config().layout.config_dir().display());
    info!("  Section: [{}]", executor.config().section);

    if let Some(address) = &args.listen {
        let acceptor = TcpAcceptor::bind(address)
            .await
            .with_context(|| format!("failed to listen on {}", address))?;
        run(&acceptor, &executor).await
    } else if let Some(port) = &args.serial {
        let connector = SerialConnector::new(SerialConfig {
            port: port.clone(),
            baud_rate: args.baud,
        });
        run(&connector, &executor).await
    } else {
        if !args.stdio {
            info!("No transport given, serving on stdin/stdout");
        }
        run(&StdioConnector, &executor).await
    }
}

/// Serve streams from `connector` until it cannot produce another one
async fn run<C: TransportConnector>(connector: &C, executor: &CommandExecutor) -> Result<()> {
    loop {
        let mut stream = connector.connect().await?;
        info!("Link up via {}", connector.name());

        match session::serve(&mut stream, executor).await {
            Ok(stats) => info!(
                "Session finished: {} commands, {} failed",
                stats.commands, stats.failures
            ),
            Err(e) => warn!("Session aborted: {:#}", e),
        }

        if let Err(e) = stream.shutdown().await {
            warn!("Failed to close {} link: {}", connector.name(), e);
        }

        if !connector.reconnectable() {
            info!("{} commands executed in total", executor.executed());
            return Ok(());
        }
    }
}
