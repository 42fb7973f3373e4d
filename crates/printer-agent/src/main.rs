use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use domain::printer::{Alignment, TextEncoding};
use domain::DeviceAddress;
use infrastructure::PrinterAgentConfig;
use printer_agent::{Agent, PrintJob};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory (optional)
    #[arg(long)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Adapter power state and paired devices
    Status,
    /// Power the adapter on
    Enable,
    /// Close any session and power the adapter off
    Disable,
    /// Discover nearby printers
    Scan {
        /// Print every event as a JSON line
        #[arg(long)]
        json: bool,
    },
    /// Connect and print text lines
    Print {
        /// Printer address; falls back to printer.address in the config
        #[arg(long)]
        address: Option<DeviceAddress>,
        /// Text lines to print
        #[arg(required = true)]
        lines: Vec<String>,
        #[arg(long, default_value = "left")]
        align: Alignment,
        #[arg(long)]
        width: Option<u8>,
        #[arg(long)]
        height: Option<u8>,
        #[arg(long)]
        encoding: Option<TextEncoding>,
        /// CODE128 payload printed after the text
        #[arg(long)]
        barcode: Option<String>,
        #[arg(long, default_value_t = 3)]
        feed: u8,
        #[arg(long)]
        cut: bool,
    },
    /// Remove the bond to a printer
    Unpair { address: DeviceAddress },
}

async fn run() -> Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,printer_agent=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Run from the workspace root during development
    let dev_base = "crates/printer-agent/config";
    let config_dir = args.config_dir.unwrap_or_else(|| {
        if std::path::Path::new(dev_base).exists() {
            dev_base.to_string()
        } else {
            "config".to_string()
        }
    });
    info!("📂 Config directory: {}", config_dir);

    let config = PrinterAgentConfig::load(&config_dir)
        .with_context(|| format!("failed to load configuration from {config_dir}"))?;

    let agent = Agent::start(&config);
    let result = execute(&agent, &config, args.command).await;
    agent.stop().await;
    result
}

async fn execute(agent: &Agent, config: &PrinterAgentConfig, command: Command) -> Result<()> {
    let bluetooth = &agent.bluetooth;

    match command {
        Command::Status => {
            let status = bluetooth.is_bluetooth_enabled().await?;
            println!("enabled: {}", status.enabled);
            for device in status.paired {
                println!("paired:  {}  {}", device.address, device.display_name());
            }
        }
        Command::Enable => {
            let paired = bluetooth.enable_bluetooth().await?;
            println!("enabled; {} paired device(s)", paired.len());
        }
        Command::Disable => {
            bluetooth.disable_bluetooth().await?;
            println!("disabled");
        }
        Command::Scan { json } => scan(agent, json).await?,
        Command::Print {
            address,
            lines,
            align,
            width,
            height,
            encoding,
            barcode,
            feed,
            cut,
        } => {
            let address = address
                .or_else(|| config.printer.address.clone())
                .ok_or_else(|| anyhow!("no --address given and printer.address is not configured"))?;

            let mut options = agent.printer.default_options().clone();
            options.width = width.unwrap_or(options.width);
            options.height = height.unwrap_or(options.height);
            options.encoding = encoding.unwrap_or(options.encoding);

            let job = PrintJob {
                lines,
                alignment: align,
                options,
                barcode,
                feed,
                cut,
            };

            let device = bluetooth.connect(&address).await?;
            info!("🖨️ Connected to {} ({})", device.display_name(), device.address);
            agent.printer.print(&job.instructions()).await?;
            bluetooth.disconnect().await;
            println!("printed {} line(s) on {}", job.lines.len(), device.address);
        }
        Command::Unpair { address } => {
            bluetooth.unpair(&address).await?;
            println!("unpaired {address}");
        }
    }
    Ok(())
}

async fn scan(agent: &Agent, json: bool) -> Result<()> {
    let mut events = agent.bluetooth.subscribe();
    let mut handle = agent.bluetooth.scan_devices().await?;

    if !json {
        for device in handle.paired() {
            println!("paired:  {}  {}", device.address, device.display_name());
        }
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Scan interrupted");
                handle.cancel();
                break;
            }
            found = handle.next_found() => match found {
                Some(device) if !json => {
                    println!("found:   {}  {}", device.address, device.display_name());
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    if json {
        for event in events.drain() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }
    Ok(())
}

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("❌ Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(run()) {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}
