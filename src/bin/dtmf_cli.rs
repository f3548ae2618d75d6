use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rtc_dtmf_bridge::config::BridgeConfig;
use rtc_dtmf_bridge::host::HostValue;
use rtc_dtmf_bridge::{init_logging, BridgeContext, PeerConnectionFactory};

#[derive(Parser, Debug)]
#[command(
    name = "dtmf_cli",
    about = "Drive a simulated DTMF sender through the host bridge"
)]
struct Cli {
    /// JSON config file (defaults to $DTMF_BRIDGE_CONFIG or assets/bridge_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert tones and print every tone change as a JSON line
    Send {
        #[arg(long)]
        tones: String,
        /// Tone duration in ms (bridge default when omitted)
        #[arg(long)]
        duration: Option<i32>,
        /// Inter-tone gap in ms (bridge default when omitted)
        #[arg(long)]
        gap: Option<i32>,
        /// Give up if the buffer has not played out after this long
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli
        .config
        .map(BridgeConfig::load_from_file)
        .unwrap_or_else(BridgeConfig::load);
    init_logging(&config.logging.level);

    match cli.command {
        Commands::Send {
            tones,
            duration,
            gap,
            timeout_ms,
        } => run_send(config, tones, duration, gap, timeout_ms),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run_send(
    config: BridgeConfig,
    tones: String,
    duration: Option<i32>,
    gap: Option<i32>,
    timeout_ms: u64,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build host runtime")?;

    let mut context = BridgeContext::init(config.clone());
    let factory = PeerConnectionFactory::new(config.engine.clone());
    let native = factory.create_dtmf_sender();
    let sender = context.dtmf_sender(&factory, native)?;

    let can_insert = context.get(&sender, "canInsertDTMF")?;
    if can_insert.as_bool() != Some(true) {
        bail!("channel cannot insert DTMF");
    }

    // Stop listening once the engine reports the buffer played out.
    let target = Arc::downgrade(&sender);
    sender.set_ontonechange(move |event| {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("failed to encode event: {err}"),
        }
        if event.tone.is_empty() {
            if let Some(sender) = target.upgrade() {
                sender.stop();
            }
        }
    });

    let mut args = vec![HostValue::from(tones)];
    args.push(duration.map(HostValue::from).unwrap_or_default());
    args.push(gap.map(HostValue::from).unwrap_or_default());
    context.call(&sender, "insertDTMF", &args)?;

    let drained = runtime.block_on(async {
        tokio::time::timeout(Duration::from_millis(timeout_ms), context.run_until_idle()).await
    });
    match drained {
        Ok(result) => {
            result?;
        }
        Err(_) => bail!("tone buffer did not drain within {timeout_ms} ms"),
    }

    drop(sender);
    context.shutdown()?;
    Ok(())
}
