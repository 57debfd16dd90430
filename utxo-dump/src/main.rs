mod dump;
mod fields;
mod preflight;
mod sink;
mod stats;
#[cfg(target_os = "macos")]
mod utils;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chainstate_codec::{ChainstateParser, Network, ParserConfig};
use clap::{Parser, ValueEnum};
use signal_hook::{consts::TERM_SIGNALS, iterator::Signals};
use tracing_subscriber::EnvFilter;

use crate::sink::{CsvSink, JsonLinesSink, RecordSink, JSON_BATCH_SIZE};

const VERSION: &str = "1.0.0";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Comma separated values with the selected fields
    Csv,
    /// One JSON document per UTXO
    Jsonl,
}

#[derive(Parser)]
#[command(name = "utxo-dump")]
#[command(about = "Dumps UTXO set from Bitcoin Core's chainstate LevelDB")]
#[command(version = VERSION)]
struct Args {
    /// Location of chainstate db
    #[arg(
        short = 'd',
        long = "db",
        value_hint = clap::ValueHint::DirPath,
        default_value_os_t = default_chainstate()
    )]
    chainstate: PathBuf,

    /// Name of file to dump utxo list to
    #[arg(short = 'o', long = "output", default_value = "utxodump.csv")]
    output_file: PathBuf,

    /// Fields to include in the output [count,txid,vout,height,coinbase,amount,nsize,script,type,address]
    #[arg(
        short = 'f',
        long = "fields",
        default_value = "count,txid,vout,amount,type,address"
    )]
    fields: String,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Is the chainstate leveldb for testnet?
    #[arg(long = "testnet")]
    testnet: bool,

    /// Is the chainstate leveldb for regtest?
    #[arg(long = "regtest", conflicts_with = "testnet")]
    regtest: bool,

    /// Convert public keys in P2PK locking scripts to addresses
    #[arg(long = "p2pkaddresses")]
    p2pk_addresses: bool,

    /// Ignore warnings if bitcoind is running in the background
    #[arg(long = "nowarnings")]
    no_warnings: bool,

    /// Do not display any progress or results
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Print utxos as we process them
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

impl Args {
    fn network(&self) -> Network {
        if self.regtest {
            Network::Regtest
        } else if self.testnet || self.chainstate.display().to_string().contains("testnet") {
            Network::Testnet
        } else {
            Network::Bitcoin
        }
    }
}

fn default_chainstate() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".bitcoin")
        .join("chainstate")
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.quiet);

    if !args.no_warnings && !preflight::check_node_stopped()? {
        return Ok(());
    }

    #[cfg(target_os = "macos")]
    utils::raise_open_files_limit();

    if !args.chainstate.exists() {
        anyhow::bail!("Couldn't find {}", args.chainstate.display());
    }

    let fields = fields::parse_fields(&args.fields)?;
    let network = args.network();

    let mut database = dump::open_chainstate(&args.chainstate)?;

    let output_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&args.output_file)
        .with_context(|| {
            format!(
                "Output file {} already exists or cannot be created",
                args.output_file.display()
            )
        })?;

    let mut sink: Box<dyn RecordSink> = match args.format {
        OutputFormat::Csv => Box::new(CsvSink::new(output_file, fields, args.verbose)?),
        OutputFormat::Jsonl => Box::new(JsonLinesSink::spawn(output_file, JSON_BATCH_SIZE)),
    };

    tracing::info!(
        "Processing {} ({}) and writing results to {}",
        args.chainstate.display(),
        network,
        args.output_file.display()
    );

    // Setup signal handling for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let mut signals = Signals::new(TERM_SIGNALS).context("Failed to register signal handler")?;
    let r = running.clone();
    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            r.store(false, Ordering::SeqCst);
        }
    });

    let mut parser = ChainstateParser::new(ParserConfig {
        network,
        p2pk_addresses: args.p2pk_addresses,
    });
    let result = dump::dump(
        dump::entries(&mut database)?,
        &mut parser,
        sink.as_mut(),
        &running,
    );
    // Whatever was decoded before a failure still reaches the output.
    let stats = dump::finish(result, sink)?;

    if !args.quiet {
        println!("\n{}", stats);
    }

    Ok(())
}
