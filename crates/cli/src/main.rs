//! # CLI - Vessel Oracle Interactive Shell
//!
//! A REPL over the oracle's command dispatcher. Reads commands from stdin,
//! executes each as one transaction, and prints results to stdout. Logs go
//! to stderr so scripted use can parse stdout.
//!
//! ## Commands
//!
//! ```text
//! OBS <account> <imo> <ts> <source-account> <eta> <depport>
//!     [<adt> <lat> <lon> <speed> <course> <heading> <destport> <mmsi> <name>]
//! OBS-UPDATE ...                    same arguments as OBS
//! OBS-DEL <account> <imo> <ts> <source-account>
//! OBS-GET <imo> <ts> <source-account>
//! WINDOW <imo>                      current consolidation window
//! INGEST <imo> SIMULATE             fan out the built-in sample record
//! INGEST <imo> <payload.json>       fan out a tracking API response
//! CONSOLIDATE <account> <imo>
//! REPORT <imo> <ts>
//! REPORT-DEL <account> <imo> <ts>
//! REPORTS                           list all reports
//! TRANSMIT <account> <imo> <ts> [channel]
//! EXPORT <path> | IMPORT <path>     genesis file (import needs an empty store)
//! PARAMS | STATS | COMPACT | EXIT | QUIT
//! ```
//!
//! Accounts are local names (`bob`, `ds0`, ...); the shell turns them into
//! addresses.
//!
//! ## Configuration
//!
//! See the `config` crate: `ORACLE_DATA_DIR`, `ORACLE_IN_MEMORY`,
//! `ORACLE_WAL_SYNC`, `ORACLE_CHANNEL`, `ORACLE_MIN_ITEMS`, `ORACLE_MAX_ITEMS`,
//! `ORACLE_WINDOW_SECS`, ... plus `ORACLE_SEED` to make `INGEST` noise
//! reproducible and `RUST_LOG` for log filtering.
//!
//! ## Example
//!
//! ```text
//! $ ORACLE_IN_MEMORY=true cargo run -p cli
//! vessel oracle started (store=memory, channel=channel-0, min=3, max=16, window=3600s)
//! > INGEST 9525338 SIMULATE
//! OK ingested 8 of 8 observations
//! > CONSOLIDATE bob 9525338
//! OK imo=9525338 ts=1760000000 ... depport=INNSA depport_score=87
//! > EXIT
//! bye
//! ```

mod shell;

use anyhow::Result;
use config::NodeConfig;
use shell::{Flow, Shell, HELP};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = NodeConfig::load()?;
    let mut shell = Shell::open(&config)?;
    if let Some(seed) = std::env::var("ORACLE_SEED").ok().and_then(|s| s.parse().ok()) {
        shell = shell.with_seed(seed);
    }

    let store = if config.in_memory {
        "memory".to_string()
    } else {
        config.wal_path().display().to_string()
    };
    println!(
        "vessel oracle started (store={}, channel={}, min={}, max={}, window={}s)",
        store,
        config.channel,
        config.params.min_item_count,
        config.params.max_item_count,
        config.params.interval_width
    );
    println!("{}", HELP);
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if shell.run_line(&line, &mut stdout)? == Flow::Exit {
            break;
        }
        print!("> ");
        stdout.flush().ok();
    }

    Ok(())
}
