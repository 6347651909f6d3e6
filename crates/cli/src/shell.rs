//! Line-oriented command interpreter over a [`Dispatcher`].
//!
//! Each input line is one command. Replies go to the supplied writer:
//! `OK ...` on success, `ERR <KIND> <message>` on a rejected command,
//! `(nil)` for a missed lookup.

use anyhow::Result;
use config::NodeConfig;
use kvstore::{KvStore, MemStore, Store};
use oracle::genesis::{export_genesis, init_genesis, read_genesis_file, write_genesis_file};
use oracle::ingest::{emulate, parse_payload, simulation_record, DATA_SOURCE_COUNT};
use oracle::{
    derive_address, observations, reports, window, ChannelSink, Command, ConsolidatedReport,
    Dispatcher, Observation, OracleError, Outcome,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

pub const HELP: &str = "\
Commands: OBS | OBS-UPDATE | OBS-DEL | OBS-GET | WINDOW | INGEST
          CONSOLIDATE | REPORT | REPORT-DEL | REPORTS | TRANSMIT
          EXPORT | IMPORT | PARAMS | STATS | COMPACT | EXIT";

const OBS_USAGE: &str = "<account> <imo> <ts> <source-account> <eta> <depport> \
[<adt> <lat> <lon> <speed> <course> <heading> <destport> <mmsi> <name>]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    dispatcher: Dispatcher<Box<dyn KvStore>, ChannelSink>,
    channel: String,
    rng: StdRng,
}

impl Shell {
    /// Opens the store described by `config` and wires a dispatcher to it.
    pub fn open(config: &NodeConfig) -> Result<Self> {
        let store: Box<dyn KvStore> = if config.in_memory {
            Box::new(MemStore::new())
        } else {
            Box::new(Store::open(config.wal_path(), config.wal_sync)?)
        };
        let mut sink = ChannelSink::default();
        sink.open_channel(config.channel.clone());

        let dispatcher = Dispatcher::new(store, sink)
            .with_params(config.params)
            .with_transmit_timeout(config.transmit_timeout_secs);

        Ok(Self {
            dispatcher,
            channel: config.channel.clone(),
            rng: StdRng::from_entropy(),
        })
    }

    /// Uses a fixed seed for ingestion noise.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher<Box<dyn KvStore>, ChannelSink> {
        &self.dispatcher
    }

    /// Executes one input line. Only write failures on `out` are errors.
    pub fn run_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(cmd) = parts.first() else {
            return Ok(Flow::Continue);
        };
        let args = &parts[1..];

        match cmd.to_uppercase().as_str() {
            "OBS" => self.observation(args, false, out)?,
            "OBS-UPDATE" => self.observation(args, true, out)?,
            "OBS-DEL" => self.delete_observation(args, out)?,
            "OBS-GET" => self.get_observation(args, out)?,
            "WINDOW" => self.window(args, out)?,
            "INGEST" => self.ingest(args, out)?,
            "CONSOLIDATE" => self.consolidate(args, out)?,
            "REPORT" => self.get_report(args, out)?,
            "REPORT-DEL" => self.delete_report(args, out)?,
            "REPORTS" => self.list_reports(out)?,
            "TRANSMIT" => self.transmit(args, out)?,
            "EXPORT" => self.export(args, out)?,
            "IMPORT" => self.import(args, out)?,
            "PARAMS" => {
                let p = self.dispatcher.params();
                writeln!(
                    out,
                    "min_item_count={} max_item_count={} interval_width={}",
                    p.min_item_count, p.max_item_count, p.interval_width
                )?;
            }
            "STATS" => self.stats(out)?,
            "COMPACT" => match self.dispatcher.store_mut().compact() {
                Ok(()) => writeln!(out, "OK")?,
                Err(e) => writeln!(out, "ERR INTERNAL compact failed: {:#}", e)?,
            },
            "HELP" => writeln!(out, "{}", HELP)?,
            "EXIT" | "QUIT" => {
                writeln!(out, "bye")?;
                return Ok(Flow::Exit);
            }
            other => writeln!(out, "unknown command: {}", other)?,
        }
        Ok(Flow::Continue)
    }

    fn execute<W: Write>(&mut self, cmd: Command, out: &mut W) -> Result<Option<Outcome>> {
        match self.dispatcher.execute(cmd) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => {
                report_error(&e, out)?;
                Ok(None)
            }
        }
    }

    fn observation<W: Write>(&mut self, args: &[&str], update: bool, out: &mut W) -> Result<()> {
        let verb = if update { "OBS-UPDATE" } else { "OBS" };
        if args.len() < 6 || (args.len() > 6 && args.len() < 15) {
            writeln!(out, "ERR usage: {} {}", verb, OBS_USAGE)?;
            return Ok(());
        }
        let obs = match parse_observation(args) {
            Ok(obs) => obs,
            Err(msg) => return invalid(out, &msg),
        };
        let cmd = if update {
            Command::UpdateObservation(obs)
        } else {
            Command::CreateObservation(obs)
        };
        if self.execute(cmd, out)?.is_some() {
            writeln!(out, "OK")?;
        }
        Ok(())
    }

    fn delete_observation<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let [account, imo, ts, source] = args else {
            writeln!(out, "ERR usage: OBS-DEL <account> <imo> <ts> <source-account>")?;
            return Ok(());
        };
        let ts = match parse_num::<u64>("ts", ts) {
            Ok(ts) => ts,
            Err(msg) => return invalid(out, &msg),
        };
        let cmd = Command::DeleteObservation {
            creator: derive_address(account),
            imo: imo.to_string(),
            ts,
            source: derive_address(source),
        };
        if self.execute(cmd, out)?.is_some() {
            writeln!(out, "OK")?;
        }
        Ok(())
    }

    fn get_observation<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let [imo, ts, source] = args else {
            writeln!(out, "ERR usage: OBS-GET <imo> <ts> <source-account>")?;
            return Ok(());
        };
        let ts = match parse_num::<u64>("ts", ts) {
            Ok(ts) => ts,
            Err(msg) => return invalid(out, &msg),
        };
        let store = self.dispatcher.store();
        match observations::get(store, imo, ts, &derive_address(source)) {
            Ok(Some(obs)) => writeln!(out, "{}", format_observation(&obs))?,
            Ok(None) => writeln!(out, "(nil)")?,
            Err(e) => report_error(&e, out)?,
        }
        Ok(())
    }

    fn window<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let [imo] = args else {
            writeln!(out, "ERR usage: WINDOW <imo>")?;
            return Ok(());
        };
        let p = self.dispatcher.params();
        let store = self.dispatcher.store();
        match window::select(store, imo, p.interval_width, p.max_item_count) {
            Ok(selected) if selected.is_empty() => writeln!(out, "(empty)")?,
            Ok(selected) => {
                for obs in &selected {
                    writeln!(out, "{}", format_observation(obs))?;
                }
                writeln!(out, "({} observations)", selected.len())?;
            }
            Err(e) => report_error(&e, out)?,
        }
        Ok(())
    }

    fn ingest<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let [imo, source] = args else {
            writeln!(out, "ERR usage: INGEST <imo> SIMULATE | INGEST <imo> <payload.json>")?;
            return Ok(());
        };
        let record = if source.eq_ignore_ascii_case("SIMULATE") {
            simulation_record().map(|mut r| {
                r.imo = imo.to_string();
                r
            })
        } else {
            std::fs::read_to_string(source)
                .map_err(anyhow::Error::from)
                .and_then(|text| parse_payload(&text))
        };
        let record = match record {
            Ok(r) => r,
            Err(e) => return invalid(out, &format!("{:#}", e)),
        };
        if record.imo != *imo {
            return invalid(
                out,
                &format!("payload is for imo {}, not {}", record.imo, imo),
            );
        }

        let emulated = emulate(&record, DATA_SOURCE_COUNT, &mut self.rng);
        let total = emulated.len();
        let mut stored = 0;
        for obs in emulated {
            if self.execute(Command::CreateObservation(obs), out)?.is_some() {
                stored += 1;
            }
        }
        writeln!(out, "OK ingested {} of {} observations", stored, total)?;
        Ok(())
    }

    fn consolidate<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let [account, imo] = args else {
            writeln!(out, "ERR usage: CONSOLIDATE <account> <imo>")?;
            return Ok(());
        };
        let cmd = Command::Consolidate {
            creator: derive_address(account),
            imo: imo.to_string(),
        };
        if let Some(Outcome::Consolidated(report)) = self.execute(cmd, out)? {
            writeln!(out, "OK {}", format_report(&report))?;
        }
        Ok(())
    }

    fn get_report<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let [imo, ts] = args else {
            writeln!(out, "ERR usage: REPORT <imo> <ts>")?;
            return Ok(());
        };
        let ts = match parse_num::<u64>("ts", ts) {
            Ok(ts) => ts,
            Err(msg) => return invalid(out, &msg),
        };
        match reports::get(self.dispatcher.store(), imo, ts) {
            Ok(Some(report)) => writeln!(out, "{}", format_report(&report))?,
            Ok(None) => writeln!(out, "(nil)")?,
            Err(e) => report_error(&e, out)?,
        }
        Ok(())
    }

    fn delete_report<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let [account, imo, ts] = args else {
            writeln!(out, "ERR usage: REPORT-DEL <account> <imo> <ts>")?;
            return Ok(());
        };
        let ts = match parse_num::<u64>("ts", ts) {
            Ok(ts) => ts,
            Err(msg) => return invalid(out, &msg),
        };
        let cmd = Command::DeleteReport {
            creator: derive_address(account),
            imo: imo.to_string(),
            ts,
        };
        if self.execute(cmd, out)?.is_some() {
            writeln!(out, "OK")?;
        }
        Ok(())
    }

    fn list_reports<W: Write>(&mut self, out: &mut W) -> Result<()> {
        match reports::all(self.dispatcher.store()) {
            Ok(all) if all.is_empty() => writeln!(out, "(empty)")?,
            Ok(all) => {
                for report in &all {
                    writeln!(out, "{}", format_report(report))?;
                }
                writeln!(out, "({} reports)", all.len())?;
            }
            Err(e) => report_error(&e, out)?,
        }
        Ok(())
    }

    fn transmit<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let (account, imo, ts, channel) = match args {
            [account, imo, ts] => (account, imo, ts, self.channel.clone()),
            [account, imo, ts, channel] => (account, imo, ts, channel.to_string()),
            _ => {
                writeln!(out, "ERR usage: TRANSMIT <account> <imo> <ts> [channel]")?;
                return Ok(());
            }
        };
        let ts = match parse_num::<u64>("ts", ts) {
            Ok(ts) => ts,
            Err(msg) => return invalid(out, &msg),
        };
        let cmd = Command::TransmitReport {
            creator: derive_address(account),
            imo: imo.to_string(),
            ts,
            channel: channel.clone(),
        };
        if let Some(Outcome::Transmitted { sequence }) = self.execute(cmd, out)? {
            writeln!(out, "OK channel={} sequence={}", channel, sequence)?;
        }
        Ok(())
    }

    fn export<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let [path] = args else {
            writeln!(out, "ERR usage: EXPORT <path>")?;
            return Ok(());
        };
        let result = export_genesis(self.dispatcher.store(), self.dispatcher.params())
            .and_then(|state| {
                write_genesis_file(Path::new(path), &state)?;
                Ok(state)
            });
        match result {
            Ok(state) => writeln!(
                out,
                "OK exported {} observations, {} reports",
                state.observations.len(),
                state.reports.len()
            )?,
            Err(e) => report_error(&e, out)?,
        }
        Ok(())
    }

    fn import<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let [path] = args else {
            writeln!(out, "ERR usage: IMPORT <path>")?;
            return Ok(());
        };
        match self.dispatcher.store().scan_prefix(b"") {
            Ok(live) if !live.is_empty() => {
                writeln!(out, "ERR GENESIS store is not empty")?;
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => {
                writeln!(out, "ERR INTERNAL {:#}", e)?;
                return Ok(());
            }
        }
        let result = read_genesis_file(Path::new(path))
            .and_then(|state| init_genesis(self.dispatcher.store_mut(), &state).map(|_| state));
        match result {
            Ok(state) => {
                if state.params != self.dispatcher.params() {
                    tracing::warn!(
                        params = ?state.params,
                        "genesis params differ from node config; node config stays in effect"
                    );
                }
                writeln!(
                    out,
                    "OK imported {} observations, {} reports",
                    state.observations.len(),
                    state.reports.len()
                )?
            }
            Err(e) => report_error(&e, out)?,
        }
        Ok(())
    }

    fn stats<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let store = self.dispatcher.store();
        let counts = observations::all(store)
            .and_then(|obs| reports::all(store).map(|r| (obs.len(), r.len())));
        match counts {
            Ok((obs, reps)) => writeln!(
                out,
                "observations={} reports={} pending_packets={}",
                obs,
                reps,
                self.dispatcher.sink().pending().len()
            )?,
            Err(e) => report_error(&e, out)?,
        }
        Ok(())
    }
}

fn report_error<W: Write>(e: &OracleError, out: &mut W) -> Result<()> {
    writeln!(out, "ERR {} {}", e.kind().as_str(), e)?;
    Ok(())
}

fn invalid<W: Write>(out: &mut W, msg: &str) -> Result<()> {
    writeln!(out, "ERR INVALID_REQUEST {}", msg)?;
    Ok(())
}

fn parse_num<T: FromStr>(field: &str, raw: &str) -> std::result::Result<T, String> {
    raw.parse()
        .map_err(|_| format!("{} is not a valid number: {:?}", field, raw))
}

/// Builds an observation from `OBS` arguments. Optional attributes default
/// to zero or empty; the name takes every remaining word.
fn parse_observation(args: &[&str]) -> std::result::Result<Observation, String> {
    let mut obs = Observation {
        creator: derive_address(args[0]),
        imo: args[1].to_string(),
        ts: parse_num("ts", args[2])?,
        source: derive_address(args[3]),
        lat: 0,
        lon: 0,
        speed: 0,
        course: 0,
        heading: 0,
        adt: 0,
        eta: parse_num("eta", args[4])?,
        name: String::new(),
        destport: String::new(),
        depport: args[5].to_string(),
        mmsi: String::new(),
    };
    if args.len() > 6 {
        obs.adt = parse_num("adt", args[6])?;
        obs.lat = parse_num("lat", args[7])?;
        obs.lon = parse_num("lon", args[8])?;
        obs.speed = parse_num("speed", args[9])?;
        obs.course = parse_num("course", args[10])?;
        obs.heading = parse_num("heading", args[11])?;
        obs.destport = args[12].to_string();
        obs.mmsi = args[13].to_string();
        obs.name = args[14..].join(" ");
    }
    Ok(obs)
}

fn format_observation(obs: &Observation) -> String {
    format!(
        "imo={} ts={} source={} creator={} eta={} depport={} adt={} lat={} lon={} \
         speed={} course={} heading={} destport={} mmsi={} name={:?}",
        obs.imo,
        obs.ts,
        obs.source,
        obs.creator,
        obs.eta,
        obs.depport,
        obs.adt,
        obs.lat,
        obs.lon,
        obs.speed,
        obs.course,
        obs.heading,
        obs.destport,
        obs.mmsi,
        obs.name
    )
}

fn format_report(r: &ConsolidatedReport) -> String {
    format!(
        "imo={} ts={} creator={} total_samples={} eta_outliers={} eta_mean_cleaned={} \
         eta_std_cleaned={} eta_mean_all={} eta_std_all={} depport={} depport_score={}",
        r.imo,
        r.ts,
        r.creator,
        r.total_samples,
        r.eta_outliers,
        r.eta_mean_cleaned,
        r.eta_std_cleaned,
        r.eta_mean_all,
        r.eta_std_all,
        r.depport,
        r.depport_score
    )
}
