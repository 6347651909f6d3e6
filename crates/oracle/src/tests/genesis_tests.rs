use super::helpers::*;
use crate::genesis::{export_genesis, init_genesis, read_genesis_file, write_genesis_file};
use crate::{index, window, Command, ErrorKind, GenesisState};
use anyhow::Result;
use config::ConsolidationParams;
use kvstore::{KvStore, MemStore};
use tempfile::tempdir;

fn populated() -> Result<GenesisState> {
    let mut d = dispatcher();
    for obs in unanimous(4, ETA, "INNSA") {
        d.execute(Command::CreateObservation(obs))?;
    }
    d.execute(Command::Consolidate {
        creator: addr("bob"),
        imo: IMO.into(),
    })?;
    Ok(export_genesis(d.store(), d.params())?)
}

#[test]
fn export_then_import_rebuilds_index() -> Result<()> {
    let state = populated()?;
    assert_eq!(state.observations.len(), 4);
    assert_eq!(state.reports.len(), 1);

    let mut fresh = MemStore::new();
    init_genesis(&mut fresh, &state)?;

    assert_eq!(index::list(&fresh, IMO)?.unwrap().entries.len(), 4);
    assert_eq!(window::select(&fresh, IMO, 3600, 16)?.len(), 4);
    assert_eq!(export_genesis(&fresh, state.params)?, state);
    Ok(())
}

#[test]
fn duplicate_observation_is_fatal() {
    let mut state = GenesisState::default();
    state.observations = unanimous(2, ETA, "INNSA");
    state.observations.push(state.observations[0].clone());

    let mut kv = MemStore::new();
    let err = init_genesis(&mut kv, &state).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Genesis);
    assert!(err.to_string().contains("duplicate observation"));
    assert!(kv.is_empty());
}

#[test]
fn duplicate_report_is_fatal() -> Result<()> {
    let mut state = populated()?;
    state.reports.push(state.reports[0].clone());
    let err = state.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Genesis);
    assert!(err.to_string().contains("duplicate report"));
    Ok(())
}

#[test]
fn record_already_in_store_aborts_whole_import() -> Result<()> {
    let state = populated()?;
    let mut kv = MemStore::new();
    init_genesis(&mut kv, &state)?;
    let before = kv.scan_prefix(b"")?;

    let mut again = state.clone();
    again.observations.insert(0, observation("new", TS, ETA, "INNSA"));
    let err = init_genesis(&mut kv, &again).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Genesis);
    assert_eq!(kv.scan_prefix(b"")?, before);
    Ok(())
}

#[test]
fn invalid_creator_in_genesis_is_rejected() {
    let mut state = GenesisState::default();
    let mut obs = observation("ds0", TS, ETA, "INNSA");
    obs.creator = "bob".into();
    state.observations.push(obs);
    assert_eq!(state.validate().unwrap_err().kind(), ErrorKind::Genesis);
}

#[test]
fn genesis_file_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("genesis.json");
    let mut state = populated()?;
    state.params = ConsolidationParams {
        min_item_count: 2,
        max_item_count: 8,
        interval_width: 900,
    };

    write_genesis_file(&path, &state)?;
    assert!(!dir.path().join("genesis.json.tmp").exists());
    assert_eq!(read_genesis_file(&path)?, state);

    // overwrite in place
    write_genesis_file(&path, &GenesisState::default())?;
    assert_eq!(read_genesis_file(&path)?, GenesisState::default());
    Ok(())
}

#[test]
fn malformed_genesis_file_is_genesis_error() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("genesis.json");
    std::fs::write(&path, b"{ not json")?;
    assert_eq!(read_genesis_file(&path).unwrap_err().kind(), ErrorKind::Genesis);
    assert_eq!(
        read_genesis_file(&dir.path().join("missing.json"))
            .unwrap_err()
            .kind(),
        ErrorKind::Internal
    );
    Ok(())
}

#[test]
fn missing_sections_default_to_empty() -> Result<()> {
    let state: GenesisState = serde_json::from_str("{}")?;
    assert_eq!(state, GenesisState::default());
    Ok(())
}
