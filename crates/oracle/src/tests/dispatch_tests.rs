use super::helpers::*;
use crate::codec::encode;
use crate::keys::observation_key;
use crate::sink::{ReportPacket, TimeoutHeight};
use crate::{
    index, observations, reports, ChannelSink, Command, ConsolidatedReport, Dispatcher, ErrorKind,
    Observation, Outcome,
};
use anyhow::Result;
use kvstore::{KvStore, MemStore};

fn create_all(d: &mut Dispatcher<MemStore, ChannelSink>, obs: &[Observation]) -> Result<()> {
    for o in obs {
        assert_eq!(d.execute(Command::CreateObservation(o.clone()))?, Outcome::Stored);
    }
    Ok(())
}

fn snapshot(kv: &MemStore) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    kv.scan_prefix(b"")
}

fn manual_report(creator: &str, ts: u64) -> ConsolidatedReport {
    ConsolidatedReport {
        creator: creator.to_string(),
        imo: IMO.to_string(),
        ts,
        total_samples: 5,
        eta_outliers: 1,
        eta_mean_cleaned: ETA,
        eta_std_cleaned: 10,
        eta_mean_all: ETA - 100,
        eta_std_all: 400,
        depport: "INNSA".to_string(),
        depport_score: 80,
    }
}

#[test]
fn create_then_duplicate_is_rejected() -> Result<()> {
    let mut d = dispatcher();
    let obs = observation("ds0", TS, ETA, "INNSA");
    d.execute(Command::CreateObservation(obs.clone()))?;

    let before = snapshot(d.store())?;
    let err = d.execute(Command::CreateObservation(obs)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Duplicate);
    assert!(err.to_string().contains("already set"));
    assert_eq!(snapshot(d.store())?, before);
    Ok(())
}

#[test]
fn invalid_creator_address_is_rejected() {
    let mut d = dispatcher();
    let mut obs = observation("ds0", TS, ETA, "INNSA");
    obs.creator = "cosmos1invalid".to_string();
    let err = d.execute(Command::CreateObservation(obs)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAddress);
    assert!(d.store().is_empty());

    let err = d
        .execute(Command::Consolidate {
            creator: String::new(),
            imo: IMO.into(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAddress);
}

#[test]
fn identity_with_separator_is_rejected() {
    let mut d = dispatcher();
    let mut obs = observation("ds0", TS, ETA, "INNSA");
    obs.imo = "95/25338".to_string();
    assert_eq!(
        d.execute(Command::CreateObservation(obs)).unwrap_err().kind(),
        ErrorKind::InvalidRequest
    );

    let mut obs = observation("ds0", TS, ETA, "INNSA");
    obs.source = String::new();
    assert_eq!(
        d.execute(Command::CreateObservation(obs)).unwrap_err().kind(),
        ErrorKind::InvalidRequest
    );
    assert!(d.store().is_empty());
}

#[test]
fn update_by_other_principal_changes_nothing() -> Result<()> {
    let mut d = dispatcher();
    let original = observation("alice", TS, ETA, "INNSA");
    d.execute(Command::CreateObservation(original.clone()))?;
    let stored_bytes = d.store().get(&observation_key(IMO, TS, &original.source))?;
    assert_eq!(stored_bytes, Some(encode(&original)?));

    let mut forged = original.clone();
    forged.creator = addr("mallory");
    forged.eta = ETA + 999;
    let err = d.execute(Command::UpdateObservation(forged)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let after = d.store().get(&observation_key(IMO, TS, &original.source))?;
    assert_eq!(after, stored_bytes);
    Ok(())
}

#[test]
fn update_by_creator_replaces_attributes() -> Result<()> {
    let mut d = dispatcher();
    let mut obs = observation("alice", TS, ETA, "INNSA");
    d.execute(Command::CreateObservation(obs.clone()))?;

    obs.eta = ETA + 60;
    obs.speed = 120;
    d.execute(Command::UpdateObservation(obs.clone()))?;

    let back = observations::get(d.store(), IMO, TS, &obs.source)?.unwrap();
    assert_eq!(back, obs);
    assert_eq!(index::list(d.store(), IMO)?.unwrap().entries.len(), 1);
    Ok(())
}

#[test]
fn update_of_missing_observation_is_not_found() {
    let mut d = dispatcher();
    let err = d
        .execute(Command::UpdateObservation(observation("alice", TS, ETA, "INNSA")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(d.store().is_empty());
}

#[test]
fn delete_requires_creator() -> Result<()> {
    let mut d = dispatcher();
    let obs = observation("alice", TS, ETA, "INNSA");
    d.execute(Command::CreateObservation(obs.clone()))?;
    let before = snapshot(d.store())?;

    let err = d
        .execute(Command::DeleteObservation {
            creator: addr("mallory"),
            imo: IMO.into(),
            ts: TS,
            source: obs.source.clone(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(snapshot(d.store())?, before);

    let outcome = d.execute(Command::DeleteObservation {
        creator: addr("alice"),
        imo: IMO.into(),
        ts: TS,
        source: obs.source.clone(),
    })?;
    assert_eq!(outcome, Outcome::Deleted);
    assert!(observations::get(d.store(), IMO, TS, &obs.source)?.is_none());
    assert!(index::list(d.store(), IMO)?.unwrap().entries.is_empty());

    let err = d
        .execute(Command::DeleteObservation {
            creator: addr("alice"),
            imo: IMO.into(),
            ts: TS,
            source: obs.source,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[test]
fn consolidate_stores_report_at_clock_second() -> Result<()> {
    let mut d = dispatcher();
    create_all(&mut d, &unanimous(4, ETA, "INNSA"))?;

    let outcome = d.execute(Command::Consolidate {
        creator: addr("bob"),
        imo: IMO.into(),
    })?;
    let report = match outcome {
        Outcome::Consolidated(report) => report,
        other => panic!("expected a report, got {:?}", other),
    };
    assert_eq!(report.ts, NOW);
    assert_eq!(report.total_samples, 4);
    assert_eq!(reports::get(d.store(), IMO, NOW)?, Some(report));
    Ok(())
}

#[test]
fn failed_consolidation_leaves_store_unchanged() -> Result<()> {
    let mut d = dispatcher();
    create_all(&mut d, &unanimous(2, ETA, "INNSA"))?;
    let before = snapshot(d.store())?;

    let err = d
        .execute(Command::Consolidate {
            creator: addr("bob"),
            imo: IMO.into(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientSamples);
    assert_eq!(snapshot(d.store())?, before);
    assert!(reports::all(d.store())?.is_empty());
    Ok(())
}

#[test]
fn manual_report_lifecycle() -> Result<()> {
    let mut d = dispatcher();
    let report = manual_report(&addr("carol"), NOW);
    d.execute(Command::CreateReport(report.clone()))?;
    assert_eq!(
        d.execute(Command::CreateReport(report.clone()))
            .unwrap_err()
            .kind(),
        ErrorKind::Duplicate
    );

    let mut forged = report.clone();
    forged.creator = addr("mallory");
    forged.depport = "DEBWE".into();
    assert_eq!(
        d.execute(Command::UpdateReport(forged)).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );

    let mut updated = report.clone();
    updated.depport_score = 60;
    d.execute(Command::UpdateReport(updated.clone()))?;
    assert_eq!(reports::get(d.store(), IMO, NOW)?, Some(updated));

    assert_eq!(
        d.execute(Command::DeleteReport {
            creator: addr("mallory"),
            imo: IMO.into(),
            ts: NOW,
        })
        .unwrap_err()
        .kind(),
        ErrorKind::Unauthorized
    );
    d.execute(Command::DeleteReport {
        creator: addr("carol"),
        imo: IMO.into(),
        ts: NOW,
    })?;
    assert!(reports::get(d.store(), IMO, NOW)?.is_none());
    Ok(())
}

#[test]
fn consolidate_does_not_replace_foreign_report() -> Result<()> {
    let mut d = dispatcher();
    create_all(&mut d, &unanimous(4, ETA, "INNSA"))?;
    let mut theirs = manual_report(&addr("alice"), NOW);
    theirs.depport = "XXXXX".into();
    d.execute(Command::CreateReport(theirs.clone()))?;
    let before = snapshot(d.store())?;

    let err = d
        .execute(Command::Consolidate {
            creator: addr("bob"),
            imo: IMO.into(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Duplicate);
    assert_eq!(snapshot(d.store())?, before);
    assert_eq!(reports::get(d.store(), IMO, NOW)?, Some(theirs));
    Ok(())
}

#[test]
fn report_invariants_are_enforced() {
    let mut d = dispatcher();
    let creator = addr("carol");

    let mut no_samples = manual_report(&creator, NOW);
    no_samples.total_samples = 0;
    no_samples.eta_outliers = 0;
    let mut too_many_outliers = manual_report(&creator, NOW);
    too_many_outliers.eta_outliers = 6;
    let mut score = manual_report(&creator, NOW);
    score.depport_score = 101;

    for bad in [no_samples, too_many_outliers, score] {
        let err = d.execute(Command::CreateReport(bad)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
    assert!(d.store().is_empty());
}

#[test]
fn transmit_queues_packets_with_increasing_sequence() -> Result<()> {
    let mut d = dispatcher().with_transmit_timeout(600);
    let report = manual_report(&addr("carol"), NOW);
    d.execute(Command::CreateReport(report.clone()))?;

    let transmit = || Command::TransmitReport {
        creator: addr("bob"),
        imo: IMO.into(),
        ts: NOW,
        channel: CHANNEL.into(),
    };
    assert_eq!(d.execute(transmit())?, Outcome::Transmitted { sequence: 1 });
    assert_eq!(d.execute(transmit())?, Outcome::Transmitted { sequence: 2 });

    let packets = d.sink_mut().drain();
    assert_eq!(packets.len(), 2);
    let first = &packets[0];
    assert_eq!(first.channel, CHANNEL);
    assert_eq!(first.port, "vesseloracle");
    assert_eq!(first.timeout_height, TimeoutHeight::default());
    assert_eq!(first.timeout_timestamp, (NOW + 600) * 1_000_000_000);
    let decoded = ReportPacket::from_bytes(&first.data)?;
    assert_eq!(decoded.consolidated_data_report, report);
    assert!(d.sink().pending().is_empty());
    Ok(())
}

#[test]
fn transmit_of_missing_report_is_not_found() {
    let mut d = dispatcher();
    let err = d
        .execute(Command::TransmitReport {
            creator: addr("bob"),
            imo: IMO.into(),
            ts: NOW,
            channel: CHANNEL.into(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(d.sink().pending().is_empty());
}

#[test]
fn transmit_on_closed_channel_is_dispatch_failure() -> Result<()> {
    let mut d = dispatcher();
    d.execute(Command::CreateReport(manual_report(&addr("carol"), NOW)))?;
    let err = d
        .execute(Command::TransmitReport {
            creator: addr("bob"),
            imo: IMO.into(),
            ts: NOW,
            channel: "channel-9".into(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DispatchFailed);
    assert!(err.to_string().contains("channel-9"));
    Ok(())
}
