use config::ConsolidationParams;
use kvstore::MemStore;

use crate::{derive_address, ChannelSink, Dispatcher, FixedClock, Observation};

pub const IMO: &str = "9525338";
pub const ETA: u64 = 1_727_690_400;
pub const TS: u64 = 1_726_625_760;
pub const NOW: u64 = 1_726_700_000;
pub const CHANNEL: &str = "channel-0";

pub fn addr(name: &str) -> String {
    derive_address(name)
}

/// Observation for [`IMO`] created by and attributed to account `source`.
pub fn observation(source: &str, ts: u64, eta: u64, depport: &str) -> Observation {
    let address = addr(source);
    Observation {
        creator: address.clone(),
        imo: IMO.to_string(),
        ts,
        source: address,
        lat: 60566,
        lon: 5561919,
        speed: 158,
        course: 219,
        heading: 208,
        adt: 1_726_280_520,
        eta,
        name: "MAERSK CHENNAI".to_string(),
        destport: "CGPNR".to_string(),
        depport: depport.to_string(),
        mmsi: "566093000".to_string(),
    }
}

/// `count` observations from sources `ds0..`, all at [`TS`].
pub fn unanimous(count: usize, eta: u64, depport: &str) -> Vec<Observation> {
    (0..count)
        .map(|i| observation(&format!("ds{}", i), TS, eta, depport))
        .collect()
}

pub fn dispatcher() -> Dispatcher<MemStore, ChannelSink> {
    let mut sink = ChannelSink::default();
    sink.open_channel(CHANNEL);
    Dispatcher::new(MemStore::new(), sink)
        .with_params(ConsolidationParams::default())
        .with_clock(FixedClock(NOW))
}
