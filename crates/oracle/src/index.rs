//! Per-IMO list of observation identities.
//!
//! The list lets window selection find a vessel's observations without
//! scanning every stored observation. Entries keep insertion order.

use kvstore::KvStore;

use crate::codec::{decode, encode};
use crate::error::Result;
use crate::keys::imo_index_key;
use crate::types::{ImoIndex, ObservationId};

/// Appends `entry` to its IMO's list. An identical entry already present is
/// left where it is.
pub fn add<S: KvStore + ?Sized>(kv: &mut S, entry: &ObservationId) -> Result<()> {
    let mut index = list(kv, &entry.imo)?.unwrap_or_default();
    if index.entries.contains(entry) {
        return Ok(());
    }
    index.entries.push(entry.clone());
    tracing::trace!(imo = %entry.imo, len = index.entries.len(), "index entry added");
    kv.set(imo_index_key(&entry.imo), encode(&index)?)?;
    Ok(())
}

/// Removes the first entry equal to `entry`. Missing lists and entries are
/// not an error.
pub fn remove<S: KvStore + ?Sized>(kv: &mut S, entry: &ObservationId) -> Result<()> {
    let Some(mut index) = list(kv, &entry.imo)? else {
        return Ok(());
    };
    if let Some(pos) = index.entries.iter().position(|e| e == entry) {
        index.entries.remove(pos);
        kv.set(imo_index_key(&entry.imo), encode(&index)?)?;
    }
    Ok(())
}

pub fn remove_all<S: KvStore + ?Sized>(kv: &mut S, imo: &str) -> Result<()> {
    kv.delete(imo_index_key(imo))?;
    Ok(())
}

/// Returns the list for `imo`, or `None` if none was ever written.
pub fn list<S: KvStore + ?Sized>(kv: &S, imo: &str) -> Result<Option<ImoIndex>> {
    match kv.get(&imo_index_key(imo))? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}
