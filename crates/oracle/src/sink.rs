//! Outbound packet path for consolidated reports.
//!
//! [`PacketSink`] is the seam to whatever carries packets off the node.
//! [`ChannelSink`] is the in-process implementation: it owns a set of open
//! channels, hands out per-channel sequence numbers starting at 1, and
//! queues serialized packets until a relayer drains them.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::ConsolidatedReport;

pub const DEFAULT_PORT: &str = "vesseloracle";

/// Payload carried by one packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPacket {
    pub consolidated_data_report: ConsolidatedReport,
}

impl ReportPacket {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Counterparty height after which the packet is no longer delivered.
/// Zero disables the height timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutHeight {
    pub revision_number: u64,
    pub revision_height: u64,
}

pub trait PacketSink {
    /// Queues `packet` on `channel` and returns its sequence number.
    fn transmit(
        &mut self,
        packet: &ReportPacket,
        channel: &str,
        timeout_height: TimeoutHeight,
        timeout_timestamp: u64,
    ) -> Result<u64>;
}

/// A packet accepted by a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    pub port: String,
    pub channel: String,
    pub sequence: u64,
    pub timeout_height: TimeoutHeight,
    /// Nanoseconds since epoch.
    pub timeout_timestamp: u64,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct ChannelSink {
    port: String,
    /// channel id -> next sequence number
    channels: BTreeMap<String, u64>,
    outbound: Vec<OutboundPacket>,
}

impl ChannelSink {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            channels: BTreeMap::new(),
            outbound: Vec::new(),
        }
    }

    /// Opens `channel`. Reopening an open channel keeps its sequence.
    pub fn open_channel(&mut self, channel: impl Into<String>) {
        self.channels.entry(channel.into()).or_insert(1);
    }

    pub fn is_open(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Packets accepted but not yet drained.
    pub fn pending(&self) -> &[OutboundPacket] {
        &self.outbound
    }

    pub fn drain(&mut self) -> Vec<OutboundPacket> {
        std::mem::take(&mut self.outbound)
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

impl PacketSink for ChannelSink {
    fn transmit(
        &mut self,
        packet: &ReportPacket,
        channel: &str,
        timeout_height: TimeoutHeight,
        timeout_timestamp: u64,
    ) -> Result<u64> {
        if timeout_height == TimeoutHeight::default() && timeout_timestamp == 0 {
            bail!("packet has neither a timeout height nor a timeout timestamp");
        }
        let Some(next) = self.channels.get_mut(channel) else {
            bail!("channel {} is not open on port {}", channel, self.port);
        };
        let data = packet.to_bytes()?;
        let sequence = *next;
        *next += 1;

        tracing::debug!(
            port = %self.port,
            channel,
            sequence,
            bytes = data.len(),
            "packet queued"
        );
        self.outbound.push(OutboundPacket {
            port: self.port.clone(),
            channel: channel.to_string(),
            sequence,
            timeout_height,
            timeout_timestamp,
            data,
        });
        Ok(sequence)
    }
}
