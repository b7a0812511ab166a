use std::fmt;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::ui::formatters::{format_bytes, format_datetime};

const MINUTE: i64 = 60;
const HOUR: i64 = 3600;
const DAY: i64 = 86400;

/// One peer as reported by the status source, rebuilt every cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerRecord {
    pub interface: String,
    pub public_key: String,
    pub endpoint: Option<String>,
    /// First IPv4 address of the allowed-IPs list
    pub virtual_ip: String,
    /// Unix epoch of the latest handshake, 0 = never
    pub latest_handshake: i64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    /// Client name printed by the source itself (table format only)
    pub name_hint: Option<String>,
}

impl PeerRecord {
    pub fn is_connected(&self) -> bool {
        self.latest_handshake > 0
    }

    pub fn last_seen(&self, now: i64) -> LastSeen {
        LastSeen::from_handshake(self.latest_handshake, now)
    }
}

/// Age bucket of a peer's latest handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastSeen {
    Offline,
    SecondsAgo(i64),
    MinutesAgo(i64),
    HoursAgo(i64),
    At(i64),
}

impl LastSeen {
    pub fn from_handshake(handshake: i64, now: i64) -> Self {
        if handshake <= 0 {
            return LastSeen::Offline;
        }

        // A handshake "in the future" is clock skew between us and the daemon.
        let age = (now - handshake).max(0);
        if age < MINUTE {
            LastSeen::SecondsAgo(age)
        } else if age < HOUR {
            LastSeen::MinutesAgo(age / MINUTE)
        } else if age < DAY {
            LastSeen::HoursAgo(age / HOUR)
        } else {
            LastSeen::At(handshake)
        }
    }
}

impl fmt::Display for LastSeen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastSeen::Offline => write!(f, "offline"),
            LastSeen::SecondsAgo(n) => write!(f, "{}s ago", n),
            LastSeen::MinutesAgo(n) => write!(f, "{}m ago", n),
            LastSeen::HoursAgo(n) => write!(f, "{}h ago", n),
            LastSeen::At(epoch) => match Local.timestamp_opt(*epoch, 0).single() {
                Some(datetime) => write!(f, "{}", format_datetime(datetime)),
                None => write!(f, "{}", epoch),
            },
        }
    }
}

/// Virtual IP to stable client name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub virtual_ip: String,
    pub name: String,
}

/// Traffic observed for one client during one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub client_name: String,
    pub rx_delta: u64,
    pub tx_delta: u64,
    pub timestamp: i64,
}

/// A peer as subscribers see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerView {
    pub name: String,
    pub remote_ip: String,
    pub virtual_ip: String,
    pub bytes_received: String,
    pub bytes_sent: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub last_seen: String,
    pub connected: bool,
    pub interface: String,
    pub public_key: String,
}

impl PeerView {
    pub fn new(name: String, record: &PeerRecord, now: i64) -> Self {
        Self {
            name,
            remote_ip: record.endpoint.clone().unwrap_or_default(),
            virtual_ip: record.virtual_ip.clone(),
            bytes_received: format_bytes(record.rx_bytes),
            bytes_sent: format_bytes(record.tx_bytes),
            rx_bytes: record.rx_bytes,
            tx_bytes: record.tx_bytes,
            last_seen: record.last_seen(now).to_string(),
            connected: record.is_connected(),
            interface: record.interface.clone(),
            public_key: record.public_key.clone(),
        }
    }
}

/// Aggregate view broadcast at the end of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub total: usize,
    pub connected: Vec<PeerView>,
    pub ts: i64,
}

impl Snapshot {
    pub fn online_count(&self) -> usize {
        self.connected.iter().filter(|p| p.connected).count()
    }
}
