//! Live peer telemetry.
//!
//! Each cycle the poller rescans the peer-config artifacts, runs the status
//! command, parses its output, turns cumulative counters into per-interval
//! deltas, stores them, and hands one immutable snapshot to every subscriber.

pub mod broadcaster;
mod delta;
pub mod feed;
mod identity;
mod models;
pub mod parser;
mod poller;
mod source;
mod store;

pub use broadcaster::{Broadcaster, PublishReport, SubscriberId, SubscriberRegistry, Subscription};
pub use delta::{CounterDelta, DeltaTracker};
pub use identity::{extract_address, IdentityMap, IdentityResolver};
pub use models::{ClientIdentity, LastSeen, PeerRecord, PeerView, Snapshot, TelemetrySample};
pub use parser::{ParseOutcome, StatusFormat, StatusParser};
pub use poller::{CycleReport, Poller, PollerConfig, PollerHandle, PollerState};
pub use source::{CommandSource, FixedSource, StatusSource};
pub use store::{MemoryStore, SampleStore, SqliteStore, TrafficRow};
