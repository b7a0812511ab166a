// Integration tests for the poll cycle and its loop

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use vpnpulse::core::telemetry::{
    Broadcaster, FixedSource, MemoryStore, Poller, PollerConfig, PollerState, SampleStore,
    StatusSource, TelemetrySample,
};
use vpnpulse::{Error, ErrorKind};

fn peer_line(allowed: &str, handshake: i64, rx: u64, tx: u64) -> String {
    format!(
        "wg0\tPUBKEY{}=\t(none)\t203.0.113.5:40112\t{}\t{}\t{}\t{}\toff\n",
        allowed.len(),
        allowed,
        handshake,
        rx,
        tx
    )
}

fn config_for(dir: &TempDir) -> PollerConfig {
    PollerConfig {
        interval: Duration::from_millis(50),
        config_dir: dir.path().to_path_buf(),
        store_timeout: Duration::from_millis(200),
        store_retries: 1,
    }
}

fn conf_dir(entries: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, ip) in entries {
        fs::write(
            dir.path().join(format!("{}.conf", name)),
            format!("[Interface]\nAddress = {}/24\n", ip),
        )
        .unwrap();
    }
    dir
}

struct FailingStore {
    attempts: AtomicUsize,
}

impl SampleStore for FailingStore {
    fn record(&self, _sample: &TelemetrySample) -> vpnpulse::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::persistence("disk full"))
    }
}

struct SlowStore;

impl SampleStore for SlowStore {
    fn record(&self, _sample: &TelemetrySample) -> vpnpulse::Result<()> {
        std::thread::sleep(Duration::from_millis(400));
        Ok(())
    }
}

struct SlowSource {
    delay: Duration,
    raw: String,
}

impl StatusSource for SlowSource {
    async fn fetch(&self) -> vpnpulse::Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok(self.raw.clone())
    }
}

struct FlakyStore {
    delay: Duration,
}

impl SampleStore for FlakyStore {
    fn record(&self, _sample: &TelemetrySample) -> vpnpulse::Result<()> {
        std::thread::sleep(self.delay);
        Err(Error::persistence("database is locked"))
    }
}

#[tokio::test]
async fn test_end_to_end_delta_from_previous_total() {
    let dir = conf_dir(&[("phone", "10.6.0.2")]);
    let raw = format!(
        "wg0\tPRIVATE=\tPUBLIC=\t51820\toff\n{}",
        peer_line("10.6.0.2/32", 0, 1_048_576, 0)
    );
    let store = Arc::new(MemoryStore::new());
    let broadcaster = Broadcaster::default();
    let mut subscriber = broadcaster.subscribe();

    let mut poller = Poller::new(
        config_for(&dir),
        FixedSource::new(raw),
        store.clone(),
        broadcaster.clone(),
    );
    poller.tracker_mut().seed("phone", 524_288, 0);

    let report = poller.run_cycle().await;

    assert_eq!(report.samples.len(), 1);
    assert_eq!(report.samples[0].client_name, "phone");
    assert_eq!(report.samples[0].rx_delta, 524_288);
    assert_eq!(report.samples[0].tx_delta, 0);
    assert_eq!(store.samples(), report.samples);

    let snapshot = subscriber.try_recv().expect("snapshot delivered");
    assert_eq!(snapshot.total, 1);
    let peer = &snapshot.connected[0];
    assert_eq!(peer.name, "phone");
    assert_eq!(peer.virtual_ip, "10.6.0.2");
    assert_eq!(peer.bytes_received, "1.00 MB");
    assert_eq!(peer.rx_bytes, 1_048_576);
    assert!(!peer.connected);
    assert_eq!(peer.last_seen, "offline");
    assert_eq!(poller.state(), PollerState::Idle);
}

#[tokio::test]
async fn test_recent_handshake_is_connected() {
    let dir = conf_dir(&[("laptop", "10.6.0.3")]);
    let handshake = chrono::Utc::now().timestamp() - 600;
    let raw = peer_line("10.6.0.3/32", handshake, 10, 20);

    let mut poller = Poller::new(
        config_for(&dir),
        FixedSource::new(raw),
        Arc::new(MemoryStore::new()),
        Broadcaster::default(),
    );
    let report = poller.run_cycle().await;

    let peer = &report.snapshot.connected[0];
    assert!(peer.connected);
    assert_eq!(peer.last_seen, "10m ago");
    assert_eq!(report.snapshot.online_count(), 1);
}

#[tokio::test]
async fn test_unresolved_identity_uses_virtual_ip() {
    let dir = conf_dir(&[]);
    let raw = peer_line("10.6.0.50/32", 0, 1, 1);

    let mut poller = Poller::new(
        config_for(&dir),
        FixedSource::new(raw),
        Arc::new(MemoryStore::new()),
        Broadcaster::default(),
    );
    let report = poller.run_cycle().await;

    assert_eq!(report.snapshot.connected[0].name, "10.6.0.50");
    assert_eq!(report.samples[0].client_name, "10.6.0.50");
    assert!(report
        .issues
        .iter()
        .any(|e| e.kind() == ErrorKind::IdentityUnresolved));
}

#[tokio::test]
async fn test_source_failure_still_publishes_empty_snapshot() {
    let dir = conf_dir(&[("phone", "10.6.0.2"), ("laptop", "10.6.0.3")]);
    let broadcaster = Broadcaster::default();
    let mut subscriber = broadcaster.subscribe();

    let mut poller = Poller::new(
        config_for(&dir),
        FixedSource::unavailable(),
        Arc::new(MemoryStore::new()),
        broadcaster.clone(),
    );
    let report = poller.run_cycle().await;

    assert!(report.samples.is_empty());
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].kind(), ErrorKind::SourceUnavailable);

    let snapshot = subscriber.try_recv().expect("degraded cycle still publishes");
    assert!(snapshot.connected.is_empty());
    assert_eq!(snapshot.total, 2);
}

#[tokio::test]
async fn test_counter_regression_reported_and_clamped() {
    let dir = conf_dir(&[("phone", "10.6.0.2")]);
    let raw = peer_line("10.6.0.2/32", 0, 100, 100);

    let mut poller = Poller::new(
        config_for(&dir),
        FixedSource::new(raw),
        Arc::new(MemoryStore::new()),
        Broadcaster::default(),
    );
    poller.tracker_mut().seed("phone", 9_000, 50);

    let report = poller.run_cycle().await;
    assert_eq!(report.samples[0].rx_delta, 0);
    assert_eq!(report.samples[0].tx_delta, 50);
    assert!(report
        .issues
        .iter()
        .any(|e| e.kind() == ErrorKind::CounterRegression));

    // Same totals again: nothing new
    let report = poller.run_cycle().await;
    assert_eq!(report.samples[0].rx_delta, 0);
    assert_eq!(report.samples[0].tx_delta, 0);
}

#[tokio::test]
async fn test_failing_store_is_retried_then_skipped() {
    let dir = conf_dir(&[("phone", "10.6.0.2")]);
    let store = Arc::new(FailingStore {
        attempts: AtomicUsize::new(0),
    });
    let broadcaster = Broadcaster::default();
    let mut subscriber = broadcaster.subscribe();

    let mut poller = Poller::new(
        config_for(&dir),
        FixedSource::new(peer_line("10.6.0.2/32", 0, 1, 1)),
        store.clone(),
        broadcaster.clone(),
    );
    let report = poller.run_cycle().await;

    assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
    assert!(report
        .issues
        .iter()
        .any(|e| e.kind() == ErrorKind::Persistence));
    assert!(subscriber.try_recv().is_some());
}

#[tokio::test]
async fn test_slow_store_does_not_stall_cycle() {
    let dir = conf_dir(&[("phone", "10.6.0.2")]);
    let broadcaster = Broadcaster::default();
    let mut subscriber = broadcaster.subscribe();

    let mut poller = Poller::new(
        PollerConfig {
            store_timeout: Duration::from_millis(50),
            ..config_for(&dir)
        },
        FixedSource::new(peer_line("10.6.0.2/32", 0, 1, 1)),
        Arc::new(SlowStore),
        broadcaster.clone(),
    );

    let report = tokio::time::timeout(Duration::from_millis(300), poller.run_cycle())
        .await
        .expect("cycle bounded by the store timeout");

    assert!(report
        .issues
        .iter()
        .any(|e| e.kind() == ErrorKind::Persistence));
    assert!(subscriber.try_recv().is_some());
}

#[tokio::test]
async fn test_spawned_loop_publishes_and_stops() {
    let dir = conf_dir(&[("phone", "10.6.0.2")]);
    let broadcaster = Broadcaster::default();
    let mut subscriber = broadcaster.subscribe();

    let poller = Poller::new(
        config_for(&dir),
        FixedSource::new(peer_line("10.6.0.2/32", 0, 1, 1)),
        Arc::new(MemoryStore::new()),
        broadcaster.clone(),
    );
    let handle = poller.spawn();
    let latest = handle.latest();

    for _ in 0..2 {
        let snapshot = tokio::time::timeout(Duration::from_secs(2), subscriber.recv())
            .await
            .expect("cycle within cadence")
            .expect("subscriber still registered");
        assert_eq!(snapshot.connected.len(), 1);
    }
    assert!(latest.borrow().ts > 0);

    tokio::time::timeout(Duration::from_secs(1), handle.stop())
        .await
        .expect("stop observed at the next cycle boundary");
}

#[tokio::test]
async fn test_stop_mid_cycle_within_one_interval() {
    let dir = conf_dir(&[("phone", "10.6.0.2")]);
    let broadcaster = Broadcaster::default();
    let mut subscriber = broadcaster.subscribe();

    let poller = Poller::new(
        PollerConfig {
            interval: Duration::from_secs(1),
            store_timeout: Duration::from_millis(400),
            store_retries: 1,
            ..config_for(&dir)
        },
        SlowSource {
            delay: Duration::from_millis(750),
            raw: peer_line("10.6.0.2/32", 0, 1, 1),
        },
        Arc::new(FlakyStore {
            delay: Duration::from_millis(380),
        }),
        broadcaster.clone(),
    );
    let handle = poller.spawn();

    // First tick fires at once, so the cycle is in its fetch by now
    tokio::time::sleep(Duration::from_millis(20)).await;
    let started = std::time::Instant::now();
    tokio::time::timeout(Duration::from_millis(500), handle.stop())
        .await
        .expect("in-flight cycle abandoned on stop");

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(subscriber.try_recv().is_none());
}

#[tokio::test]
async fn test_dropping_shutdown_sender_ends_loop() {
    let dir = conf_dir(&[]);
    let poller = Poller::new(
        config_for(&dir),
        FixedSource::unavailable(),
        Arc::new(MemoryStore::new()),
        Broadcaster::default(),
    );

    let (tx, rx) = tokio::sync::broadcast::channel(1);
    let task = tokio::spawn(poller.run(rx));
    drop(tx);

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("loop exits once the signal source is gone")
        .unwrap();
}
