// Integration tests for concurrent subscriber registry use

use std::sync::Arc;
use std::thread;

use vpnpulse::core::telemetry::{Broadcaster, Snapshot};

const ROUNDS: usize = 500;

fn snapshot(ts: i64) -> Arc<Snapshot> {
    Arc::new(Snapshot {
        total: 0,
        connected: Vec::new(),
        ts,
    })
}

#[test]
fn test_unsubscribe_during_publish_keeps_others_fed() {
    let broadcaster = Broadcaster::new(ROUNDS + 1);
    let mut kept: Vec<_> = (0..8).map(|_| broadcaster.subscribe()).collect();
    let leaving: Vec<_> = (0..32).map(|_| broadcaster.subscribe()).collect();
    let leaving_ids: Vec<_> = leaving.iter().map(|s| s.id()).collect();

    let publisher = {
        let broadcaster = broadcaster.clone();
        thread::spawn(move || {
            for ts in 0..ROUNDS {
                broadcaster.publish(snapshot(ts as i64));
            }
        })
    };

    let remover = {
        let broadcaster = broadcaster.clone();
        thread::spawn(move || {
            for id in leaving_ids {
                broadcaster.unsubscribe(id);
                broadcaster.unsubscribe(id);
                thread::yield_now();
            }
        })
    };

    let churn = {
        let broadcaster = broadcaster.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                let sub = broadcaster.subscribe();
                broadcaster.unsubscribe(sub.id());
            }
        })
    };

    publisher.join().unwrap();
    remover.join().unwrap();
    churn.join().unwrap();
    drop(leaving);

    for sub in kept.iter_mut() {
        let mut received = Vec::new();
        while let Some(snap) = sub.try_recv() {
            received.push(snap.ts);
        }
        assert_eq!(received.len(), ROUNDS);
        assert!(received.windows(2).all(|w| w[0] < w[1]));
    }
    assert_eq!(broadcaster.subscriber_count(), kept.len());
}

#[test]
fn test_dropped_subscribers_pruned_on_next_publish() {
    let broadcaster = Broadcaster::new(4);
    let mut survivor = broadcaster.subscribe();
    for _ in 0..5 {
        drop(broadcaster.subscribe());
    }
    assert_eq!(broadcaster.subscriber_count(), 6);

    let report = broadcaster.publish(snapshot(1));

    assert_eq!(report.pruned, 5);
    assert_eq!(report.delivered, 1);
    assert_eq!(broadcaster.subscriber_count(), 1);
    assert_eq!(survivor.try_recv().unwrap().ts, 1);
}

#[tokio::test]
async fn test_unsubscribed_receiver_ends() {
    let broadcaster = Broadcaster::default();
    let mut sub = broadcaster.subscribe();
    broadcaster.publish(snapshot(3));
    broadcaster.unsubscribe(sub.id());

    assert_eq!(sub.recv().await.unwrap().ts, 3);
    assert!(sub.recv().await.is_none());
}
