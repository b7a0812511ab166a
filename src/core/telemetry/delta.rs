use std::collections::HashMap;

/// Traffic delta for one client between two consecutive readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub rx: u64,
    pub tx: u64,
    /// Either counter went backwards (interface restart, key rotation)
    pub regressed: bool,
}

/// Per-client cumulative counter accounting.
///
/// Owned by the poll loop; nothing else mutates it.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    last_totals: HashMap<String, (u64, u64)>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, client_name: &str, rx_total: u64, tx_total: u64) -> (u64, u64) {
        let delta = self.observe(client_name, rx_total, tx_total);
        (delta.rx, delta.tx)
    }

    /// Record a reading and return the clamped increase since the last one.
    ///
    /// First sighting of a client yields zero. The stored totals always move
    /// to the current reading, so a regression only costs one sample.
    pub fn observe(&mut self, client_name: &str, rx_total: u64, tx_total: u64) -> CounterDelta {
        let (prev_rx, prev_tx) = self
            .last_totals
            .insert(client_name.to_string(), (rx_total, tx_total))
            .unwrap_or((rx_total, tx_total));

        CounterDelta {
            rx: rx_total.saturating_sub(prev_rx),
            tx: tx_total.saturating_sub(prev_tx),
            regressed: rx_total < prev_rx || tx_total < prev_tx,
        }
    }

    pub fn last_totals(&self, client_name: &str) -> Option<(u64, u64)> {
        self.last_totals.get(client_name).copied()
    }

    /// Seed a prior reading, e.g. the last totals persisted before a restart
    pub fn seed(&mut self, client_name: &str, rx_total: u64, tx_total: u64) {
        self.last_totals
            .insert(client_name.to_string(), (rx_total, tx_total));
    }

    pub fn len(&self) -> usize {
        self.last_totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_totals.is_empty()
    }
}
