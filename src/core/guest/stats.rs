// src/core/guest/stats.rs

//! Per-guest usage-stats ring buffer: a 5s poller fills it, and
//! `GET /api/vm/:id/stats` reads back the last hour of samples.

use crate::core::guest::model::UsageSample;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

/// 720 samples at a 5s interval = 1 hour.
pub const RING_CAPACITY: usize = 720;

#[derive(Default)]
pub struct UsageStatsStore {
    rings: DashMap<u32, Mutex<VecDeque<UsageSample>>>,
}

impl UsageStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, guest_id: u32, sample: UsageSample) {
        let ring = self.rings.entry(guest_id).or_insert_with(|| Mutex::new(VecDeque::with_capacity(RING_CAPACITY)));
        let mut ring = ring.lock().unwrap();
        if ring.len() == RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(sample);
    }

    pub fn samples(&self, guest_id: u32) -> Vec<UsageSample> {
        self.rings
            .get(&guest_id)
            .map(|r| r.lock().unwrap().iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn forget(&self, guest_id: u32) {
        self.rings.remove(&guest_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: i64) -> UsageSample {
        UsageSample { ts, cpu_pct: 1.0, mem_bytes: 1024, rx_bytes: 0, tx_bytes: 0 }
    }

    #[test]
    fn ring_evicts_oldest_beyond_capacity() {
        let store = UsageStatsStore::new();
        for i in 0..RING_CAPACITY + 10 {
            store.record(1, sample(i as i64));
        }
        let samples = store.samples(1);
        assert_eq!(samples.len(), RING_CAPACITY);
        assert_eq!(samples.first().unwrap().ts, 10);
    }

    #[test]
    fn forget_drops_the_ring() {
        let store = UsageStatsStore::new();
        store.record(2, sample(0));
        store.forget(2);
        assert!(store.samples(2).is_empty());
    }
}
