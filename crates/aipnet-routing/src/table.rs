//! Concurrent routing table (spec §4.7): RCU-style snapshot reads over a
//! single-mutex write path. Readers lock only long enough to clone the
//! current `Arc<Snapshot>`, then traverse their clone lock-free; writers
//! build the next snapshot under the same mutex and publish it with a
//! single pointer swap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use aipnet_frame::header::NodeId;

use crate::resolver::{score, top_k, CandidateMetrics, Weights};
use crate::sad::Sad;

/// Default time-to-live for a route entry with no refresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub node_id: NodeId,
    pub sad: Sad,
    pub latency_us: u32,
    pub load_factor: f32,
    pub region: u16,
    pub expires_at: Instant,
}

impl RouteEntry {
    pub fn new(node_id: NodeId, sad: Sad, region: u16) -> Self {
        Self {
            node_id,
            sad,
            latency_us: 0,
            load_factor: 0.0,
            region,
            expires_at: Instant::now() + DEFAULT_TTL,
        }
    }
}

#[derive(Serialize)]
struct ExportEntry {
    node_id: String,
    latency_us: u32,
    load_factor: f32,
    region: u16,
}

type Snapshot = HashMap<NodeId, RouteEntry>;

/// Concurrent routing table. `resolve` is a full scan scored against the
/// query (spec §4.7: acceptable at 100K entries since scoring is small).
pub struct RoutingTable {
    current: Mutex<Arc<Snapshot>>,
    weights: Weights,
    lookups: AtomicU64,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::with_weights(Weights::default())
    }

    pub fn with_weights(weights: Weights) -> Self {
        Self {
            current: Mutex::new(Arc::new(HashMap::new())),
            weights,
            lookups: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.current.lock().clone()
    }

    /// Insert or replace an entry. Builds the next snapshot and publishes it.
    pub fn insert(&self, entry: RouteEntry) {
        let mut guard = self.current.lock();
        let mut next = (**guard).clone();
        next.insert(entry.node_id, entry);
        *guard = Arc::new(next);
    }

    pub fn remove(&self, node_id: &NodeId) {
        let mut guard = self.current.lock();
        if guard.contains_key(node_id) {
            let mut next = (**guard).clone();
            next.remove(node_id);
            *guard = Arc::new(next);
        }
    }

    /// Update measured metrics for an existing entry and refresh its TTL.
    pub fn update_metrics(&self, node_id: &NodeId, latency_us: u32, load_factor: f32) -> bool {
        let mut guard = self.current.lock();
        if !guard.contains_key(node_id) {
            return false;
        }
        let mut next = (**guard).clone();
        if let Some(entry) = next.get_mut(node_id) {
            entry.latency_us = latency_us;
            entry.load_factor = load_factor;
            entry.expires_at = Instant::now() + DEFAULT_TTL;
        }
        *guard = Arc::new(next);
        true
    }

    /// Evict entries whose TTL has lapsed. Call from a background task.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.current.lock();
        let before = guard.len();
        let next: Snapshot = guard.iter().filter(|(_, e)| e.expires_at > now).map(|(k, v)| (*k, v.clone())).collect();
        let evicted = before - next.len();
        if evicted > 0 {
            *guard = Arc::new(next);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait-free read: clone the `Arc` and score every candidate against
    /// `query`, returning up to `max_results` ordered by descending score
    /// (spec §4.6 "Top-K selection").
    pub fn resolve(&self, query: &Sad, max_results: usize) -> Vec<NodeId> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let snapshot = self.snapshot();

        let scored: Vec<(NodeId, f64, u32)> = snapshot
            .values()
            .map(|entry| {
                let metrics = CandidateMetrics { latency_us: entry.latency_us, region: entry.region };
                let s = score(query, &entry.sad, &metrics, &self.weights);
                (entry.node_id, s, entry.latency_us)
            })
            .collect();

        let ids: Vec<([u8; 16], f64, u32, [u8; 16])> =
            scored.iter().map(|(id, s, lat)| (id.0, *s, *lat, id.0)).collect();

        top_k(
            ids.iter().map(|(id, s, lat, key)| (id, *s, *lat, key.as_slice())),
            max_results,
        )
        .into_iter()
        .map(|bytes| NodeId(*bytes))
        .collect()
    }

    /// Lookup by node id, O(1) average.
    pub fn get(&self, node_id: &NodeId) -> Option<RouteEntry> {
        self.snapshot().get(node_id).cloned()
    }

    /// JSON dump for observability (spec §4.7 `export_json`).
    pub fn export_json(&self) -> String {
        let snapshot = self.snapshot();
        let entries: Vec<ExportEntry> = snapshot
            .values()
            .map(|e| ExportEntry {
                node_id: hex(&e.node_id.0),
                latency_us: e.latency_us,
                load_factor: e.load_factor,
                region: e.region,
            })
            .collect();
        serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_string())
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sad::FieldType;

    fn node(n: u8) -> NodeId {
        let mut bytes = [0u8; 16];
        bytes[15] = n;
        NodeId(bytes)
    }

    #[test]
    fn insert_then_get_round_trips() {
        let table = RoutingTable::new();
        let entry = RouteEntry::new(node(1), Sad::wildcard(), 0);
        table.insert(entry);
        assert!(table.get(&node(1)).is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_drops_entry() {
        let table = RoutingTable::new();
        table.insert(RouteEntry::new(node(1), Sad::wildcard(), 0));
        table.remove(&node(1));
        assert!(table.get(&node(1)).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn update_metrics_affects_resolve_order() {
        let table = RoutingTable::new();
        table.insert(RouteEntry::new(node(1), Sad::wildcard(), 0));
        table.insert(RouteEntry::new(node(2), Sad::wildcard(), 0));
        table.update_metrics(&node(1), 5_000, 0.1);
        table.update_metrics(&node(2), 50_000, 0.1);

        let query = Sad::wildcard().with_u32(FieldType::MaxLatencyMs, 100);
        let results = table.resolve(&query, 2);
        assert_eq!(results[0], node(1));
    }

    #[test]
    fn resolve_excludes_disqualified_candidates() {
        let table = RoutingTable::new();
        table.insert(RouteEntry::new(node(1), Sad::wildcard().with_u32(FieldType::ModelArch, 1), 0));
        table.insert(RouteEntry::new(node(2), Sad::wildcard().with_u32(FieldType::ModelArch, 2), 0));

        let query = Sad::wildcard().with_u32(FieldType::ModelArch, 1);
        let results = table.resolve(&query, 10);
        assert_eq!(results, vec![node(1)]);
    }

    #[test]
    fn reader_snapshot_unaffected_by_concurrent_insert() {
        let table = RoutingTable::new();
        table.insert(RouteEntry::new(node(1), Sad::wildcard(), 0));
        let snapshot = table.snapshot();
        table.insert(RouteEntry::new(node(2), Sad::wildcard(), 0));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(table.snapshot().len(), 2);
    }

    #[test]
    fn export_json_contains_hex_node_id() {
        let table = RoutingTable::new();
        table.insert(RouteEntry::new(node(0xAB), Sad::wildcard(), 0));
        let json = table.export_json();
        assert!(json.contains("ab"));
    }
}
