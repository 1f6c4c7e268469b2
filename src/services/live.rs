//! Live dashboard plumbing: a change-signal hub for websocket sessions and
//! per-route request statistics.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::utils::helpers::round2;

const CHANNEL_BUFFER: usize = 64;

/// What changed; dashboard sessions react by pushing fresh metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveUpdate {
    Reservation,
    Checkin,
}

#[derive(Debug)]
pub struct LiveMetricsHub {
    sender: broadcast::Sender<LiveUpdate>,
}

impl Default for LiveMetricsHub {
    fn default() -> Self {
        let (sender, _rx) = broadcast::channel(CHANNEL_BUFFER);
        Self { sender }
    }
}

impl LiveMetricsHub {
    pub fn subscribe(&self) -> broadcast::Receiver<LiveUpdate> {
        self.sender.subscribe()
    }

    pub fn publish(&self, update: LiveUpdate) {
        let _ = self.sender.send(update);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RouteStats {
    requests: u64,
    successes: u64,
    total_ms: f64,
}

/// Latency and success counters keyed by route
#[derive(Debug, Default)]
pub struct RequestMetrics {
    routes: Mutex<HashMap<String, RouteStats>>,
}

impl RequestMetrics {
    pub fn record(&self, route: &str, duration_ms: f64, success: bool) {
        let Ok(mut routes) = self.routes.lock() else {
            return;
        };
        let stats = routes.entry(route.to_string()).or_default();
        stats.requests += 1;
        stats.total_ms += duration_ms;
        if success {
            stats.successes += 1;
        }
    }

    /// `<route>_avg_ms` and `<route>_success_rate` for every route seen so far
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        let Ok(routes) = self.routes.lock() else {
            return BTreeMap::new();
        };

        let mut out = BTreeMap::new();
        for (route, stats) in routes.iter().filter(|(_, s)| s.requests > 0) {
            let requests = stats.requests as f64;
            out.insert(format!("{}_avg_ms", route), round2(stats.total_ms / requests));
            out.insert(format!("{}_success_rate", route), round2(stats.successes as f64 / requests * 100.0));
        }
        out
    }

    pub fn total_requests(&self) -> u64 {
        self.routes
            .lock()
            .map(|routes| routes.values().map(|s| s.requests).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_averages_and_rates() {
        let metrics = RequestMetrics::default();
        metrics.record("api_events", 10.0, true);
        metrics.record("api_events", 30.0, false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.get("api_events_avg_ms"), Some(&20.0));
        assert_eq!(snapshot.get("api_events_success_rate"), Some(&50.0));
        assert_eq!(metrics.total_requests(), 2);
    }

    #[tokio::test]
    async fn test_hub_delivers_updates() {
        let hub = LiveMetricsHub::default();
        let mut rx = hub.subscribe();
        hub.publish(LiveUpdate::Checkin);
        assert_eq!(rx.recv().await.unwrap(), LiveUpdate::Checkin);
    }
}
