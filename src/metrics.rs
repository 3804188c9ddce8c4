//! Resolution telemetry: the sink contract and a bundled in-memory collector.
//!
//! The engine reports one [`ResolutionEvent`] per successful resolution to
//! an optional [`MetricsSink`]. Reporting is best-effort: a sink that errors
//! or panics is logged at `debug` and otherwise ignored.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

/// How a resolution was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionStrategy {
    /// Served from the singleton or scoped tier.
    CacheHit,
    /// Produced by a registered factory closure.
    Factory,
    /// Built from a bound class.
    Constructor,
    /// Built from a class with no binding.
    Autowire,
}

impl ResolutionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionStrategy::CacheHit => "cache_hit",
            ResolutionStrategy::Factory => "factory",
            ResolutionStrategy::Constructor => "constructor",
            ResolutionStrategy::Autowire => "autowire",
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionEvent {
    pub service_id: String,
    pub duration: Duration,
    pub strategy: ResolutionStrategy,
}

impl ResolutionEvent {
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// Failure reported by a sink. Never surfaces to resolution callers.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics sink unavailable: {0}")]
    Unavailable(String),
    #[error("metrics sink rejected event: {0}")]
    Rejected(String),
}

/// Receiver for resolution telemetry.
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: &ResolutionEvent) -> Result<(), MetricsError>;
}

impl<F> MetricsSink for F
where
    F: Fn(&ResolutionEvent) -> Result<(), MetricsError> + Send + Sync,
{
    fn record(&self, event: &ResolutionEvent) -> Result<(), MetricsError> {
        self(event)
    }
}

const RECENT_SAMPLES: usize = 100;

#[derive(Debug, Clone)]
pub struct TimingStats {
    /// Total number of resolutions
    pub count: u64,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub total_duration: Duration,
    /// Most recent samples, for percentiles
    pub recent_times: Vec<Duration>,
}

impl TimingStats {
    fn new() -> Self {
        Self {
            count: 0,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            total_duration: Duration::ZERO,
            recent_times: Vec::with_capacity(RECENT_SAMPLES),
        }
    }

    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.total_duration += duration;

        if self.recent_times.len() >= RECENT_SAMPLES {
            self.recent_times.remove(0);
        }
        self.recent_times.push(duration);
    }

    pub fn average_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            let nanos = self.total_duration.as_nanos() / u128::from(self.count);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }

    /// 95th percentile over the recent samples.
    pub fn p95_duration(&self) -> Duration {
        if self.recent_times.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted = self.recent_times.clone();
        sorted.sort();
        let index = (sorted.len() as f64 * 0.95) as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}

#[derive(Debug, Clone)]
pub struct SystemMetrics {
    pub start_time: SystemTime,
    pub total_resolutions: u64,
    pub cache_hits: u64,
    pub scopes_created: u64,
    pub active_scopes: u64,
}

/// In-memory [`MetricsSink`] with per-service timings and Prometheus export.
///
/// Installed with `ContainerBuilder::with_metrics`, which also counts scope
/// begin/end calls and exposes the collector through `Container::metrics`.
#[derive(Debug)]
pub struct MetricsCollector {
    resolution_times: RwLock<HashMap<String, TimingStats>>,
    strategies: RwLock<HashMap<ResolutionStrategy, u64>>,
    system_metrics: Mutex<SystemMetrics>,
    counters: RwLock<HashMap<String, u64>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            resolution_times: RwLock::new(HashMap::new()),
            strategies: RwLock::new(HashMap::new()),
            system_metrics: Mutex::new(SystemMetrics {
                start_time: SystemTime::now(),
                total_resolutions: 0,
                cache_hits: 0,
                scopes_created: 0,
                active_scopes: 0,
            }),
            counters: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_resolution(&self, service_id: &str, strategy: ResolutionStrategy, duration: Duration) {
        self.resolution_times
            .write()
            .entry(service_id.to_string())
            .or_insert_with(TimingStats::new)
            .record(duration);
        *self.strategies.write().entry(strategy).or_insert(0) += 1;

        let mut system = self.system_metrics.lock();
        system.total_resolutions += 1;
        if strategy == ResolutionStrategy::CacheHit {
            system.cache_hits += 1;
        }
    }

    pub fn record_scope_created(&self) {
        let mut system = self.system_metrics.lock();
        system.scopes_created += 1;
        system.active_scopes += 1;
    }

    pub fn record_scope_ended(&self) {
        let mut system = self.system_metrics.lock();
        system.active_scopes = system.active_scopes.saturating_sub(1);
    }

    pub fn increment_counter(&self, name: &str) {
        *self.counters.write().entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn get_timing_stats(&self, service_id: &str) -> Option<TimingStats> {
        self.resolution_times.read().get(service_id).cloned()
    }

    pub fn strategy_count(&self, strategy: ResolutionStrategy) -> u64 {
        self.strategies.read().get(&strategy).copied().unwrap_or(0)
    }

    pub fn get_system_metrics(&self) -> SystemMetrics {
        self.system_metrics.lock().clone()
    }

    pub fn get_counters(&self) -> HashMap<String, u64> {
        self.counters.read().clone()
    }

    /// Services with the highest average resolution time.
    pub fn get_slowest_services(&self, limit: usize) -> Vec<(String, Duration)> {
        let mut services: Vec<_> = self
            .resolution_times
            .read()
            .iter()
            .map(|(id, stats)| (id.clone(), stats.average_duration()))
            .collect();
        services.sort_by(|a, b| b.1.cmp(&a.1));
        services.truncate(limit);
        services
    }

    /// Metrics in the Prometheus text exposition format.
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();
        let system = self.get_system_metrics();

        output.push_str(&format!(
            "# HELP resolvit_total_resolutions Total number of service resolutions\n\
            # TYPE resolvit_total_resolutions counter\n\
            resolvit_total_resolutions {}\n\n",
            system.total_resolutions
        ));
        output.push_str(&format!(
            "# HELP resolvit_active_scopes Current number of active scopes\n\
            # TYPE resolvit_active_scopes gauge\n\
            resolvit_active_scopes {}\n\n",
            system.active_scopes
        ));

        output.push_str(
            "# HELP resolvit_resolutions_by_strategy Resolutions per strategy\n\
            # TYPE resolvit_resolutions_by_strategy counter\n",
        );
        let mut strategies: Vec<_> = self.strategies.read().iter().map(|(s, n)| (*s, *n)).collect();
        strategies.sort_by_key(|(s, _)| s.as_str());
        for (strategy, count) in strategies {
            output.push_str(&format!(
                "resolvit_resolutions_by_strategy{{strategy=\"{}\"}} {}\n",
                strategy, count
            ));
        }
        output.push('\n');

        output.push_str(
            "# HELP resolvit_resolution_duration_seconds Time spent resolving services\n\
            # TYPE resolvit_resolution_duration_seconds summary\n",
        );
        let times = self.resolution_times.read();
        let mut ids: Vec<_> = times.keys().collect();
        ids.sort();
        for id in ids {
            let stats = &times[id];
            output.push_str(&format!(
                "resolvit_resolution_duration_seconds_sum{{service=\"{}\"}} {}\n\
                resolvit_resolution_duration_seconds_count{{service=\"{}\"}} {}\n",
                id,
                stats.total_duration.as_secs_f64(),
                id,
                stats.count
            ));
        }
        output.push('\n');

        for (name, value) in self.counters.read().iter() {
            output.push_str(&format!(
                "# HELP resolvit_{name} Custom counter\n\
                # TYPE resolvit_{name} counter\n\
                resolvit_{name} {value}\n\n",
            ));
        }

        output
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for MetricsCollector {
    fn record(&self, event: &ResolutionEvent) -> Result<(), MetricsError> {
        self.record_resolution(&event.service_id, event.strategy, event.duration);
        Ok(())
    }
}
