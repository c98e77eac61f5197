//! Worker pool that runs execution units.
//!
//! Wraps [`rayon::ThreadPool`]: every unit of a launch becomes one task, and
//! the pool keeps counters of units run and time spent in them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;

/// Configuration for [`CorePool`].
#[derive(Debug, Clone)]
pub struct CorePoolConfig {
    /// Number of worker threads. Defaults to the number of available CPUs.
    pub num_threads: usize,
    /// Prefix for worker thread names.
    pub name_prefix: String,
}

impl Default for CorePoolConfig {
    fn default() -> Self {
        Self { num_threads: num_cpus::get().max(1), name_prefix: "aicore-unit".to_string() }
    }
}

impl CorePoolConfig {
    /// Enough threads for `units` execution units, capped at the host's CPUs.
    pub fn for_units(units: usize) -> Self {
        let mut config = Self::default();
        config.num_threads = units.clamp(1, config.num_threads);
        config
    }
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorePoolMetrics {
    /// Units currently executing.
    pub active_units: usize,
    /// Units completed since the pool was created.
    pub units_completed: u64,
    /// Launches submitted since the pool was created.
    pub launches: u64,
    /// Fraction of thread time spent inside units, `[0.0, 1.0]`.
    pub utilization: f64,
}

#[derive(Debug)]
struct MetricsInner {
    active: AtomicUsize,
    completed: AtomicU64,
    launches: AtomicU64,
    busy_ns: AtomicU64,
    wall_start: Instant,
    num_threads: usize,
}

impl MetricsInner {
    fn new(num_threads: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            launches: AtomicU64::new(0),
            busy_ns: AtomicU64::new(0),
            wall_start: Instant::now(),
            num_threads,
        }
    }

    fn snapshot(&self) -> CorePoolMetrics {
        let wall_ns = self.wall_start.elapsed().as_nanos().max(1) as f64;
        let busy = self.busy_ns.load(Ordering::Relaxed) as f64;
        let capacity = wall_ns * self.num_threads as f64;
        CorePoolMetrics {
            active_units: self.active.load(Ordering::Relaxed),
            units_completed: self.completed.load(Ordering::Relaxed),
            launches: self.launches.load(Ordering::Relaxed),
            utilization: (busy / capacity).min(1.0),
        }
    }
}

/// Tracks one running unit in [`MetricsInner`].
struct UnitGuard<'m> {
    metrics: &'m MetricsInner,
    start: Instant,
}

impl<'m> UnitGuard<'m> {
    fn new(metrics: &'m MetricsInner) -> Self {
        metrics.active.fetch_add(1, Ordering::Relaxed);
        Self { metrics, start: Instant::now() }
    }
}

impl Drop for UnitGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_nanos() as u64;
        self.metrics.busy_ns.fetch_add(elapsed, Ordering::Relaxed);
        self.metrics.active.fetch_sub(1, Ordering::Relaxed);
        self.metrics.completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Thread pool that executes the units of a kernel launch.
pub struct CorePool {
    pool: rayon::ThreadPool,
    metrics: MetricsInner,
    config: CorePoolConfig,
}

impl std::fmt::Debug for CorePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorePool").field("config", &self.config).finish_non_exhaustive()
    }
}

impl CorePool {
    pub fn new(config: CorePoolConfig) -> Result<Self, rayon::ThreadPoolBuildError> {
        let prefix = config.name_prefix.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build()?;
        let metrics = MetricsInner::new(config.num_threads);
        Ok(Self { pool, metrics, config })
    }

    pub fn config(&self) -> &CorePoolConfig {
        &self.config
    }

    pub fn num_threads(&self) -> usize {
        self.config.num_threads
    }

    pub fn metrics(&self) -> CorePoolMetrics {
        self.metrics.snapshot()
    }

    /// Run `f(unit_id, work)` for every element of `work`, in parallel.
    ///
    /// Results come back in unit order. Units never wait on each other.
    pub fn run_units<W, R, F>(&self, work: Vec<W>, f: F) -> Vec<R>
    where
        W: Send,
        R: Send,
        F: Fn(usize, W) -> R + Send + Sync,
    {
        let metrics = &self.metrics;
        metrics.launches.fetch_add(1, Ordering::Relaxed);
        self.pool.install(|| {
            work.into_par_iter()
                .enumerate()
                .map(|(unit, item)| {
                    let _guard = UnitGuard::new(metrics);
                    f(unit, item)
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_are_in_unit_order() {
        let pool = CorePool::new(CorePoolConfig::for_units(4)).unwrap();
        let out = pool.run_units(vec![10, 20, 30, 40], |unit, v| unit * 1000 + v);
        assert_eq!(out, vec![10, 1020, 2030, 3040]);
    }

    #[test]
    fn units_get_exclusive_windows() {
        let pool = CorePool::new(CorePoolConfig::for_units(3)).unwrap();
        let mut buf = vec![0u32; 9];
        let windows: Vec<&mut [u32]> = buf.chunks_mut(3).collect();
        pool.run_units(windows, |unit, w| w.fill(unit as u32 + 1));
        assert_eq!(buf, vec![1, 1, 1, 2, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn metrics_count_units() {
        let pool = CorePool::new(CorePoolConfig::for_units(2)).unwrap();
        pool.run_units(vec![(); 5], |_, _| ());
        let m = pool.metrics();
        assert_eq!(m.units_completed, 5);
        assert_eq!(m.launches, 1);
        assert_eq!(m.active_units, 0);
        assert!((0.0..=1.0).contains(&m.utilization));
    }

    #[test]
    fn thread_names_use_prefix() {
        let pool = CorePool::new(CorePoolConfig { num_threads: 1, name_prefix: "unit".into() }).unwrap();
        let names = pool.run_units(vec![()], |_, _| std::thread::current().name().map(str::to_string));
        assert_eq!(names, vec![Some("unit-0".to_string())]);
    }

    #[test]
    fn for_units_caps_at_one() {
        assert_eq!(CorePoolConfig::for_units(0).num_threads, 1);
    }
}
