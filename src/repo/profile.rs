//! Opt-in timing counters for building and dispatching.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A snapshot of repository profiling metrics.
///
/// Profiling is enabled via the `SOMBRA_PROFILE` environment variable and
/// tracks time spent realizing interfaces and dispatching calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepoProfileSnapshot {
    /// Total nanoseconds spent building proxies.
    pub build_ns: u64,
    /// Number of proxies built.
    pub build_count: u64,
    /// Total nanoseconds spent parsing and checking methods at build time.
    pub parse_ns: u64,
    /// Number of methods checked.
    pub parse_count: u64,
    /// Total nanoseconds spent inside the execution engine.
    pub execute_ns: u64,
    /// Number of engine executions.
    pub execute_count: u64,
    /// Total nanoseconds spent converting results.
    pub convert_ns: u64,
    /// Number of result conversions.
    pub convert_count: u64,
}

#[derive(Default)]
struct RepoProfileCounters {
    build_ns: AtomicU64,
    build_count: AtomicU64,
    parse_ns: AtomicU64,
    parse_count: AtomicU64,
    execute_ns: AtomicU64,
    execute_count: AtomicU64,
    convert_ns: AtomicU64,
    convert_count: AtomicU64,
}

impl RepoProfileCounters {
    fn record(&self, kind: RepoProfileKind, nanos: u64) {
        let (ns, count) = match kind {
            RepoProfileKind::Build => (&self.build_ns, &self.build_count),
            RepoProfileKind::Parse => (&self.parse_ns, &self.parse_count),
            RepoProfileKind::Execute => (&self.execute_ns, &self.execute_count),
            RepoProfileKind::Convert => (&self.convert_ns, &self.convert_count),
        };
        ns.fetch_add(nanos, Ordering::Relaxed);
        count.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, reset: bool) -> RepoProfileSnapshot {
        let load = |counter: &AtomicU64| {
            if reset {
                counter.swap(0, Ordering::Relaxed)
            } else {
                counter.load(Ordering::Relaxed)
            }
        };
        RepoProfileSnapshot {
            build_ns: load(&self.build_ns),
            build_count: load(&self.build_count),
            parse_ns: load(&self.parse_ns),
            parse_count: load(&self.parse_count),
            execute_ns: load(&self.execute_ns),
            execute_count: load(&self.execute_count),
            convert_ns: load(&self.convert_ns),
            convert_count: load(&self.convert_count),
        }
    }
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<RepoProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("SOMBRA_PROFILE").is_some())
}

fn counters() -> Option<&'static RepoProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(RepoProfileCounters::default))
}

pub(crate) fn profile_timer() -> Option<Instant> {
    profiling_enabled().then(Instant::now)
}

pub(crate) enum RepoProfileKind {
    Build,
    Parse,
    Execute,
    Convert,
}

pub(crate) fn record_profile_timer(kind: RepoProfileKind, start: Option<Instant>) {
    let Some(start) = start else {
        return;
    };
    let Some(counters) = counters() else {
        return;
    };
    let nanos = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
    counters.record(kind, nanos);
}

/// Retrieves a snapshot of current repository profiling metrics.
///
/// Returns `None` when `SOMBRA_PROFILE` is unset. With `reset`, counters are
/// zeroed after reading.
///
/// ```no_run
/// use sombra_repo::repo::profile::profile_snapshot;
///
/// if let Some(snapshot) = profile_snapshot(false) {
///     println!("executions: {}", snapshot.execute_count);
/// }
/// ```
pub fn profile_snapshot(reset: bool) -> Option<RepoProfileSnapshot> {
    counters().map(|counters| counters.snapshot(reset))
}
