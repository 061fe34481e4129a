//! Monitoring scheduler: recurring timer lines over a management host.
//!
//! Two kinds of line exist. The global line enumerates every pool the host
//! knows per tick. Single-target lines watch one named pool each and restart
//! it when it is found stopped. All lines share one snapshot builder and one
//! subscriber registry; every tick opens its own host handle and drops it
//! before fan-out.

use crate::error::{PoolwatchError, Result};
use crate::host::ManagementHost;
use crate::logging::Logger;
use crate::model::{PoolSnapshot, PoolStatus};
use crate::snapshot::SnapshotBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Polling interval used when the config does not say otherwise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

// granularity at which sleeping timer lines notice a stop request
const STOP_POLL_SLICE: Duration = Duration::from_millis(50);

/// Reaction to a single pool failing to resolve during a global tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TickPolicy {
    /// Abort the whole tick: one Error line, no batch emitted.
    FailFast,
    /// Log the failing pool, keep going, emit the partial batch.
    SkipFailed,
}

impl Default for TickPolicy {
    fn default() -> Self {
        TickPolicy::FailFast
    }
}

/// Receives every emitted batch, synchronously, in subscription order.
///
/// A failing consumer is logged and skipped for that batch; it stays
/// subscribed and cannot stop other consumers from receiving the batch.
pub trait SnapshotConsumer: Send + Sync {
    fn on_batch(&self, batch: &[PoolSnapshot]) -> Result<()>;

    /// Short name used in subscriber failure log lines.
    fn name(&self) -> &str {
        "consumer"
    }
}

/// Everything a timer thread needs to run ticks on its own.
struct TickContext {
    host: Arc<dyn ManagementHost>,
    builder: SnapshotBuilder,
    logger: Logger,
    subscribers: Mutex<Vec<Arc<dyn SnapshotConsumer>>>,
}

/// One armed recurring timer. Dropping the struct without `stop` would
/// detach the thread, so every owner stops it explicitly.
struct TimerLine {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TimerLine {
    /// Arms a recurring timer. The first tick fires after one full
    /// interval, matching plain timer semantics.
    fn spawn(interval: Duration, tick: impl Fn() + Send + 'static) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let thread = thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                if sleep_until_stop(interval, &stop_clone) {
                    break;
                }
                tick();
            }
        });
        Self {
            stop,
            thread: Some(thread),
        }
    }

    /// Disarms the line and waits for its thread. A tick already in flight
    /// completes; no further tick fires.
    fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Sleeps for `interval` in short slices. Returns true if a stop was
/// requested while sleeping.
fn sleep_until_stop(interval: Duration, stop: &AtomicBool) -> bool {
    let mut remaining = interval;
    while !remaining.is_zero() {
        let slice = remaining.min(STOP_POLL_SLICE);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
        if stop.load(Ordering::Relaxed) {
            return true;
        }
    }
    false
}

/// Timer-driven monitoring engine.
///
/// Control operations are expected from the application's control thread;
/// ticks always run on the timer threads. Stopping never interrupts a tick
/// in flight.
pub struct MonitoringScheduler {
    ctx: Arc<TickContext>,
    policy: TickPolicy,
    global: Mutex<Option<TimerLine>>,
    targets: Mutex<HashMap<String, TimerLine>>,
    monitored: Mutex<HashSet<String>>,
}

impl MonitoringScheduler {
    pub fn new(host: Arc<dyn ManagementHost>, builder: SnapshotBuilder, logger: Logger) -> Self {
        Self {
            ctx: Arc::new(TickContext {
                host,
                builder,
                logger,
                subscribers: Mutex::new(Vec::new()),
            }),
            policy: TickPolicy::default(),
            global: Mutex::new(None),
            targets: Mutex::new(HashMap::new()),
            monitored: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_policy(mut self, policy: TickPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> TickPolicy {
        self.policy
    }

    /// Registers a consumer. Takes effect from the next emitted batch.
    pub fn subscribe(&self, consumer: Arc<dyn SnapshotConsumer>) {
        let mut subscribers = self
            .ctx
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subscribers.push(consumer);
    }

    pub fn subscriber_count(&self) -> usize {
        self.ctx
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Arms the global line. Re-arming cancels the previous global line
    /// before the new interval takes over, so the two can never interleave.
    /// The swap holds the slot's lock end to end; a concurrent re-arm
    /// cannot drop a freshly armed line un-stopped.
    pub fn start_global(&self, interval: Duration) {
        let mut slot = self.global.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.take() {
            // tick closures never touch this slot, so joining here is safe
            previous.stop();
        }
        let ctx = Arc::clone(&self.ctx);
        let policy = self.policy;
        *slot = Some(TimerLine::spawn(interval, move || {
            run_global_tick(&ctx, policy)
        }));
        drop(slot);

        self.ctx.logger.info(format!(
            "Real-time monitoring started (every {}s).",
            interval.as_secs()
        ));
    }

    /// Disarms the global line. No effect when it is not running.
    pub fn stop_global(&self) {
        if let Some(line) = self.take_global() {
            line.stop();
            self.ctx.logger.info("Real-time monitoring stopped.");
        }
    }

    pub fn is_global_running(&self) -> bool {
        self.global
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Arms a single-target line for `name` and records the name as
    /// monitored. Arming the same name again replaces only that name's
    /// timer; distinct names run concurrently. The replacement happens
    /// under the map's lock, as in `start_global`.
    pub fn start_target(&self, name: &str, interval: Duration) {
        {
            let mut monitored = self.monitored.lock().unwrap_or_else(|e| e.into_inner());
            monitored.insert(name.to_string());
        }

        let mut targets = self.targets.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = targets.remove(name) {
            previous.stop();
        }
        let ctx = Arc::clone(&self.ctx);
        let target = name.to_string();
        let line = TimerLine::spawn(interval, move || run_target_tick(&ctx, &target));
        targets.insert(name.to_string(), line);
        drop(targets);

        self.ctx.logger.info(format!(
            "Monitoring started for application pool '{name}'."
        ));
    }

    /// Disarms one single-target line. Returns false when no line was
    /// running for the name. Monitored-set membership is kept either way.
    pub fn stop_target(&self, name: &str) -> bool {
        match self.take_target(name) {
            Some(line) => {
                line.stop();
                self.ctx.logger.info(format!(
                    "Monitoring stopped for application pool '{name}'."
                ));
                true
            }
            None => false,
        }
    }

    /// Disarms everything: the global line and every single-target line.
    pub fn stop_all(&self) {
        self.stop_global();
        let drained: Vec<(String, TimerLine)> = {
            let mut targets = self.targets.lock().unwrap_or_else(|e| e.into_inner());
            targets.drain().collect()
        };
        for (name, line) in drained {
            line.stop();
            self.ctx.logger.info(format!(
                "Monitoring stopped for application pool '{name}'."
            ));
        }
    }

    /// Names with a currently armed single-target line, sorted.
    pub fn active_targets(&self) -> Vec<String> {
        let targets = self.targets.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = targets.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every name that has ever been placed under single-target monitoring,
    /// sorted. Membership is additive; stopping a line does not remove it.
    pub fn monitored_targets(&self) -> Vec<String> {
        let monitored = self.monitored.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = monitored.iter().cloned().collect();
        names.sort();
        names
    }

    pub fn is_monitored(&self, name: &str) -> bool {
        let monitored = self.monitored.lock().unwrap_or_else(|e| e.into_inner());
        monitored.contains(name)
    }

    /// One enumeration pass outside any timer: same per-pool policy as a
    /// global tick, but the batch is returned instead of emitted.
    pub fn sample_once(&self) -> Result<Vec<PoolSnapshot>> {
        collect_global_batch(&self.ctx, self.policy)
    }

    fn take_global(&self) -> Option<TimerLine> {
        self.global.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn take_target(&self, name: &str) -> Option<TimerLine> {
        self.targets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
    }

    #[cfg(test)]
    fn tick_global_now(&self) {
        run_global_tick(&self.ctx, self.policy);
    }

    #[cfg(test)]
    fn tick_target_now(&self, name: &str) {
        run_target_tick(&self.ctx, name);
    }
}

impl Drop for MonitoringScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// One global tick: enumerate, describe and sample every pool, then emit.
/// Never propagates; a failed tick logs once and leaves the line armed.
fn run_global_tick(ctx: &TickContext, policy: TickPolicy) {
    match collect_global_batch(ctx, policy) {
        Ok(batch) => emit(ctx, &batch),
        Err(e) => ctx
            .logger
            .error(format!("Error during application pool monitoring: {e}")),
    }
}

fn collect_global_batch(ctx: &TickContext, policy: TickPolicy) -> Result<Vec<PoolSnapshot>> {
    let mut handle = ctx.host.connect()?;
    let names = handle.pool_names()?;

    let mut batch = Vec::with_capacity(names.len());
    for name in names {
        let failure = match handle.describe(&name) {
            Ok(Some(info)) => {
                batch.push(ctx.builder.build(&info));
                continue;
            }
            // enumerated a moment ago but gone now
            Ok(None) => PoolwatchError::PoolNotFound(name.clone()),
            Err(e) => e,
        };
        match policy {
            TickPolicy::FailFast => {
                return Err(PoolwatchError::Host(format!(
                    "failed to read pool '{name}': {failure}"
                )))
            }
            TickPolicy::SkipFailed => ctx
                .logger
                .error(format!("Skipping pool '{name}': {failure}")),
        }
    }
    Ok(batch)
}

/// One single-target tick: describe the named pool, restart it if stopped,
/// emit a one-element batch. Never propagates; the line keeps running.
fn run_target_tick(ctx: &TickContext, name: &str) {
    let mut handle = match ctx.host.connect() {
        Ok(handle) => handle,
        Err(e) => {
            ctx.logger
                .error(format!("Error monitoring application pool '{name}': {e}"));
            return;
        }
    };

    let info = match handle.describe(name) {
        Ok(Some(info)) => info,
        Ok(None) => {
            ctx.logger
                .error(format!("Application pool '{name}' not found."));
            return;
        }
        Err(e) => {
            ctx.logger
                .error(format!("Error monitoring application pool '{name}': {e}"));
            return;
        }
    };

    // the emitted snapshot carries the pre-recovery status
    let snapshot = ctx.builder.build(&info);

    if info.status == PoolStatus::Stopped {
        ctx.logger.warning(format!(
            "Application pool '{name}' is stopped. Attempting to start it."
        ));
        let started = handle.start_pool(name);
        ctx.logger.info(format!(
            "Start command issued for application pool '{name}'."
        ));
        if let Err(e) = started {
            ctx.logger.error(format!(
                "Start command for application pool '{name}' failed: {e}"
            ));
        }
    }

    drop(handle);
    emit(ctx, std::slice::from_ref(&snapshot));
}

/// Fans a batch out to a stable snapshot of the registry. A subscriber
/// error is logged and isolated to that subscriber.
fn emit(ctx: &TickContext, batch: &[PoolSnapshot]) {
    let subscribers: Vec<Arc<dyn SnapshotConsumer>> = {
        let guard = ctx.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    };
    for subscriber in subscribers {
        if let Err(e) = subscriber.on_batch(batch) {
            ctx.logger.error(format!(
                "Subscriber '{}' failed to consume batch: {e}",
                subscriber.name()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, LogStore, MemoryLogStore};
    use crate::sampler::ResourceSampler;
    use crate::test_utils::{running_pool, stopped_pool, CollectingSink, FailingSink, MockHost};

    fn scheduler_with(host: Arc<MockHost>) -> (MonitoringScheduler, Arc<MemoryLogStore>) {
        let store = Arc::new(MemoryLogStore::new());
        let logger = Logger::new(store.clone());
        let sampler =
            ResourceSampler::new(logger.clone()).with_window(Duration::from_millis(10));
        let builder = SnapshotBuilder::new(sampler).with_provenance("testhost", "1.0");
        let scheduler = MonitoringScheduler::new(host, builder, logger);
        (scheduler, store)
    }

    fn errors_in(store: &MemoryLogStore) -> Vec<String> {
        store
            .entries_with_level(LogLevel::Error)
            .unwrap()
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    // ==================== global tick ====================

    #[test]
    fn test_global_tick_emits_one_ordered_batch() {
        let host = Arc::new(MockHost::new());
        host.add_pool(running_pool("alpha", std::process::id() as i64));
        host.add_pool(stopped_pool("beta"));
        host.add_pool(running_pool("gamma", 999_999_999));
        let (scheduler, store) = scheduler_with(host);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());
        scheduler.tick_global_now();

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.len(), 3);
        let names: Vec<&str> = batch.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);

        // live worker sampled normally
        assert!(batch[0].memory_bytes > 0);
        // no worker resolves to all-zero without any error
        assert_eq!(batch[1].process_id, 0);
        assert_eq!(batch[1].memory_bytes, 0);
        // unresolvable worker degrades to zero with errors logged
        assert_eq!(batch[2].cpu_percent, 0.0);
        assert_eq!(batch[2].memory_bytes, 0);
        let errors = errors_in(&store);
        assert!(!errors.is_empty());
        assert!(errors.iter().all(|m| m.contains("999999999")));

        // captured_at never decreases within the batch
        assert!(batch[0].captured_at <= batch[1].captured_at);
        assert!(batch[1].captured_at <= batch[2].captured_at);
    }

    #[test]
    fn test_fail_fast_tick_aborts_without_batch() {
        let host = Arc::new(MockHost::new());
        host.add_pool(stopped_pool("first"));
        host.add_failing_pool("broken", "access denied");
        host.add_pool(stopped_pool("last"));
        let (scheduler, store) = scheduler_with(host);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());
        scheduler.tick_global_now();

        assert_eq!(sink.batch_count(), 0);
        let errors = errors_in(&store);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("broken"));
        assert!(errors[0].contains("access denied"));
    }

    #[test]
    fn test_skip_policy_emits_partial_batch() {
        let host = Arc::new(MockHost::new());
        host.add_pool(stopped_pool("first"));
        host.add_failing_pool("broken", "access denied");
        host.add_pool(stopped_pool("last"));
        let (scheduler, store) = scheduler_with(host);
        let scheduler = scheduler.with_policy(TickPolicy::SkipFailed);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());
        scheduler.tick_global_now();

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        let names: Vec<&str> = batches[0].iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "last"]);
        let errors = errors_in(&store);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("broken"));
    }

    #[test]
    fn test_unreachable_host_logs_and_emits_nothing() {
        let host = Arc::new(MockHost::new());
        host.set_connect_error("management service unavailable");
        let (scheduler, store) = scheduler_with(host);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());
        scheduler.tick_global_now();

        assert_eq!(sink.batch_count(), 0);
        let errors = errors_in(&store);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("management service unavailable"));
    }

    #[test]
    fn test_empty_host_emits_empty_batch() {
        let host = Arc::new(MockHost::new());
        let (scheduler, store) = scheduler_with(host);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());
        scheduler.tick_global_now();

        assert_eq!(sink.batch_count(), 1);
        assert!(sink.batches()[0].is_empty());
        assert!(errors_in(&store).is_empty());
    }

    // ==================== single-target tick ====================

    #[test]
    fn test_stopped_target_is_recovered_once() {
        let host = Arc::new(MockHost::new());
        host.add_pool(stopped_pool("api"));
        let (scheduler, store) = scheduler_with(host.clone());

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());
        scheduler.tick_target_now("api");

        assert_eq!(host.started_pools(), vec!["api"]);

        let levels: Vec<LogLevel> = store
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.level)
            .collect();
        assert_eq!(levels, vec![LogLevel::Warning, LogLevel::Info]);

        // the batch still reports the pre-recovery status
        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].name, "api");
        assert_eq!(batches[0][0].status, PoolStatus::Stopped);
    }

    #[test]
    fn test_recovery_logs_warning_and_info_even_when_start_fails() {
        let host = Arc::new(MockHost::new());
        host.add_pool(stopped_pool("api"));
        host.set_start_error("permission denied");
        let (scheduler, store) = scheduler_with(host.clone());

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());
        scheduler.tick_target_now("api");

        // exactly one start attempt
        assert_eq!(host.started_pools(), vec!["api"]);
        let levels: Vec<LogLevel> = store
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.level)
            .collect();
        assert_eq!(
            levels,
            vec![LogLevel::Warning, LogLevel::Info, LogLevel::Error]
        );
        // the batch is emitted regardless
        assert_eq!(sink.batch_count(), 1);
    }

    #[test]
    fn test_running_target_is_not_recovered() {
        let host = Arc::new(MockHost::new());
        host.add_pool(running_pool("api", std::process::id() as i64));
        let (scheduler, store) = scheduler_with(host.clone());

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());
        scheduler.tick_target_now("api");

        assert!(host.started_pools().is_empty());
        assert!(store
            .entries_with_level(LogLevel::Warning)
            .unwrap()
            .is_empty());
        assert_eq!(sink.batch_count(), 1);
        assert_eq!(sink.batches()[0][0].status, PoolStatus::Started);
    }

    #[test]
    fn test_missing_target_logs_error_and_skips_tick() {
        let host = Arc::new(MockHost::new());
        let (scheduler, store) = scheduler_with(host.clone());

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());
        scheduler.tick_target_now("ghost");

        assert_eq!(sink.batch_count(), 0);
        assert!(host.started_pools().is_empty());
        let errors = errors_in(&store);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'ghost' not found"));
    }

    // ==================== subscribers ====================

    #[test]
    fn test_subscriber_failure_is_isolated() {
        let host = Arc::new(MockHost::new());
        host.add_pool(stopped_pool("api"));
        let (scheduler, store) = scheduler_with(host);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(Arc::new(FailingSink));
        scheduler.subscribe(sink.clone());
        scheduler.tick_global_now();

        // the healthy subscriber still received the batch
        assert_eq!(sink.batch_count(), 1);
        let errors = errors_in(&store);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("exploding"));
    }

    #[test]
    fn test_subscribe_takes_effect_for_later_batches() {
        let host = Arc::new(MockHost::new());
        host.add_pool(stopped_pool("api"));
        let (scheduler, _store) = scheduler_with(host);

        let early = Arc::new(CollectingSink::new());
        scheduler.subscribe(early.clone());
        scheduler.tick_global_now();

        let late = Arc::new(CollectingSink::new());
        scheduler.subscribe(late.clone());
        scheduler.tick_global_now();

        assert_eq!(early.batch_count(), 2);
        assert_eq!(late.batch_count(), 1);
        assert_eq!(scheduler.subscriber_count(), 2);
    }

    // ==================== timer lifecycle ====================

    #[test]
    fn test_rearming_global_replaces_the_interval() {
        let host = Arc::new(MockHost::new());
        host.add_pool(stopped_pool("api"));
        let (scheduler, _store) = scheduler_with(host);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());

        scheduler.start_global(Duration::from_millis(40));
        scheduler.start_global(Duration::from_millis(150));
        assert!(scheduler.is_global_running());

        thread::sleep(Duration::from_millis(400));
        scheduler.stop_global();
        assert!(!scheduler.is_global_running());

        // at 40ms the line would have fired roughly ten times
        let count = sink.batch_count();
        assert!(count >= 1, "expected at least one tick, got {count}");
        assert!(count <= 4, "old line kept firing, got {count} ticks");
    }

    #[test]
    fn test_stop_without_running_line_logs_nothing() {
        let host = Arc::new(MockHost::new());
        let (scheduler, store) = scheduler_with(host);

        scheduler.stop_global();
        assert!(store.entries().unwrap().is_empty());
    }

    #[test]
    fn test_global_lifecycle_is_logged() {
        let host = Arc::new(MockHost::new());
        let (scheduler, store) = scheduler_with(host);

        scheduler.start_global(Duration::from_secs(60));
        scheduler.stop_global();

        let messages: Vec<String> = store
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("monitoring started"));
        assert!(messages[1].contains("monitoring stopped"));
    }

    #[test]
    fn test_stop_target_halts_emissions_but_keeps_membership() {
        let host = Arc::new(MockHost::new());
        host.add_pool(running_pool("api", 0));
        let (scheduler, _store) = scheduler_with(host);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());

        scheduler.start_target("api", Duration::from_millis(30));
        assert_eq!(scheduler.active_targets(), vec!["api"]);
        thread::sleep(Duration::from_millis(120));

        assert!(scheduler.stop_target("api"));
        let settled = sink.batch_count();
        assert!(settled >= 1);

        thread::sleep(Duration::from_millis(150));
        assert_eq!(sink.batch_count(), settled);

        assert!(scheduler.active_targets().is_empty());
        assert!(scheduler.is_monitored("api"));
        assert_eq!(scheduler.monitored_targets(), vec!["api"]);
        // stopping again is a no-op
        assert!(!scheduler.stop_target("api"));
    }

    #[test]
    fn test_distinct_targets_run_concurrently() {
        let host = Arc::new(MockHost::new());
        host.add_pool(running_pool("api", 0));
        host.add_pool(running_pool("jobs", 0));
        let (scheduler, _store) = scheduler_with(host);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());

        scheduler.start_target("api", Duration::from_millis(30));
        scheduler.start_target("jobs", Duration::from_millis(30));
        thread::sleep(Duration::from_millis(150));
        scheduler.stop_all();

        let batches = sink.batches();
        assert!(batches.iter().all(|b| b.len() == 1));
        let names: HashSet<String> =
            batches.iter().map(|b| b[0].name.clone()).collect();
        assert!(names.contains("api"));
        assert!(names.contains("jobs"));
        assert_eq!(scheduler.monitored_targets(), vec!["api", "jobs"]);
    }

    #[test]
    fn test_restarting_same_target_replaces_its_line() {
        let host = Arc::new(MockHost::new());
        host.add_pool(running_pool("api", 0));
        let (scheduler, _store) = scheduler_with(host);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());

        scheduler.start_target("api", Duration::from_millis(30));
        scheduler.start_target("api", Duration::from_millis(200));
        assert_eq!(scheduler.active_targets(), vec!["api"]);

        thread::sleep(Duration::from_millis(450));
        scheduler.stop_all();

        // at 30ms the first line alone would have produced ~15 batches
        let count = sink.batch_count();
        assert!(count >= 1, "expected at least one tick, got {count}");
        assert!(count <= 4, "old line kept firing, got {count} ticks");
    }

    #[test]
    fn test_concurrent_rearms_leave_no_orphaned_line() {
        let host = Arc::new(MockHost::new());
        host.add_pool(stopped_pool("api"));
        let (scheduler, _store) = scheduler_with(host);
        let scheduler = Arc::new(scheduler);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());

        // two control threads re-arm the same lines over and over
        let arms: Vec<_> = (0..2)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                thread::spawn(move || {
                    for _ in 0..20 {
                        scheduler.start_global(Duration::from_millis(10));
                        scheduler.start_target("api", Duration::from_millis(10));
                    }
                })
            })
            .collect();
        for arm in arms {
            arm.join().unwrap();
        }

        assert!(scheduler.is_global_running());
        assert_eq!(scheduler.active_targets(), vec!["api"]);
        scheduler.stop_all();

        // every line armed above is joined now; nothing may fire past this
        let settled = sink.batch_count();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(sink.batch_count(), settled, "a replaced line kept firing");
    }

    #[test]
    fn test_captured_at_is_monotonic_across_ticks() {
        let host = Arc::new(MockHost::new());
        host.add_pool(stopped_pool("api"));
        let (scheduler, _store) = scheduler_with(host);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());

        scheduler.tick_global_now();
        scheduler.tick_global_now();
        scheduler.tick_target_now("api");

        let stamps: Vec<_> = sink
            .batches()
            .iter()
            .flatten()
            .map(|s| s.captured_at)
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    // ==================== one-shot sampling ====================

    #[test]
    fn test_sample_once_returns_batch_without_emitting() {
        let host = Arc::new(MockHost::new());
        host.add_pool(stopped_pool("api"));
        host.add_pool(stopped_pool("jobs"));
        let (scheduler, _store) = scheduler_with(host);

        let sink = Arc::new(CollectingSink::new());
        scheduler.subscribe(sink.clone());

        let batch = scheduler.sample_once().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(sink.batch_count(), 0);
    }

    #[test]
    fn test_sample_once_propagates_fail_fast_errors() {
        let host = Arc::new(MockHost::new());
        host.add_failing_pool("broken", "boom");
        let (scheduler, _store) = scheduler_with(host);

        assert!(scheduler.sample_once().is_err());
    }
}
