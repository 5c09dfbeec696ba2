//! Round-robin provider pool with per-slot circuit breakers and a hard
//! deadline on every classification.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use super::{LanguageProvider, ProviderClassification, ProviderError};

/// Worker threads allowed at once, overrunning calls included.
const DEFAULT_WORKER_LIMIT: usize = 16;

#[derive(Debug, Default)]
struct SlotHealth {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

struct Slot {
    provider: Arc<dyn LanguageProvider>,
    health: Mutex<SlotHealth>,
}

impl Slot {
    fn is_open(&self, now: Instant) -> bool {
        self.health
            .lock()
            .map(|h| h.open_until.is_some_and(|until| now < until))
            .unwrap_or(false)
    }

    fn record_success(&self) {
        if let Ok(mut h) = self.health.lock() {
            h.consecutive_failures = 0;
            h.open_until = None;
        }
    }

    fn record_failure(&self, threshold: u32, cooldown: Duration) {
        if let Ok(mut h) = self.health.lock() {
            h.consecutive_failures += 1;
            if h.consecutive_failures >= threshold {
                h.open_until = Some(Instant::now() + cooldown);
                tracing::warn!(
                    provider = self.provider.name(),
                    failures = h.consecutive_failures,
                    cooldown_secs = cooldown.as_secs(),
                    "Provider circuit opened"
                );
            }
        }
    }
}

pub struct ProviderPool {
    slots: Vec<Slot>,
    next: AtomicUsize,
    timeout: Duration,
    failure_threshold: u32,
    cooldown: Duration,
    workers: Arc<AtomicUsize>,
    worker_limit: usize,
}

impl ProviderPool {
    pub fn new(timeout: Duration, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            slots: Vec::new(),
            next: AtomicUsize::new(0),
            timeout,
            failure_threshold: failure_threshold.max(1),
            cooldown,
            workers: Arc::new(AtomicUsize::new(0)),
            worker_limit: DEFAULT_WORKER_LIMIT,
        }
    }

    pub fn with_worker_limit(mut self, limit: usize) -> Self {
        self.worker_limit = limit.max(1);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn LanguageProvider>) -> Self {
        self.slots.push(Slot {
            provider,
            health: Mutex::new(SlotHealth::default()),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Classify `text` using the next healthy provider, rotating past failures
    /// until one answers or the pool's deadline passes.
    pub fn classify(&self, text: &str) -> Result<ProviderClassification, ProviderError> {
        if self.slots.is_empty() {
            return Err(ProviderError::NoProviders);
        }

        let started = Instant::now();
        let deadline = started + self.timeout;
        let first = self.next.fetch_add(1, Ordering::Relaxed);
        let mut last_error = None;

        for offset in 0..self.slots.len() {
            let slot = &self.slots[(first + offset) % self.slots.len()];
            let now = Instant::now();
            if slot.is_open(now) {
                continue;
            }
            let Some(remaining) = deadline.checked_duration_since(now).filter(|d| !d.is_zero())
            else {
                break;
            };

            let workers = WorkerBudget {
                running: &self.workers,
                limit: self.worker_limit,
            };
            match call_with_timeout(&slot.provider, text, remaining, workers) {
                Ok(result) => {
                    slot.record_success();
                    tracing::debug!(
                        provider = slot.provider.name(),
                        intents = result.intents.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Provider classification complete"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    slot.record_failure(self.failure_threshold, self.cooldown);
                    tracing::warn!(provider = slot.provider.name(), error = %e, "Provider call failed");
                    let timed_out = matches!(e, ProviderError::Timeout { .. });
                    last_error = Some(e);
                    if timed_out {
                        break;
                    }
                }
            }
        }

        if Instant::now() >= deadline {
            return Err(ProviderError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            });
        }
        Err(last_error
            .unwrap_or_else(|| ProviderError::Unavailable("all providers cooling down".into())))
    }
}

struct WorkerBudget<'a> {
    running: &'a Arc<AtomicUsize>,
    limit: usize,
}

/// Releases a worker slot when the thread finishes, even by panic.
struct WorkerSlot(Arc<AtomicUsize>);

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Run one provider call on a worker thread and stop waiting after `timeout`.
///
/// Each call gets its own OS thread. A call that overruns keeps its thread
/// until the provider's HTTP client gives up (its own timeout bounds that);
/// its result is dropped. Threads still running count against the pool's
/// worker limit, and once the limit is reached calls fail fast instead of
/// spawning more.
fn call_with_timeout(
    provider: &Arc<dyn LanguageProvider>,
    text: &str,
    timeout: Duration,
    budget: WorkerBudget<'_>,
) -> Result<ProviderClassification, ProviderError> {
    if budget.running.fetch_add(1, Ordering::AcqRel) >= budget.limit {
        budget.running.fetch_sub(1, Ordering::AcqRel);
        return Err(ProviderError::Unavailable("provider workers saturated".into()));
    }
    let slot = WorkerSlot(Arc::clone(budget.running));

    let (tx, rx) = mpsc::channel();
    let provider = Arc::clone(provider);
    let text = text.to_string();

    std::thread::Builder::new()
        .name("provider-call".into())
        .spawn(move || {
            let _slot = slot;
            let _ = tx.send(provider.classify(&text));
        })
        .map_err(|e| ProviderError::Unavailable(format!("failed to spawn worker: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ProviderError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(ProviderError::Unavailable("provider worker panicked".into()))
        }
    }
}
