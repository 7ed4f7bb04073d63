//! Concurrency stress helpers.
//!
//! These race disclosures from several threads against a draining thread.

use crate::fixtures::{TestConversation, TestEntity};
use convsync_engine::{EntityKey, TransferBatch, TransferableEntity};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }
}

/// Everything observed by [`race_disclosures_against_drains`].
#[derive(Debug)]
pub struct ConcurrentRun {
    /// Batches in drain order, including the final drain.
    pub drained: Vec<TransferBatch>,
    /// Entities disclosed by the writer threads.
    pub disclosed: Vec<EntityKey>,
    /// Throughput summary.
    pub result: StressTestResult,
}

impl ConcurrentRun {
    /// How many drained batches carry a delta for each disclosed key.
    pub fn delivery_counts(&self) -> HashMap<EntityKey, usize> {
        let mut counts: HashMap<EntityKey, usize> =
            self.disclosed.iter().map(|key| (key.clone(), 0)).collect();
        for batch in &self.drained {
            for key in batch.entity_keys() {
                *counts.entry(key.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Returns true if every disclosed entity was delivered exactly once.
    pub fn each_delivered_once(&self) -> bool {
        self.delivery_counts().values().all(|&count| count == 1)
    }
}

/// Discloses `threads * per_thread` distinct entities from `threads` writer
/// threads while another thread keeps draining, then drains once more.
pub fn race_disclosures_against_drains(
    conversation: Arc<TestConversation>,
    threads: usize,
    per_thread: usize,
) -> ConcurrentRun {
    let start = Instant::now();
    let writers_done = Arc::new(AtomicBool::new(false));
    let failures = Arc::new(AtomicUsize::new(0));

    let drainer = {
        let conversation = Arc::clone(&conversation);
        let writers_done = Arc::clone(&writers_done);
        thread::spawn(move || {
            let mut drained = Vec::new();
            while !writers_done.load(Ordering::SeqCst) {
                if let Some(batch) = conversation.drain() {
                    drained.push(batch);
                }
                thread::yield_now();
            }
            drained
        })
    };

    let writers: Vec<_> = (0..threads)
        .map(|t| {
            let conversation = Arc::clone(&conversation);
            let failures = Arc::clone(&failures);
            thread::spawn(move || {
                let mut keys = Vec::with_capacity(per_thread);
                for i in 0..per_thread {
                    let entity = TestEntity::new("Stress", format!("w{t}-{i}"));
                    match conversation.disclose(&entity) {
                        Ok(()) => keys.push(entity.key()),
                        Err(_) => {
                            failures.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
                keys
            })
        })
        .collect();

    let mut disclosed = Vec::new();
    for writer in writers {
        if let Ok(keys) = writer.join() {
            disclosed.extend(keys);
        }
    }
    writers_done.store(true, Ordering::SeqCst);

    let mut drained = drainer.join().unwrap_or_default();
    if let Some(last) = conversation.drain() {
        drained.push(last);
    }

    let failed = failures.load(Ordering::SeqCst);
    ConcurrentRun {
        result: StressTestResult::new(disclosed.len(), failed, start.elapsed()),
        drained,
        disclosed,
    }
}
