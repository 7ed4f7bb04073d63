//! Simulate command implementation.

use super::model::{Operator, Record};
use convsync_engine::{
    AllowAll, Conversation, ConversationConfig, EntityKey, TransferBatch, TransferableEntity,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::info;

/// Simulation result.
#[derive(Debug, Serialize)]
pub struct SimulateResult {
    /// Disclosing threads.
    pub threads: usize,
    /// Shared entities.
    pub entities: usize,
    /// Rounds per thread.
    pub rounds: usize,
    /// Successful disclosures.
    pub disclosures: usize,
    /// Failed disclosures.
    pub failures: usize,
    /// Non-empty batches drained.
    pub batches: usize,
    /// Deltas found in drained batches.
    pub deltas_delivered: u64,
    /// Deltas queued by the conversation.
    pub deltas_queued: u64,
    /// Disclosures skipped because the client was up to date.
    pub skipped_unchanged: u64,
    /// Deltas drained before one of their slaves.
    pub forward_references: usize,
    /// Whether a final disclosure of everything queued nothing.
    pub converged: bool,
    /// Wall time in milliseconds.
    pub duration_ms: u128,
    /// Disclosures per second.
    pub ops_per_second: f64,
}

impl SimulateResult {
    /// Returns true if every queued delta was drained exactly once, in order.
    pub fn is_consistent(&self) -> bool {
        self.failures == 0
            && self.deltas_delivered == self.deltas_queued
            && self.forward_references == 0
            && self.converged
    }
}

/// Runs the simulate command.
pub fn run(
    threads: usize,
    entities: usize,
    rounds: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = simulate(threads, entities, rounds);

    // Output
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    if !result.is_consistent() {
        return Err("Simulation found inconsistent deliveries".into());
    }
    Ok(())
}

/// Entity `i` has entity `(i - 1) / 2` as its slave, forming a binary tree.
fn build_entities(count: usize) -> Vec<Record> {
    let mut entities: Vec<Record> = Vec::with_capacity(count);
    for i in 0..count {
        let entity = Record::new("Node", format!("n{i}")).with_field("index", i);
        if i > 0 {
            entity.link(&entities[(i - 1) / 2]);
        }
        entities.push(entity);
    }
    entities
}

fn new_conversation() -> Conversation<Operator, Record> {
    Conversation::new(
        Arc::new(Operator("simulate".to_string())),
        1,
        AllowAll,
        ConversationConfig::default(),
    )
}

fn simulate(threads: usize, entity_count: usize, rounds: usize) -> SimulateResult {
    let conversation = Arc::new(new_conversation());
    let entities = Arc::new(build_entities(entity_count));
    let writers_done = Arc::new(AtomicBool::new(false));
    let disclosures = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));

    info!(threads, entities = entity_count, rounds, "starting simulation");
    let start = Instant::now();

    let drainer = {
        let conversation = Arc::clone(&conversation);
        let writers_done = Arc::clone(&writers_done);
        thread::spawn(move || {
            let mut drained = Vec::new();
            while !writers_done.load(Ordering::SeqCst) {
                if let Some(batch) = conversation.drain() {
                    if !batch.is_empty() {
                        drained.push(batch);
                    }
                }
                thread::yield_now();
            }
            drained
        })
    };

    let writers: Vec<_> = (0..threads)
        .map(|t| {
            let conversation = Arc::clone(&conversation);
            let entities = Arc::clone(&entities);
            let disclosures = Arc::clone(&disclosures);
            let failures = Arc::clone(&failures);
            thread::spawn(move || {
                for _ in 0..rounds {
                    for (i, entity) in entities.iter().enumerate() {
                        if i % threads == t {
                            entity.touch();
                        }
                        match conversation.disclose(entity) {
                            Ok(()) => disclosures.fetch_add(1, Ordering::Relaxed),
                            Err(_) => failures.fetch_add(1, Ordering::Relaxed),
                        };
                    }
                }
            })
        })
        .collect();

    for writer in writers {
        if writer.join().is_err() {
            failures.fetch_add(1, Ordering::Relaxed);
        }
    }
    writers_done.store(true, Ordering::SeqCst);

    let mut drained = drainer.join().unwrap_or_default();
    if let Some(last) = conversation.drain() {
        if !last.is_empty() {
            drained.push(last);
        }
    }
    let duration = start.elapsed();

    let deltas_delivered = drained.iter().map(|b| b.entities.len() as u64).sum();
    let forward_references = count_forward_references(&entities, &drained);

    let stats = conversation.stats();
    let converged = conversation.disclose_all(entities.iter()).is_ok()
        && conversation
            .drain()
            .is_some_and(|batch| batch.entities.is_empty());

    let disclosures = disclosures.load(Ordering::Relaxed);
    let failures = failures.load(Ordering::Relaxed);
    let ops_per_second = if duration.as_secs_f64() > 0.0 {
        (disclosures + failures) as f64 / duration.as_secs_f64()
    } else {
        0.0
    };

    SimulateResult {
        threads,
        entities: entity_count,
        rounds,
        disclosures,
        failures,
        batches: drained.len(),
        deltas_delivered,
        deltas_queued: stats.entities_sent,
        skipped_unchanged: stats.skipped_unchanged,
        forward_references,
        converged,
        duration_ms: duration.as_millis(),
        ops_per_second,
    }
}

/// Counts deltas that reached the client before a slave they reference.
fn count_forward_references(entities: &[Record], drained: &[TransferBatch]) -> usize {
    let slaves: HashMap<EntityKey, Vec<EntityKey>> = entities
        .iter()
        .map(|e| (e.key(), e.slaves().iter().map(|s| s.key()).collect()))
        .collect();

    let mut delivered: HashSet<&EntityKey> = HashSet::new();
    let mut forward = 0;
    for delta in drained.iter().flat_map(|batch| &batch.entities) {
        let missing = slaves
            .get(&delta.key)
            .map(|keys| keys.iter().filter(|k| !delivered.contains(k)).count())
            .unwrap_or(0);
        forward += missing;
        delivered.insert(&delta.key);
    }
    forward
}

fn print_text_output(result: &SimulateResult) {
    println!("Simulation");
    println!("==========");
    println!("Threads:            {}", result.threads);
    println!("Entities:           {}", result.entities);
    println!("Rounds:             {}", result.rounds);
    println!();
    println!("Disclosures:        {}", result.disclosures);
    println!("Failures:           {}", result.failures);
    println!("Skipped unchanged:  {}", result.skipped_unchanged);
    println!("Batches drained:    {}", result.batches);
    println!(
        "Deltas:             {} queued, {} delivered",
        result.deltas_queued, result.deltas_delivered
    );
    println!("Forward references: {}", result.forward_references);
    println!("Converged:          {}", result.converged);
    println!();
    println!(
        "Duration:           {} ms ({:.0} disclosures/s)",
        result.duration_ms, result.ops_per_second
    );
    println!();

    if result.is_consistent() {
        println!("✓ Every delta was delivered exactly once");
    } else {
        println!("✗ Inconsistent deliveries");
    }
}
