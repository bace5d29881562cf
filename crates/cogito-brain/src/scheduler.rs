//! Step scheduling: a single loop runs cycle steps one at a time; delayed
//! reschedules are timer tasks that feed the queue when they fire.

use anyhow::Result;
use cogito_types::{CycleKind, JournalEventKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::cycle::{self, StepOutcome};
use crate::MindState;

/// Job priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Reschedules of a running chain.
    Normal,
    /// First step of a chain, issued by a command.
    High,
}

/// One pending step of a cycle chain.
#[derive(Debug, Clone)]
pub struct Job {
    /// Shared by every step of the same chain.
    pub chain_id: Uuid,
    pub cycle: CycleKind,
    /// State generation the chain was started under.
    pub generation: u64,
    /// Analysis topic (deep analysis only).
    pub topic: Option<String>,
    /// Zero-based position in the chain.
    pub step: u64,
}

impl Job {
    pub fn first(cycle: CycleKind, generation: u64, topic: Option<String>) -> Self {
        Self {
            chain_id: Uuid::now_v7(),
            cycle,
            generation,
            topic,
            step: 0,
        }
    }

    fn next(&self) -> Self {
        Self {
            step: self.step + 1,
            ..self.clone()
        }
    }
}

/// The step scheduler.
pub struct Scheduler {
    mind: Arc<MindState>,
    high_rx: mpsc::Receiver<Job>,
    normal_rx: mpsc::Receiver<Job>,
    high_tx: mpsc::Sender<Job>,
    normal_tx: mpsc::Sender<Job>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(mind: Arc<MindState>, shutdown_rx: watch::Receiver<bool>) -> Self {
        let capacity = mind.config.cycles.queue_capacity.max(1);
        let (high_tx, high_rx) = mpsc::channel(64);
        let (normal_tx, normal_rx) = mpsc::channel(capacity);

        Self {
            mind,
            high_rx,
            normal_rx,
            high_tx,
            normal_tx,
            shutdown_rx,
        }
    }

    /// Get a sender handle for submitting jobs externally.
    pub fn sender(&self) -> SchedulerSender {
        SchedulerSender {
            high_tx: self.high_tx.clone(),
            normal_tx: self.normal_tx.clone(),
        }
    }

    /// Run the scheduler loop until shutdown.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!("scheduler started");

        loop {
            // Biased select: shutdown first, then command-issued steps.
            let job = tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => {
                    tracing::info!("scheduler received shutdown signal");
                    break;
                }
                Some(job) = self.high_rx.recv() => job,
                Some(job) = self.normal_rx.recv() => job,
                else => {
                    tracing::info!("all scheduler channels closed");
                    break;
                }
            };

            self.execute(job).await;
        }

        Ok(())
    }

    /// Run one step to completion and reschedule its successor if due.
    ///
    /// The step's storage work runs on the blocking pool; the loop waits for
    /// it, so steps still execute one at a time.
    async fn execute(&self, job: Job) {
        tracing::debug!(
            chain_id = %job.chain_id,
            cycle = ?job.cycle,
            generation = job.generation,
            step = job.step,
            "running step"
        );

        let mind = self.mind.clone();
        let step = job.clone();
        let outcome = tokio::task::spawn_blocking(move || cycle::run_step(&mind, &step))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|result| result);

        match outcome {
            Ok(StepOutcome::Completed { next: Some(delay) }) => {
                self.schedule_after(job.next(), delay);
            }
            Ok(StepOutcome::Completed { next: None }) => {
                tracing::debug!(chain_id = %job.chain_id, "chain finished");
            }
            Ok(StepOutcome::Stale) => {
                tracing::debug!(chain_id = %job.chain_id, cycle = ?job.cycle, "stale step dropped");
            }
            Err(e) => {
                tracing::error!(
                    chain_id = %job.chain_id,
                    cycle = ?job.cycle,
                    error = %e,
                    "step failed, halting chain"
                );
                self.mind.journal.record(
                    JournalEventKind::StepFailed,
                    Some(job.chain_id),
                    Some(job.cycle),
                    serde_json::json!({
                        "generation": job.generation,
                        "step": job.step,
                        "error": format!("{e:#}"),
                    }),
                );
            }
        }
    }

    /// Spawn a timer that enqueues `job` after `delay`, unless shutdown comes first.
    fn schedule_after(&self, job: Job, delay: Duration) {
        let sender = self.sender();
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(delay) => {
                    if sender.submit(job, Priority::Normal).await.is_err() {
                        tracing::debug!("scheduler gone, dropping rescheduled step");
                    }
                }
            }
        });
    }
}

/// Handle for submitting jobs to the scheduler.
#[derive(Clone)]
pub struct SchedulerSender {
    high_tx: mpsc::Sender<Job>,
    normal_tx: mpsc::Sender<Job>,
}

impl SchedulerSender {
    pub async fn submit(&self, job: Job, priority: Priority) -> Result<()> {
        let tx = match priority {
            Priority::High => &self.high_tx,
            Priority::Normal => &self.normal_tx,
        };
        tx.send(job)
            .await
            .map_err(|_| anyhow::anyhow!("scheduler channel closed"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FixedContent;
    use crate::test_mind;
    use cogito_types::Mode;

    #[test]
    fn next_keeps_chain_identity() {
        let job = Job::first(CycleKind::Learning, 4, None);
        let next = job.next();
        assert_eq!(next.chain_id, job.chain_id);
        assert_eq!(next.generation, 4);
        assert_eq!(next.step, 1);
    }

    #[test]
    fn priorities_order() {
        assert!(Priority::High > Priority::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_loop_and_pending_timers() {
        let (_dir, mind) = test_mind(FixedContent::new());
        let scheduler = Scheduler::new(mind.clone(), mind.shutdown_tx.subscribe());
        let sender = scheduler.sender();
        let handle = tokio::spawn(scheduler.run());

        let generation = mind
            .storage
            .transact(|s| Ok(s.enter(Mode::Thinking, "thinking")))
            .unwrap();
        sender
            .submit(Job::first(CycleKind::Thinking, generation, None), Priority::High)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(mind.storage.load_state().unwrap().total_thoughts, 1);

        mind.shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(mind.storage.load_state().unwrap().total_thoughts, 1);
        assert!(sender
            .submit(Job::first(CycleKind::Thinking, generation, None), Priority::High)
            .await
            .is_err());
    }
}
