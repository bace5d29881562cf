//! Cycle steps: one generated record plus the matching counter updates,
//! applied atomically and only while the step's chain is still current.

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use std::time::Duration;
use uuid::Uuid;

use cogito_types::{unit_interval, Activity, ChangeKind, CognitiveState, CycleKind, JournalEventKind};

use crate::generator::ContentProvider;
use crate::records;
use crate::scheduler::Job;
use crate::MindState;

pub const THOUGHTS_PER_MINUTE_STEP: f64 = 0.1;
pub const LEARNING_RATE_STEP: f64 = 0.05;
pub const CREATIVITY_STEP: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// The step ran; `next` is the delay before the chain's next step.
    Completed { next: Option<Duration> },
    /// The chain was superseded. Nothing was written.
    Stale,
}

/// What one activity produced.
#[derive(Debug, Clone, Copy)]
struct Produced {
    activity: Activity,
    change: ChangeKind,
    record_id: Uuid,
}

/// Execute one step of `job`'s chain.
///
/// The currency check, the record append and the counter updates share one
/// state transaction; a stale step appends nothing and is not rescheduled.
/// Autonomous dispatches append their record but leave the counters alone.
pub fn run_step(mind: &MindState, job: &Job) -> Result<StepOutcome> {
    let produced = mind.storage.transact_with_records(|state, db| {
        if !state.is_current(job.cycle, job.generation) {
            return Ok(None);
        }
        let (activity, topic) = match job.cycle {
            CycleKind::Thinking => (Activity::Think, None),
            CycleKind::Learning => (Activity::Learn, None),
            CycleKind::Theorizing => (Activity::Theorize, None),
            CycleKind::DeepAnalysis => (Activity::Analyze, job.topic.as_deref()),
            CycleKind::Autonomous => (
                mind.provider.activity(),
                Some(mind.config.cycles.autonomous_topic.as_str()),
            ),
        };
        let produced = append(mind.provider.as_ref(), db, activity, topic.unwrap_or_default())?;
        if job.cycle != CycleKind::Autonomous {
            apply_counters(state, activity);
        }
        state.touch();
        Ok(Some(produced))
    })?;

    let Some(produced) = produced else {
        mind.journal.record(
            JournalEventKind::StepSkipped,
            Some(job.chain_id),
            Some(job.cycle),
            serde_json::json!({ "generation": job.generation, "step": job.step }),
        );
        return Ok(StepOutcome::Stale);
    };

    mind.feed.publish(produced.change, Some(produced.record_id));
    mind.feed.publish(ChangeKind::StateUpdated, None);

    tracing::info!(
        chain_id = %job.chain_id,
        cycle = ?job.cycle,
        activity = ?produced.activity,
        record_id = %produced.record_id,
        step = job.step,
        "step completed"
    );
    mind.journal.record(
        JournalEventKind::StepCompleted,
        Some(job.chain_id),
        Some(job.cycle),
        serde_json::json!({
            "activity": produced.activity,
            "record_id": produced.record_id,
            "generation": job.generation,
            "step": job.step,
        }),
    );

    Ok(StepOutcome::Completed {
        next: mind.config.cycles.interval(job.cycle),
    })
}

/// Generate and insert one record for `activity`.
fn append(
    provider: &dyn ContentProvider,
    db: &Connection,
    activity: Activity,
    topic: &str,
) -> Result<Produced> {
    let now = Utc::now();

    let (change, record_id) = match activity {
        Activity::Think => {
            let thought = provider.thought().into_thought(now);
            records::insert_thought(db, &thought)?;
            (ChangeKind::ThoughtAdded, thought.id)
        }
        Activity::Learn => {
            let entry = provider.concept().into_entry(now);
            records::insert_knowledge(db, &entry)?;
            (ChangeKind::KnowledgeAdded, entry.id)
        }
        Activity::Theorize => {
            let theory = provider.theory().into_theory(now);
            records::insert_theory(db, &theory)?;
            (ChangeKind::TheoryAdded, theory.id)
        }
        Activity::Analyze => {
            let insight = provider.insight(topic).into_insight(topic, now);
            records::insert_insight(db, &insight)?;
            (ChangeKind::InsightAdded, insight.id)
        }
    };

    Ok(Produced {
        activity,
        change,
        record_id,
    })
}

/// Counter increments of a sustained cycle step. Analysis has none.
fn apply_counters(state: &mut CognitiveState, activity: Activity) {
    match activity {
        Activity::Think => {
            state.total_thoughts += 1;
            state.thoughts_per_minute += THOUGHTS_PER_MINUTE_STEP;
        }
        Activity::Learn => {
            state.total_knowledge += 1;
            state.learning_rate = unit_interval(state.learning_rate + LEARNING_RATE_STEP);
        }
        Activity::Theorize => {
            state.total_theories += 1;
            state.creativity_level = unit_interval(state.creativity_level + CREATIVITY_STEP);
        }
        Activity::Analyze => {}
    }
}
