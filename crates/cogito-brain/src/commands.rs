//! Command handlers. Each command overwrites mode and focus in one state
//! transaction, bumping the generation so that every chain already queued
//! becomes stale, then enqueues the first step of its own chain.
//!
//! The autonomous dispatcher is tracked separately: only the toggle and
//! `stop` change the autonomous flag, so it keeps running when another cycle
//! is started.

use anyhow::Result;
use cogito_types::{ChangeKind, CommandAck, CycleKind, JournalEventKind, Mode};
use std::fmt;

use crate::scheduler::{Job, Priority, SchedulerSender};
use crate::MindState;

pub const THINKING_FOCUS: &str = "Generating new thoughts and connections...";
pub const LEARNING_FOCUS: &str = "Acquiring and processing new knowledge...";
pub const THEORIZING_FOCUS: &str = "Formulating new theories and hypotheses...";
pub const AUTONOMOUS_FOCUS: &str = "Operating in autonomous mode - thinking independently...";
pub const AUTONOMOUS_OFF_FOCUS: &str = "Autonomous mode disabled";
pub const STOPPED_FOCUS: &str = "Idle";

/// Rejected command input. The HTTP layer maps it to 400.
#[derive(Debug)]
pub struct InvalidInput(pub String);

impl fmt::Display for InvalidInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid input: {}", self.0)
    }
}

impl std::error::Error for InvalidInput {}

pub async fn start_thinking(mind: &MindState, sender: &SchedulerSender) -> Result<CommandAck> {
    start_cycle(mind, sender, CycleKind::Thinking, THINKING_FOCUS.to_string(), None).await
}

pub async fn start_learning(mind: &MindState, sender: &SchedulerSender) -> Result<CommandAck> {
    start_cycle(mind, sender, CycleKind::Learning, LEARNING_FOCUS.to_string(), None).await
}

pub async fn start_theorizing(mind: &MindState, sender: &SchedulerSender) -> Result<CommandAck> {
    start_cycle(mind, sender, CycleKind::Theorizing, THEORIZING_FOCUS.to_string(), None).await
}

/// One-shot analysis of `topic`. Blank topics are rejected.
pub async fn deep_analysis(
    mind: &MindState,
    sender: &SchedulerSender,
    topic: &str,
) -> Result<CommandAck> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(InvalidInput("topic must not be empty".into()).into());
    }
    let focus = format!("Deep analysis of: {topic}");
    start_cycle(mind, sender, CycleKind::DeepAnalysis, focus, Some(topic.to_string())).await
}

/// Flip the autonomous flag. On starts the dispatcher; off returns to idle.
pub async fn toggle_autonomous(mind: &MindState, sender: &SchedulerSender) -> Result<CommandAck> {
    let (ack, dispatcher) = mind.storage.transact(|s| {
        let enabled = !s.autonomous_mode;
        let dispatcher = s.set_autonomous(enabled);
        if enabled {
            s.enter(Mode::Autonomous, AUTONOMOUS_FOCUS);
        } else {
            s.enter(Mode::Idle, AUTONOMOUS_OFF_FOCUS);
        }
        Ok((CommandAck::from(&*s), dispatcher))
    })?;
    announce(mind, "toggle_autonomous", &ack);

    if ack.autonomous_mode {
        let job = Job::first(CycleKind::Autonomous, dispatcher, None);
        sender.submit(job, Priority::High).await?;
    }
    Ok(ack)
}

/// Halt whatever is running and go idle.
pub async fn stop(mind: &MindState) -> Result<CommandAck> {
    let ack = mind.storage.transact(|s| {
        s.set_autonomous(false);
        s.enter(Mode::Idle, STOPPED_FOCUS);
        Ok(CommandAck::from(&*s))
    })?;
    announce(mind, "stop", &ack);
    Ok(ack)
}

/// Re-enqueue the persisted chains, keeping their generations: the mode's
/// sustained cycle and, if the flag is set, the autonomous dispatcher.
/// Returns the resumed cycles.
pub async fn resume(mind: &MindState, sender: &SchedulerSender) -> Result<Vec<CycleKind>> {
    let state = mind.storage.load_state()?;
    let mut cycles: Vec<CycleKind> = state
        .mode
        .sustained_cycle()
        .filter(|cycle| *cycle != CycleKind::Autonomous)
        .into_iter()
        .collect();
    if state.autonomous_mode {
        cycles.push(CycleKind::Autonomous);
    }
    cycles.retain(|cycle| state.is_current(*cycle, state.chain_generation(*cycle)));

    for &cycle in &cycles {
        let generation = state.chain_generation(cycle);
        let job = Job::first(cycle, generation, None);
        mind.journal.record(
            JournalEventKind::ChainResumed,
            Some(job.chain_id),
            Some(cycle),
            serde_json::json!({ "generation": generation }),
        );
        tracing::info!(?cycle, generation, "resuming persisted cycle");
        sender.submit(job, Priority::High).await?;
    }
    Ok(cycles)
}

async fn start_cycle(
    mind: &MindState,
    sender: &SchedulerSender,
    cycle: CycleKind,
    focus: String,
    topic: Option<String>,
) -> Result<CommandAck> {
    let ack = mind.storage.transact(|s| {
        s.enter(cycle.mode(), focus);
        Ok(CommandAck::from(&*s))
    })?;
    announce(mind, cycle.mode().as_str(), &ack);

    let job = Job::first(cycle, ack.generation, topic);
    sender.submit(job, Priority::High).await?;
    Ok(ack)
}

fn announce(mind: &MindState, command: &str, ack: &CommandAck) {
    tracing::info!(
        command,
        mode = %ack.mode,
        generation = ack.generation,
        "command applied"
    );
    mind.feed.publish(ChangeKind::StateUpdated, None);
    mind.journal.record(
        JournalEventKind::CommandIssued,
        None,
        None,
        serde_json::json!({
            "command": command,
            "mode": ack.mode,
            "focus": ack.current_focus,
            "generation": ack.generation,
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FixedContent;
    use crate::scheduler::Scheduler;
    use crate::test_mind;
    use cogito_types::Activity;
    use std::sync::Arc;
    use std::time::Duration;

    fn spawn_scheduler(mind: &Arc<MindState>) -> SchedulerSender {
        let scheduler = Scheduler::new(mind.clone(), mind.shutdown_tx.subscribe());
        let sender = scheduler.sender();
        tokio::spawn(scheduler.run());
        sender
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn thinking_chain_steps_every_two_seconds() {
        let (_dir, mind) = test_mind(FixedContent::new());
        let sender = spawn_scheduler(&mind);

        let ack = start_thinking(&mind, &sender).await.unwrap();
        assert_eq!(ack.mode, Mode::Thinking);
        assert_eq!(ack.current_focus, THINKING_FOCUS);

        // Steps at 0s, 2s, 4s, 6s.
        advance(6_500).await;
        let state = mind.storage.load_state().unwrap();
        assert_eq!(state.total_thoughts, 4);
        assert!((state.thoughts_per_minute - 0.4).abs() < 1e-9);
        assert_eq!(mind.records.counts().unwrap().thoughts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn learning_then_thinking_switches_chains() {
        let (_dir, mind) = test_mind(FixedContent::new());
        let sender = spawn_scheduler(&mind);

        start_learning(&mind, &sender).await.unwrap();
        // Steps at 0s and 3s.
        advance(3_500).await;
        assert_eq!(mind.records.counts().unwrap().knowledge, 2);

        start_thinking(&mind, &sender).await.unwrap();
        advance(10_000).await;

        let counts = mind.records.counts().unwrap();
        assert_eq!(counts.knowledge, 2);
        assert!(counts.thoughts >= 5);
        let state = mind.storage.load_state().unwrap();
        assert_eq!(state.total_knowledge, 2);
        assert_eq!(state.mode, Mode::Thinking);
    }

    #[tokio::test(start_paused = true)]
    async fn theorizing_chain_five_second_cadence() {
        let (_dir, mind) = test_mind(FixedContent::new());
        let sender = spawn_scheduler(&mind);

        start_theorizing(&mind, &sender).await.unwrap();
        // Steps at 0s, 5s, 10s.
        advance(12_000).await;
        let state = mind.storage.load_state().unwrap();
        assert_eq!(state.total_theories, 3);
        assert!((state.creativity_level - 0.76).abs() < 1e-9);
        assert_eq!(mind.records.theories().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn deep_analysis_runs_once() {
        let (_dir, mind) = test_mind(FixedContent::new());
        let sender = spawn_scheduler(&mind);

        let ack = deep_analysis(&mind, &sender, "Quantum Gravity").await.unwrap();
        assert_eq!(ack.mode, Mode::DeepAnalysis);
        assert_eq!(ack.current_focus, "Deep analysis of: Quantum Gravity");

        advance(30_000).await;
        let insights = mind.records.top_insights(10).unwrap();
        assert_eq!(insights.len(), 1);
        assert!(insights[0].content.contains("Quantum Gravity"));
        assert_eq!(insights[0].kind, cogito_types::InsightKind::Breakthrough);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_topic_rejected_without_state_change() {
        let (_dir, mind) = test_mind(FixedContent::new());
        let sender = spawn_scheduler(&mind);

        let err = deep_analysis(&mind, &sender, "   ").await.unwrap_err();
        assert!(err.downcast_ref::<InvalidInput>().is_some());
        let state = mind.storage.load_state().unwrap();
        assert_eq!(state.mode, Mode::Idle);
        assert_eq!(state.generation, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn autonomous_toggle_off_halts_dispatch() {
        let (_dir, mind) = test_mind(FixedContent::with_activities([Activity::Think; 16]));
        let sender = spawn_scheduler(&mind);

        let on = toggle_autonomous(&mind, &sender).await.unwrap();
        assert!(on.autonomous_mode);
        assert_eq!(on.mode, Mode::Autonomous);
        assert_eq!(on.current_focus, AUTONOMOUS_FOCUS);

        // Dispatches at 0s, 4s, 8s; they append without touching counters.
        advance(9_000).await;
        assert_eq!(mind.records.counts().unwrap().thoughts, 3);
        let state = mind.storage.load_state().unwrap();
        assert_eq!(state.total_thoughts, 0);
        assert_eq!(state.thoughts_per_minute, 0.0);

        let off = toggle_autonomous(&mind, &sender).await.unwrap();
        assert!(!off.autonomous_mode);
        assert_eq!(off.mode, Mode::Idle);
        assert_eq!(off.current_focus, AUTONOMOUS_OFF_FOCUS);

        advance(20_000).await;
        assert_eq!(mind.records.counts().unwrap().thoughts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_running_chain() {
        let (_dir, mind) = test_mind(FixedContent::new());
        let sender = spawn_scheduler(&mind);

        start_thinking(&mind, &sender).await.unwrap();
        advance(100).await;
        let ack = stop(&mind).await.unwrap();
        assert_eq!(ack.mode, Mode::Idle);
        assert_eq!(ack.current_focus, STOPPED_FOCUS);

        advance(10_000).await;
        assert_eq!(mind.records.counts().unwrap().thoughts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn other_command_keeps_autonomous_dispatch_running() {
        let (_dir, mind) = test_mind(FixedContent::with_activities([Activity::Learn; 16]));
        let sender = spawn_scheduler(&mind);

        toggle_autonomous(&mind, &sender).await.unwrap();
        advance(100).await;
        assert_eq!(mind.records.counts().unwrap().knowledge, 1);

        let ack = start_thinking(&mind, &sender).await.unwrap();
        assert!(ack.autonomous_mode);
        assert_eq!(ack.mode, Mode::Thinking);

        // Dispatches at 4s, 8s, 12s, 16s, 20s alongside the thinking chain.
        advance(20_000).await;
        let counts = mind.records.counts().unwrap();
        assert_eq!(counts.knowledge, 6);
        assert!(counts.thoughts >= 10);
        let state = mind.storage.load_state().unwrap();
        assert!(state.autonomous_mode);
        assert_eq!(state.total_knowledge, 0);

        // The next toggle turns autonomy off and halts the dispatcher.
        let off = toggle_autonomous(&mind, &sender).await.unwrap();
        assert!(!off.autonomous_mode);
        assert_eq!(off.mode, Mode::Idle);
        advance(20_000).await;
        assert_eq!(mind.records.counts().unwrap().knowledge, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_clears_autonomous_flag() {
        let (_dir, mind) = test_mind(FixedContent::with_activities([Activity::Learn; 16]));
        let sender = spawn_scheduler(&mind);

        toggle_autonomous(&mind, &sender).await.unwrap();
        advance(100).await;
        let ack = stop(&mind).await.unwrap();
        assert!(!ack.autonomous_mode);

        advance(20_000).await;
        assert_eq!(mind.records.counts().unwrap().knowledge, 1);
        // The next toggle turns autonomy back on rather than off.
        assert!(toggle_autonomous(&mind, &sender).await.unwrap().autonomous_mode);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_continues_persisted_chain() {
        let (_dir, mind) = test_mind(FixedContent::new());
        mind.storage
            .transact(|s| Ok(s.enter(Mode::Learning, LEARNING_FOCUS)))
            .unwrap();
        let sender = spawn_scheduler(&mind);

        let resumed = resume(&mind, &sender).await.unwrap();
        assert_eq!(resumed, vec![CycleKind::Learning]);
        advance(3_500).await;
        let state = mind.storage.load_state().unwrap();
        assert_eq!(state.total_knowledge, 2);
        assert_eq!(state.generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_ignores_idle_and_one_shot_modes() {
        let (_dir, mind) = test_mind(FixedContent::new());
        let sender = spawn_scheduler(&mind);
        assert!(resume(&mind, &sender).await.unwrap().is_empty());

        mind.storage
            .transact(|s| Ok(s.enter(Mode::DeepAnalysis, "Deep analysis of: X")))
            .unwrap();
        assert!(resume(&mind, &sender).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_restarts_dispatcher_next_to_mode_chain() {
        let (_dir, mind) = test_mind(FixedContent::with_activities([Activity::Analyze; 4]));
        mind.storage
            .transact(|s| {
                s.set_autonomous(true);
                Ok(s.enter(Mode::Theorizing, THEORIZING_FOCUS))
            })
            .unwrap();
        let sender = spawn_scheduler(&mind);

        let resumed = resume(&mind, &sender).await.unwrap();
        assert_eq!(resumed, vec![CycleKind::Theorizing, CycleKind::Autonomous]);
        advance(100).await;
        let counts = mind.records.counts().unwrap();
        assert_eq!(counts.theories, 1);
        assert_eq!(counts.insights, 1);
    }
}
