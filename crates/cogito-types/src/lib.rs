//! Shared domain types for the cogito daemon and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Clamp a metric that is meant to live in [0, 1]. NaN collapses to 0.
pub fn unit_interval(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ── Mode ────────────────────────────────────────────────────────────

/// The single active behavior of the shared cognitive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Idle,
    Thinking,
    Learning,
    Theorizing,
    DeepAnalysis,
    Autonomous,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Thinking => "thinking",
            Mode::Learning => "learning",
            Mode::Theorizing => "theorizing",
            Mode::DeepAnalysis => "deep_analysis",
            Mode::Autonomous => "autonomous",
        }
    }

    /// The cycle that keeps running on its own while this mode is active.
    /// Idle and deep analysis have none.
    pub fn sustained_cycle(&self) -> Option<CycleKind> {
        match self {
            Mode::Thinking => Some(CycleKind::Thinking),
            Mode::Learning => Some(CycleKind::Learning),
            Mode::Theorizing => Some(CycleKind::Theorizing),
            Mode::Autonomous => Some(CycleKind::Autonomous),
            Mode::Idle | Mode::DeepAnalysis => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Cycles ──────────────────────────────────────────────────────────

/// A self-rescheduling chain of generation steps tied to one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    Thinking,
    Learning,
    Theorizing,
    DeepAnalysis,
    Autonomous,
}

impl CycleKind {
    /// The mode a step of this cycle requires to still be current.
    pub fn mode(&self) -> Mode {
        match self {
            CycleKind::Thinking => Mode::Thinking,
            CycleKind::Learning => Mode::Learning,
            CycleKind::Theorizing => Mode::Theorizing,
            CycleKind::DeepAnalysis => Mode::DeepAnalysis,
            CycleKind::Autonomous => Mode::Autonomous,
        }
    }
}

/// One-shot activity picked by the autonomous dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Think,
    Learn,
    Theorize,
    Analyze,
}

impl Activity {
    pub const ALL: [Activity; 4] = [
        Activity::Think,
        Activity::Learn,
        Activity::Theorize,
        Activity::Analyze,
    ];
}

// ── Cognitive State ─────────────────────────────────────────────────

/// The singleton record every command and cycle step mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveState {
    pub mode: Mode,
    pub current_focus: String,
    pub thoughts_per_minute: f64,
    pub learning_rate: f64,
    pub creativity_level: f64,
    pub curiosity_level: f64,
    pub last_activity: DateTime<Utc>,
    pub total_thoughts: u64,
    pub total_theories: u64,
    pub total_knowledge: u64,
    pub autonomous_mode: bool,
    /// Bumped by every command. A scheduled step is only current while it
    /// carries the generation it was started with.
    #[serde(default)]
    pub generation: u64,
    /// Bumped whenever the autonomous flag changes. The dispatcher chain runs
    /// alongside the mode's own chain and only checks against this one.
    #[serde(default)]
    pub autonomous_generation: u64,
}

impl CognitiveState {
    pub const INITIAL_FOCUS: &'static str = "Initializing consciousness...";

    /// Fresh idle state with the given starting levels.
    pub fn new(learning_rate: f64, creativity_level: f64, curiosity_level: f64) -> Self {
        Self {
            mode: Mode::Idle,
            current_focus: Self::INITIAL_FOCUS.to_string(),
            thoughts_per_minute: 0.0,
            learning_rate: unit_interval(learning_rate),
            creativity_level: unit_interval(creativity_level),
            curiosity_level: unit_interval(curiosity_level),
            last_activity: Utc::now(),
            total_thoughts: 0,
            total_theories: 0,
            total_knowledge: 0,
            autonomous_mode: false,
            generation: 0,
            autonomous_generation: 0,
        }
    }

    /// Switch to `mode` with a new focus, invalidating every running chain.
    /// Returns the new generation.
    pub fn enter(&mut self, mode: Mode, focus: impl Into<String>) -> u64 {
        self.mode = mode;
        self.current_focus = focus.into();
        self.generation += 1;
        self.touch();
        self.generation
    }

    /// Set the autonomous flag, invalidating any running dispatcher.
    /// Returns the new autonomous generation.
    pub fn set_autonomous(&mut self, enabled: bool) -> u64 {
        self.autonomous_mode = enabled;
        self.autonomous_generation += 1;
        self.autonomous_generation
    }

    /// The generation a new chain of `cycle` is started under.
    pub fn chain_generation(&self, cycle: CycleKind) -> u64 {
        match cycle {
            CycleKind::Autonomous => self.autonomous_generation,
            _ => self.generation,
        }
    }

    /// Whether a step started at `generation` for `cycle` may still run.
    ///
    /// The autonomous dispatcher depends only on the flag and its own
    /// generation; other commands change the mode without stopping it.
    pub fn is_current(&self, cycle: CycleKind, generation: u64) -> bool {
        match cycle {
            CycleKind::Autonomous => {
                self.autonomous_mode && self.autonomous_generation == generation
            }
            _ => self.generation == generation && self.mode == cycle.mode(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

// ── Thought ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtKind {
    Observation,
    Hypothesis,
    Theory,
    Question,
    Insight,
    Connection,
}

impl ThoughtKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThoughtKind::Observation => "observation",
            ThoughtKind::Hypothesis => "hypothesis",
            ThoughtKind::Theory => "theory",
            ThoughtKind::Question => "question",
            ThoughtKind::Insight => "insight",
            ThoughtKind::Connection => "connection",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "observation" => Some(ThoughtKind::Observation),
            "hypothesis" => Some(ThoughtKind::Hypothesis),
            "theory" => Some(ThoughtKind::Theory),
            "question" => Some(ThoughtKind::Question),
            "insight" => Some(ThoughtKind::Insight),
            "connection" => Some(ThoughtKind::Connection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtStatus {
    Active,
    Validated,
    Refuted,
    Evolving,
}

impl ThoughtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThoughtStatus::Active => "active",
            ThoughtStatus::Validated => "validated",
            ThoughtStatus::Refuted => "refuted",
            ThoughtStatus::Evolving => "evolving",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ThoughtStatus::Active),
            "validated" => Some(ThoughtStatus::Validated),
            "refuted" => Some(ThoughtStatus::Refuted),
            "evolving" => Some(ThoughtStatus::Evolving),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    pub id: Uuid,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: ThoughtKind,
    pub domain: String,
    pub confidence: f64,
    pub complexity: f64,
    pub novelty: f64,
    pub reasoning: String,
    pub parent_thought_id: Option<Uuid>,
    pub related_thoughts: Vec<Uuid>,
    pub evidence: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub status: ThoughtStatus,
}

// ── Knowledge ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeSource {
    Learned,
    Derived,
    Hypothesized,
    Observed,
}

impl KnowledgeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeSource::Learned => "learned",
            KnowledgeSource::Derived => "derived",
            KnowledgeSource::Hypothesized => "hypothesized",
            KnowledgeSource::Observed => "observed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "learned" => Some(KnowledgeSource::Learned),
            "derived" => Some(KnowledgeSource::Derived),
            "hypothesized" => Some(KnowledgeSource::Hypothesized),
            "observed" => Some(KnowledgeSource::Observed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: Uuid,
    pub concept: String,
    pub definition: String,
    pub domain: String,
    pub connections: Vec<String>,
    pub confidence: f64,
    pub source: KnowledgeSource,
    pub last_updated: DateTime<Utc>,
    pub usage_count: u64,
}

// ── Theory ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TheoryStatus {
    Forming,
    Testing,
    Validated,
    Refuted,
    Evolving,
}

impl TheoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TheoryStatus::Forming => "forming",
            TheoryStatus::Testing => "testing",
            TheoryStatus::Validated => "validated",
            TheoryStatus::Refuted => "refuted",
            TheoryStatus::Evolving => "evolving",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "forming" => Some(TheoryStatus::Forming),
            "testing" => Some(TheoryStatus::Testing),
            "validated" => Some(TheoryStatus::Validated),
            "refuted" => Some(TheoryStatus::Refuted),
            "evolving" => Some(TheoryStatus::Evolving),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theory {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub domain: String,
    pub hypothesis: String,
    pub evidence: Vec<String>,
    pub predictions: Vec<String>,
    pub confidence: f64,
    pub novelty: f64,
    pub complexity: f64,
    pub supporting_thoughts: Vec<Uuid>,
    pub contradicting_evidence: Vec<String>,
    pub status: TheoryStatus,
    pub created_at: DateTime<Utc>,
    pub last_evolved: DateTime<Utc>,
}

// ── Insight ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Pattern,
    Anomaly,
    Connection,
    Breakthrough,
    Paradox,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::Pattern => "pattern",
            InsightKind::Anomaly => "anomaly",
            InsightKind::Connection => "connection",
            InsightKind::Breakthrough => "breakthrough",
            InsightKind::Paradox => "paradox",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pattern" => Some(InsightKind::Pattern),
            "anomaly" => Some(InsightKind::Anomaly),
            "connection" => Some(InsightKind::Connection),
            "breakthrough" => Some(InsightKind::Breakthrough),
            "paradox" => Some(InsightKind::Paradox),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub domain: String,
    pub significance: f64,
    pub related_concepts: Vec<String>,
    pub implications: Vec<String>,
    pub discovered_at: DateTime<Utc>,
}

// ── Change Feed ─────────────────────────────────────────────────────

/// Pushed to subscribers on every state update or record insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Monotonically increasing sequence number.
    pub seq: u64,
    pub kind: ChangeKind,
    /// Id of the inserted record, if any.
    pub record_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    StateUpdated,
    ThoughtAdded,
    KnowledgeAdded,
    TheoryAdded,
    InsightAdded,
}

// ── API payloads ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub topic: String,
}

/// Returned by every state-changing command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAck {
    pub mode: Mode,
    pub current_focus: String,
    pub generation: u64,
    pub autonomous_mode: bool,
}

impl From<&CognitiveState> for CommandAck {
    fn from(state: &CognitiveState) -> Self {
        Self {
            mode: state.mode,
            current_focus: state.current_focus.clone(),
            generation: state.generation,
            autonomous_mode: state.autonomous_mode,
        }
    }
}

// ── Journal Event ───────────────────────────────────────────────────

/// An event recorded in the append-only activity journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: JournalEventKind,
    /// Scheduler job that produced this event (if any).
    pub job_id: Option<Uuid>,
    /// Cycle that produced this event (if any).
    pub cycle: Option<CycleKind>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEventKind {
    CommandIssued,
    StepCompleted,
    StepSkipped,
    StepFailed,
    ChainResumed,
    SystemStartup,
    SystemShutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_serializes_snake_case() {
        let json = serde_json::to_string(&Mode::DeepAnalysis).unwrap();
        assert_eq!(json, "\"deep_analysis\"");
        let back: Mode = serde_json::from_str("\"autonomous\"").unwrap();
        assert_eq!(back, Mode::Autonomous);
    }

    #[test]
    fn sustained_cycles() {
        assert_eq!(Mode::Thinking.sustained_cycle(), Some(CycleKind::Thinking));
        assert_eq!(Mode::Autonomous.sustained_cycle(), Some(CycleKind::Autonomous));
        assert_eq!(Mode::DeepAnalysis.sustained_cycle(), None);
        assert_eq!(Mode::Idle.sustained_cycle(), None);
    }

    #[test]
    fn unit_interval_clamps() {
        assert_eq!(unit_interval(1.3), 1.0);
        assert_eq!(unit_interval(-0.2), 0.0);
        assert_eq!(unit_interval(0.42), 0.42);
        assert_eq!(unit_interval(f64::NAN), 0.0);
    }

    #[test]
    fn new_state_defaults() {
        let s = CognitiveState::new(0.5, 0.7, 1.4);
        assert_eq!(s.mode, Mode::Idle);
        assert_eq!(s.current_focus, CognitiveState::INITIAL_FOCUS);
        assert_eq!(s.total_thoughts, 0);
        assert_eq!(s.curiosity_level, 1.0);
        assert!(!s.autonomous_mode);
        assert_eq!(s.generation, 0);
        assert_eq!(s.autonomous_generation, 0);
    }

    #[test]
    fn enter_bumps_generation_and_invalidates() {
        let mut s = CognitiveState::new(0.5, 0.7, 0.8);
        let g1 = s.enter(Mode::Learning, "learning");
        assert!(s.is_current(CycleKind::Learning, g1));

        let g2 = s.enter(Mode::Thinking, "thinking");
        assert_eq!(g2, g1 + 1);
        assert!(!s.is_current(CycleKind::Learning, g1));
        assert!(!s.is_current(CycleKind::Thinking, g1));
        assert!(s.is_current(CycleKind::Thinking, g2));
    }

    #[test]
    fn autonomous_requires_flag() {
        let mut s = CognitiveState::new(0.5, 0.7, 0.8);
        s.enter(Mode::Autonomous, "auto");
        assert!(!s.is_current(CycleKind::Autonomous, 0));
        let g = s.set_autonomous(true);
        assert!(s.is_current(CycleKind::Autonomous, g));
        assert_eq!(s.chain_generation(CycleKind::Autonomous), g);
    }

    #[test]
    fn autonomous_survives_mode_change_until_flag_flips() {
        let mut s = CognitiveState::new(0.5, 0.7, 0.8);
        s.enter(Mode::Autonomous, "auto");
        let g = s.set_autonomous(true);

        let thinking = s.enter(Mode::Thinking, "thinking");
        assert!(s.is_current(CycleKind::Autonomous, g));
        assert!(s.is_current(CycleKind::Thinking, thinking));

        s.set_autonomous(false);
        assert!(!s.is_current(CycleKind::Autonomous, g));
        // A later re-enable starts a fresh dispatcher; the old one stays stale.
        let g2 = s.set_autonomous(true);
        assert!(!s.is_current(CycleKind::Autonomous, g));
        assert!(s.is_current(CycleKind::Autonomous, g2));
    }

    #[test]
    fn enum_string_roundtrip() {
        for kind in [
            ThoughtKind::Observation,
            ThoughtKind::Hypothesis,
            ThoughtKind::Theory,
            ThoughtKind::Question,
            ThoughtKind::Insight,
            ThoughtKind::Connection,
        ] {
            assert_eq!(ThoughtKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(InsightKind::parse("breakthrough"), Some(InsightKind::Breakthrough));
        assert_eq!(TheoryStatus::parse("forming"), Some(TheoryStatus::Forming));
        assert_eq!(KnowledgeSource::parse("nope"), None);
    }

    #[test]
    fn thought_kind_serialized_as_type() {
        let thought = Thought {
            id: Uuid::nil(),
            content: "c".into(),
            kind: ThoughtKind::Question,
            domain: "Physics".into(),
            confidence: 0.5,
            complexity: 0.5,
            novelty: 0.5,
            reasoning: "r".into(),
            parent_thought_id: None,
            related_thoughts: vec![],
            evidence: vec![],
            timestamp: Utc::now(),
            status: ThoughtStatus::Active,
        };
        let json = serde_json::to_string(&thought).unwrap();
        assert!(json.contains("\"type\":\"question\""));
        assert!(json.contains("\"status\":\"active\""));
    }
}
