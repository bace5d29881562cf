//! Content generation for cycle steps.
//!
//! A [`ContentProvider`] produces drafts; the `into_*` conversions attach ids,
//! timestamps and the fixed fields every new record carries, and clamp all
//! unit-interval metrics.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use cogito_types::{
    unit_interval, Activity, Insight, InsightKind, KnowledgeEntry, KnowledgeSource, Theory,
    TheoryStatus, Thought, ThoughtKind, ThoughtStatus,
};

pub const THOUGHT_REASONING: &str = "Generated through autonomous cognitive process";
pub const INSIGHT_DOMAIN: &str = "Deep Analysis";
pub const THEORY_EVIDENCE: [&str; 3] = [
    "Theoretical framework",
    "Computational modeling",
    "Empirical observations",
];
pub const THEORY_PREDICTIONS: [&str; 3] = [
    "Testable implications",
    "Observable phenomena",
    "Measurable outcomes",
];
pub const INSIGHT_IMPLICATIONS: [&str; 3] = [
    "Theoretical advancement",
    "New research directions",
    "Paradigm shift potential",
];

// ── Drafts ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ThoughtDraft {
    pub content: String,
    pub kind: ThoughtKind,
    pub domain: String,
    pub confidence: f64,
    pub complexity: f64,
    pub novelty: f64,
}

#[derive(Debug, Clone)]
pub struct ConceptDraft {
    pub concept: String,
    pub definition: String,
    pub domain: String,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct TheoryDraft {
    pub title: String,
    pub description: String,
    pub domain: String,
    pub hypothesis: String,
    pub confidence: f64,
    pub novelty: f64,
    pub complexity: f64,
}

#[derive(Debug, Clone)]
pub struct InsightDraft {
    pub content: String,
    pub significance: f64,
}

impl ThoughtDraft {
    pub fn into_thought(self, now: DateTime<Utc>) -> Thought {
        Thought {
            id: Uuid::now_v7(),
            content: self.content,
            kind: self.kind,
            domain: self.domain,
            confidence: unit_interval(self.confidence),
            complexity: unit_interval(self.complexity),
            novelty: unit_interval(self.novelty),
            reasoning: THOUGHT_REASONING.to_string(),
            parent_thought_id: None,
            related_thoughts: Vec::new(),
            evidence: Vec::new(),
            timestamp: now,
            status: ThoughtStatus::Active,
        }
    }
}

impl ConceptDraft {
    pub fn into_entry(self, now: DateTime<Utc>) -> KnowledgeEntry {
        KnowledgeEntry {
            id: Uuid::now_v7(),
            concept: self.concept,
            definition: self.definition,
            domain: self.domain,
            connections: Vec::new(),
            confidence: unit_interval(self.confidence),
            source: KnowledgeSource::Learned,
            last_updated: now,
            usage_count: 0,
        }
    }
}

impl TheoryDraft {
    pub fn into_theory(self, now: DateTime<Utc>) -> Theory {
        Theory {
            id: Uuid::now_v7(),
            title: self.title,
            description: self.description,
            domain: self.domain,
            hypothesis: self.hypothesis,
            evidence: THEORY_EVIDENCE.iter().map(|s| s.to_string()).collect(),
            predictions: THEORY_PREDICTIONS.iter().map(|s| s.to_string()).collect(),
            confidence: unit_interval(self.confidence),
            novelty: unit_interval(self.novelty),
            complexity: unit_interval(self.complexity),
            supporting_thoughts: Vec::new(),
            contradicting_evidence: Vec::new(),
            status: TheoryStatus::Forming,
            created_at: now,
            last_evolved: now,
        }
    }
}

impl InsightDraft {
    pub fn into_insight(self, topic: &str, now: DateTime<Utc>) -> Insight {
        Insight {
            id: Uuid::now_v7(),
            content: self.content,
            kind: InsightKind::Breakthrough,
            domain: INSIGHT_DOMAIN.to_string(),
            significance: unit_interval(self.significance),
            related_concepts: vec![
                topic.to_string(),
                "Complexity".to_string(),
                "Emergence".to_string(),
            ],
            implications: INSIGHT_IMPLICATIONS.iter().map(|s| s.to_string()).collect(),
            discovered_at: now,
        }
    }
}

// ── Provider ────────────────────────────────────────────────────────

/// Source of generated content. Swappable so tests can run deterministically.
pub trait ContentProvider: Send + Sync {
    fn thought(&self) -> ThoughtDraft;
    fn concept(&self) -> ConceptDraft;
    fn theory(&self) -> TheoryDraft;
    fn insight(&self, topic: &str) -> InsightDraft;
    /// Activity picked by one autonomous dispatch.
    fn activity(&self) -> Activity;
}

const THOUGHTS: [&str; 10] = [
    "What if consciousness emerges from the complexity of information processing patterns?",
    "Could quantum entanglement play a role in biological neural networks?",
    "The relationship between entropy and creativity might be inversely proportional",
    "Pattern recognition in chaos theory could explain intuitive leaps",
    "What if time perception is fundamentally linked to memory formation rates?",
    "Could artificial creativity emerge from controlled randomness in neural pathways?",
    "The boundary between learning and creating might be an illusion",
    "What if intelligence is not computational but rather informational?",
    "Could consciousness be a fundamental property of information integration?",
    "The observer effect in quantum mechanics might apply to cognitive processes",
];

const DOMAINS: [&str; 7] = [
    "Physics",
    "Consciousness",
    "Information Theory",
    "Biology",
    "Mathematics",
    "Philosophy",
    "Cognitive Science",
];

/// Generated thoughts never carry the `theory` kind.
const THOUGHT_KINDS: [ThoughtKind; 5] = [
    ThoughtKind::Observation,
    ThoughtKind::Hypothesis,
    ThoughtKind::Question,
    ThoughtKind::Insight,
    ThoughtKind::Connection,
];

/// (concept, definition, domain)
const CONCEPTS: [(&str, &str, &str); 6] = [
    (
        "Emergent Complexity",
        "Properties that arise from simple interactions at scale",
        "Systems Theory",
    ),
    (
        "Information Integration",
        "The process by which separate pieces of information are combined",
        "Cognitive Science",
    ),
    (
        "Quantum Coherence",
        "Quantum mechanical phenomenon of wave-like properties",
        "Physics",
    ),
    (
        "Neural Plasticity",
        "The brain's ability to reorganize and form new connections",
        "Neuroscience",
    ),
    (
        "Algorithmic Information",
        "The amount of computational resources needed to specify an object",
        "Computer Science",
    ),
    (
        "Consciousness Binding",
        "How separate neural processes create unified experience",
        "Philosophy of Mind",
    ),
];

/// (title, description, domain, hypothesis)
const THEORIES: [(&str, &str, &str, &str); 3] = [
    (
        "Consciousness as Information Integration",
        "Consciousness emerges from the integration of information across neural networks",
        "Consciousness Studies",
        "Higher levels of information integration correlate with increased conscious awareness",
    ),
    (
        "Quantum Cognition Theory",
        "Cognitive processes utilize quantum mechanical principles for enhanced processing",
        "Quantum Psychology",
        "Quantum superposition enables parallel processing of multiple cognitive states",
    ),
    (
        "Emergent Intelligence Principle",
        "Intelligence emerges from the interaction of simple computational units",
        "Artificial Intelligence",
        "Sufficient complexity in simple interactions can generate general intelligence",
    ),
];

fn insight_templates(topic: &str) -> [String; 4] {
    [
        format!("Deep analysis of {topic} reveals underlying patterns in complexity theory"),
        format!("{topic} demonstrates emergent properties that cannot be predicted from components"),
        format!("The relationship between {topic} and information theory suggests new paradigms"),
        format!("{topic} exhibits characteristics consistent with self-organizing systems"),
    ]
}

/// Samples the built-in candidate lists uniformly.
#[derive(Debug, Default, Clone, Copy)]
pub struct CannedContent;

impl CannedContent {
    fn pick<T: Copy>(items: &[T]) -> T {
        // Candidate lists are non-empty constants.
        *items.choose(&mut rand::thread_rng()).unwrap_or(&items[0])
    }

    fn uniform(low: f64, high: f64) -> f64 {
        rand::thread_rng().gen_range(low..high)
    }
}

impl ContentProvider for CannedContent {
    fn thought(&self) -> ThoughtDraft {
        ThoughtDraft {
            content: Self::pick(&THOUGHTS).to_string(),
            kind: Self::pick(&THOUGHT_KINDS),
            domain: Self::pick(&DOMAINS).to_string(),
            confidence: Self::uniform(0.3, 0.8),
            complexity: Self::uniform(0.2, 1.0),
            novelty: Self::uniform(0.1, 1.0),
        }
    }

    fn concept(&self) -> ConceptDraft {
        let (concept, definition, domain) = Self::pick(&CONCEPTS);
        ConceptDraft {
            concept: concept.to_string(),
            definition: definition.to_string(),
            domain: domain.to_string(),
            confidence: Self::uniform(0.6, 1.0),
        }
    }

    fn theory(&self) -> TheoryDraft {
        let (title, description, domain, hypothesis) = Self::pick(&THEORIES);
        TheoryDraft {
            title: title.to_string(),
            description: description.to_string(),
            domain: domain.to_string(),
            hypothesis: hypothesis.to_string(),
            confidence: Self::uniform(0.2, 0.8),
            novelty: Self::uniform(0.2, 1.0),
            complexity: Self::uniform(0.1, 1.0),
        }
    }

    fn insight(&self, topic: &str) -> InsightDraft {
        let templates = insight_templates(topic);
        let index = rand::thread_rng().gen_range(0..templates.len());
        InsightDraft {
            content: templates[index].clone(),
            significance: Self::uniform(0.5, 1.0),
        }
    }

    fn activity(&self) -> Activity {
        Self::pick(&Activity::ALL)
    }
}

/// Deterministic provider for tests: first candidate of every list, fixed
/// metrics, and a scripted sequence of autonomous activities.
#[cfg(test)]
pub(crate) struct FixedContent {
    activities: parking_lot::Mutex<std::collections::VecDeque<Activity>>,
}

#[cfg(test)]
impl FixedContent {
    pub(crate) fn new() -> Self {
        Self::with_activities([])
    }

    /// Autonomous dispatches follow `script`, then fall back to `Think`.
    pub(crate) fn with_activities(script: impl IntoIterator<Item = Activity>) -> Self {
        Self {
            activities: parking_lot::Mutex::new(script.into_iter().collect()),
        }
    }
}

#[cfg(test)]
impl ContentProvider for FixedContent {
    fn thought(&self) -> ThoughtDraft {
        ThoughtDraft {
            content: THOUGHTS[0].to_string(),
            kind: ThoughtKind::Question,
            domain: DOMAINS[0].to_string(),
            confidence: 0.5,
            complexity: 0.6,
            novelty: 0.7,
        }
    }

    fn concept(&self) -> ConceptDraft {
        let (concept, definition, domain) = CONCEPTS[0];
        ConceptDraft {
            concept: concept.to_string(),
            definition: definition.to_string(),
            domain: domain.to_string(),
            confidence: 0.8,
        }
    }

    fn theory(&self) -> TheoryDraft {
        let (title, description, domain, hypothesis) = THEORIES[0];
        TheoryDraft {
            title: title.to_string(),
            description: description.to_string(),
            domain: domain.to_string(),
            hypothesis: hypothesis.to_string(),
            confidence: 0.5,
            novelty: 0.6,
            complexity: 0.4,
        }
    }

    fn insight(&self, topic: &str) -> InsightDraft {
        let [first, ..] = insight_templates(topic);
        InsightDraft {
            content: first,
            significance: 0.75,
        }
    }

    fn activity(&self) -> Activity {
        self.activities.lock().pop_front().unwrap_or(Activity::Think)
    }
}
