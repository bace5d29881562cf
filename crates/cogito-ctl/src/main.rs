//! Command-line client for the cogito daemon.
//!
//! Usage: cogito-ctl [--url URL] <command>

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cogito_types::{
    AnalyzeRequest, ChangeEvent, CognitiveState, CommandAck, Insight, JournalEvent,
    KnowledgeEntry, Theory, Thought,
};
use serde::de::DeserializeOwned;

#[derive(Parser)]
#[command(name = "cogito-ctl", about = "Drive and observe the cogito daemon")]
struct Cli {
    /// Base URL of the daemon's HTTP API.
    #[arg(long, env = "COGITO_URL", default_value = "http://127.0.0.1:7420")]
    url: String,

    /// Print raw JSON instead of the formatted view.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: CtlCommand,
}

#[derive(Subcommand)]
enum CtlCommand {
    /// Start the thinking cycle.
    Think,
    /// Start the learning cycle.
    Learn,
    /// Start the theorizing cycle.
    Theorize,
    /// Toggle autonomous mode.
    Autonomous,
    /// Halt every cycle and go idle.
    Stop,
    /// Run a one-shot deep analysis of a topic.
    Analyze { topic: String },
    /// Show the cognitive state.
    State,
    /// List recent thoughts.
    Thoughts {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Only thoughts of this kind (observation, question, ...).
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        domain: Option<String>,
    },
    /// List theories, most novel first.
    Theories,
    /// Show the ten most significant insights.
    Insights,
    /// List knowledge entries.
    Knowledge {
        #[arg(long)]
        domain: Option<String>,
    },
    /// Search knowledge by concept.
    Search {
        query: String,
        #[arg(long)]
        domain: Option<String>,
    },
    /// Show recent journal events.
    Journal {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Daemon health.
    Health,
    /// Follow the change feed until interrupted.
    Watch,
}

struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    fn new(base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let resp = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {path} failed"))?;
        decode(resp).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Option<&AnalyzeRequest>) -> Result<T> {
        let mut req = self.http.post(self.url(path));
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("POST {path} failed"))?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or(body);
        bail!("daemon returned {status}: {message}");
    }
    resp.json::<T>().await.context("failed to decode response")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new(&cli.url)?;
    let json = cli.json;

    match cli.command {
        CtlCommand::Think => ack(client.post("/api/think", None).await?, json),
        CtlCommand::Learn => ack(client.post("/api/learn", None).await?, json),
        CtlCommand::Theorize => ack(client.post("/api/theorize", None).await?, json),
        CtlCommand::Autonomous => ack(client.post("/api/autonomous", None).await?, json),
        CtlCommand::Stop => ack(client.post("/api/stop", None).await?, json),
        CtlCommand::Analyze { topic } => {
            let body = AnalyzeRequest { topic };
            ack(client.post("/api/analyze", Some(&body)).await?, json)
        }
        CtlCommand::State => {
            let state: CognitiveState = client.get("/api/state", &[]).await?;
            if json {
                return print_json(&state);
            }
            print_state(&state);
            Ok(())
        }
        CtlCommand::Thoughts { limit, kind, domain } => {
            let mut query = vec![("limit", limit.to_string())];
            query.extend(kind.map(|k| ("kind", k)));
            query.extend(domain.map(|d| ("domain", d)));
            let thoughts: Vec<Thought> = client.get("/api/thoughts", &query).await?;
            if json {
                return print_json(&thoughts);
            }
            for t in &thoughts {
                println!(
                    "{}  [{:<11}] {:<18} conf {:.2} nov {:.2}  {}",
                    t.timestamp.format("%H:%M:%S"),
                    t.kind.as_str(),
                    t.domain,
                    t.confidence,
                    t.novelty,
                    t.content
                );
            }
            Ok(())
        }
        CtlCommand::Theories => {
            let theories: Vec<Theory> = client.get("/api/theories", &[]).await?;
            if json {
                return print_json(&theories);
            }
            for t in &theories {
                println!("{:.2}  {} ({})", t.novelty, t.title, t.domain);
                println!("      {}", t.hypothesis);
            }
            Ok(())
        }
        CtlCommand::Insights => {
            let insights: Vec<Insight> = client.get("/api/insights", &[]).await?;
            if json {
                return print_json(&insights);
            }
            for i in &insights {
                println!("{:.2}  [{}] {}", i.significance, i.kind.as_str(), i.content);
            }
            Ok(())
        }
        CtlCommand::Knowledge { domain } => {
            let query: Vec<(&str, String)> = domain.map(|d| ("domain", d)).into_iter().collect();
            let entries: Vec<KnowledgeEntry> = client.get("/api/knowledge", &query).await?;
            print_knowledge(&entries, json)
        }
        CtlCommand::Search { query, domain } => {
            let mut params = vec![("q", query)];
            params.extend(domain.map(|d| ("domain", d)));
            let entries: Vec<KnowledgeEntry> =
                client.get("/api/knowledge/search", &params).await?;
            print_knowledge(&entries, json)
        }
        CtlCommand::Journal { limit } => {
            let events: Vec<JournalEvent> = client
                .get("/api/journal", &[("limit", limit.to_string())])
                .await?;
            if json {
                return print_json(&events);
            }
            for e in &events {
                println!(
                    "{}  {:<16} {}",
                    e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    format!("{:?}", e.kind),
                    e.payload
                );
            }
            Ok(())
        }
        CtlCommand::Health => {
            let report: serde_json::Value = client.get("/api/health", &[]).await?;
            print_json(&report)
        }
        CtlCommand::Watch => watch(&client, json).await,
    }
}

fn ack(ack: CommandAck, json: bool) -> Result<()> {
    if json {
        return print_json(&ack);
    }
    println!("mode: {} (generation {})", ack.mode, ack.generation);
    println!("focus: {}", ack.current_focus);
    if ack.autonomous_mode {
        println!("autonomous: on");
    }
    Ok(())
}

fn print_state(s: &CognitiveState) {
    println!("mode             {}", s.mode);
    println!("focus            {}", s.current_focus);
    println!("autonomous       {}", if s.autonomous_mode { "on" } else { "off" });
    println!("thoughts         {} ({:.1}/min)", s.total_thoughts, s.thoughts_per_minute);
    println!("knowledge        {}", s.total_knowledge);
    println!("theories         {}", s.total_theories);
    println!("learning rate    {:.2}", s.learning_rate);
    println!("creativity       {:.2}", s.creativity_level);
    println!("curiosity        {:.2}", s.curiosity_level);
    println!("last activity    {}", s.last_activity.to_rfc3339());
}

fn print_knowledge(entries: &[KnowledgeEntry], json: bool) -> Result<()> {
    if json {
        return print_json(&entries);
    }
    for k in entries {
        println!("{:.2}  {} [{}]: {}", k.confidence, k.concept, k.domain, k.definition);
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Stream `/api/events` and print one line per change.
async fn watch(client: &Client, json: bool) -> Result<()> {
    let mut resp = client
        .http
        .get(client.url("/api/events"))
        .header("accept", "text/event-stream")
        .send()
        .await
        .context("failed to connect to change feed")?;
    if !resp.status().is_success() {
        bail!("daemon returned {}", resp.status());
    }

    let mut buffer = String::new();
    while let Some(chunk) = resp.chunk().await? {
        buffer.push_str(&String::from_utf8_lossy(&chunk));
        for data in drain_events(&mut buffer) {
            if json {
                println!("{data}");
                continue;
            }
            match serde_json::from_str::<ChangeEvent>(&data) {
                Ok(event) => println!(
                    "#{:<6} {}  {:?}{}",
                    event.seq,
                    event.timestamp.format("%H:%M:%S"),
                    event.kind,
                    event
                        .record_id
                        .map(|id| format!("  {id}"))
                        .unwrap_or_default()
                ),
                Err(_) => println!("{data}"),
            }
        }
    }
    Ok(())
}

/// Remove every complete SSE frame from `buffer` and return their `data`
/// lines. Keep-alive comments carry no data and yield nothing.
fn drain_events(buffer: &mut String) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(end) = buffer.find("\n\n") {
        let frame: String = buffer.drain(..end + 2).collect();
        out.extend(
            frame
                .lines()
                .filter_map(|l| l.strip_prefix("data:"))
                .map(|d| d.trim().to_string()),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_complete_frames_only() {
        let mut buffer = String::from("event: change\ndata: {\"seq\":1}\n\n:\n\nevent: change\ndata: {\"se");
        let events = drain_events(&mut buffer);
        assert_eq!(events, vec!["{\"seq\":1}".to_string()]);
        assert_eq!(buffer, "event: change\ndata: {\"se");

        buffer.push_str("q\":2}\n\n");
        assert_eq!(drain_events(&mut buffer), vec!["{\"seq\":2}".to_string()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["cogito-ctl", "analyze", "Quantum Gravity"]).unwrap();
        assert!(matches!(cli.command, CtlCommand::Analyze { ref topic } if topic == "Quantum Gravity"));

        let cli = Cli::try_parse_from(["cogito-ctl", "--json", "thoughts", "--limit", "5"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, CtlCommand::Thoughts { limit: 5, .. }));
    }
}
