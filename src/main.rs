use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncBufReadExt;
use tracing::warn;

use shadowguard::config::Config;
use shadowguard::dispatch::webhook::WebhookDispatcher;
use shadowguard::dispatch::{Dispatcher, MultiDispatcher, TerminalDispatcher};
use shadowguard::event::normalize::{normalize, RawRecord};
use shadowguard::knowledge::KnowledgeBase;
use shadowguard::output::terminal;
use shadowguard::pipeline::{Detector, Pipeline, PipelineOptions};
use shadowguard::semantic::remote::HttpEmbedder;
use shadowguard::semantic::traits::Embedder;

/// Shadowguard: multi-signal risk detection for corporate network activity.
///
/// Scores which user accessed which external domain, how, and with how
/// much data, combining rule lists, semantic similarity, and per-user
/// behavioral baselines into one calibrated verdict.
#[derive(Parser)]
#[command(name = "shadowguard", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream NDJSON activity events through the detection engine
    Run {
        /// Event file to replay; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,

        /// Emit verdicts as raw JSON lines instead of the table view
        #[arg(long)]
        json: bool,
    },

    /// Score a single synthetic event and show the full verdict
    Score {
        /// Domain the user accessed (e.g. chatgpt.com)
        domain: String,

        /// User identifier
        #[arg(long, default_value = "analyst@company.com")]
        user: String,

        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Upload size in bytes
        #[arg(long, default_value = "0")]
        upload: u64,

        /// Request path
        #[arg(long, default_value = "/")]
        url: String,
    },

    /// Show the loaded knowledge base and engine configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shadowguard=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { input, json } => run(input, json).await?,

        Commands::Score {
            domain,
            user,
            method,
            upload,
            url,
        } => {
            let config = Config::load()?;
            let kb = KnowledgeBase::load(&config.knowledge_path)?;
            let detector = Detector::from_knowledge(
                &kb,
                create_embedder(&config),
                Duration::from_millis(config.embedding_timeout_ms),
            )?;

            let raw = RawRecord {
                ts: Some(chrono::Utc::now().to_rfc3339()),
                user_id: Some(user),
                domain: Some(domain),
                url: Some(url),
                method: Some(method),
                upload_size_bytes: Some(upload as i64),
                kind: None,
            };
            let event = normalize(&raw).context("Constructed event failed validation")?;
            println!(
                "Scoring {} {} ({} bytes, user {})...",
                event.method.as_str(),
                event.domain,
                event.upload_size_bytes,
                event.user_id
            );

            // A fresh arena: the one-off score has no history, so the
            // first-seen flags reflect a never-before-seen user.
            let mut arena =
                shadowguard::behavior::arena::ProfileArena::new(config.max_profiles_per_shard);
            let verdict = detector.evaluate(&event, &mut arena).await;

            terminal::display_verdict_detail(&verdict);
            println!("\n{}", serde_json::to_string_pretty(&verdict)?);
        }

        Commands::Status => {
            let config = Config::load()?;
            let kb = KnowledgeBase::load(&config.knowledge_path)?;

            println!("{}", "=== Shadowguard status ===".bold());
            println!("Knowledge base: {}", config.knowledge_path);
            println!(
                "  Anchors: {} ({}-dim embeddings)",
                kb.anchors.len(),
                kb.embedding_dim()
            );
            for anchor in &kb.anchors {
                println!(
                    "    {:<24} weight {:.2}, {} keywords",
                    anchor.name,
                    anchor.weight,
                    anchor.keywords.len()
                );
            }
            println!(
                "  Blacklist: {} domains, {} patterns",
                kb.blacklist.len(),
                kb.blacklist_patterns.len()
            );
            println!("  Whitelist: {} domains", kb.whitelist.len());
            println!(
                "  Fusion weights: rule {:.2} / semantic {:.2} / behavior {:.2}",
                kb.fusion.rule, kb.fusion.semantic, kb.fusion.behavior
            );
            println!("  Anomaly threshold k: {:.1}", kb.anomaly_k);
            println!(
                "Embedding endpoint: {}",
                config.embedding_url.as_deref().unwrap_or("(not configured; keyword fallback)")
            );
            println!("  Timeout: {}ms", config.embedding_timeout_ms);
            println!(
                "Alert webhook: {}",
                config.webhook_url.as_deref().unwrap_or("(not configured)")
            );
            println!("  Threshold: score >= {}", config.alert_threshold);
            println!(
                "Pipeline: {} shards, queue depth {}, {} profiles/shard",
                config.shard_count, config.shard_queue_depth, config.max_profiles_per_shard
            );
        }
    }

    Ok(())
}

/// Stream events from a file or stdin through the pipeline.
async fn run(input: Option<PathBuf>, json: bool) -> Result<()> {
    let config = Config::load()?;
    config.require_shards()?;
    let kb = KnowledgeBase::load(&config.knowledge_path)?;

    let detector = Arc::new(Detector::from_knowledge(
        &kb,
        create_embedder(&config),
        Duration::from_millis(config.embedding_timeout_ms),
    )?);

    let mut targets: Vec<Arc<dyn Dispatcher>> = vec![Arc::new(TerminalDispatcher { json })];
    if let Some(url) = config.webhook_url.as_deref() {
        targets.push(Arc::new(WebhookDispatcher::new(
            url,
            config.alert_threshold,
        )?));
    }
    let dispatcher: Arc<dyn Dispatcher> = Arc::new(MultiDispatcher::new(targets));

    let pipeline = Pipeline::spawn(
        detector,
        dispatcher,
        PipelineOptions {
            shard_count: config.shard_count,
            queue_depth: config.shard_queue_depth,
            max_profiles_per_shard: config.max_profiles_per_shard,
            alert_threshold: config.alert_threshold,
        },
    );
    let stats = pipeline.stats();

    if !json {
        println!(
            "  {:>3}  {:<10} {:<28} {:<24} {}",
            "Scr".dimmed(),
            "Level".dimmed(),
            "Domain".dimmed(),
            "User".dimmed(),
            "Explanation".dimmed(),
        );
    }

    match input {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read events from {}", path.display()))?;
            let lines: Vec<&str> = content.lines().collect();

            let pb = ProgressBar::new(lines.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  Replay [{bar:30}] {pos}/{len} ({eta})")
                    .unwrap(),
            );

            for line in lines {
                ingest_line(line, &pipeline, &stats).await?;
                pb.inc(1);
            }
            pb.finish_and_clear();
        }
        None => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut lines = stdin.lines();
            while let Some(line) = lines.next_line().await? {
                ingest_line(&line, &pipeline, &stats).await?;
            }
        }
    }

    let snapshot = pipeline.shutdown().await;
    if json {
        warn!(
            processed = snapshot.processed,
            rejected = snapshot.rejected,
            alerts = snapshot.alerts,
            degraded = snapshot.degraded,
            "Run complete"
        );
    } else {
        terminal::display_stats(&snapshot);
    }

    Ok(())
}

/// Parse, normalize, and submit one NDJSON line. Malformed records are
/// counted and logged, never retried, and never reach the pipeline.
async fn ingest_line(
    line: &str,
    pipeline: &Pipeline,
    stats: &Arc<shadowguard::pipeline::EngineStats>,
) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    let raw: RawRecord = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => {
            stats.record_rejected();
            warn!(error = %e, "Rejected undecodable event record");
            return Ok(());
        }
    };

    match normalize(&raw) {
        Ok(event) => pipeline.submit(event).await,
        Err(e) => {
            stats.record_rejected();
            warn!(error = %e, "Rejected malformed event");
            Ok(())
        }
    }
}

/// Build the embedding capability from configuration, if deployed.
fn create_embedder(config: &Config) -> Option<Box<dyn Embedder>> {
    config.embedding_url.as_deref().map(|url| {
        Box::new(HttpEmbedder::new(url, config.embedding_api_key.clone())) as Box<dyn Embedder>
    })
}
