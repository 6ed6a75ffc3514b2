// Colored terminal output for verdicts and engine statistics.
//
// This module handles all terminal-specific formatting; the dispatchers
// and main.rs delegate here.

use colored::Colorize;

use crate::fusion::{RiskLevel, Verdict};
use crate::output::truncate_chars;
use crate::pipeline::StatsSnapshot;

/// One-line rendering, used while streaming events.
pub fn display_verdict_line(verdict: &Verdict) {
    println!(
        "  {:>3}  {:<10} {:<28} {:<24} {}",
        verdict.risk_score,
        colorize_level(verdict.risk_level),
        truncate_chars(&verdict.domain, 28),
        truncate_chars(&verdict.user_id, 24),
        truncate_chars(&verdict.explanation, 70).dimmed(),
    );
}

/// Full rendering of a single verdict, used by `shadowguard score`.
pub fn display_verdict_detail(verdict: &Verdict) {
    println!(
        "\n{}",
        format!("=== Verdict for {} ===", verdict.domain).bold()
    );
    println!("  Risk level: {}", colorize_level(verdict.risk_level));
    println!("  Risk score: {}/100", verdict.risk_score);
    println!("  Dominant category: {}", verdict.dominant_category);
    println!("  Rule outcome: {}", verdict.signals.rule);
    println!(
        "  Semantic: {} ({:.2}{})",
        verdict.signals.semantic.top_category,
        verdict.signals.semantic.confidence,
        if verdict.signals.semantic.degraded {
            ", degraded"
        } else {
            ""
        },
    );
    if verdict.signals.behavioral_unavailable {
        println!("  Behavioral: unavailable");
    } else if verdict.signals.behavioral.is_empty() {
        println!("  Behavioral: no anomalies");
    } else {
        let flags: Vec<&str> = verdict
            .signals
            .behavioral
            .iter()
            .map(|a| a.as_str())
            .collect();
        println!("  Behavioral: {}", flags.join(", "));
    }
    println!("  Explanation: {}", verdict.explanation);
}

/// End-of-run counters.
pub fn display_stats(stats: &StatsSnapshot) {
    println!("\n{}", "Run complete.".bold());
    println!("  Events processed: {}", stats.processed);
    println!("  Rejected (malformed): {}", stats.rejected);
    println!("  Alerts raised: {}", stats.alerts);
    if stats.degraded > 0 {
        println!(
            "  {} {} verdicts used the keyword fallback",
            "Note:".yellow(),
            stats.degraded
        );
    }
}

fn colorize_level(level: RiskLevel) -> String {
    match level {
        RiskLevel::Critical => level.as_str().red().bold().to_string(),
        RiskLevel::High => level.as_str().red().to_string(),
        RiskLevel::Medium => level.as_str().yellow().to_string(),
        RiskLevel::Low => level.as_str().normal().to_string(),
        RiskLevel::Safe => level.as_str().dimmed().to_string(),
    }
}
