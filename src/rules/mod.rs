// Rule matcher — deterministic blacklist/whitelist lookup.
//
// Pure and stateless after construction: every match is a function of the
// domain and the loaded lists, safe to call from any shard without
// synchronization. Tie-break order is blacklist > whitelist > no-match.

use std::collections::HashMap;

use anyhow::{Context, Result};
use regex_lite::Regex;
use serde::Serialize;
use tracing::warn;

use crate::knowledge::KnowledgeBase;

/// Which list, if any, matched the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOutcome {
    Blacklist,
    Whitelist,
    None,
}

impl RuleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOutcome::Blacklist => "blacklist",
            RuleOutcome::Whitelist => "whitelist",
            RuleOutcome::None => "none",
        }
    }
}

impl std::fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The rule matcher's verdict for one domain.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub outcome: RuleOutcome,
    pub category: Option<String>,
    pub static_weight: f64,
}

impl RuleMatch {
    fn none() -> Self {
        Self {
            outcome: RuleOutcome::None,
            category: None,
            static_weight: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Tag {
    category: String,
    weight: f64,
}

/// Compiled domain lists. Exact entries sit in a map; suffix matching
/// walks the entry list (lists are operator-curated and small).
pub struct RuleSet {
    black_exact: HashMap<String, Tag>,
    black_suffixes: Vec<(String, Tag)>,
    black_patterns: Vec<(Regex, Tag)>,
    white_exact: HashMap<String, Tag>,
    white_suffixes: Vec<(String, Tag)>,
}

impl RuleSet {
    /// Compile the knowledge base's lists into a matcher.
    pub fn from_knowledge(kb: &KnowledgeBase) -> Result<Self> {
        let mut black_exact = HashMap::new();
        let mut black_suffixes = Vec::new();
        for entry in &kb.blacklist {
            let domain = entry.domain.to_ascii_lowercase();
            let tag = Tag {
                category: entry.category.clone(),
                weight: entry.weight,
            };
            black_exact.insert(domain.clone(), tag.clone());
            black_suffixes.push((domain, tag));
        }

        let mut black_patterns = Vec::new();
        for entry in &kb.blacklist_patterns {
            let regex = Regex::new(&entry.pattern)
                .with_context(|| format!("Invalid blacklist pattern: {}", entry.pattern))?;
            black_patterns.push((
                regex,
                Tag {
                    category: entry.category.clone(),
                    weight: entry.weight,
                },
            ));
        }

        let mut white_exact = HashMap::new();
        let mut white_suffixes = Vec::new();
        for entry in &kb.whitelist {
            let domain = entry.domain.to_ascii_lowercase();
            let tag = Tag {
                category: entry.category.clone(),
                weight: entry.weight,
            };
            white_exact.insert(domain.clone(), tag.clone());
            white_suffixes.push((domain, tag));
        }

        Ok(Self {
            black_exact,
            black_suffixes,
            black_patterns,
            white_exact,
            white_suffixes,
        })
    }

    /// Look up a domain (and its request path, for pattern entries).
    ///
    /// A domain that hits both lists is a misconfiguration: blacklist takes
    /// precedence and the collision is logged as a configuration warning.
    pub fn match_domain(&self, domain: &str, path: &str) -> RuleMatch {
        let black = self.lookup_blacklist(domain, path);
        let white = self.lookup_whitelist(domain);

        match (black, white) {
            (Some(tag), Some(_)) => {
                warn!(
                    domain,
                    "Domain matches both blacklist and whitelist; blacklist wins"
                );
                Self::hit(RuleOutcome::Blacklist, tag)
            }
            (Some(tag), None) => Self::hit(RuleOutcome::Blacklist, tag),
            (None, Some(tag)) => Self::hit(RuleOutcome::Whitelist, tag),
            (None, None) => RuleMatch::none(),
        }
    }

    fn hit(outcome: RuleOutcome, tag: &Tag) -> RuleMatch {
        RuleMatch {
            outcome,
            category: Some(tag.category.clone()),
            static_weight: tag.weight,
        }
    }

    fn lookup_blacklist(&self, domain: &str, path: &str) -> Option<&Tag> {
        if let Some(tag) = self.black_exact.get(domain) {
            return Some(tag);
        }
        if let Some(tag) = suffix_lookup(&self.black_suffixes, domain) {
            return Some(tag);
        }
        // Pattern entries see the path too: `upload.*anonymous`-style
        // rules key on the full request, not just the host.
        let full = format!("{domain}{path}");
        self.black_patterns
            .iter()
            .find(|(regex, _)| regex.is_match(domain) || regex.is_match(&full))
            .map(|(_, tag)| tag)
    }

    fn lookup_whitelist(&self, domain: &str) -> Option<&Tag> {
        self.white_exact
            .get(domain)
            .or_else(|| suffix_lookup(&self.white_suffixes, domain))
    }
}

fn suffix_lookup<'a>(entries: &'a [(String, Tag)], domain: &str) -> Option<&'a Tag> {
    entries.iter().find_map(|(suffix, tag)| {
        let dotted = domain
            .len()
            .checked_sub(suffix.len() + 1)
            .map(|boundary| domain.ends_with(suffix) && domain.as_bytes()[boundary] == b'.')
            .unwrap_or(false);
        (dotted).then_some(tag)
    })
}
