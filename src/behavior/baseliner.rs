// Behavioral baseliner — anomaly rules over the per-user profile.
//
// Every rule is evaluated against the profile state *before* this event,
// then the profile update is applied as the final step. Cancellation
// mid-event therefore never leaves a half-updated profile, and a "first"
// observation can never be double-counted.

use serde::Serialize;

use super::profile::UserProfile;
use crate::event::ActivityEvent;

/// An anomaly flag raised by one of the independent rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anomaly {
    /// Domain absent from the profile's seen set at event time
    FirstSeenDomain,
    /// Upload size beyond mean + k * stddev for the event's category
    UploadOutlier,
    /// The event's dominant category has no prior observations
    NewCategoryForUser,
}

impl Anomaly {
    pub fn as_str(&self) -> &'static str {
        match self {
            Anomaly::FirstSeenDomain => "first_seen_domain",
            Anomaly::UploadOutlier => "upload_outlier",
            Anomaly::NewCategoryForUser => "new_category_for_user",
        }
    }
}

/// Outcome of baselining one event.
#[derive(Debug, Clone, Serialize)]
pub struct BehavioralResult {
    pub anomalies: Vec<Anomaly>,
    /// Profile state could not be read or written; fusion treats the
    /// behavioral contribution as neutral
    pub unavailable: bool,
}

impl BehavioralResult {
    pub fn unavailable() -> Self {
        Self {
            anomalies: Vec::new(),
            unavailable: true,
        }
    }

    pub fn fired(&self, anomaly: Anomaly) -> bool {
        self.anomalies.contains(&anomaly)
    }
}

/// Stateless anomaly evaluator. Profiles live in the shard's arena; the
/// baseliner only encodes the rules and the update discipline.
pub struct Baseliner {
    /// Outlier threshold multiplier (upload > mean + k * stddev)
    k: f64,
}

impl Baseliner {
    pub fn new(k: f64) -> Self {
        Self { k }
    }

    /// Evaluate the anomaly rules, then fold the event into the profile.
    ///
    /// The outlier rule needs at least two prior samples; with fewer,
    /// stddev is meaningless and the rule stays quiet. The update is the
    /// last thing that happens here.
    pub fn observe(
        &self,
        profile: &mut UserProfile,
        event: &ActivityEvent,
        category: &str,
    ) -> BehavioralResult {
        let mut anomalies = Vec::new();

        if !profile.domains.contains_key(&event.domain) {
            anomalies.push(Anomaly::FirstSeenDomain);
        }

        let stats = profile.upload_stats.get(category);
        match stats {
            None => anomalies.push(Anomaly::NewCategoryForUser),
            Some(s) if s.count == 0 => anomalies.push(Anomaly::NewCategoryForUser),
            Some(s) => {
                if s.count >= 2 {
                    let threshold = s.mean + self.k * s.stddev();
                    if event.upload_size_bytes as f64 > threshold {
                        anomalies.push(Anomaly::UploadOutlier);
                    }
                }
            }
        }

        // Update phase: fixed first-seen timestamp, then running stats.
        profile
            .domains
            .entry(event.domain.clone())
            .or_insert(event.timestamp);
        profile
            .upload_stats
            .entry(category.to_string())
            .or_default()
            .push(event.upload_size_bytes as f64);
        profile.last_seen = event.timestamp;

        BehavioralResult {
            anomalies,
            unavailable: false,
        }
    }
}
