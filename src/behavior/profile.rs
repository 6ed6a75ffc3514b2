// User profiles — first-seen domains and streaming upload statistics.
//
// Running mean/variance use Welford's online algorithm, so the profile
// stores only (count, mean, M2) per category and never raw history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Streaming statistics for one category's upload sizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunningStats {
    pub count: u64,
    pub mean: f64,
    m2: f64,
}

impl RunningStats {
    /// Fold one sample into the statistics (Welford update).
    pub fn push(&mut self, sample: f64) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = sample - self.mean;
        self.m2 += delta * delta2;
    }

    /// Sample variance; 0.0 until there are at least two samples.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// One user's rolling behavioral profile. Created lazily on the user's
/// first event; updated in place on every subsequent one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Domain → when this user first accessed it
    pub domains: HashMap<String, DateTime<Utc>>,
    /// Category → running upload-size statistics
    pub upload_stats: HashMap<String, RunningStats>,
    /// Last event timestamp, used for arena eviction ordering
    pub last_seen: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            domains: HashMap::new(),
            upload_stats: HashMap::new(),
            last_seen: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Direct two-pass mean/variance for comparison against Welford.
    fn direct_stats(samples: &[f64]) -> (f64, f64) {
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = if samples.len() < 2 {
            0.0
        } else {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
        };
        (mean, variance)
    }

    #[test]
    fn welford_matches_direct_computation() {
        let samples = [
            1024.0, 2048.0, 512.0, 8192.0, 300.0, 4096.0, 1536.0, 900.0, 15000.0, 64.0,
        ];
        let mut stats = RunningStats::default();
        for &s in &samples {
            stats.push(s);
        }

        let (mean, variance) = direct_stats(&samples);
        assert!((stats.mean - mean).abs() < 1e-9, "mean drifted");
        assert!(
            (stats.variance() - variance).abs() < 1e-6,
            "variance drifted: welford={} direct={}",
            stats.variance(),
            variance
        );
    }

    #[test]
    fn single_sample_has_zero_variance() {
        let mut stats = RunningStats::default();
        stats.push(500.0);
        assert_eq!(stats.count, 1);
        assert!((stats.mean - 500.0).abs() < f64::EPSILON);
        assert_eq!(stats.variance(), 0.0);
        assert_eq!(stats.stddev(), 0.0);
    }

    #[test]
    fn identical_samples_have_zero_variance() {
        let mut stats = RunningStats::default();
        for _ in 0..50 {
            stats.push(1000.0);
        }
        assert!((stats.mean - 1000.0).abs() < 1e-9);
        assert!(stats.variance().abs() < 1e-9);
    }

    #[test]
    fn welford_is_stable_for_large_offsets() {
        // Classic catastrophic-cancellation case for naive sum-of-squares
        let samples = [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0];
        let mut stats = RunningStats::default();
        for &s in &samples {
            stats.push(s);
        }
        let (_, variance) = direct_stats(&samples);
        assert!((stats.variance() - variance).abs() < 1e-3);
    }
}
