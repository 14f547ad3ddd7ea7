//! Reconciliation of the two statistics sources.
//!
//! The web detail endpoint and the mobile statistics endpoint both
//! under-report independently and non-systematically; taking the larger
//! play count is the documented mitigation. The policy lives behind
//! [`MergePolicy`] so it can be swapped (say, for a weighted blend)
//! without touching the mapper.

use serde::Serialize;

use crate::normalization::record::{RawStatistics, SecondaryStatistics};
use crate::normalization::units::coerce_count;

/// Reconciled counters. Always non-negative integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub play: u64,
    pub digg: u64,
    pub comment: u64,
    pub share: u64,
    pub collect: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// The larger of the two play counts wins.
    #[default]
    MaxWins,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticsReconciler {
    policy: MergePolicy,
}

impl StatisticsReconciler {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    /// Merge the primary snapshot with an optional secondary one.
    ///
    /// Every counter except the play count comes from the primary source
    /// alone; the secondary endpoint only reliably reports plays. Without a
    /// secondary snapshot the coerced primary play count is used unchanged.
    pub fn reconcile(
        &self,
        primary: &RawStatistics,
        secondary: Option<&SecondaryStatistics>,
    ) -> Statistics {
        let mut out = Statistics {
            play: coerce_count(&primary.play_count),
            digg: coerce_count(&primary.digg_count),
            comment: coerce_count(&primary.comment_count),
            share: coerce_count(&primary.share_count),
            collect: coerce_count(&primary.collect_count),
        };
        if let Some(secondary) = secondary {
            out.play = match self.policy {
                MergePolicy::MaxWins => out.play.max(coerce_count(&secondary.play_count)),
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn primary(play: serde_json::Value) -> RawStatistics {
        RawStatistics {
            play_count: play,
            digg_count: json!(10),
            comment_count: json!(2),
            share_count: json!(1),
            collect_count: json!(4),
        }
    }

    fn secondary(play: serde_json::Value) -> SecondaryStatistics {
        SecondaryStatistics {
            aweme_id: json!("1"),
            play_count: play,
        }
    }

    #[test]
    fn larger_secondary_play_count_wins() {
        let merged = StatisticsReconciler::default()
            .reconcile(&primary(json!(1000)), Some(&secondary(json!(1500))));
        assert_eq!(merged.play, 1500);
    }

    #[test]
    fn larger_primary_play_count_is_kept() {
        let merged = StatisticsReconciler::default()
            .reconcile(&primary(json!(2000)), Some(&secondary(json!(1500))));
        assert_eq!(merged.play, 2000);
    }

    #[test]
    fn null_primary_play_falls_back_to_secondary() {
        let merged = StatisticsReconciler::default()
            .reconcile(&primary(json!(null)), Some(&secondary(json!(300))));
        assert_eq!(merged.play, 300);
    }

    #[test]
    fn no_secondary_uses_coerced_primary() {
        let merged = StatisticsReconciler::default().reconcile(&primary(json!(null)), None);
        assert_eq!(merged.play, 0);
        let merged = StatisticsReconciler::default().reconcile(&primary(json!(777)), None);
        assert_eq!(merged.play, 777);
    }

    #[test]
    fn other_counters_come_from_primary_alone() {
        let merged = StatisticsReconciler::default()
            .reconcile(&primary(json!(1)), Some(&secondary(json!(999))));
        assert_eq!(merged.digg, 10);
        assert_eq!(merged.comment, 2);
        assert_eq!(merged.share, 1);
        assert_eq!(merged.collect, 4);
    }
}
