//! ROPE and expected-loss decision rules.
//!
//! The status ladder, first rule wins:
//!
//! 1. Total exposure below `min_total_n` → collecting_data.
//! 2. No conversions anywhere and no engagement signal → collecting_data
//!    (nothing has moved any posterior off the prior).
//! 3. HDI of the top-two difference inside the ROPE → practically
//!    equivalent.
//! 4. Leader's expected loss within ε, HDI excluding zero, and at least one
//!    conversion observed on the leader → ready to ship. A proxy-only
//!    posterior never ships.
//! 5. Otherwise keep testing.
//!
//! Expected-loss ties within 1e-12 resolve to the earlier variant so
//! reruns of the same snapshot are stable.

use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

use crate::config::defaults as d;
use crate::engine::sampler::{hdi, PosteriorDraws};
use crate::engine::stats;
use crate::types::report::{DecisionStatus, DecisionSummary, RopeAnalysis, RopeVerdict};
use crate::types::snapshot::ExperimentSnapshot;

/// Decision stage output consumed by the recommender and the result
/// assembly.
#[derive(Debug, Clone)]
pub struct Decision {
    pub summary: DecisionSummary,
    pub rope_analysis: Option<RopeAnalysis>,
    /// Index of the variant with the lowest expected loss.
    pub leader: usize,
    /// Index of the second-best variant by expected loss.
    pub runner_up: usize,
    /// HDI of leader − runner-up.
    pub diff_hdi: [f64; 2],
}

/// Leading and runner-up variants by expected loss, earlier index winning
/// ties within [`d::LOSS_TIE_EPSILON`].
pub fn leader_and_runner_up(losses: &[f64]) -> (usize, usize) {
    let mut leader = 0;
    for v in 1..losses.len() {
        if losses[v] < losses[leader] - d::LOSS_TIE_EPSILON {
            leader = v;
        }
    }
    let mut runner_up = usize::from(leader == 0);
    for v in 0..losses.len() {
        if v == leader || v == runner_up {
            continue;
        }
        if losses[v] < losses[runner_up] - d::LOSS_TIE_EPSILON {
            runner_up = v;
        }
    }
    (leader, runner_up)
}

/// Apply the decision ladder.
pub fn decide(
    snapshot: &ExperimentSnapshot,
    posterior_means: &[f64],
    losses: &[f64],
    draws: &PosteriorDraws,
    proxy_present: bool,
) -> Decision {
    let config = &snapshot.config;
    let (leader, runner_up) = leader_and_runner_up(losses);
    let leading_loss = losses[leader];

    let diff = draws.diff_samples(leader, runner_up);
    let diff_hdi = hdi(&diff, config.hdi_mass);

    let total = snapshot.total_exposures();
    let rope = config.rope_half_width;

    let status = if total < config.min_total_n {
        DecisionStatus::CollectingData
    } else if snapshot.total_conversions() == 0 && !proxy_present {
        DecisionStatus::CollectingData
    } else if diff_hdi[0] >= -rope && diff_hdi[1] <= rope {
        DecisionStatus::PracticallyEquivalent
    } else if leading_loss <= config.loss_threshold
        && (diff_hdi[0] > 0.0 || diff_hdi[1] < 0.0)
        && snapshot.conversions_of(&snapshot.variants[leader]) > 0
    {
        DecisionStatus::ReadyToShip
    } else {
        DecisionStatus::KeepTesting
    };

    debug!(
        status = status.as_str(),
        leader = %snapshot.variants[leader],
        leading_loss,
        hdi_lo = diff_hdi[0],
        hdi_hi = diff_hdi[1],
        "decision"
    );

    let winning_variant = match status {
        DecisionStatus::ReadyToShip => Some(snapshot.variants[leader].clone()),
        _ => None,
    };

    let confidence_pct = if leading_loss <= 0.0 {
        100.0
    } else {
        (config.loss_threshold / leading_loss * 100.0).min(100.0)
    };

    let rope_analysis = if total == 0 {
        None
    } else {
        Some(rope_analysis(leader, runner_up, diff_hdi, rope))
    };

    let estimated_days = match status {
        DecisionStatus::CollectingData | DecisionStatus::KeepTesting => estimated_days(
            snapshot,
            posterior_means,
            leader,
            runner_up,
            total,
        ),
        _ => None,
    };

    Decision {
        summary: DecisionSummary {
            decision_status: status,
            winning_variant,
            leading_variant_loss: leading_loss,
            epsilon_threshold: config.loss_threshold,
            confidence_pct,
            estimated_days,
        },
        rope_analysis,
        leader,
        runner_up,
        diff_hdi,
    }
}

/// HDI-vs-ROPE verdict for the top-two pair, reported with `a` as the
/// earlier-ordered variant of the pair.
fn rope_analysis(leader: usize, runner_up: usize, diff_hdi: [f64; 2], rope: f64) -> RopeAnalysis {
    // diff_hdi is leader − runner-up; flip when the leader is the
    // later-ordered one so the reported interval is a − b.
    let hdi = if leader < runner_up {
        diff_hdi
    } else {
        [-diff_hdi[1], -diff_hdi[0]]
    };

    let decision = if hdi[0] >= -rope && hdi[1] <= rope {
        RopeVerdict::Equivalent
    } else if hdi[0] > rope {
        RopeVerdict::ShipA
    } else if hdi[1] < -rope {
        RopeVerdict::ShipB
    } else {
        RopeVerdict::Undecided
    };

    RopeAnalysis {
        rope: [-rope, rope],
        hdi,
        decision,
    }
}

/// Project the days until a decision, from the two-proportion
/// normal-approximation sample size at the configured α and power and the
/// daily visitor rate observed in dated history entries.
fn estimated_days(
    snapshot: &ExperimentSnapshot,
    posterior_means: &[f64],
    leader: usize,
    runner_up: usize,
    total: u64,
) -> Option<u32> {
    let daily_rates: Vec<f64> = snapshot
        .history
        .iter()
        .filter_map(|h| h.daily_visitors())
        .collect();
    if daily_rates.is_empty() {
        return None;
    }
    let daily = stats::mean(&daily_rates);
    if daily <= 0.0 {
        return None;
    }

    let standard_normal = Normal::new(0.0, 1.0).ok()?;
    let z_alpha = standard_normal.inverse_cdf(1.0 - d::PROJECTION_ALPHA / 2.0);
    let z_power = standard_normal.inverse_cdf(d::PROJECTION_POWER);

    let p_bar = (posterior_means[leader] + posterior_means[runner_up]) / 2.0;
    let delta = (posterior_means[leader] - posterior_means[runner_up])
        .abs()
        .max(snapshot.config.rope_half_width);
    if delta <= 0.0 {
        return None;
    }

    let per_arm = 2.0 * (z_alpha + z_power).powi(2) * p_bar * (1.0 - p_bar) / (delta * delta);
    let needed_total = per_arm * snapshot.active_indices().len() as f64;
    let remaining = (needed_total - total as f64).max(0.0);
    let days = (remaining / daily).ceil().max(1.0);
    Some(days.min(f64::from(u32::MAX)) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::posterior::BetaPosterior;
    use crate::engine::sampler;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn draws_for(posteriors: &[BetaPosterior], seed: u64) -> PosteriorDraws {
        let active: Vec<usize> = (0..posteriors.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        sampler::sample(posteriors, 20_000, 0.5, &active, &mut rng).unwrap()
    }

    fn snapshot(counts: &[(&str, u64, u64)]) -> ExperimentSnapshot {
        let mut s = ExperimentSnapshot::new(
            "exp",
            counts.iter().map(|(v, _, _)| (*v).to_string()).collect(),
        );
        for (v, n, k) in counts {
            s.exposures.insert((*v).to_string(), *n);
            s.conversions.insert((*v).to_string(), *k);
        }
        s
    }

    #[test]
    fn tie_break_prefers_earlier_variant() {
        assert_eq!(leader_and_runner_up(&[0.01, 0.01, 0.02]), (0, 1));
        assert_eq!(leader_and_runner_up(&[0.02, 0.01, 0.01]), (1, 2));
        assert_eq!(leader_and_runner_up(&[0.03, 0.001, 0.02]), (1, 2));
    }

    #[test]
    fn tiny_differences_count_as_ties() {
        let losses = [0.01, 0.01 - 1e-14];
        assert_eq!(leader_and_runner_up(&losses).0, 0);
    }

    #[test]
    fn below_min_total_forces_collecting_data() {
        let s = snapshot(&[("A", 10, 1), ("B", 10, 2)]);
        let posteriors = [
            BetaPosterior { alpha: 2.0, beta: 28.0 },
            BetaPosterior { alpha: 3.0, beta: 27.0 },
        ];
        let draws = draws_for(&posteriors, 1);
        let means: Vec<f64> = posteriors.iter().map(BetaPosterior::mean).collect();
        let losses = draws.expected_loss();
        let decision = decide(&s, &means, &losses, &draws, false);
        assert_eq!(
            decision.summary.decision_status,
            DecisionStatus::CollectingData
        );
    }

    #[test]
    fn no_conversions_and_no_proxy_collects_data() {
        let s = snapshot(&[("A", 30, 0), ("B", 30, 0)]);
        let posteriors = [
            BetaPosterior { alpha: 1.0, beta: 49.0 },
            BetaPosterior { alpha: 1.0, beta: 49.0 },
        ];
        let draws = draws_for(&posteriors, 2);
        let means: Vec<f64> = posteriors.iter().map(BetaPosterior::mean).collect();
        let losses = draws.expected_loss();
        let decision = decide(&s, &means, &losses, &draws, false);
        assert_eq!(
            decision.summary.decision_status,
            DecisionStatus::CollectingData
        );

        // The same counts with an engagement signal fall through the ladder
        let decision = decide(&s, &means, &losses, &draws, true);
        assert_ne!(
            decision.summary.decision_status,
            DecisionStatus::CollectingData
        );
    }

    #[test]
    fn clear_winner_ships() {
        let s = snapshot(&[("A", 1000, 50), ("B", 1000, 80)]);
        let posteriors = [
            BetaPosterior { alpha: 51.0, beta: 969.0 },
            BetaPosterior { alpha: 81.0, beta: 939.0 },
        ];
        let draws = draws_for(&posteriors, 3);
        let means: Vec<f64> = posteriors.iter().map(BetaPosterior::mean).collect();
        let losses = draws.expected_loss();
        let decision = decide(&s, &means, &losses, &draws, false);
        assert_eq!(decision.summary.decision_status, DecisionStatus::ReadyToShip);
        assert_eq!(decision.summary.winning_variant.as_deref(), Some("B"));
        assert!(decision.diff_hdi[0] > 0.0, "hdi {:?}", decision.diff_hdi);

        // Reported a − b flips sign because the leader is later-ordered
        let rope = decision.rope_analysis.expect("analysed");
        assert_eq!(rope.decision, RopeVerdict::ShipB);
        assert!(rope.hdi[1] < 0.0);
    }

    #[test]
    fn zero_conversions_on_leader_never_ships() {
        // Proxy-blended posteriors far apart, but no conversion evidence
        let s = snapshot(&[("A", 50, 0), ("B", 50, 0)]);
        let posteriors = [
            BetaPosterior { alpha: 4.0, beta: 96.0 },
            BetaPosterior { alpha: 13.0, beta: 87.0 },
        ];
        let draws = draws_for(&posteriors, 4);
        let means: Vec<f64> = posteriors.iter().map(BetaPosterior::mean).collect();
        let losses = draws.expected_loss();
        let decision = decide(&s, &means, &losses, &draws, true);
        assert_eq!(decision.summary.decision_status, DecisionStatus::KeepTesting);
        assert!(decision.summary.winning_variant.is_none());
    }

    #[test]
    fn confidence_caps_at_one_hundred() {
        let s = snapshot(&[("A", 1000, 50), ("B", 1000, 80)]);
        let posteriors = [
            BetaPosterior { alpha: 51.0, beta: 969.0 },
            BetaPosterior { alpha: 81.0, beta: 939.0 },
        ];
        let draws = draws_for(&posteriors, 5);
        let means: Vec<f64> = posteriors.iter().map(BetaPosterior::mean).collect();
        let losses = draws.expected_loss();
        let decision = decide(&s, &means, &losses, &draws, false);
        assert!(decision.summary.confidence_pct <= 100.0);
        assert!(decision.summary.confidence_pct > 0.0);
    }

    #[test]
    fn estimated_days_needs_dated_history() {
        let mut s = snapshot(&[("A", 100, 1), ("B", 100, 0)]);
        let posteriors = [
            BetaPosterior { alpha: 2.0, beta: 118.0 },
            BetaPosterior { alpha: 1.0, beta: 119.0 },
        ];
        let draws = draws_for(&posteriors, 6);
        let means: Vec<f64> = posteriors.iter().map(BetaPosterior::mean).collect();
        let losses = draws.expected_loss();

        let decision = decide(&s, &means, &losses, &draws, false);
        assert_eq!(decision.summary.decision_status, DecisionStatus::KeepTesting);
        assert!(decision.summary.estimated_days.is_none());

        let start = chrono::Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let end = chrono::Utc.with_ymd_and_hms(2025, 2, 15, 0, 0, 0).unwrap();
        s.history.push(crate::types::snapshot::HistoricalExperiment {
            control_rate: 0.05,
            treatment_rate: 0.06,
            control_n: 700,
            treatment_n: 700,
            started_at: Some(start),
            ended_at: Some(end),
        });
        let decision = decide(&s, &means, &losses, &draws, false);
        let days = decision.summary.estimated_days.expect("dated history");
        assert!(days >= 1, "projection must be at least a day, got {days}");
    }
}
