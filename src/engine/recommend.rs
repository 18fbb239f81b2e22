//! Plain-English recommendation templates.
//!
//! One template per decision status. Every placeholder is filled from the
//! decision record; the text never introduces a number the structured
//! result does not already carry, and the wording stays factual rather
//! than confident.

use crate::engine::decision::Decision;
use crate::types::report::DecisionStatus;
use crate::types::snapshot::ExperimentSnapshot;

/// Render the recommendation for a decided snapshot.
pub fn recommendation(snapshot: &ExperimentSnapshot, decision: &Decision) -> String {
    let leader = &snapshot.variants[decision.leader];
    let runner_up = &snapshot.variants[decision.runner_up];
    let total = snapshot.total_exposures();
    let config = &snapshot.config;

    let loss_pct = decision.summary.leading_variant_loss * 100.0;
    let epsilon_pct = decision.summary.epsilon_threshold * 100.0;
    let mass_pct = config.hdi_mass * 100.0;
    let hdi_lo_pct = decision.diff_hdi[0] * 100.0;
    let hdi_hi_pct = decision.diff_hdi[1] * 100.0;
    let rope_pct = config.rope_half_width * 100.0;

    match decision.summary.decision_status {
        DecisionStatus::ReadyToShip => format!(
            "Ship {leader}: expected regret if wrong is {loss_pct:.3}%, below the \
             {epsilon_pct:.3}% threshold, and the {mass_pct:.0}% HDI of the difference \
             [{hdi_lo_pct:.3}%, {hdi_hi_pct:.3}%] excludes zero."
        ),
        DecisionStatus::PracticallyEquivalent => format!(
            "{leader} and {runner_up} are practically equivalent: the {mass_pct:.0}% HDI \
             of their difference [{hdi_lo_pct:.3}%, {hdi_hi_pct:.3}%] sits inside the \
             ±{rope_pct:.3}% region of practical equivalence after {total} visitors. \
             Ship either, or keep the simpler variant."
        ),
        DecisionStatus::KeepTesting => {
            let mut text = format!(
                "Keep testing: {leader} currently leads with expected regret \
                 {loss_pct:.3}% against the {epsilon_pct:.3}% threshold, but more data \
                 is needed before a ship call ({total} visitors so far)."
            );
            if let Some(days) = decision.summary.estimated_days {
                text.push_str(&format!(
                    " Roughly {days} more days at the recent traffic rate."
                ));
            }
            text
        }
        DecisionStatus::CollectingData => {
            let mut text = if total == 0 {
                "Collecting data: no visitors have been recorded yet, so every arm's \
                 posterior equals the prior."
                    .to_string()
            } else {
                format!(
                    "Collecting data: {total} visitors across {} variants is not yet \
                     enough signal to evaluate (minimum {}).",
                    snapshot.variants.len(),
                    config.min_total_n
                )
            };
            if let Some(days) = decision.summary.estimated_days {
                text.push_str(&format!(
                    " Roughly {days} more days at the recent traffic rate should \
                     produce a first read."
                ));
            }
            text
        }
    }
}
