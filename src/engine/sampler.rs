//! Monte-Carlo posterior sampling.
//!
//! One seeded pass produces every random quantity the downstream stages
//! read: the S×V draw matrix, the active-support argmax streams for
//! top-two Thompson allocation, and the challenger gating uniforms.
//! Downstream stages borrow these arrays; none of them may redraw, which
//! is what makes a seeded run reproduce byte-identical results.
//!
//! The draw order is fixed — primary columns in variant order, challenger
//! columns in active-variant order, then the gates — so identical
//! snapshots and seeds walk the RNG stream identically.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Beta as BetaDistribution, Distribution};

use crate::engine::posterior::BetaPosterior;
use crate::types::snapshot::DataError;

/// Product of the single sampling pass.
#[derive(Debug, Clone)]
pub struct PosteriorDraws {
    /// Column-major draw matrix: `columns[v][s]`.
    columns: Vec<Vec<f64>>,
    /// Per-trial argmax over all variants (first index wins ties).
    best_idx: Vec<usize>,
    /// Per-trial argmax over active variants only.
    best_active_idx: Vec<usize>,
    /// Per-trial challenger argmax (active variants, independent draw).
    challenger_idx: Vec<usize>,
    /// Whether the challenger is consulted for this trial.
    challenger_gate: Vec<bool>,
}

/// Run the sampling pass.
///
/// `active` holds the variant indices eligible for allocation, in
/// ascending order, and must be non-empty (snapshot validation guarantees
/// it).
pub fn sample(
    posteriors: &[BetaPosterior],
    samples: usize,
    top_two_beta: f64,
    active: &[usize],
    rng: &mut StdRng,
) -> Result<PosteriorDraws, DataError> {
    let mut columns = Vec::with_capacity(posteriors.len());
    for p in posteriors {
        let dist = beta_distribution(p)?;
        let column: Vec<f64> = (0..samples).map(|_| dist.sample(rng)).collect();
        columns.push(column);
    }

    // Primary argmax streams over the stored matrix
    let mut best_idx = vec![0usize; samples];
    let mut best_val = columns[0].clone();
    for (v, column) in columns.iter().enumerate().skip(1) {
        for (s, &x) in column.iter().enumerate() {
            if x > best_val[s] {
                best_val[s] = x;
                best_idx[s] = v;
            }
        }
    }

    let mut best_active_idx = vec![active[0]; samples];
    let mut best_active_val = columns[active[0]].clone();
    for &v in &active[1..] {
        for (s, &x) in columns[v].iter().enumerate() {
            if x > best_active_val[s] {
                best_active_val[s] = x;
                best_active_idx[s] = v;
            }
        }
    }

    // Challenger: an independent draw per active variant, argmax only.
    // Drawn inside this same pass so no other stage touches the RNG.
    let mut challenger_idx = vec![active[0]; samples];
    let mut challenger_val = vec![f64::NEG_INFINITY; samples];
    for &v in active {
        let dist = beta_distribution(&posteriors[v])?;
        for s in 0..samples {
            let x = dist.sample(rng);
            if x > challenger_val[s] {
                challenger_val[s] = x;
                challenger_idx[s] = v;
            }
        }
    }

    let challenger_gate: Vec<bool> =
        (0..samples).map(|_| rng.gen::<f64>() < top_two_beta).collect();

    Ok(PosteriorDraws {
        columns,
        best_idx,
        best_active_idx,
        challenger_idx,
        challenger_gate,
    })
}

fn beta_distribution(p: &BetaPosterior) -> Result<BetaDistribution<f64>, DataError> {
    BetaDistribution::new(p.alpha, p.beta).map_err(|_| {
        DataError::NonFinite(format!("posterior Beta({}, {})", p.alpha, p.beta))
    })
}

impl PosteriorDraws {
    pub fn n_samples(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn n_variants(&self) -> usize {
        self.columns.len()
    }

    /// One variant's draws.
    pub fn column(&self, v: usize) -> &[f64] {
        &self.columns[v]
    }

    /// Per-trial top-two draws for the allocator: (primary, challenger,
    /// gate), all restricted to the active support.
    pub fn allocation_trials(&self) -> impl Iterator<Item = (usize, usize, bool)> + '_ {
        self.best_active_idx
            .iter()
            .zip(&self.challenger_idx)
            .zip(&self.challenger_gate)
            .map(|((&b, &c), &g)| (b, c, g))
    }

    /// P(variant is best): fraction of trials won, first index taking
    /// exact ties. Sums to exactly one across variants.
    pub fn probability_best(&self) -> Vec<f64> {
        let mut wins = vec![0u64; self.n_variants()];
        for &b in &self.best_idx {
            wins[b] += 1;
        }
        let s = self.n_samples() as f64;
        wins.into_iter().map(|w| w as f64 / s).collect()
    }

    /// Expected loss per variant: mean over trials of (row max − draw).
    /// The expected regret of shipping that variant versus the oracle.
    pub fn expected_loss(&self) -> Vec<f64> {
        let samples = self.n_samples();
        let variants = self.n_variants();
        let mut acc = vec![0.0f64; variants];
        for s in 0..samples {
            let mut row_max = self.columns[0][s];
            for column in &self.columns[1..] {
                if column[s] > row_max {
                    row_max = column[s];
                }
            }
            for (v, column) in self.columns.iter().enumerate() {
                acc[v] += row_max - column[s];
            }
        }
        acc.into_iter().map(|a| a / samples as f64).collect()
    }

    /// Per-trial difference `a − b`.
    pub fn diff_samples(&self, a: usize, b: usize) -> Vec<f64> {
        self.columns[a]
            .iter()
            .zip(&self.columns[b])
            .map(|(&x, &y)| x - y)
            .collect()
    }

    /// Fraction of trials where `a` strictly beats `b`.
    pub fn probability_greater(&self, a: usize, b: usize) -> f64 {
        let wins = self.columns[a]
            .iter()
            .zip(&self.columns[b])
            .filter(|(x, y)| x > y)
            .count();
        wins as f64 / self.n_samples() as f64
    }
}

/// Highest-density interval: the narrowest window holding `mass` of the
/// samples, found by sliding a fixed-size window over the sorted draws.
pub fn hdi(samples: &[f64], mass: f64) -> [f64; 2] {
    if samples.is_empty() {
        return [0.0, 0.0];
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let k = ((mass * n as f64).ceil() as usize).clamp(1, n);

    let mut best = [sorted[0], sorted[k - 1]];
    let mut best_width = best[1] - best[0];
    for i in 1..=(n - k) {
        let width = sorted[i + k - 1] - sorted[i];
        if width < best_width {
            best_width = width;
            best = [sorted[i], sorted[i + k - 1]];
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn draws(posteriors: &[BetaPosterior], samples: usize, seed: u64) -> PosteriorDraws {
        let active: Vec<usize> = (0..posteriors.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        sample(posteriors, samples, 0.5, &active, &mut rng).expect("valid posteriors")
    }

    fn symmetric_pair() -> Vec<BetaPosterior> {
        vec![
            BetaPosterior { alpha: 10.0, beta: 90.0 },
            BetaPosterior { alpha: 10.0, beta: 90.0 },
        ]
    }

    #[test]
    fn probability_best_sums_to_one() {
        let d = draws(&symmetric_pair(), 5_000, 7);
        let p = d.probability_best();
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        // Symmetric posteriors split roughly evenly
        assert!((p[0] - 0.5).abs() < 0.05, "p = {p:?}");
    }

    #[test]
    fn dominant_posterior_wins_nearly_always() {
        let posteriors = vec![
            BetaPosterior { alpha: 5.0, beta: 95.0 },
            BetaPosterior { alpha: 60.0, beta: 40.0 },
        ];
        let d = draws(&posteriors, 5_000, 11);
        let p = d.probability_best();
        assert!(p[1] > 0.999, "p = {p:?}");
        let loss = d.expected_loss();
        assert!(loss[1] < loss[0]);
        assert!(loss[1] < 1e-3, "dominant arm loses almost nothing: {}", loss[1]);
    }

    #[test]
    fn expected_loss_is_non_negative_and_bounded() {
        let d = draws(&symmetric_pair(), 2_000, 3);
        for loss in d.expected_loss() {
            assert!((0.0..=1.0).contains(&loss), "loss = {loss}");
        }
    }

    #[test]
    fn same_seed_reproduces_the_pass() {
        let a = draws(&symmetric_pair(), 1_000, 42);
        let b = draws(&symmetric_pair(), 1_000, 42);
        assert_eq!(a.column(0), b.column(0));
        assert_eq!(a.probability_best(), b.probability_best());
        assert_eq!(a.challenger_gate, b.challenger_gate);
    }

    #[test]
    fn diff_and_probability_greater_agree() {
        let d = draws(&symmetric_pair(), 2_000, 5);
        let diff = d.diff_samples(0, 1);
        let positive = diff.iter().filter(|&&x| x > 0.0).count() as f64 / 2_000.0;
        assert!((positive - d.probability_greater(0, 1)).abs() < 1e-12);
    }

    #[test]
    fn hdi_of_uniform_grid_has_requested_mass() {
        let samples: Vec<f64> = (0..100).map(|i| i as f64 / 99.0).collect();
        let [lo, hi] = hdi(&samples, 0.95);
        // 95 of 100 points span 94 gaps of 1/99
        assert!(lo >= 0.0 && hi <= 1.0);
        assert!((hi - lo - 94.0 / 99.0).abs() < 1e-9, "[{lo}, {hi}]");
    }

    #[test]
    fn hdi_finds_the_dense_region() {
        // Tight cluster plus a far outlier: the window must exclude the
        // outlier, not the cluster.
        let mut samples = vec![0.50, 0.51, 0.52, 0.53, 0.54, 0.55, 0.56, 0.57, 0.58];
        samples.push(10.0);
        let [lo, hi] = hdi(&samples, 0.9);
        assert!(hi < 1.0, "outlier excluded, got [{lo}, {hi}]");
    }

    #[test]
    fn hdi_narrows_with_concentration() {
        let wide = BetaPosterior { alpha: 5.0, beta: 45.0 };
        let narrow = BetaPosterior { alpha: 50.0, beta: 450.0 };
        let d = draws(&[wide, narrow], 20_000, 13);
        let w = hdi(d.column(0), 0.95);
        let n = hdi(d.column(1), 0.95);
        assert!(
            n[1] - n[0] < w[1] - w[0],
            "ten-fold evidence must narrow the interval: {n:?} vs {w:?}"
        );
    }

    #[test]
    fn paused_variant_never_wins_allocation_trials() {
        let posteriors = vec![
            BetaPosterior { alpha: 2.0, beta: 98.0 },
            BetaPosterior { alpha: 80.0, beta: 20.0 }, // dominant but paused
            BetaPosterior { alpha: 3.0, beta: 97.0 },
        ];
        let mut rng = StdRng::seed_from_u64(19);
        let d = sample(&posteriors, 2_000, 0.5, &[0, 2], &mut rng).unwrap();
        for (primary, challenger, _) in d.allocation_trials() {
            assert_ne!(primary, 1);
            assert_ne!(challenger, 1);
        }
        // The full-support P(best) still sees the dominant arm
        assert!(d.probability_best()[1] > 0.99);
    }
}
