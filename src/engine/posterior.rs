//! Beta-Binomial posterior updates.
//!
//! The pure conjugate posterior is Beta(α₀ + k, β₀ + n − k). While the
//! conversion signal is sparse — min(k, n − k) below the sparsity limit —
//! the engagement proxy enters as pseudo-observations with weight
//! min(n, 30): enough to move a zero-conversion posterior, capped so real
//! conversions dominate once they arrive. Posterior construction is fully
//! deterministic.

use crate::config::{defaults as d, BetaPrior, EngineConfig};
use crate::engine::proxy::ProxySummary;

/// Posterior Beta(α, β) for one variant. Both parameters are always
/// strictly positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaPosterior {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPosterior {
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn variance(&self) -> f64 {
        let s = self.alpha + self.beta;
        self.alpha * self.beta / (s * s * (s + 1.0))
    }
}

/// Posterior for a variant with `exposures` visitors and `conversions`
/// successes, optionally blended with its proxy summary.
pub fn for_variant(
    prior: BetaPrior,
    exposures: u64,
    conversions: u64,
    proxy: Option<ProxySummary>,
    config: &EngineConfig,
) -> BetaPosterior {
    let n = exposures as f64;
    let k = conversions as f64;

    let mut alpha = prior.alpha + k;
    let mut beta = prior.beta + (n - k);

    let sparse = conversions.min(exposures - conversions) < d::PROXY_SPARSITY_LIMIT;
    if config.use_proxy && sparse {
        if let Some(proxy) = proxy {
            if proxy.n > 0 {
                let w = n.min(d::PROXY_PSEUDO_WEIGHT_CAP);
                alpha += w * proxy.mean;
                beta += w * (1.0 - proxy.mean);
            }
        }
    }

    BetaPosterior { alpha, beta }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform_prior() -> BetaPrior {
        BetaPrior { alpha: 1.0, beta: 19.0 }
    }

    #[test]
    fn conjugate_update_without_proxy() {
        let posterior = for_variant(platform_prior(), 100, 7, None, &EngineConfig::default());
        assert_eq!(posterior.alpha, 8.0);
        assert_eq!(posterior.beta, 112.0);
        assert!((posterior.mean() - 8.0 / 120.0).abs() < 1e-12);
    }

    #[test]
    fn zero_exposures_leaves_the_prior() {
        let proxy = ProxySummary { mean: 0.9, n: 10 };
        let posterior = for_variant(
            platform_prior(),
            0,
            0,
            Some(proxy),
            &EngineConfig::default(),
        );
        // Pseudo-weight min(0, 30) = 0: nothing moves
        assert_eq!(posterior.alpha, 1.0);
        assert_eq!(posterior.beta, 19.0);
    }

    #[test]
    fn proxy_moves_a_zero_conversion_posterior() {
        let proxy = ProxySummary { mean: 0.4, n: 40 };
        let posterior = for_variant(
            platform_prior(),
            50,
            0,
            Some(proxy),
            &EngineConfig::default(),
        );
        // w = min(50, 30) = 30: α = 1 + 12, β = 19 + 50 + 18
        assert!((posterior.alpha - 13.0).abs() < 1e-12);
        assert!((posterior.beta - 87.0).abs() < 1e-12);

        let without = for_variant(platform_prior(), 50, 0, None, &EngineConfig::default());
        assert!(posterior.mean() > without.mean());
    }

    #[test]
    fn pseudo_weight_caps_at_thirty() {
        let proxy = ProxySummary { mean: 1.0, n: 500 };
        let posterior = for_variant(
            platform_prior(),
            10_000,
            1,
            Some(proxy),
            &EngineConfig::default(),
        );
        // α = 1 + 1 + 30·1.0 regardless of n beyond the cap
        assert!((posterior.alpha - 32.0).abs() < 1e-12);
    }

    #[test]
    fn dense_conversions_disable_blending() {
        let proxy = ProxySummary { mean: 1.0, n: 100 };
        // min(5, 95) = 5 is not sparse
        let posterior = for_variant(
            platform_prior(),
            100,
            5,
            Some(proxy),
            &EngineConfig::default(),
        );
        assert_eq!(posterior.alpha, 6.0);
        assert_eq!(posterior.beta, 114.0);
    }

    #[test]
    fn use_proxy_false_disables_blending() {
        let proxy = ProxySummary { mean: 0.8, n: 40 };
        let config = EngineConfig {
            use_proxy: false,
            ..EngineConfig::default()
        };
        let posterior = for_variant(platform_prior(), 50, 0, Some(proxy), &config);
        assert_eq!(posterior.alpha, 1.0);
        assert_eq!(posterior.beta, 69.0);
    }

    #[test]
    fn mass_grows_with_exposures() {
        let config = EngineConfig::default();
        let mut last_mass = 0.0;
        for n in [0u64, 10, 50, 200, 1000] {
            let posterior = for_variant(platform_prior(), n, n / 20, None, &config);
            let mass = posterior.alpha + posterior.beta;
            assert!(
                mass >= last_mass,
                "posterior mass must not shrink: {mass} < {last_mass} at n = {n}"
            );
            last_mass = mass;
        }
    }

    #[test]
    fn variance_shrinks_with_data() {
        let small = for_variant(platform_prior(), 100, 10, None, &EngineConfig::default());
        let large = for_variant(platform_prior(), 10_000, 1000, None, &EngineConfig::default());
        assert!(large.variance() < small.variance());
    }
}
