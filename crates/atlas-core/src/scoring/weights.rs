//! Sub-score weights per mode.
//!
//! Overrides replace the defaults wholesale and are renormalized to sum to 1.
//! In hardrock mode without a geology layer the `geology_boost` weight is
//! redistributed proportionally: `wᵢ' = wᵢ / Σ_{j ≠ geology} wⱼ`.

use std::collections::BTreeMap;

use tracing::debug;

use super::SubScore;
use crate::error::{PipelineError, Result};
use crate::params::{Mode, Weights};

pub fn default_weights(mode: Mode) -> BTreeMap<SubScore, f64> {
    let table: &[(SubScore, f64)] = match mode {
        Mode::Coastal => &[
            (SubScore::CoastalProximity, 0.30),
            (SubScore::Slope, 0.20),
            (SubScore::BareLand, 0.20),
            (SubScore::Sandiness, 0.20),
            (SubScore::RiverProximity, 0.10),
        ],
        Mode::Hardrock => &[
            (SubScore::Lineaments, 0.45),
            (SubScore::Relief, 0.20),
            (SubScore::Exposure, 0.20),
            (SubScore::GeologyBoost, 0.15),
        ],
    };
    table.iter().copied().collect()
}

/// Weights applied for one run, summing to 1 over the sub-scores that take
/// part in the combination.
pub fn resolve_weights(
    mode: Mode,
    overrides: Option<&Weights>,
    geology_present: bool,
) -> Result<BTreeMap<SubScore, f64>> {
    let mut weights: BTreeMap<SubScore, f64> = match overrides {
        Some(w) => mode.sub_scores().iter().map(|&s| (s, w.get(s))).collect(),
        None => default_weights(mode),
    };
    if mode == Mode::Hardrock && !geology_present {
        let dropped = weights.remove(&SubScore::GeologyBoost).unwrap_or(0.0);
        debug!(dropped, "no geology layer; redistributing geology_boost weight");
    }
    let total: f64 = weights.values().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(PipelineError::invalid(
            "weights",
            "no positive weight left after removing sub-scores without layers",
        ));
    }
    for w in weights.values_mut() {
        *w /= total;
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_sum_to_one() {
        for mode in [Mode::Coastal, Mode::Hardrock] {
            let w = resolve_weights(mode, None, true).unwrap();
            assert_relative_eq!(w.values().sum::<f64>(), 1.0, epsilon = 1e-12);
            for (s, d) in default_weights(mode) {
                assert_relative_eq!(w[&s], d, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn missing_geology_redistributes_proportionally() {
        let w = resolve_weights(Mode::Hardrock, None, false).unwrap();
        assert!(!w.contains_key(&SubScore::GeologyBoost));
        assert_relative_eq!(w[&SubScore::Lineaments], 0.45 / 0.85, epsilon = 1e-12);
        assert_relative_eq!(w[&SubScore::Relief], 0.20 / 0.85, epsilon = 1e-12);
        assert_relative_eq!(w[&SubScore::Exposure], 0.20 / 0.85, epsilon = 1e-12);
    }

    #[test]
    fn overrides_replace_and_renormalize() {
        let o = Weights::new([(SubScore::CoastalProximity, 1.0), (SubScore::Sandiness, 3.0)]);
        let w = resolve_weights(Mode::Coastal, Some(&o), false).unwrap();
        assert_relative_eq!(w[&SubScore::CoastalProximity], 0.25);
        assert_relative_eq!(w[&SubScore::Sandiness], 0.75);
        assert_eq!(w[&SubScore::Slope], 0.0);
        assert_eq!(w.len(), 5);
    }

    #[test]
    fn doubled_overrides_give_identical_weights() {
        let a = Weights::new([(SubScore::Lineaments, 0.5), (SubScore::Relief, 0.3), (SubScore::Exposure, 0.2)]);
        let b = Weights::new(a.0.iter().map(|(&s, &v)| (s, v * 2.0)));
        assert_eq!(
            resolve_weights(Mode::Hardrock, Some(&a), true).unwrap(),
            resolve_weights(Mode::Hardrock, Some(&b), true).unwrap()
        );
    }

    #[test]
    fn geology_only_without_layer_is_rejected() {
        let o = Weights::new([(SubScore::GeologyBoost, 1.0)]);
        assert!(resolve_weights(Mode::Hardrock, Some(&o), false).is_err());
        assert!(resolve_weights(Mode::Hardrock, Some(&o), true).is_ok());
    }
}
