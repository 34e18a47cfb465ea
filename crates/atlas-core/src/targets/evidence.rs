//! Per-target evidence and reason chips.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::features::FeatureStack;
use crate::params::Mode;
use crate::scoring::{ResolvedThresholds, SubScore};

pub const MAX_REASON_CHIPS: usize = 3;

/// Statistics of one analytic layer over a target's valid pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    /// Mean raw layer value.
    pub mean: f64,
    /// Fraction of valid pixels passing the layer's own threshold.
    pub pass_fraction: f64,
    pub valid_pixels: usize,
}

/// Compact, ranked evidence tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonChip {
    pub layer: SubScore,
    pub label: String,
    pub pass_fraction: f64,
}

/// Evidence for each of the mode's sub-scores whose layer is present and has
/// at least one valid pixel among `pixels`.
pub fn compute_evidence(
    mode: Mode,
    stack: &FeatureStack,
    thresholds: &ResolvedThresholds,
    pixels: &[usize],
) -> BTreeMap<SubScore, EvidenceEntry> {
    let mut out = BTreeMap::new();
    for &sub in mode.sub_scores() {
        let Some(layer) = sub.raw_layer(stack) else {
            continue;
        };
        let (mut n, mut sum, mut passing) = (0usize, 0.0f64, 0usize);
        for &i in pixels {
            let v = layer.data[i];
            if v.is_nan() {
                continue;
            }
            n += 1;
            sum += v as f64;
            if thresholds.passes(sub, v as f64) {
                passing += 1;
            }
        }
        if n > 0 {
            out.insert(
                sub,
                EvidenceEntry { mean: sum / n as f64, pass_fraction: passing as f64 / n as f64, valid_pixels: n },
            );
        }
    }
    out
}

/// Top evidence by pass fraction, descending; ties by layer name. Layers
/// nobody passes are left out.
pub fn reason_chips(evidence: &BTreeMap<SubScore, EvidenceEntry>) -> Vec<ReasonChip> {
    let mut ranked: Vec<(SubScore, f64)> = evidence
        .iter()
        .filter(|(_, e)| e.pass_fraction > 0.0)
        .map(|(&s, e)| (s, e.pass_fraction))
        .collect();
    ranked.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.name().cmp(b.0.name()),
        other => other,
    });
    ranked
        .into_iter()
        .take(MAX_REASON_CHIPS)
        .map(|(layer, pass_fraction)| ReasonChip { layer, label: layer.label().to_string(), pass_fraction })
        .collect()
}
