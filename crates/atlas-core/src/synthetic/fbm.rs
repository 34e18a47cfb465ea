//! Fractional Brownian motion relief for synthetic DEMs.
//!
//! Sum of Perlin octaves with amplitude `gain^i` and frequency `2^i`, where
//! `gain = 2^(−H)`.
use noise::{NoiseFn, Perlin};

pub struct Fbm {
    /// Hurst exponent; higher is smoother.
    pub h: f64,
    pub octaves: u32,
    noise: Perlin,
}

impl Fbm {
    pub fn new(seed: u32, h: f64, octaves: u32) -> Self {
        Self { h, octaves, noise: Perlin::new(seed) }
    }

    /// Evaluate at noise-space `(x, y)`, rescaled to roughly `[-1, 1]` by the
    /// total octave amplitude.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let gain = 2f64.powf(-self.h);
        let mut value = 0.0;
        let mut amp = 1.0;
        let mut norm = 0.0;
        let mut freq = 1.0;
        for _ in 0..self.octaves {
            value += amp * self.noise.get([x * freq, y * freq]);
            norm += amp;
            amp *= gain;
            freq *= 2.0;
        }
        if norm > 0.0 {
            value / norm
        } else {
            0.0
        }
    }
}
