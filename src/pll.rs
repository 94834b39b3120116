//! Decision-directed carrier phase tracking for QPSK. First-order loop: the phase estimate moves
//! by `gamma` times the phase detector output and nothing else, so a carrier frequency offset
//! shows up as a ramp the loop lags behind (see `steady_state_bias`).

use crate::config::PllConfig;
use crate::error::{ensure_positive, Result};
use crate::symbols::decide;
use num::Complex;
use std::f64::consts::PI;
use tracing::debug;

/// Result of processing one sample
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PllStep {
    /// Phase estimate after this sample
    pub phase: f64,
    pub decision: Complex<f64>,
    /// Phase detector output, `Im(conj(a) z) / Es`
    pub error: f64,
}

#[derive(Clone, Debug)]
pub struct DecisionDirectedPll {
    config: PllConfig,
}

impl DecisionDirectedPll {
    pub fn new(config: PllConfig) -> Result<Self> {
        ensure_positive("symbol energy", config.es)?;
        Ok(Self { config })
    }

    /// De-rotate `sample` by the previous estimate, decide, and move the estimate
    pub fn step(&self, prev_phase: f64, sample: Complex<f64>) -> PllStep {
        let z = sample * Complex::new(0., -prev_phase).exp();
        let decision = decide(z, self.config.es);
        let error = (decision.conj() * z).im / self.config.es;
        PllStep {
            phase: prev_phase + self.config.gamma * error,
            decision,
            error,
        }
    }

    /// Phase estimates and symbol decisions for every sample. The first sample is only decided,
    /// using the configured initial phase, and does not update the loop.
    pub fn track(&self, samps: &[Complex<f64>]) -> (Vec<f64>, Vec<Complex<f64>>) {
        let mut phases = Vec::with_capacity(samps.len());
        let mut decisions = Vec::with_capacity(samps.len());

        let mut iter = samps.iter();
        if let Some(first) = iter.next() {
            let mut phase = self.config.initial_phase;
            let z = first * Complex::new(0., -phase).exp();
            phases.push(phase);
            decisions.push(decide(z, self.config.es));

            for y in iter {
                let step = self.step(phase, *y);
                phase = step.phase;
                phases.push(step.phase);
                decisions.push(step.decision);
            }
        }
        debug!(
            samples = samps.len(),
            final_phase = phases.last().cloned().unwrap_or(self.config.initial_phase),
            "phase tracked"
        );
        (phases, decisions)
    }
}

/// Run the loop over `samps` with gain `gamma` starting from `initial_phase`
pub fn track_phase(
    samps: &[Complex<f64>],
    gamma: f64,
    initial_phase: f64,
    es: f64,
) -> Result<(Vec<f64>, Vec<Complex<f64>>)> {
    let pll = DecisionDirectedPll::new(PllConfig {
        gamma,
        initial_phase,
        es,
    })?;
    Ok(pll.track(samps))
}

/// Predicted lag `true phase - estimate` once the loop settles on a carrier offset
/// `freq_offset` (symbols of duration `symbol_period`). `None` when the per-symbol rotation is
/// larger than the loop can follow.
pub fn steady_state_bias(freq_offset: f64, symbol_period: f64, gamma: f64) -> Option<f64> {
    let ramp = 2. * PI * freq_offset * symbol_period;
    if gamma <= 0. || ramp.abs() > gamma {
        return None;
    }
    Some((ramp / gamma).asin() - ramp)
}

/// Mean of `true_phase - estimates` ignoring the first `skip` samples
pub fn empirical_bias(true_phase: &[f64], estimates: &[f64], skip: usize) -> Option<f64> {
    let diffs: Vec<f64> = true_phase
        .iter()
        .zip(estimates)
        .skip(skip)
        .map(|(p, e)| p - e)
        .collect();
    if diffs.is_empty() {
        None
    } else {
        Some(diffs.iter().sum::<f64>() / diffs.len() as f64)
    }
}
