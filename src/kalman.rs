//! Frequency-domain channel estimation with a scalar complex Kalman filter and a
//! Rauch-Tung-Striebel smoother. The state is the channel gain of one active subcarrier and the
//! recursion runs across subcarrier index:
//!
//! x[k] = F x[k-1] + G w[k],    w ~ CN(0, Q)
//! Y[k] = h[k] x[k] + v[k],     v ~ CN(0, R)
//!
//! where `h[k]` is the known pilot symbol times `sqrt(Es)` on pilot subcarriers and zero
//! elsewhere. Data subcarriers therefore carry no observation and are filled in by the smoother
//! from the pilots on either side.

use crate::config::KalmanParams;
use crate::error::{ensure_positive, Result, SyncError};
use num::{Complex, Zero};
use tracing::debug;

/// Estimated gain and its error variance
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Estimate {
    pub state: Complex<f64>,
    pub cov: f64,
}

/// What the forward pass keeps for each subcarrier
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterStep {
    pub filtered: Estimate,
    /// One-step-ahead prediction variance, needed by the smoother
    pub predicted_cov: f64,
}

/// Scalar state-space model. `F` and `G` are real in this use.
#[derive(Clone, Debug)]
pub struct ScalarModel {
    pub f: f64,
    pub g: f64,
    pub q: f64,
    pub r: f64,
}

impl ScalarModel {
    /// Model for subcarrier correlation `params.rho` and observation noise variance `n0`
    pub fn new(params: &KalmanParams, n0: f64) -> Result<Self> {
        params.validate()?;
        ensure_positive("noise variance", n0)?;
        Ok(Self {
            f: 1.,
            g: params.process_gain(),
            q: params.q,
            r: n0,
        })
    }

    /// Predict from `prev` and correct with observation `obs` made through gain `h`
    pub fn filter_step(&self, prev: &Estimate, obs: Complex<f64>, h: Complex<f64>) -> FilterStep {
        let predicted = prev.state * self.f;
        let predicted_cov = self.f * prev.cov * self.f + self.g * self.q * self.g;

        let gain = h.conj() * predicted_cov / (h.norm_sqr() * predicted_cov + self.r);
        let state = predicted + gain * (obs - h * predicted);
        let cov = predicted_cov - (gain * h).re * predicted_cov;

        FilterStep {
            filtered: Estimate { state, cov },
            predicted_cov,
        }
    }

    /// One backward step of the smoother. `next_predicted_cov` is the forward pass's prediction
    /// variance at `k + 1` and `next` the smoothed estimate there.
    pub fn smooth_step(
        &self,
        filtered: &Estimate,
        next_predicted_cov: f64,
        next: &Estimate,
    ) -> Estimate {
        let s = filtered.cov * self.f / next_predicted_cov;
        Estimate {
            state: filtered.state + (next.state - filtered.state * self.f) * s,
            cov: filtered.cov + s * (next.cov - next_predicted_cov) * s,
        }
    }

    /// Forward pass over all subcarriers starting from the prior `initial`
    pub fn filter(
        &self,
        initial: Estimate,
        observations: &[Complex<f64>],
        gains: &[Complex<f64>],
    ) -> Result<Vec<FilterStep>> {
        if observations.len() != gains.len() {
            return Err(SyncError::DimensionMismatch {
                what: "observation gains",
                expected: observations.len(),
                actual: gains.len(),
            });
        }
        let mut res: Vec<FilterStep> = Vec::with_capacity(observations.len());
        let mut prev = initial;
        for (y, h) in observations.iter().zip(gains) {
            let step = self.filter_step(&prev, *y, *h);
            prev = step.filtered;
            res.push(step);
        }
        Ok(res)
    }

    /// Backward pass over the output of `filter`
    pub fn smooth(&self, steps: &[FilterStep]) -> Vec<Estimate> {
        let mut res = vec![
            Estimate {
                state: Complex::zero(),
                cov: 0.
            };
            steps.len()
        ];
        let last = match steps.last() {
            Some(last) => last.filtered,
            None => return res,
        };
        res[steps.len() - 1] = last;
        for k in (0..steps.len() - 1).rev() {
            res[k] = self.smooth_step(&steps[k].filtered, steps[k + 1].predicted_cov, &res[k + 1]);
        }
        res
    }
}

/// Known pilot `i` sits at `pilot_indices[i]`; everything has to fit in `len` subcarriers
fn observation_gains(
    len: usize,
    pilot_symbols: &[Complex<f64>],
    pilot_indices: &[usize],
    es: f64,
) -> Result<Vec<Complex<f64>>> {
    if pilot_symbols.len() != pilot_indices.len() {
        return Err(SyncError::DimensionMismatch {
            what: "pilot symbols",
            expected: pilot_indices.len(),
            actual: pilot_symbols.len(),
        });
    }
    if let Some(w) = pilot_indices.windows(2).find(|w| w[0] >= w[1]) {
        return Err(SyncError::InvalidPilotSet(format!(
            "index {} follows {}",
            w[1], w[0]
        )));
    }
    if let Some(&k) = pilot_indices.iter().find(|&&k| k >= len) {
        return Err(SyncError::InvalidPilotSet(format!(
            "index {} beyond {} subcarriers",
            k, len
        )));
    }

    let mut gains = vec![Complex::zero(); len];
    for (&k, p) in pilot_indices.iter().zip(pilot_symbols) {
        gains[k] = p * es.sqrt();
    }
    Ok(gains)
}

fn prepare(
    observations: &[Complex<f64>],
    pilot_symbols: &[Complex<f64>],
    pilot_indices: &[usize],
    es: f64,
    n0: f64,
    params: &KalmanParams,
) -> Result<(ScalarModel, Vec<FilterStep>)> {
    ensure_positive("symbol energy", es)?;
    let model = ScalarModel::new(params, n0)?;
    let gains = observation_gains(observations.len(), pilot_symbols, pilot_indices, es)?;
    let initial = Estimate {
        state: Complex::new(params.x0, 0.),
        cov: params.p0,
    };
    debug!(
        subcarriers = observations.len(),
        pilots = pilot_indices.len(),
        "estimating channel"
    );
    let steps = model.filter(initial, observations, &gains)?;
    Ok((model, steps))
}

/// Smoothed channel gain on every active subcarrier, pilot or not. `observations` are the
/// demodulated active subcarriers, `pilot_symbols` the unit-energy symbols known to be sent at
/// `pilot_indices`.
pub fn estimate_channel(
    observations: &[Complex<f64>],
    pilot_symbols: &[Complex<f64>],
    pilot_indices: &[usize],
    es: f64,
    n0: f64,
) -> Result<Vec<Complex<f64>>> {
    estimate_channel_with(
        &KalmanParams::default(),
        observations,
        pilot_symbols,
        pilot_indices,
        es,
        n0,
    )
}

pub fn estimate_channel_with(
    params: &KalmanParams,
    observations: &[Complex<f64>],
    pilot_symbols: &[Complex<f64>],
    pilot_indices: &[usize],
    es: f64,
    n0: f64,
) -> Result<Vec<Complex<f64>>> {
    let (model, steps) = prepare(observations, pilot_symbols, pilot_indices, es, n0, params)?;
    Ok(model.smooth(&steps).iter().map(|e| e.state).collect())
}

/// Forward pass only: each gain uses the pilots at or below its own index
pub fn filter_channel(
    observations: &[Complex<f64>],
    pilot_symbols: &[Complex<f64>],
    pilot_indices: &[usize],
    es: f64,
    n0: f64,
) -> Result<Vec<Complex<f64>>> {
    let (_, steps) = prepare(
        observations,
        pilot_symbols,
        pilot_indices,
        es,
        n0,
        &KalmanParams::default(),
    )?;
    Ok(steps.iter().map(|s| s.filtered.state).collect())
}
