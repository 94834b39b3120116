//! Simulated propagation: multipath impulse responses, delay, carrier offsets and noise. Used to
//! build test signals for the receivers, not part of them.

use crate::error::{ensure_positive, Result, SyncError};
use num::{Complex, Zero};
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelMode {
    /// No channel, a single unit tap
    Dirac,
    /// Independent Rayleigh-faded taps with an exponentially decaying power profile
    Rayleigh,
}

/// Circular complex Gaussian sample with the given total variance
fn complex_gaussian<R: Rng>(variance: f64, rng: &mut R) -> Complex<f64> {
    let re: f64 = rng.sample(StandardNormal);
    let im: f64 = rng.sample(StandardNormal);
    Complex::new(re, im) * (variance / 2.).sqrt()
}

/// Impulse response of `length` taps. For `Rayleigh`, tap `k` has mean power proportional to
/// `exp(-k / spread)` and the profile sums to one.
pub fn generate_channel<R: Rng>(
    length: usize,
    mode: ChannelMode,
    spread: f64,
    rng: &mut R,
) -> Result<Vec<Complex<f64>>> {
    if length == 0 {
        return Err(SyncError::OutOfRange {
            what: "channel impulse response",
            needed: 1,
            available: 0,
        });
    }

    let mut taps = vec![Complex::zero(); length];
    match mode {
        ChannelMode::Dirac => taps[0] = Complex::new(1., 0.),
        ChannelMode::Rayleigh => {
            ensure_positive("delay spread", spread)?;
            let profile: Vec<f64> = (0..length).map(|k| (-(k as f64) / spread).exp()).collect();
            let total: f64 = profile.iter().sum();
            for (tap, p) in taps.iter_mut().zip(&profile) {
                *tap = complex_gaussian(p / total, rng);
            }
        }
    }
    Ok(taps)
}

/// Full linear convolution, `signal.len() + taps.len() - 1` samples
pub fn convolve(signal: &[Complex<f64>], taps: &[Complex<f64>]) -> Vec<Complex<f64>> {
    if signal.is_empty() || taps.is_empty() {
        return Vec::new();
    }
    let mut res = vec![Complex::zero(); signal.len() + taps.len() - 1];
    for (i, s) in signal.iter().enumerate() {
        for (j, c) in taps.iter().enumerate() {
            res[i + j] += s * c;
        }
    }
    res
}

/// Rotate sample `k` by `2 pi offset (first_index + k) ts`. A negative offset undoes a positive
/// one, provided `first_index` is the absolute position of `samps[0]`.
pub fn shift_frequency(
    samps: &[Complex<f64>],
    offset_hz: f64,
    ts: f64,
    first_index: usize,
) -> Vec<Complex<f64>> {
    samps
        .iter()
        .enumerate()
        .map(|(k, s)| {
            let t = (first_index + k) as f64 * ts;
            s * Complex::new(0., 2. * PI * offset_hz * t).exp()
        })
        .collect()
}

/// Add circular complex white Gaussian noise of variance `n0` in place. `n0 == 0` leaves the
/// samples untouched.
pub fn add_awgn<R: Rng>(samps: &mut [Complex<f64>], n0: f64, rng: &mut R) -> Result<()> {
    if n0 == 0. {
        return Ok(());
    }
    ensure_positive("noise variance", n0)?;
    for s in samps.iter_mut() {
        *s += complex_gaussian(n0, rng);
    }
    Ok(())
}

/// What happens to an OFDM frame between the transmitter and the receiver's sampler
#[derive(Clone, Debug)]
pub struct OfdmImpairments {
    /// Integer propagation delay in samples
    pub delay_samples: usize,
    pub freq_offset_hz: f64,
    /// Sample period (s)
    pub ts: f64,
    /// Noise variance per sample, zero for a noiseless link
    pub n0: f64,
}

impl OfdmImpairments {
    pub fn apply<R: Rng>(
        &self,
        tx: &[Complex<f64>],
        taps: &[Complex<f64>],
        rng: &mut R,
    ) -> Result<Vec<Complex<f64>>> {
        let delayed: Vec<_> = std::iter::repeat(Complex::zero())
            .take(self.delay_samples)
            .chain(tx.iter().cloned())
            .collect();
        let shifted = shift_frequency(&delayed, self.freq_offset_hz, self.ts, 0);
        let mut rx = convolve(&shifted, taps);
        add_awgn(&mut rx, self.n0, rng)?;
        Ok(rx)
    }
}

/// Triangular pulse of base `2 period`
pub fn triangle(t: f64, period: f64) -> f64 {
    if t.abs() < period {
        1. - t.abs() / period
    } else {
        0.
    }
}

/// Single-carrier PSK link with triangular pulses, sampled at arbitrary instants
#[derive(Clone, Debug)]
pub struct PskChannel {
    /// Symbol duration T
    pub symbol_period: f64,
    /// Noise variance per sample
    pub n0: f64,
    /// Carrier phase offset (rad)
    pub phase: f64,
    /// Carrier frequency offset (Hz)
    pub freq_offset: f64,
    /// Timing offset as a fraction of T
    pub delay: f64,
}

impl PskChannel {
    /// Noisy channel output at time `t` for the transmitted `data`
    pub fn sample<R: Rng>(&self, t: f64, data: &[Complex<f64>], rng: &mut R) -> Complex<f64> {
        let period = self.symbol_period;
        // Only the two pulses around t overlap it
        let x = (t - self.delay * period) / period;
        let first = x.floor().max(0.) as usize;
        let last = (x.ceil().max(0.) as usize).min(data.len().saturating_sub(1));

        let mut y: Complex<f64> = Complex::zero();
        if !data.is_empty() && x > -1. {
            for k in first.saturating_sub(1)..=last {
                y += data[k] * triangle(t - k as f64 * period - self.delay * period, period);
            }
        }
        y *= Complex::new(0., self.phase + 2. * PI * self.freq_offset * t).exp();
        y + if self.n0 > 0. {
            complex_gaussian(self.n0, rng)
        } else {
            Complex::zero()
        }
    }

    pub fn sample_at<R: Rng>(
        &self,
        times: &[f64],
        data: &[Complex<f64>],
        rng: &mut R,
    ) -> Vec<Complex<f64>> {
        times.iter().map(|t| self.sample(*t, data, rng)).collect()
    }

    /// Instants `k T + delay T`, where each sample sees exactly one symbol
    pub fn optimal_instants(&self, count: usize) -> Vec<f64> {
        (0..count)
            .map(|k| (k as f64 + self.delay) * self.symbol_period)
            .collect()
    }
}
