use crate::error::{ensure_positive, Result, SyncError};
use serde::Deserialize;
use std::path::Path;

/// Parameters of one OFDM transmission. Fields left out of a JSON file take the DVB-T 2k values
/// from `Default`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OfdmConfig {
    /// Useful symbol duration (s)
    pub tu: f64,
    /// Total number of subcarriers (transform size)
    pub n: usize,
    /// First active subcarrier
    pub kmin: usize,
    /// Last active subcarrier (inclusive)
    pub kmax: usize,
    /// Number of samples in the cyclic prefix
    pub guard_len: usize,
    /// Distance between consecutive pilot subcarriers
    pub pilot_step: usize,
    /// Mean energy per QPSK symbol
    pub es: f64,
    /// Es/N0 in dB
    pub esn0_db: f64,
}

impl Default for OfdmConfig {
    fn default() -> Self {
        Self {
            tu: 224e-6,
            n: 2048,
            kmin: 0,
            kmax: 1704,
            guard_len: 2048 / 8,
            pilot_step: 12,
            es: 1.,
            esn0_db: 20.,
        }
    }
}

impl OfdmConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("useful duration", self.tu)?;
        ensure_positive("symbol energy", self.es)?;
        if !self.esn0_db.is_finite() {
            return Err(SyncError::NumericDegeneracy {
                what: "Es/N0",
                value: self.esn0_db,
            });
        }
        if self.kmin > self.kmax || self.kmax >= self.n {
            return Err(SyncError::OutOfRange {
                what: "active subcarriers",
                needed: self.kmax + 1,
                available: self.n,
            });
        }
        if self.guard_len > self.n {
            return Err(SyncError::OutOfRange {
                what: "cyclic prefix",
                needed: self.guard_len,
                available: self.n,
            });
        }
        if self.pilot_step == 0 {
            return Err(SyncError::InvalidPilotSet("pilot step is zero".to_string()));
        }
        Ok(())
    }

    /// Sample period (s)
    pub fn ts(&self) -> f64 {
        self.tu / self.n as f64
    }

    pub fn active_count(&self) -> usize {
        self.kmax - self.kmin + 1
    }

    /// Pilot positions relative to `kmin`, i.e. indices into the active subcarrier vector
    pub fn pilot_indices(&self) -> Vec<usize> {
        (0..self.active_count()).step_by(self.pilot_step).collect()
    }

    /// Noise variance per complex sample
    pub fn n0(&self) -> f64 {
        self.es / 10f64.powf(self.esn0_db / 10.)
    }

    /// Samples in one OFDM block including the cyclic prefix
    pub fn block_len(&self) -> usize {
        self.n + self.guard_len
    }

    pub fn subcarrier_spacing(&self) -> f64 {
        1. / self.tu
    }

    pub fn bandwidth(&self) -> f64 {
        self.active_count() as f64 * self.subcarrier_spacing()
    }
}

/// Decision-directed PLL settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PllConfig {
    /// Loop gain. Larger tracks faster but lets more noise through
    pub gamma: f64,
    /// Phase estimate used for the very first sample
    pub initial_phase: f64,
    pub es: f64,
}

impl Default for PllConfig {
    fn default() -> Self {
        Self {
            gamma: 0.01,
            initial_phase: 0.,
            es: 1.,
        }
    }
}

impl PllConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        ensure_positive("symbol energy", config.es)?;
        Ok(config)
    }
}

/// Statistical model linking the channel gains of adjacent subcarriers
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct KalmanParams {
    /// Correlation between adjacent subcarriers
    pub rho: f64,
    /// Prior mean of the first channel gain
    pub x0: f64,
    /// Prior variance of the first channel gain
    pub p0: f64,
    /// Process noise variance
    pub q: f64,
}

impl Default for KalmanParams {
    fn default() -> Self {
        Self {
            rho: 0.9,
            x0: 0.,
            p0: 1.,
            q: 1.,
        }
    }
}

impl KalmanParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.rho.abs() <= 1.) {
            return Err(SyncError::NumericDegeneracy {
                what: "subcarrier correlation",
                value: self.rho,
            });
        }
        ensure_positive("prior variance", self.p0)?;
        if !(self.q >= 0.) || !self.q.is_finite() {
            return Err(SyncError::NumericDegeneracy {
                what: "process noise variance",
                value: self.q,
            });
        }
        Ok(())
    }

    /// Gain applied to the process noise, `sqrt(1 - rho^2)`
    pub fn process_gain(&self) -> f64 {
        (1. - self.rho * self.rho).sqrt()
    }
}
