use crate::error::{ensure_positive, Result, SyncError};
use crate::symbols::decide;
use num::Complex;

/// Zero-forcing equalization `Y / (H sqrt(es))`, bringing the active subcarriers back to the
/// unit-energy alphabet. A null in `channel` yields non-finite output.
pub fn equalize(
    observations: &[Complex<f64>],
    channel: &[Complex<f64>],
    es: f64,
) -> Result<Vec<Complex<f64>>> {
    ensure_positive("symbol energy", es)?;
    if observations.len() != channel.len() {
        return Err(SyncError::DimensionMismatch {
            what: "channel estimate",
            expected: observations.len(),
            actual: channel.len(),
        });
    }
    Ok(observations
        .iter()
        .zip(channel)
        .map(|(y, h)| y / h / es.sqrt())
        .collect())
}

/// Unit-energy QPSK decision on each equalized subcarrier
pub fn decide_subcarriers(equalized: &[Complex<f64>]) -> Vec<Complex<f64>> {
    equalized.iter().map(|x| decide(*x, 1.)).collect()
}
