use crate::error::{ensure_positive, Result, SyncError};
use num::Complex;
use rand::Rng;
use std::f64::consts::PI;

/// M-ary PSK alphabet with points `sqrt(es) * exp(j(pi/M + 2 pi k/M))`. For M = 4 these are the
/// four diagonals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Psk {
    order: usize,
    es: f64,
}

impl Psk {
    pub fn new(order: usize, es: f64) -> Result<Self> {
        if order < 2 || !order.is_power_of_two() {
            return Err(SyncError::DimensionMismatch {
                what: "PSK alphabet",
                expected: 4,
                actual: order,
            });
        }
        ensure_positive("symbol energy", es)?;
        Ok(Self { order, es })
    }

    pub fn qpsk(es: f64) -> Result<Self> {
        Self::new(4, es)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn es(&self) -> f64 {
        self.es
    }

    pub fn point(&self, k: usize) -> Complex<f64> {
        self.point_at(k as f64)
    }

    fn point_at(&self, k: f64) -> Complex<f64> {
        let m = self.order as f64;
        Complex::new(0., PI / m + 2. * PI * k / m).exp() * self.es.sqrt()
    }

    /// Nearest point of the alphabet. NaN in, NaN out.
    pub fn decide(&self, sample: Complex<f64>) -> Complex<f64> {
        if self.order == 4 {
            return decide(sample, self.es);
        }
        let m = self.order as f64;
        let k = ((sample.arg() - PI / m) * m / (2. * PI)).round();
        self.point_at(k)
    }
}

/// Maximum-likelihood QPSK decision: the quadrant of `sample` picks the diagonal point of energy
/// `es`.
pub fn decide(sample: Complex<f64>, es: f64) -> Complex<f64> {
    Complex::new(sample.re.signum(), sample.im.signum()) * (es / 2.).sqrt()
}

/// `count` independent, uniformly drawn symbols
pub fn generate_symbols<R: Rng>(psk: &Psk, count: usize, rng: &mut R) -> Vec<Complex<f64>> {
    (0..count)
        .map(|_| psk.point(rng.gen_range(0, psk.order())))
        .collect()
}

/// Number of positions where `decided` differs from `sent`
pub fn count_symbol_errors(sent: &[Complex<f64>], decided: &[Complex<f64>]) -> Result<usize> {
    if sent.len() != decided.len() {
        return Err(SyncError::DimensionMismatch {
            what: "decisions",
            expected: sent.len(),
            actual: decided.len(),
        });
    }
    Ok(sent
        .iter()
        .zip(decided)
        .filter(|(s, d)| (**s - **d).norm() > 1e-10)
        .count())
}
