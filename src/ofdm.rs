use crate::config::OfdmConfig;
use crate::error::{Result, SyncError};
use num::{Complex, Zero};
use rustfft::{FFTplanner, FFT};
use std::f64::consts::PI;
use std::sync::Arc;

/// Modulator/demodulator for one OFDM numerology. Keeps the FFT plans around so a frame of many
/// blocks only plans once.
pub struct OfdmModem {
    n: usize,
    guard_len: usize,
    kmin: usize,
    active: usize,
    ifft: Arc<dyn FFT<f64>>,
    fft: Arc<dyn FFT<f64>>,
}

impl OfdmModem {
    pub fn new(config: &OfdmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_layout(
            config.n,
            config.guard_len,
            config.kmin,
            config.active_count(),
        ))
    }

    fn with_layout(n: usize, guard_len: usize, kmin: usize, active: usize) -> Self {
        Self {
            n,
            guard_len,
            kmin,
            active,
            ifft: FFTplanner::new(true).plan_fft(n),
            fft: FFTplanner::new(false).plan_fft(n),
        }
    }

    /// Produce one `N + L` sample block from the symbols of the active subcarriers. `delay` is a
    /// fractional delay in samples, applied as a linear phase across subcarriers.
    pub fn modulate(&self, symbols: &[Complex<f64>], delay: f64) -> Result<Vec<Complex<f64>>> {
        if symbols.len() != self.active {
            return Err(SyncError::DimensionMismatch {
                what: "active subcarrier symbols",
                expected: self.active,
                actual: symbols.len(),
            });
        }

        let mut spectrum = vec![Complex::zero(); self.n];
        for (i, s) in symbols.iter().enumerate() {
            let k = self.kmin + i;
            spectrum[k] = s * Complex::new(0., -2. * PI * delay * k as f64 / self.n as f64).exp();
        }

        let mut block = vec![Complex::zero(); self.n];
        self.ifft.process(&mut spectrum, &mut block);
        let scale = (self.n as f64).sqrt();

        let mut res = Vec::with_capacity(self.n + self.guard_len);
        res.extend(block[self.n - self.guard_len..].iter().map(|x| x / scale));
        res.extend(block.iter().map(|x| x / scale));
        Ok(res)
    }

    /// Back-to-back blocks, each from unit-energy symbols scaled to energy `es`
    pub fn modulate_frame(
        &self,
        blocks: &[Vec<Complex<f64>>],
        delay: f64,
        es: f64,
    ) -> Result<Vec<Complex<f64>>> {
        let mut res = Vec::with_capacity(blocks.len() * (self.n + self.guard_len));
        for symbols in blocks {
            let scaled: Vec<_> = symbols.iter().map(|s| s * es.sqrt()).collect();
            res.append(&mut self.modulate(&scaled, delay)?);
        }
        Ok(res)
    }

    /// Transform `N` guard-free samples back to the active subcarriers
    pub fn demodulate(&self, samps: &[Complex<f64>]) -> Result<Vec<Complex<f64>>> {
        if samps.len() != self.n {
            return Err(SyncError::DimensionMismatch {
                what: "OFDM block",
                expected: self.n,
                actual: samps.len(),
            });
        }

        let mut spectrum = vec![Complex::zero(); self.n];
        self.fft.process(&mut samps.to_vec(), &mut spectrum);
        let scale = (self.n as f64).sqrt();
        Ok(spectrum[self.kmin..self.kmin + self.active]
            .iter()
            .map(|x| x / scale)
            .collect())
    }
}

/// One OFDM block with the symbols on subcarriers `0..symbols.len()` and the rest extinguished
pub fn modulate_ofdm(
    symbols: &[Complex<f64>],
    n: usize,
    guard_len: usize,
    delay: f64,
) -> Result<Vec<Complex<f64>>> {
    if n == 0 {
        return Err(SyncError::OutOfRange {
            what: "transform size",
            needed: 1,
            available: 0,
        });
    }
    if symbols.len() > n {
        return Err(SyncError::DimensionMismatch {
            what: "active subcarrier symbols",
            expected: n,
            actual: symbols.len(),
        });
    }
    if guard_len > n {
        return Err(SyncError::OutOfRange {
            what: "cyclic prefix",
            needed: guard_len,
            available: n,
        });
    }
    OfdmModem::with_layout(n, guard_len, 0, symbols.len()).modulate(symbols, delay)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symbols::{generate_symbols, Psk};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn modulate_then_demodulate_recovers_symbols() {
        let config = OfdmConfig::default();
        let modem = OfdmModem::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let symbols = generate_symbols(&Psk::qpsk(1.).unwrap(), config.active_count(), &mut rng);

        let block = modem.modulate(&symbols, 0.).unwrap();
        assert_eq!(block.len(), config.block_len());

        let recovered = modem.demodulate(&block[config.guard_len..]).unwrap();
        assert_eq!(recovered.len(), symbols.len());
        for (r, s) in recovered.iter().zip(&symbols) {
            assert!((r - s).norm() < 1e-10);
        }
    }

    #[test]
    fn cyclic_prefix_copies_tail() {
        let mut rng = StdRng::seed_from_u64(3);
        let symbols = generate_symbols(&Psk::qpsk(1.).unwrap(), 52, &mut rng);
        let block = modulate_ofdm(&symbols, 64, 16, 0.25).unwrap();
        assert_eq!(block.len(), 80);
        for i in 0..16 {
            assert_eq!(block[i], block[i + 64]);
        }

        // Unitary transform: energy is preserved
        let energy: f64 = block[16..].iter().map(|x| x.norm_sqr()).sum();
        assert!((energy - 52.).abs() < 1e-9);
    }

    #[test]
    fn fractional_delay_is_phase_ramp() {
        let symbols = vec![Complex::new(1., 0.); 8];
        let delay = 0.3;
        let block = modulate_ofdm(&symbols, 16, 4, delay).unwrap();
        let modem = OfdmModem::with_layout(16, 4, 0, 8);
        let spectrum = modem.demodulate(&block[4..]).unwrap();
        for (k, x) in spectrum.iter().enumerate() {
            let expected = Complex::new(0., -2. * PI * delay * k as f64 / 16.).exp();
            assert!((x - expected).norm() < 1e-10);
        }
    }

    #[test]
    fn inactive_subcarriers_stay_empty() {
        let config = OfdmConfig {
            n: 64,
            kmin: 6,
            kmax: 57,
            guard_len: 16,
            ..Default::default()
        };
        let modem = OfdmModem::new(&config).unwrap();
        let symbols = vec![Complex::new(0., 1.); config.active_count()];
        let block = modem.modulate(&symbols, 0.).unwrap();

        let mut full = vec![Complex::zero(); 64];
        FFTplanner::new(false)
            .plan_fft(64)
            .process(&mut block[16..].to_vec(), &mut full);
        for (k, x) in full.iter().enumerate() {
            if k < 6 || k > 57 {
                assert!(x.norm() < 1e-10);
            }
        }
    }

    #[test]
    fn reject_bad_dimensions() {
        assert!(modulate_ofdm(&[Complex::zero(); 10], 8, 2, 0.).is_err());
        assert!(modulate_ofdm(&[Complex::zero(); 4], 8, 9, 0.).is_err());
        match modulate_ofdm(&[], 0, 0, 0.) {
            Err(SyncError::OutOfRange { needed: 1, .. }) => {}
            res => panic!("{:?}", res),
        }
        let modem = OfdmModem::with_layout(8, 2, 0, 4);
        assert!(modem.demodulate(&[Complex::zero(); 10]).is_err());
    }
}
