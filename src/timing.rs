use crate::error::{ensure_positive, Result, SyncError};
use num::Complex;
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Outcome of one acquisition
#[derive(Clone, Debug, PartialEq)]
pub struct TimingEstimate {
    /// First delay at which the metric peaks, i.e. where the cyclic prefix starts
    pub delay: usize,
    /// Carrier frequency offset (Hz)
    pub freq_offset: f64,
    /// Every delay attaining the peak. Usually just `delay`
    pub ties: Vec<usize>,
}

/// Correlate the received samples with themselves one block later:
/// `P[d] = sum_{m < L} y[m + d] conj(y[m + d + N])` for `d` in `0..search_range`.
/// The cyclic prefix makes this peak at the start of a block.
pub fn timing_metric(
    samps: &[Complex<f64>],
    guard_len: usize,
    n: usize,
    search_range: usize,
) -> Result<Vec<Complex<f64>>> {
    let needed = (search_range + n + guard_len).saturating_sub(1);
    if search_range == 0 || samps.len() < needed {
        return Err(SyncError::OutOfRange {
            what: "timing metric",
            needed: needed.max(1),
            available: samps.len(),
        });
    }

    Ok((0..search_range)
        .map(|d| {
            (0..guard_len)
                .map(|m| samps[m + d] * samps[m + d + n].conj())
                .sum::<Complex<f64>>()
        })
        .collect())
}

/// Jointly estimate where the first block starts and the carrier frequency offset. The offset
/// comes from the phase rotation accumulated over `N` samples at the metric's peak, so it is
/// unambiguous only within `+-1 / (2 N ts)`.
pub fn estimate_timing_frequency(
    samps: &[Complex<f64>],
    guard_len: usize,
    n: usize,
    search_range: usize,
    ts: f64,
) -> Result<TimingEstimate> {
    ensure_positive("sample period", ts)?;
    let metric = timing_metric(samps, guard_len, n, search_range)?;

    let mut peak = f64::NEG_INFINITY;
    let mut ties = Vec::new();
    for (d, p) in metric.iter().enumerate() {
        let mag = p.norm();
        if !mag.is_finite() {
            return Err(SyncError::NumericDegeneracy {
                what: "timing metric",
                value: mag,
            });
        }
        if mag > peak {
            peak = mag;
            ties.clear();
        }
        if mag == peak {
            ties.push(d);
        }
    }
    // search_range > 0, so the metric is not empty
    let delay = ties[0];
    if ties.len() > 1 {
        warn!("timing metric peaks at {} delays, using {}", ties.len(), delay);
    }

    let freq_offset = -metric[delay].arg() / (2. * PI * n as f64 * ts);
    debug!(delay, freq_offset, peak, "timing acquired");

    Ok(TimingEstimate {
        delay,
        freq_offset,
        ties,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::{generate_channel, ChannelMode, OfdmImpairments};
    use crate::config::OfdmConfig;
    use crate::ofdm::OfdmModem;
    use crate::symbols::{generate_symbols, Psk};
    use num::Zero;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// One DVB-T block delayed by a 10 km propagation path, followed by silence
    fn synthetic_frame(freq_offset: f64, n0: f64, seed: u64) -> (Vec<Complex<f64>>, usize) {
        let config = OfdmConfig::default();
        let ts = config.ts();
        let tau = 10e3 / 3e8;
        let theta = (tau / ts).floor() as usize;
        let frac = (tau - theta as f64 * ts) / ts;

        let mut rng = StdRng::seed_from_u64(seed);
        let modem = OfdmModem::new(&config).unwrap();
        let symbols = generate_symbols(&Psk::qpsk(1.).unwrap(), config.active_count(), &mut rng);
        let tx = modem.modulate(&symbols, frac).unwrap();
        let taps = generate_channel(1, ChannelMode::Dirac, 1., &mut rng).unwrap();

        let link = OfdmImpairments {
            delay_samples: theta,
            freq_offset_hz: freq_offset,
            ts,
            n0,
        };
        let mut rx = link.apply(&tx, &taps, &mut rng).unwrap();
        rx.resize(2 * config.n + 2 * config.guard_len, Complex::zero());
        (rx, theta)
    }

    #[test]
    fn metric_of_repeated_block() {
        // Block of 4 with a guard of 2: [c d a b c d]
        let y: Vec<_> = [3., 4., 1., 2., 3., 4., 0., 0.]
            .iter()
            .map(|x| Complex::new(*x, 0.))
            .collect();
        let p = timing_metric(&y, 2, 4, 3).unwrap();
        assert_eq!(p[0], Complex::new(25., 0.));
        assert_eq!(p[1], Complex::new(16., 0.));
        assert_eq!(p[2], Complex::new(0., 0.));
    }

    #[test]
    fn ties_resolved_to_first_delay() {
        // Prefix of silence then a constant: every delay past the silence correlates equally
        let mut samps = vec![Complex::zero(); 3];
        samps.extend(vec![Complex::new(1., 0.); 13]);
        let est = estimate_timing_frequency(&samps, 4, 8, 5, 1e-6).unwrap();
        assert_eq!(est.delay, 3);
        assert_eq!(est.ties, vec![3, 4]);
        assert_eq!(est.freq_offset, 0.);

        let silent = vec![Complex::zero(); 16];
        let est = estimate_timing_frequency(&silent, 4, 8, 5, 1e-6).unwrap();
        assert_eq!(est.delay, 0);
        assert_eq!(est.ties, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn non_finite_metric_rejected() {
        let mut samps = vec![Complex::new(1., 0.); 16];
        samps[10] = Complex::new(f64::NAN, 0.);
        match estimate_timing_frequency(&samps, 4, 8, 5, 1e-6) {
            Err(SyncError::NumericDegeneracy { .. }) => {}
            res => panic!("{:?}", res),
        }
    }

    #[test]
    fn too_few_samples() {
        let y = vec![Complex::new(1., 0.); 10];
        assert!(timing_metric(&y, 2, 8, 1).is_ok());
        match timing_metric(&y, 2, 8, 2) {
            Err(SyncError::OutOfRange { needed, .. }) => assert_eq!(needed, 11),
            res => panic!("expected OutOfRange, got {:?}", res),
        }
        assert!(timing_metric(&y, 2, 8, 0).is_err());
    }

    #[test]
    fn noiseless_acquisition_is_exact() {
        let config = OfdmConfig::default();
        let df = 1000.;
        let (rx, theta) = synthetic_frame(df, 0., 5);
        let est = estimate_timing_frequency(&rx, config.guard_len, config.n, config.n, config.ts())
            .unwrap();
        assert_eq!(est.delay, theta);
        assert_eq!(est.ties, vec![theta]);
        assert!((est.freq_offset - df).abs() < 1e-6, "{}", est.freq_offset);
    }

    #[test]
    fn negative_offset_recovered() {
        let config = OfdmConfig::default();
        let (rx, theta) = synthetic_frame(-1500., 0., 9);
        let est = estimate_timing_frequency(&rx, config.guard_len, config.n, config.n, config.ts())
            .unwrap();
        assert_eq!(est.delay, theta);
        assert!((est.freq_offset + 1500.).abs() < 1e-6);
    }

    #[test]
    fn acquisition_at_20db() {
        let config = OfdmConfig::default();
        let df = 1000.;
        let (rx, theta) = synthetic_frame(df, config.n0(), 21);
        let est = estimate_timing_frequency(&rx, config.guard_len, config.n, config.n, config.ts())
            .unwrap();
        assert!((est.delay as i64 - theta as i64).abs() <= 3, "{}", est.delay);
        // The phase of a 256-term correlation at 20 dB is good to a few Hz at this spacing
        assert!((est.freq_offset - df).abs() < 30., "{}", est.freq_offset);
    }
}
