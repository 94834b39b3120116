use crate::channel::shift_frequency;
use crate::config::OfdmConfig;
use crate::equalization::{decide_subcarriers, equalize};
use crate::error::{Result, SyncError};
use crate::kalman::estimate_channel;
use crate::ofdm::OfdmModem;
use crate::timing::{estimate_timing_frequency, TimingEstimate};
use num::Complex;
use tracing::{debug, info};

/// Everything the receiver recovered from one OFDM block
#[derive(Clone, Debug)]
pub struct ReceivedBlock {
    /// Smoothed channel estimate per active subcarrier
    pub channel: Vec<Complex<f64>>,
    /// Equalized active subcarriers, unit-energy scale
    pub equalized: Vec<Complex<f64>>,
    pub decisions: Vec<Complex<f64>>,
}

#[derive(Clone, Debug)]
pub struct ReceivedFrame {
    pub timing: TimingEstimate,
    pub blocks: Vec<ReceivedBlock>,
}

/// Demodulate a frame of `known_pilots.len()` consecutive blocks. Timing and frequency are
/// acquired once over the first `search_range` delays; each block then has its cyclic prefix
/// dropped, the frequency offset removed, its channel estimated from the pilots it carries
/// (`known_pilots[i]`, unit energy, at `config.pilot_indices()`) and its subcarriers decided.
pub fn receive_frame(
    samps: &[Complex<f64>],
    config: &OfdmConfig,
    known_pilots: &[Vec<Complex<f64>>],
    search_range: usize,
) -> Result<ReceivedFrame> {
    let modem = OfdmModem::new(config)?;
    let ts = config.ts();
    let timing = estimate_timing_frequency(samps, config.guard_len, config.n, search_range, ts)?;
    info!(
        delay = timing.delay,
        freq_offset = timing.freq_offset,
        "frame acquired"
    );

    let needed = timing.delay + known_pilots.len() * config.block_len();
    if samps.len() < needed {
        return Err(SyncError::OutOfRange {
            what: "frame",
            needed,
            available: samps.len(),
        });
    }

    let pilot_indices = config.pilot_indices();
    let n0 = config.n0();
    let mut blocks = Vec::with_capacity(known_pilots.len());
    for (i, pilots) in known_pilots.iter().enumerate() {
        let start = timing.delay + i * config.block_len() + config.guard_len;
        let block = shift_frequency(&samps[start..start + config.n], -timing.freq_offset, ts, start);
        let observations = modem.demodulate(&block)?;

        let channel = estimate_channel(&observations, pilots, &pilot_indices, config.es, n0)?;
        let equalized = equalize(&observations, &channel, config.es)?;
        let decisions = decide_subcarriers(&equalized);
        debug!(block = i, start, "block demodulated");

        blocks.push(ReceivedBlock {
            channel,
            equalized,
            decisions,
        });
    }

    Ok(ReceivedFrame { timing, blocks })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::{generate_channel, ChannelMode, OfdmImpairments};
    use crate::symbols::{count_symbol_errors, generate_symbols, Psk};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Frame {
        config: OfdmConfig,
        rx: Vec<Complex<f64>>,
        sent: Vec<Vec<Complex<f64>>>,
        pilots: Vec<Vec<Complex<f64>>>,
        theta: usize,
    }

    fn build_frame(mode: ChannelMode, n0: f64, seed: u64) -> Frame {
        let config = OfdmConfig::default();
        let ts = config.ts();
        let tau = 10e3 / 3e8;
        let theta = (tau / ts).floor() as usize;
        let frac = (tau - theta as f64 * ts) / ts;

        let mut rng = StdRng::seed_from_u64(seed);
        let psk = Psk::qpsk(1.).unwrap();
        let sent: Vec<_> = (0..2)
            .map(|_| generate_symbols(&psk, config.active_count(), &mut rng))
            .collect();
        let pilots: Vec<Vec<Complex<f64>>> = sent
            .iter()
            .map(|s| config.pilot_indices().iter().map(|&k| s[k]).collect())
            .collect();

        let modem = OfdmModem::new(&config).unwrap();
        let tx = modem.modulate_frame(&sent, frac, config.es).unwrap();
        let taps = generate_channel(config.guard_len, mode, 10., &mut rng).unwrap();
        let link = OfdmImpairments {
            delay_samples: theta,
            freq_offset_hz: 1000.,
            ts,
            n0,
        };
        let rx = link.apply(&tx, &taps, &mut rng).unwrap();
        Frame {
            config,
            rx,
            sent,
            pilots,
            theta,
        }
    }

    #[test]
    fn noiseless_frame_decoded() {
        let f = build_frame(ChannelMode::Dirac, 0., 1);
        let frame = receive_frame(&f.rx, &f.config, &f.pilots, f.config.n).unwrap();
        // The second block can pull the peak a few samples late, never early
        assert!(frame.timing.delay >= f.theta && frame.timing.delay <= f.theta + 8);
        assert!((frame.timing.freq_offset - 1000.).abs() < 30.);

        assert_eq!(frame.blocks.len(), 2);
        for (block, sent) in frame.blocks.iter().zip(&f.sent) {
            assert_eq!(block.decisions.len(), sent.len());
            assert_eq!(count_symbol_errors(sent, &block.decisions).unwrap(), 0);
        }
    }

    #[test]
    fn rayleigh_frame_at_20db() {
        let f = build_frame(ChannelMode::Rayleigh, OfdmConfig::default().n0(), 2);
        let frame = receive_frame(&f.rx, &f.config, &f.pilots, f.config.n).unwrap();
        let errors: usize = frame
            .blocks
            .iter()
            .zip(&f.sent)
            .map(|(b, s)| count_symbol_errors(s, &b.decisions).unwrap())
            .sum();
        let total = 2 * f.config.active_count();
        // Only subcarriers in deep fades should go wrong
        assert!(errors < total / 10, "{} of {}", errors, total);
    }

    #[test]
    fn truncated_frame_rejected() {
        let f = build_frame(ChannelMode::Dirac, 0., 3);
        let short = &f.rx[..f.theta + f.config.block_len() + f.config.n];
        match receive_frame(short, &f.config, &f.pilots, f.config.n) {
            Err(SyncError::OutOfRange { .. }) => {}
            res => panic!("{:?}", res.map(|r| r.timing)),
        }
    }
}
