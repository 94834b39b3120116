//! Simulates a DVB-T 2k style link end to end: random QPSK blocks are OFDM modulated, delayed by
//! a 10 km propagation path (integer plus fractional samples), shifted in frequency, passed
//! through a Rayleigh channel with noise, and recovered by `receive_frame`.
//!
//! Usage: ofdm_link [config.json]

use failure::Error;
use num::Complex;
use ofdm_sync::{
    count_symbol_errors, generate_channel, generate_symbols, receive_frame, ChannelMode,
    OfdmConfig, OfdmImpairments, OfdmModem, Psk,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

/// Number of OFDM blocks in the frame
const NUM_BLOCKS: usize = 2;
/// Propagation distance (m)
const DISTANCE: f64 = 10e3;
const FREQ_OFFSET: f64 = 1000.;
/// Delay spread of the channel, in samples
const SPREAD: f64 = 10.;

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => OfdmConfig::from_json_file(path)?,
        None => OfdmConfig::default(),
    };
    let ts = config.ts();
    let mut rng = StdRng::seed_from_u64(0);

    let tau = DISTANCE / 3e8;
    let theta = (tau / ts).floor() as usize;
    let frac = (tau - theta as f64 * ts) / ts;

    let psk = Psk::qpsk(1.)?;
    let sent: Vec<Vec<Complex<f64>>> = (0..NUM_BLOCKS)
        .map(|_| generate_symbols(&psk, config.active_count(), &mut rng))
        .collect();
    let pilot_indices = config.pilot_indices();
    let pilots: Vec<Vec<Complex<f64>>> = sent
        .iter()
        .map(|s| pilot_indices.iter().map(|&k| s[k]).collect())
        .collect();

    let modem = OfdmModem::new(&config)?;
    let tx = modem.modulate_frame(&sent, frac, config.es)?;
    let taps = generate_channel(config.guard_len, ChannelMode::Rayleigh, SPREAD, &mut rng)?;
    let link = OfdmImpairments {
        delay_samples: theta,
        freq_offset_hz: FREQ_OFFSET,
        ts,
        n0: config.n0(),
    };
    let rx = link.apply(&tx, &taps, &mut rng)?;

    let frame = receive_frame(&rx, &config, &pilots, config.n)?;
    println!(
        "{} active subcarriers, occupied bandwidth {:.0} Hz",
        config.active_count(),
        config.bandwidth()
    );
    println!("theta = {}, theta_est = {}", theta, frame.timing.delay);
    println!(
        "Df = {} Hz, Df_est = {:.2} Hz",
        FREQ_OFFSET, frame.timing.freq_offset
    );

    for (i, (block, s)) in frame.blocks.iter().zip(&sent).enumerate() {
        let wrong: Vec<f64> = block
            .decisions
            .iter()
            .zip(s)
            .enumerate()
            .filter(|(_, (d, x))| (**d - **x).norm() > 1e-10)
            .map(|(k, _)| (config.kmin + k) as f64 * config.subcarrier_spacing())
            .collect();
        println!(
            "block {}: {} symbol errors out of {}",
            i,
            count_symbol_errors(s, &block.decisions)?,
            s.len()
        );
        if !wrong.is_empty() {
            println!("  subcarrier frequencies in error (Hz): {:?}", wrong);
        }
    }

    Ok(())
}
