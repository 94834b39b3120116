//! QPSK over a triangular-pulse channel with a carrier phase offset, tracked by the
//! decision-directed PLL. Samples are taken at the optimal instants so only the carrier phase
//! (and, optionally, a frequency offset) has to be recovered.
//!
//! Usage: pll_link [freq_offset] [pll_config.json]

use failure::Error;
use ofdm_sync::pll::{empirical_bias, steady_state_bias};
use ofdm_sync::{
    count_symbol_errors, generate_symbols, DecisionDirectedPll, PllConfig, Psk, PskChannel,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::f64::consts::PI;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const NUM_SYMBOLS: usize = 1000;
const SYMBOL_PERIOD: f64 = 1.;
const ESN0_DB: f64 = 20.;
const PHASE: f64 = PI / 8.;
const DELAY: f64 = -0.4;

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let freq_offset: f64 = match args.next() {
        Some(fd) => fd.parse()?,
        None => 0.,
    };
    let config = match args.next() {
        Some(path) => PllConfig::from_json_file(path)?,
        None => PllConfig::default(),
    };

    let mut rng = StdRng::seed_from_u64(0);
    let data = generate_symbols(&Psk::qpsk(config.es)?, NUM_SYMBOLS, &mut rng);
    let channel = PskChannel {
        symbol_period: SYMBOL_PERIOD,
        n0: config.es / 10f64.powf(ESN0_DB / 10.),
        phase: PHASE,
        freq_offset,
        delay: DELAY,
    };
    let times = channel.optimal_instants(data.len());
    let y = channel.sample_at(&times, &data, &mut rng);

    let pll = DecisionDirectedPll::new(config.clone())?;
    let (phases, decisions) = pll.track(&y);
    println!(
        "symbol errors (phi_0 = {}, gamma = {}): {}",
        config.initial_phase,
        config.gamma,
        count_symbol_errors(&data, &decisions)?
    );

    let truth: Vec<f64> = times
        .iter()
        .map(|t| PHASE + 2. * PI * freq_offset * t)
        .collect();
    let measured = empirical_bias(&truth, &phases, NUM_SYMBOLS / 2);
    match steady_state_bias(freq_offset, SYMBOL_PERIOD, config.gamma) {
        Some(predicted) => println!("bias: measured {:?}, predicted {:.5}", measured, predicted),
        None => warn!(
            freq_offset,
            gamma = config.gamma,
            "frequency offset too large for the loop gain, expect loss of lock"
        ),
    }

    Ok(())
}
