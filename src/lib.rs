//! Receiver-side synchronization and estimation for two links:
//!
//! OFDM:
//!  <Generator> -> <OFDM modulator> -> <delay, CFO, multipath, noise> -> <timing/frequency
//!  acquisition> -> <Kalman channel estimation> -> <equalization and decision>
//!
//!  Timing and frequency come from the correlation between the cyclic prefix and the block tail
//!  it was copied from, N samples later. The channel is estimated per block from pilots on every
//!  12th active subcarrier and interpolated by a Kalman smoother.
//!
//! Single carrier PSK:
//!  <Generator> -> <triangular pulse channel with phase/frequency offset> -> <decision-directed
//!  PLL> -> <decision>

pub mod channel;
pub mod config;
mod equalization;
mod error;
pub mod kalman;
pub mod ofdm;
pub mod pll;
pub mod receiver;
pub mod symbols;
pub mod timing;

pub use channel::{generate_channel, ChannelMode, OfdmImpairments, PskChannel};
pub use config::{KalmanParams, OfdmConfig, PllConfig};
pub use equalization::{decide_subcarriers, equalize};
pub use error::{Result, SyncError};
pub use kalman::estimate_channel;
pub use ofdm::{modulate_ofdm, OfdmModem};
pub use pll::{track_phase, DecisionDirectedPll};
pub use receiver::{receive_frame, ReceivedFrame};
pub use symbols::{count_symbol_errors, decide, generate_symbols, Psk};
pub use timing::{estimate_timing_frequency, TimingEstimate};
