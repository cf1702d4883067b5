//! Synchronization engine for MarketSync
//!
//! Drives the market series in one of two modes:
//!
//! - **Simulated**: a ticker appends generated points; no fetch, no analysis
//! - **External**: refresh cycles fetch an authoritative snapshot, merge it
//!   into the series (reconciling a simulated history first) and analyze it
//!
//! # Components
//!
//! - [`controller::ModeController`] - owns the state and every timer
//! - [`sequencer::AnalysisSequencer`] - one fetch, merge, analyze cycle
//! - [`scheduler::RefreshScheduler`] - periodic ticks plus a countdown
//! - [`guard::CycleGuard`] - at most one cycle in flight
//! - [`shutdown::ShutdownController`] - process-wide cancellation
//!
//! Results from superseded cycles are never applied: every commit checks the
//! epoch it was started under.

pub mod controller;
pub mod error;
pub mod guard;
pub mod scheduler;
pub mod sequencer;
pub mod settings;
pub mod shutdown;
pub mod state;
pub mod timer;

pub use controller::ModeController;
pub use error::{EngineError, EngineResult};
pub use guard::{CycleGuard, InFlightGuard};
pub use scheduler::RefreshScheduler;
pub use sequencer::{AnalysisSequencer, CycleKind, CycleOutcome};
pub use settings::{build_analyzer, build_generator, build_source, generator_params, EngineSettings};
pub use shutdown::{run_until_shutdown, ShutdownController};
pub use state::{AppSnapshot, AppState, Mode, SharedState};
pub use timer::TimerHandle;
