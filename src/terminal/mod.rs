// ABOUTME: Terminal module turning hub services into an interactive command line
// Holds the controller state machine, readiness tracking and result frame decoding

pub mod controller;
pub mod frame;
pub mod readiness;

pub use controller::{Dispatch, TerminalConfig, TerminalController, TerminalEvent};
pub use frame::{decode_frame, normalize_ansi, Frame};
pub use readiness::{ControllerState, Readiness};
