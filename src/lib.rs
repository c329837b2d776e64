//! Kiosk playlist controller: steps a fullscreen display through a playlist of
//! web projects, showing a title card before each one.

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod idle;
pub mod playlist;
pub mod quit;
pub mod sequencer;
pub mod serial;
pub mod shell;
pub mod state;

pub use controller::Controller;
pub use playlist::{Playlist, Project};
pub use sequencer::{NavCommand, Sequencer};
