//! vcanvas Session Host
//!
//! Configuration loading and the single-owner session loop that drives a
//! canvas from protocol commands and background work.

pub mod config;
pub mod session;

pub use config::{config_paths, Config, ConfigWarning};
pub use session::{Canvas, Session, SessionEvent, SessionHandle};
