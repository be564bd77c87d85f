//! Terminal output for interactive sessions.
//!
//! Provides the console abstraction the reporter writes single-line failure
//! reports to, and a 24-bit color theme for painting them.

mod colors;
mod console;

pub use colors::{Color, Theme};
pub use console::{Console, TerminalConsole};
