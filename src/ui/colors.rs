//! 24-bit RGB color theme for terminal failure reports.

use owo_colors::Rgb;

/// Named colors a report line can be painted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Failures.
    Red,
}

/// 24-bit RGB palette backing each [`Color`].
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    /// Failure color - red (239, 68, 68)
    pub error: Rgb,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            error: Rgb(239, 68, 68),
        }
    }
}

impl Theme {
    /// Create a new theme with default colors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a named color to its RGB value.
    pub fn rgb(&self, color: Color) -> Rgb {
        match color {
            Color::Red => self.error,
        }
    }
}
