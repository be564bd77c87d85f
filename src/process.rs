//! Process termination for fatal failures.

/// Ends the process after a fatal report has been emitted.
pub trait Terminator: Send + Sync {
    /// Terminate with `status`. Never returns.
    fn terminate(&self, status: i32) -> !;
}

/// Terminates the real process via [`std::process::exit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit;

impl Terminator for ProcessExit {
    fn terminate(&self, status: i32) -> ! {
        std::process::exit(status)
    }
}
