//! Verbosity-gated diagnostics for PCD preprocessing.
//!
//! Every diagnostic goes to stderr. Stdout belongs to the command's own
//! output (reports, `dump --json`), which must stay machine-readable at any
//! verbosity.
//!
//! Three output levels controlled by the driver's CLI flags:
//! - **Quiet** (`-q`): errors, warnings and the final summary only
//! - **Default** (no flag): per-phase progress lines
//! - **Verbose** (`-v`): everything, including per-token decisions and timings

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Errors, warnings and summary.
    Quiet = 0,
    /// Progress lines.
    Default = 1,
    /// Everything.
    Verbose = 2,
}

/// Global verbosity level, set once at startup.
static VERBOSITY: AtomicU8 = AtomicU8::new(1); // Default

/// Initialize the verbosity level for the current process.
pub fn init(quiet: bool, verbose: bool) {
    let level = if quiet {
        Verbosity::Quiet
    } else if verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Default
    };
    VERBOSITY.store(level as u8, Ordering::Relaxed);
}

/// Returns the current verbosity level.
pub fn verbosity() -> Verbosity {
    match VERBOSITY.load(Ordering::Relaxed) {
        0 => Verbosity::Quiet,
        2 => Verbosity::Verbose,
        _ => Verbosity::Default,
    }
}

/// Returns `true` if verbose mode is active.
pub fn is_verbose() -> bool {
    verbosity() == Verbosity::Verbose
}

/// Returns `true` if quiet mode is active.
pub fn is_quiet() -> bool {
    verbosity() == Verbosity::Quiet
}

/// Print a message only when verbose mode is enabled.
///
/// ```ignore
/// vprintln!("  token {} is new", key);
/// ```
#[macro_export]
macro_rules! vprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::is_verbose() {
            eprintln!($($arg)*);
        }
    };
}

/// Print a message at default verbosity and above (suppressed in quiet mode).
///
/// ```ignore
/// dprintln!("Preprocessing {} modules...", count);
/// ```
#[macro_export]
macro_rules! dprintln {
    ($($arg:tt)*) => {
        if !$crate::verbose::is_quiet() {
            eprintln!($($arg)*);
        }
    };
}

/// Print a warning at every verbosity level.
///
/// Expands to a `()` expression, so it can stand alone as a match arm.
#[macro_export]
macro_rules! wprintln {
    ($($arg:tt)*) => {{
        eprintln!("warning: {}", format_args!($($arg)*))
    }};
}

/// RAII timer that prints elapsed duration on drop when verbose mode is active.
///
/// ```ignore
/// let _t = Timer::start("module scan");
/// // ... work ...
/// // prints "  module scan: 42ms" on drop
/// ```
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    /// Begin timing a labeled operation.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if is_verbose() {
            let elapsed = self.start.elapsed();
            eprintln!("  {}: {:.1?}", self.label, elapsed);
        }
    }
}
