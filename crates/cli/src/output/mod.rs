//! Console output

mod formatter;

pub use formatter::Formatter;

/// Output settings shared by every command
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Strict JSON on stdout, no colors or progress bars
    pub json: bool,
    pub no_color: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}
