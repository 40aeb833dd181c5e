//! Process exit codes
//!
//! Scripts wrapping `msync` rely on these values staying stable.

/// Exit status of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// Job ran but some objects failed, or an unexpected error occurred
    GeneralError = 1,
    /// Bad arguments or configuration
    UsageError = 2,
    /// An endpoint could not be reached or rejected the credentials
    NetworkError = 3,
    NotFound = 5,
    /// Stopped by Ctrl-C after checkpointing
    Interrupted = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for an engine error
    pub fn from_error(error: &ms_core::Error) -> Self {
        use ms_core::Error;
        match error {
            Error::Configuration(_) => Self::UsageError,
            Error::Connection(_) => Self::NetworkError,
            Error::NotFound(_) => Self::NotFound,
            Error::Interrupted => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}
