//! Error types for the devfreq boost driver.

use core::fmt;

/// Result type for boost driver operations
pub type BoostResult<T> = Result<T, BoostError>;

/// Boost driver errors
///
/// Everything here happens at bring-up. Runtime kicks and notifications
/// never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostError {
    /// A worker or timer thread could not be created
    ThreadSpawn,
    /// The input core refused the input handler (errno)
    InputRegistration(i32),
    /// The display notifier chain refused the client (errno)
    NotifierRegistration(i32),
    /// A devfreq profile without frequencies
    InvalidProfile,
    /// The global driver is already running
    AlreadyInitialized,
}

impl fmt::Display for BoostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoostError::ThreadSpawn => write!(f, "failed to create kthread"),
            BoostError::InputRegistration(err) => {
                write!(f, "failed to register input handler, err: {}", err)
            },
            BoostError::NotifierRegistration(err) => {
                write!(f, "failed to register display notifier, err: {}", err)
            },
            BoostError::InvalidProfile => write!(f, "devfreq profile has an empty frequency table"),
            BoostError::AlreadyInitialized => write!(f, "devfreq boost already initialized"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BoostError {}
