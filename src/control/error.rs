//! Failure causes carried by [`ResultValue`](super::ResultValue).
//!
//! A failed `ResultValue` always records why it failed:
//!
//! - [`FailureCause::Absent`]: the value it was built from was missing
//! - [`FailureCause::Message`]: the caller declared a failure with a message
//! - [`FailureCause::Error`]: an underlying error, including panics captured
//!   while running caller-supplied functions (see [`PanicError`])

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Rendered message of [`FailureCause::Absent`].
const ABSENT_MESSAGE: &str = "null value";

/// The reason a [`ResultValue`](super::ResultValue) is a failure.
///
/// Causes are cheap to clone: wrapped errors are reference counted, so a
/// failure short-circuiting through `map` carries the very same error.
///
/// # Examples
///
/// ```rust
/// use fplite::control::FailureCause;
///
/// let cause = FailureCause::message("disk full");
/// assert_eq!(cause.to_string(), "disk full");
/// assert_eq!(FailureCause::Absent.to_string(), "null value");
/// ```
#[derive(Debug, Clone)]
pub enum FailureCause {
    /// The value the result was built from was absent.
    Absent,
    /// An explicit failure message.
    Message(String),
    /// A wrapped underlying error.
    Error(Arc<dyn Error + Send + Sync>),
}

impl FailureCause {
    /// Creates a message cause.
    #[inline]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wraps an error as a cause.
    #[inline]
    pub fn error<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::Error(Arc::new(error))
    }

    /// Returns `true` if this cause records an absent value.
    #[inline]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns the wrapped error as a concrete type, if it is one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::{FailureCause, PanicError};
    ///
    /// let cause = FailureCause::error(PanicError::new("boom"));
    /// assert_eq!(cause.downcast_ref::<PanicError>().map(PanicError::message), Some("boom"));
    /// ```
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Error + 'static,
    {
        match self {
            Self::Error(error) => error.downcast_ref::<E>(),
            Self::Absent | Self::Message(_) => None,
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => formatter.write_str(ABSENT_MESSAGE),
            Self::Message(message) => formatter.write_str(message),
            Self::Error(error) => write!(formatter, "{error}"),
        }
    }
}

impl Error for FailureCause {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Error(error) => {
                let source: &(dyn Error + 'static) = error.as_ref();
                Some(source)
            }
            Self::Absent | Self::Message(_) => None,
        }
    }
}

// Wrapped errors are equal when they are the same allocation, or failing
// that, when they render the same message.
impl PartialEq for FailureCause {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Absent, Self::Absent) => true,
            (Self::Message(left), Self::Message(right)) => left == right,
            (Self::Error(left), Self::Error(right)) => {
                Arc::ptr_eq(left, right) || left.to_string() == right.to_string()
            }
            _ => false,
        }
    }
}

impl From<String> for FailureCause {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for FailureCause {
    fn from(message: &str) -> Self {
        Self::Message(message.to_owned())
    }
}

// Wrapped errors cannot be rebuilt, so they serialize as their message.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
enum CauseRepr {
    Absent,
    Message(String),
}

#[cfg(feature = "serde")]
impl serde::Serialize for FailureCause {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let repr = match self {
            Self::Absent => CauseRepr::Absent,
            Self::Message(message) => CauseRepr::Message(message.clone()),
            Self::Error(error) => CauseRepr::Message(error.to_string()),
        };
        serde::Serialize::serialize(&repr, serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for FailureCause {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match <CauseRepr as serde::Deserialize>::deserialize(deserializer)? {
            CauseRepr::Absent => Self::Absent,
            CauseRepr::Message(message) => Self::Message(message),
        })
    }
}

/// A panic captured while running a caller-supplied function.
///
/// # Examples
///
/// ```rust
/// use fplite::control::{PanicError, ResultValue};
///
/// let result = ResultValue::success(1).map(|_: i32| -> i32 { panic!("boom") });
/// let cause = result.cause().unwrap();
/// assert_eq!(cause.downcast_ref::<PanicError>().unwrap().message(), "boom");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
    message: String,
}

impl PanicError {
    /// Creates a panic error with the given message.
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Builds a panic error from the payload returned by `catch_unwind`.
    ///
    /// Payloads that are neither `&str` nor `String` are reported as
    /// `"unknown panic"`.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_owned());
        Self { message }
    }

    /// Returns the panic message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "panicked: {}", self.message)
    }
}

impl Error for PanicError {}
