//! `ResultValue` type - a success value or a captured failure.
//!
//! `ResultValue<T>` is either a success holding a `T` or a failure holding a
//! [`FailureCause`]. Every combinator that runs caller-supplied code
//! (`map`, `flat_map`, `or_else`) catches a panic raised by that code and
//! turns it into a failure, so once a computation enters this API no panic
//! escapes from it.
//!
//! # Examples
//!
//! ```rust
//! use fplite::control::ResultValue;
//!
//! let present = ResultValue::from_option(Some(20));
//! assert_eq!(present.map(|n| n + 1).get_or_else(0), 21);
//!
//! let missing: ResultValue<i32> = ResultValue::from_option(None);
//! assert_eq!(missing.to_string(), "Failure(null value)");
//! ```

use std::error::Error;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::error::{FailureCause, PanicError};

#[derive(Clone, PartialEq)]
enum Outcome<T> {
    Success(T),
    Failure(FailureCause),
}

/// A value that is either a success or a captured failure.
///
/// The two variants are not directly constructible: use the factories
/// ([`success`](Self::success), [`failure`](Self::failure),
/// [`failure_from`](Self::failure_from), [`from_option`](Self::from_option))
/// and inspect the outcome with [`as_result`](Self::as_result) or
/// [`into_result`](Self::into_result) when an exhaustive match is needed.
///
/// # Examples
///
/// ```rust
/// use fplite::control::ResultValue;
///
/// let result = ResultValue::success(2).flat_map(|n| {
///     if n > 0 {
///         ResultValue::success(n * 10)
///     } else {
///         ResultValue::failure("negative")
///     }
/// });
///
/// match result.into_result() {
///     Ok(value) => assert_eq!(value, 20),
///     Err(cause) => panic!("unexpected failure: {cause}"),
/// }
/// ```
#[derive(Clone, PartialEq)]
pub struct ResultValue<T> {
    outcome: Outcome<T>,
}

/// Runs `function`, turning a panic into a failure carrying a [`PanicError`].
fn capture<U>(function: impl FnOnce() -> ResultValue<U>) -> ResultValue<U> {
    catch_unwind(AssertUnwindSafe(function)).unwrap_or_else(|payload| {
        ResultValue::failure_from(PanicError::from_payload(&*payload))
    })
}

impl<T> ResultValue<T> {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Creates a success holding `value`.
    #[inline]
    pub const fn success(value: T) -> Self {
        Self {
            outcome: Outcome::Success(value),
        }
    }

    /// Creates a failure with an explicit message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::ResultValue;
    ///
    /// let result: ResultValue<i32> = ResultValue::failure("no connection");
    /// assert_eq!(result.cause().unwrap().to_string(), "no connection");
    /// ```
    #[inline]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::failure_with(FailureCause::Message(message.into()))
    }

    /// Creates a failure wrapping an underlying error.
    #[inline]
    pub fn failure_from<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::failure_with(FailureCause::error(error))
    }

    /// Creates a failure with the given cause.
    #[inline]
    pub const fn failure_with(cause: FailureCause) -> Self {
        Self {
            outcome: Outcome::Failure(cause),
        }
    }

    /// Creates a failure recording an absent value.
    #[inline]
    pub const fn absent() -> Self {
        Self::failure_with(FailureCause::Absent)
    }

    /// Creates a success from `Some(value)` and an absent failure from `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::{FailureCause, ResultValue};
    ///
    /// assert!(ResultValue::from_option(Some(1)).is_success());
    /// assert_eq!(
    ///     ResultValue::<i32>::from_option(None).cause(),
    ///     Some(&FailureCause::Absent)
    /// );
    /// ```
    #[inline]
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or_else(Self::absent, Self::success)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns `true` if this is a success.
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    /// Returns `true` if this is a failure.
    #[inline]
    pub const fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failure(_))
    }

    /// Returns a reference to the success value, if any.
    #[inline]
    pub const fn success_ref(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    /// Returns the failure cause, if any.
    #[inline]
    pub const fn cause(&self) -> Option<&FailureCause> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(cause) => Some(cause),
        }
    }

    /// Borrows the outcome as a standard `Result`.
    #[inline]
    pub const fn as_result(&self) -> Result<&T, &FailureCause> {
        match &self.outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(cause) => Err(cause),
        }
    }

    /// Converts the outcome into a standard `Result`.
    ///
    /// # Errors
    ///
    /// Returns the failure cause if this is a failure.
    #[inline]
    pub fn into_result(self) -> Result<T, FailureCause> {
        match self.outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(cause) => Err(cause),
        }
    }

    // =========================================================================
    // Combinators
    // =========================================================================

    /// Applies `function` to a success value.
    ///
    /// A panic inside `function` becomes a failure. On a failure, `function`
    /// is not called and the same cause is carried over.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::ResultValue;
    ///
    /// let parsed = ResultValue::success("12").map(|text| text.parse::<i32>().unwrap());
    /// assert_eq!(parsed.success_ref(), Some(&12));
    ///
    /// let broken = ResultValue::success("twelve").map(|text| text.parse::<i32>().unwrap());
    /// assert!(broken.is_failure());
    /// ```
    pub fn map<U, F>(self, function: F) -> ResultValue<U>
    where
        F: FnOnce(T) -> U,
    {
        match self.outcome {
            Outcome::Success(value) => capture(move || ResultValue::success(function(value))),
            Outcome::Failure(cause) => ResultValue::failure_with(cause),
        }
    }

    /// Applies a function returning a `ResultValue` to a success value.
    ///
    /// A panic inside `function` becomes a failure. On a failure, `function`
    /// is not called.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::ResultValue;
    ///
    /// fn half(n: i32) -> ResultValue<i32> {
    ///     if n % 2 == 0 { ResultValue::success(n / 2) } else { ResultValue::failure("odd") }
    /// }
    ///
    /// assert_eq!(ResultValue::success(8).flat_map(half).flat_map(half).get_or_else(0), 2);
    /// assert!(ResultValue::success(6).flat_map(half).flat_map(half).is_failure());
    /// ```
    pub fn flat_map<U, F>(self, function: F) -> ResultValue<U>
    where
        F: FnOnce(T) -> ResultValue<U>,
    {
        match self.outcome {
            Outcome::Success(value) => capture(move || function(value)),
            Outcome::Failure(cause) => ResultValue::failure_with(cause),
        }
    }

    /// Returns the success value, or `default` on a failure.
    #[inline]
    pub fn get_or_else(self, default: T) -> T {
        match self.outcome {
            Outcome::Success(value) => value,
            Outcome::Failure(_) => default,
        }
    }

    /// Returns the success value, or calls `default` on a failure.
    ///
    /// `default` is only evaluated on the failure path.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::ResultValue;
    ///
    /// let value = ResultValue::success(1).get_or_else_with(|| unreachable!());
    /// assert_eq!(value, 1);
    /// ```
    #[inline]
    pub fn get_or_else_with<F>(self, default: F) -> T
    where
        F: FnOnce() -> T,
    {
        match self.outcome {
            Outcome::Success(value) => value,
            Outcome::Failure(_) => default(),
        }
    }

    /// Returns `self` on a success, otherwise the result of `alternative`.
    ///
    /// A panic inside `alternative` becomes a failure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::ResultValue;
    ///
    /// let primary: ResultValue<&str> = ResultValue::failure("primary down");
    /// let recovered = primary.or_else(|| ResultValue::success("replica"));
    /// assert_eq!(recovered.get_or_else("none"), "replica");
    /// ```
    pub fn or_else<F>(self, alternative: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self.outcome {
            Outcome::Success(_) => self,
            Outcome::Failure(_) => capture(alternative),
        }
    }

    /// Replaces the cause of a failure with an explicit message.
    ///
    /// A success is returned unchanged.
    pub fn map_failure(self, message: impl Into<String>) -> Self {
        match self.outcome {
            Outcome::Success(_) => self,
            Outcome::Failure(_) => Self::failure(message),
        }
    }

    /// Runs `effect` on the success value, if any.
    pub fn for_each<F>(&self, effect: F)
    where
        F: FnOnce(&T),
    {
        if let Outcome::Success(value) = &self.outcome {
            effect(value);
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl<T> From<Option<T>> for ResultValue<T> {
    fn from(value: Option<T>) -> Self {
        Self::from_option(value)
    }
}

impl<T, E> From<Result<T, E>> for ResultValue<T>
where
    E: Error + Send + Sync + 'static,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(error) => Self::failure_from(error),
        }
    }
}

impl<T> From<ResultValue<T>> for Result<T, FailureCause> {
    fn from(result: ResultValue<T>) -> Self {
        result.into_result()
    }
}

/// Collects successes, stopping at the first failure.
///
/// # Examples
///
/// ```rust
/// use fplite::control::ResultValue;
///
/// let all: ResultValue<Vec<i32>> = vec![ResultValue::success(1), ResultValue::success(2)]
///     .into_iter()
///     .collect();
/// assert_eq!(all.get_or_else(vec![]), vec![1, 2]);
/// ```
impl<T, C> FromIterator<ResultValue<T>> for ResultValue<C>
where
    C: FromIterator<T>,
{
    fn from_iter<I: IntoIterator<Item = ResultValue<T>>>(iter: I) -> Self {
        iter.into_iter()
            .map(ResultValue::into_result)
            .collect::<Result<C, FailureCause>>()
            .map_or_else(Self::failure_with, Self::success)
    }
}

// =============================================================================
// Formatting
// =============================================================================

impl<T: fmt::Debug> fmt::Debug for ResultValue<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Success(value) => formatter.debug_tuple("Success").field(value).finish(),
            Outcome::Failure(cause) => formatter.debug_tuple("Failure").field(cause).finish(),
        }
    }
}

impl<T: fmt::Display> fmt::Display for ResultValue<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Success(value) => write!(formatter, "Success({value})"),
            Outcome::Failure(cause) => write!(formatter, "Failure({cause})"),
        }
    }
}

// =============================================================================
// Serde
// =============================================================================

#[cfg(feature = "serde")]
#[derive(Serialize)]
enum ResultValueRef<'a, T> {
    Success(&'a T),
    Failure(&'a FailureCause),
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
enum ResultValueOwned<T> {
    Success(T),
    Failure(FailureCause),
}

#[cfg(feature = "serde")]
impl<T: Serialize> Serialize for ResultValue<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match &self.outcome {
            Outcome::Success(value) => ResultValueRef::Success(value).serialize(serializer),
            Outcome::Failure(cause) => ResultValueRef::<T>::Failure(cause).serialize(serializer),
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, T> Deserialize<'de> for ResultValue<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match ResultValueOwned::deserialize(deserializer)? {
            ResultValueOwned::Success(value) => Self::success(value),
            ResultValueOwned::Failure(cause) => Self::failure_with(cause),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::Cell;

    #[rstest]
    fn test_success_is_success() {
        let result = ResultValue::success(42);
        assert!(result.is_success());
        assert!(!result.is_failure());
        assert_eq!(result.success_ref(), Some(&42));
        assert!(result.cause().is_none());
    }

    #[rstest]
    fn test_failure_is_failure() {
        let result: ResultValue<i32> = ResultValue::failure("bad");
        assert!(result.is_failure());
        assert_eq!(result.success_ref(), None);
        assert_eq!(result.cause(), Some(&FailureCause::message("bad")));
    }

    #[rstest]
    #[case::present(Some(7), true)]
    #[case::absent(None, false)]
    fn test_from_option(#[case] value: Option<i32>, #[case] expected_success: bool) {
        assert_eq!(ResultValue::from_option(value).is_success(), expected_success);
    }

    #[rstest]
    fn test_map_skips_function_on_failure() {
        let calls = Cell::new(0);
        let result: ResultValue<i32> = ResultValue::absent();
        let mapped = result.map(|n| {
            calls.set(calls.get() + 1);
            n + 1
        });
        assert_eq!(calls.get(), 0);
        assert_eq!(mapped.cause(), Some(&FailureCause::Absent));
    }

    #[rstest]
    fn test_map_captures_panic() {
        let mapped = ResultValue::success(1).map(|_: i32| -> i32 { panic!("exploded") });
        let cause = mapped.cause().cloned();
        assert_eq!(
            cause.as_ref().and_then(|c| c.downcast_ref::<PanicError>()).map(PanicError::message),
            Some("exploded")
        );
    }

    #[rstest]
    fn test_flat_map_captures_panic() {
        let result = ResultValue::success(1).flat_map(|_: i32| -> ResultValue<i32> { panic!("x") });
        assert!(result.is_failure());
    }

    #[rstest]
    fn test_or_else_captures_panic() {
        let result: ResultValue<i32> = ResultValue::failure("first");
        let recovered = result.or_else(|| panic!("second"));
        assert_eq!(recovered.cause().map(ToString::to_string), Some("panicked: second".to_string()));
    }

    #[rstest]
    fn test_map_failure_relabels_only_failures() {
        assert_eq!(ResultValue::success(1).map_failure("x"), ResultValue::success(1));
        let relabeled: ResultValue<i32> = ResultValue::absent().map_failure("missing id");
        assert_eq!(relabeled.cause(), Some(&FailureCause::message("missing id")));
    }

    #[rstest]
    fn test_for_each_runs_on_success_only() {
        let seen = Cell::new(0);
        ResultValue::success(5).for_each(|n| seen.set(*n));
        ResultValue::<i32>::failure("no").for_each(|_| seen.set(-1));
        assert_eq!(seen.get(), 5);
    }

    #[rstest]
    fn test_display() {
        assert_eq!(ResultValue::success(3).to_string(), "Success(3)");
        assert_eq!(ResultValue::<i32>::absent().to_string(), "Failure(null value)");
        assert_eq!(ResultValue::<i32>::failure("oops").to_string(), "Failure(oops)");
    }

    #[rstest]
    fn test_debug() {
        assert_eq!(format!("{:?}", ResultValue::success(3)), "Success(3)");
        assert_eq!(format!("{:?}", ResultValue::<i32>::absent()), "Failure(Absent)");
    }

    #[rstest]
    fn test_collect_stops_at_first_failure() {
        let calls = Cell::new(0);
        let items = [Some(1), None, Some(3)];
        let collected: ResultValue<Vec<i32>> = items
            .iter()
            .map(|item| {
                calls.set(calls.get() + 1);
                ResultValue::from_option(*item)
            })
            .collect();
        assert_eq!(collected.cause(), Some(&FailureCause::Absent));
        assert_eq!(calls.get(), 2);
    }
}
