//! Thread-safe deferred computation with memoization.
//!
//! This module provides the `Deferred<T>` type: a computation that is run at
//! most once, on first demand, and whose result is cached for every later
//! observation. `Deferred` is a shared handle, so clones observe (and
//! populate) the same cache.
//!
//! Unlike [`ResultValue`], `Deferred` does not catch panics. A panic raised
//! by the producer propagates to whoever forced it, and the instance is left
//! poisoned.
//!
//! # Examples
//!
//! ```rust
//! use fplite::control::Deferred;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let runs = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&runs);
//! let deferred = Deferred::new(move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     42
//! });
//!
//! // Nothing has run yet
//! assert_eq!(runs.load(Ordering::SeqCst), 0);
//!
//! assert_eq!(*deferred.force(), 42);
//! assert_eq!(*deferred.force(), 42);
//! assert_eq!(runs.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::result_value::ResultValue;

/// Error returned when a [`Deferred`] can no longer produce a value.
///
/// This error is returned by [`Deferred::try_force`] and
/// [`Deferred::into_inner`] after the producer panicked.
/// [`Deferred::force`] panics instead of returning this error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredPoisonedError;

impl fmt::Display for DeferredPoisonedError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Deferred: producer panicked, instance is poisoned")
    }
}

impl std::error::Error for DeferredPoisonedError {}

/// The observable evaluation state of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
    /// The producer has not completed yet.
    Unevaluated,
    /// The value has been computed and cached.
    Evaluated,
    /// The producer panicked; no value will ever be available.
    Poisoned,
}

type BoxedProducer<T> = Box<dyn FnOnce() -> T + Send>;

enum Producer<T> {
    Pending(BoxedProducer<T>),
    // Handed over to the thread that is running it, or already finished.
    Taken,
    Poisoned,
}

struct Shared<T> {
    value: OnceLock<T>,
    producer: Mutex<Producer<T>>,
}

/// A memoizing, thread-safe deferred computation.
///
/// The producer runs at most once over the lifetime of the shared instance,
/// even when several threads force it concurrently. Composition
/// ([`map`](Self::map), [`flat_map`](Self::flat_map), [`zip_with`](Self::zip_with))
/// never forces the receiver; the work happens when the composed value is
/// itself forced.
///
/// # Examples
///
/// ```rust
/// use fplite::control::Deferred;
///
/// let base = Deferred::new(|| 20);
/// let answer = base.map(|n| n + 22);
///
/// assert!(!base.is_evaluated());
/// assert_eq!(answer.invoke(), 42);
/// assert!(base.is_evaluated());
/// ```
pub struct Deferred<T> {
    shared: Arc<Shared<T>>,
}

static_assertions::assert_impl_all!(Deferred<i32>: Send, Sync, Clone);
static_assertions::assert_impl_all!(Deferred<String>: Send, Sync, Clone);
static_assertions::assert_not_impl_any!(Deferred<std::cell::Cell<i32>>: Send, Sync);

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + Sync + 'static> Deferred<T> {
    /// Creates a deferred computation from a producer.
    ///
    /// The producer is not called until the value is first forced.
    #[inline]
    pub fn new<F>(producer: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                value: OnceLock::new(),
                producer: Mutex::new(Producer::Pending(Box::new(producer))),
            }),
        }
    }

    /// Creates a deferred computation that is already evaluated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::Deferred;
    ///
    /// let deferred = Deferred::evaluated("ready");
    /// assert!(deferred.is_evaluated());
    /// ```
    #[inline]
    pub fn evaluated(value: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                value: OnceLock::from(value),
                producer: Mutex::new(Producer::Taken),
            }),
        }
    }

    /// Forces evaluation and returns a reference to the cached value.
    ///
    /// The first call runs the producer; every later call (on this handle or
    /// any clone of it) returns the cached value.
    ///
    /// # Panics
    ///
    /// - If the producer panics; the panic is propagated and the instance
    ///   becomes poisoned.
    /// - If the instance is already poisoned.
    pub fn force(&self) -> &T {
        match self.try_force() {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    /// Forces evaluation, reporting a poisoned instance as an error.
    ///
    /// A caller that waits on another thread's evaluation receives the
    /// error, not the panic, when that evaluation fails.
    ///
    /// # Errors
    ///
    /// Returns `Err(DeferredPoisonedError)` if a previous or concurrent
    /// evaluation panicked.
    ///
    /// # Panics
    ///
    /// If this call runs the producer and the producer panics.
    pub fn try_force(&self) -> Result<&T, DeferredPoisonedError> {
        if let Some(value) = self.shared.value.get() {
            return Ok(value);
        }
        // The poisoned case unwinds out of `get_or_init` with the error as
        // payload, leaving the cell empty.
        catch_unwind(AssertUnwindSafe(|| {
            self.shared.value.get_or_init(|| self.run_producer())
        }))
        .or_else(|payload| match payload.downcast::<DeferredPoisonedError>() {
            Ok(error) => Err(*error),
            Err(payload) => resume_unwind(payload),
        })
    }

    fn run_producer(&self) -> T {
        let producer = {
            let mut slot = self.shared.producer.lock();
            let taken = std::mem::replace(&mut *slot, Producer::Taken);
            match taken {
                Producer::Pending(producer) => producer,
                Producer::Taken | Producer::Poisoned => {
                    *slot = Producer::Poisoned;
                    drop(slot);
                    resume_unwind(Box::new(DeferredPoisonedError))
                }
            }
        };
        match catch_unwind(AssertUnwindSafe(producer)) {
            Ok(value) => value,
            Err(payload) => {
                *self.shared.producer.lock() = Producer::Poisoned;
                resume_unwind(payload)
            }
        }
    }

    /// Applies `function` to the value once it is forced.
    ///
    /// The receiver is not forced by this call.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::Deferred;
    ///
    /// let length = Deferred::new(|| "hello".to_string()).map(String::len);
    /// assert_eq!(*length.force(), 5);
    /// ```
    pub fn map<U, F>(&self, function: F) -> Deferred<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        let source = self.clone();
        Deferred::new(move || function(source.force()))
    }

    /// Chains a computation that itself produces a deferred value.
    ///
    /// When forced, the receiver is forced, `function` is applied, and the
    /// returned deferred value is forced as well.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::Deferred;
    ///
    /// let chained = Deferred::new(|| 21).flat_map(|n| {
    ///     let n = *n;
    ///     Deferred::new(move || n * 2)
    /// });
    /// assert_eq!(chained.invoke(), 42);
    /// ```
    pub fn flat_map<U, F>(&self, function: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(&T) -> Deferred<U> + Send + 'static,
    {
        let source = self.clone();
        Deferred::new(move || function(source.force()).take_value())
    }

    /// Combines two deferred values with a function once both are forced.
    pub fn zip_with<U, V, F>(&self, other: &Deferred<U>, function: F) -> Deferred<V>
    where
        U: Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: FnOnce(&T, &U) -> V + Send + 'static,
    {
        let first = self.clone();
        let second = other.clone();
        Deferred::new(move || function(first.force(), second.force()))
    }

    /// Pairs two deferred values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::Deferred;
    ///
    /// let pair = Deferred::new(|| 1).zip(&Deferred::new(|| "one"));
    /// assert_eq!(pair.invoke(), (1, "one"));
    /// ```
    pub fn zip<U>(&self, other: &Deferred<U>) -> Deferred<(T, U)>
    where
        T: Clone,
        U: Clone + Send + Sync + 'static,
    {
        self.zip_with(other, |first, second| (first.clone(), second.clone()))
    }

    /// Routes the value to one of two branches, both of which receive it.
    pub fn for_each<G, H>(&self, condition: bool, if_true: G, if_false: H)
    where
        G: FnOnce(&T),
        H: FnOnce(&T),
    {
        if condition {
            if_true(self.force());
        } else {
            if_false(self.force());
        }
    }

    /// Routes to `if_true` with the value, or to `if_false` without forcing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fplite::control::Deferred;
    ///
    /// let deferred = Deferred::new(|| 42);
    /// deferred.for_each_on_true(false, |n| println!("{n}"), || println!("skipped"));
    /// assert!(!deferred.is_evaluated());
    /// ```
    pub fn for_each_on_true<G, H>(&self, condition: bool, if_true: G, if_false: H)
    where
        G: FnOnce(&T),
        H: FnOnce(),
    {
        if condition {
            if_true(self.force());
        } else {
            if_false();
        }
    }

    /// Routes to `if_false` with the value, or to `if_true` without forcing.
    pub fn for_each_on_false<G, H>(&self, condition: bool, if_true: G, if_false: H)
    where
        G: FnOnce(),
        H: FnOnce(&T),
    {
        if condition {
            if_true();
        } else {
            if_false(self.force());
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Deferred<T> {
    /// Forces evaluation and returns a clone of the cached value.
    ///
    /// # Panics
    ///
    /// Under the same conditions as [`force`](Self::force).
    #[inline]
    pub fn invoke(&self) -> T {
        self.force().clone()
    }

    /// Consumes the handle and returns the value, forcing it if needed.
    ///
    /// The value is moved out when this is the last handle, and cloned
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns `Err(DeferredPoisonedError)` if a previous evaluation panicked.
    ///
    /// # Panics
    ///
    /// If this call runs the producer and the producer panics.
    pub fn into_inner(self) -> Result<T, DeferredPoisonedError> {
        match Arc::try_unwrap(self.shared) {
            Ok(shared) => match shared.value.into_inner() {
                Some(value) => Ok(value),
                None => match shared.producer.into_inner() {
                    Producer::Pending(producer) => Ok(producer()),
                    Producer::Taken | Producer::Poisoned => Err(DeferredPoisonedError),
                },
            },
            Err(shared) => Self { shared }.try_force().cloned(),
        }
    }

    fn take_value(self) -> T {
        self.into_inner().unwrap_or_else(|error| panic!("{error}"))
    }
}

impl<T> Deferred<T> {
    /// Returns the cached value without forcing evaluation.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.shared.value.get()
    }

    /// Returns whether the value has been computed.
    #[inline]
    pub fn is_evaluated(&self) -> bool {
        self.shared.value.get().is_some()
    }

    /// Returns whether a previous evaluation panicked.
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.state() == DeferredState::Poisoned
    }

    /// Returns the current evaluation state.
    pub fn state(&self) -> DeferredState {
        if self.is_evaluated() {
            return DeferredState::Evaluated;
        }
        match *self.shared.producer.lock() {
            Producer::Pending(_) | Producer::Taken => DeferredState::Unevaluated,
            Producer::Poisoned => DeferredState::Poisoned,
        }
    }
}

// =============================================================================
// Free Functions
// =============================================================================

/// Lifts a two-argument function into the deferred domain.
///
/// The result is curried: apply it to the first deferred argument, then to
/// the second. Neither argument is forced until the final deferred value is.
///
/// # Examples
///
/// ```rust
/// use fplite::control::{Deferred, lift2};
///
/// let add = lift2(|a: &i32, b: &i32| a + b);
/// let sum = add(&Deferred::new(|| 20))(&Deferred::new(|| 22));
/// assert_eq!(sum.invoke(), 42);
/// ```
pub fn lift2<A, B, C, F>(
    function: F,
) -> impl Fn(&Deferred<A>) -> Box<dyn Fn(&Deferred<B>) -> Deferred<C> + Send + Sync> + Send + Sync
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    C: Send + Sync + 'static,
    F: Fn(&A, &B) -> C + Send + Sync + 'static,
{
    let function = Arc::new(function);
    move |first: &Deferred<A>| {
        let function = Arc::clone(&function);
        let first = first.clone();
        Box::new(move |second: &Deferred<B>| {
            let function = Arc::clone(&function);
            first.zip_with(second, move |a, b| function(a, b))
        }) as Box<dyn Fn(&Deferred<B>) -> Deferred<C> + Send + Sync>
    }
}

/// Turns a sequence of deferred values into a deferred vector.
///
/// Forcing the result forces every element, in order.
///
/// # Examples
///
/// ```rust
/// use fplite::control::{Deferred, sequence};
///
/// let all = sequence((1..=3).map(|n| Deferred::new(move || n * 10)));
/// assert_eq!(all.invoke(), vec![10, 20, 30]);
/// ```
pub fn sequence<T, I>(deferreds: I) -> Deferred<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Deferred<T>>,
{
    let deferreds: Vec<Deferred<T>> = deferreds.into_iter().collect();
    Deferred::new(move || deferreds.into_iter().map(Deferred::take_value).collect())
}

/// Turns a sequence of possibly-absent deferred values into a deferred
/// [`ResultValue`].
///
/// Forcing the result forces the elements in order and stops at the first
/// absent one, yielding a single absent failure; later elements are left
/// unevaluated.
///
/// # Examples
///
/// ```rust
/// use fplite::control::{Deferred, FailureCause, sequence_result};
///
/// let complete = sequence_result(vec![Deferred::new(|| Some(1)), Deferred::new(|| Some(2))]);
/// assert_eq!(complete.invoke().get_or_else(vec![]), vec![1, 2]);
///
/// let partial = sequence_result(vec![Deferred::new(|| Some(1)), Deferred::new(|| None)]);
/// assert_eq!(partial.invoke().cause(), Some(&FailureCause::Absent));
/// ```
pub fn sequence_result<T, I>(deferreds: I) -> Deferred<ResultValue<Vec<T>>>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Deferred<Option<T>>>,
{
    let deferreds: Vec<Deferred<Option<T>>> = deferreds.into_iter().collect();
    Deferred::new(move || {
        deferreds
            .into_iter()
            .map(|deferred| ResultValue::from_option(deferred.take_value()))
            .collect()
    })
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<T: Default + Send + Sync + 'static> Default for Deferred<T> {
    /// Creates a deferred computation of the default value of `T`.
    fn default() -> Self {
        Self::new(T::default)
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => formatter.debug_tuple("Deferred").field(value).finish(),
            None if self.is_poisoned() => {
                formatter.debug_tuple("Deferred").field(&"<poisoned>").finish()
            }
            None => formatter.debug_tuple("Deferred").field(&"<unevaluated>").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>, value: i32) -> Deferred<i32> {
        let counter = Arc::clone(counter);
        Deferred::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            value
        })
    }

    #[rstest]
    fn test_deferred_starts_unevaluated() {
        let deferred = Deferred::new(|| 42);
        assert_eq!(deferred.state(), DeferredState::Unevaluated);
        assert!(deferred.get().is_none());
    }

    #[rstest]
    fn test_deferred_force_memoizes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let deferred = counting(&counter, 7);
        assert_eq!(*deferred.force(), 7);
        assert_eq!(*deferred.force(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(deferred.state(), DeferredState::Evaluated);
    }

    #[rstest]
    fn test_clones_share_cache() {
        let counter = Arc::new(AtomicUsize::new(0));
        let deferred = counting(&counter, 1);
        let clone = deferred.clone();
        let _ = clone.force();
        assert!(deferred.is_evaluated());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn test_evaluated_never_runs_producer() {
        let deferred = Deferred::evaluated(5);
        assert_eq!(deferred.get(), Some(&5));
        assert_eq!(deferred.into_inner(), Ok(5));
    }

    #[rstest]
    fn test_into_inner_unforced() {
        let counter = Arc::new(AtomicUsize::new(0));
        let deferred = counting(&counter, 3);
        assert_eq!(deferred.into_inner(), Ok(3));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn test_into_inner_shared_clones_value() {
        let deferred = Deferred::new(|| vec![1, 2]);
        let other = deferred.clone();
        assert_eq!(deferred.into_inner(), Ok(vec![1, 2]));
        assert!(other.is_evaluated());
    }

    #[rstest]
    fn test_poisoned_after_panic() {
        let deferred: Deferred<i32> = Deferred::new(|| panic!("producer failed"));
        let outcome = catch_unwind(AssertUnwindSafe(|| *deferred.force()));
        assert!(outcome.is_err());
        assert!(deferred.is_poisoned());
        assert_eq!(deferred.try_force(), Err(DeferredPoisonedError));
        assert_eq!(deferred.into_inner(), Err(DeferredPoisonedError));
    }

    #[rstest]
    fn test_force_on_poisoned_panics() {
        let deferred: Deferred<i32> = Deferred::new(|| panic!("producer failed"));
        let _ = catch_unwind(AssertUnwindSafe(|| *deferred.force()));
        let second = catch_unwind(AssertUnwindSafe(|| *deferred.force()));
        assert!(second.is_err());
        assert!(deferred.is_poisoned());
    }

    #[rstest]
    fn test_debug_output() {
        let deferred = Deferred::new(|| 42);
        assert_eq!(format!("{deferred:?}"), "Deferred(\"<unevaluated>\")");
        let _ = deferred.force();
        assert_eq!(format!("{deferred:?}"), "Deferred(42)");
    }

    #[rstest]
    fn test_default() {
        let deferred: Deferred<String> = Deferred::default();
        assert_eq!(deferred.invoke(), String::new());
    }

    #[rstest]
    #[case::taken_true(true, 1)]
    #[case::taken_false(false, 0)]
    fn test_for_each_on_true_forces_only_when_needed(
        #[case] condition: bool,
        #[case] expected_runs: usize,
    ) {
        let counter = Arc::new(AtomicUsize::new(0));
        let deferred = counting(&counter, 9);
        deferred.for_each_on_true(condition, |n| assert_eq!(*n, 9), || {});
        assert_eq!(counter.load(Ordering::SeqCst), expected_runs);
    }

    #[rstest]
    #[case::taken_true(true, 0)]
    #[case::taken_false(false, 1)]
    fn test_for_each_on_false_forces_only_when_needed(
        #[case] condition: bool,
        #[case] expected_runs: usize,
    ) {
        let counter = Arc::new(AtomicUsize::new(0));
        let deferred = counting(&counter, 9);
        deferred.for_each_on_false(condition, || {}, |n| assert_eq!(*n, 9));
        assert_eq!(counter.load(Ordering::SeqCst), expected_runs);
    }
}
