//! Control structures for functional programming.
//!
//! This module provides:
//!
//! - [`ResultValue`]: A success value or a captured failure
//! - [`FailureCause`]: What went wrong inside a failed [`ResultValue`]
//! - [`Deferred`]: Thread-safe lazy evaluation with memoization
//! - [`lift2`], [`sequence`], [`sequence_result`]: Combinators over [`Deferred`]
//!
//! # Examples
//!
//! ## Capturing Failures
//!
//! ```rust
//! use fplite::control::ResultValue;
//!
//! let result = ResultValue::success(10).map(|n: i32| {
//!     assert!(n < 5, "too large");
//!     n
//! });
//! assert!(result.is_failure());
//! assert_eq!(result.get_or_else(0), 0);
//! ```
//!
//! ## Deferred Evaluation
//!
//! ```rust
//! use fplite::control::{Deferred, sequence};
//!
//! let values = vec![Deferred::new(|| 1), Deferred::new(|| 2), Deferred::new(|| 3)];
//! let collected = sequence(values);
//!
//! // Nothing has been evaluated yet
//! assert!(!collected.is_evaluated());
//! assert_eq!(collected.invoke(), vec![1, 2, 3]);
//! ```

mod deferred;
mod error;
mod result_value;

pub use deferred::{
    Deferred, DeferredPoisonedError, DeferredState, lift2, sequence, sequence_result,
};
pub use error::{FailureCause, PanicError};
pub use result_value::ResultValue;
