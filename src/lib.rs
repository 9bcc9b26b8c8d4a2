//! # fplite
//!
//! A small functional programming toolkit for Rust.
//!
//! ## Overview
//!
//! Two independent building blocks are provided:
//!
//! - **`ResultValue`**: A success-or-failure value whose combinators never let
//!   a panic from caller-supplied code escape; failures are plain data.
//! - **`Deferred`**: A memoizing thunk that runs its producer at most once and
//!   composes without forcing evaluation early.
//!
//! ## Feature Flags
//!
//! - `control`: `ResultValue`, `Deferred` and their free functions (default)
//! - `serde`: Serialization support for `ResultValue`
//! - `full`: Enable all features
//!
//! ## Example
//!
//! ```rust
//! use fplite::prelude::*;
//!
//! let parsed = ResultValue::from_option("42".parse::<i32>().ok());
//! assert_eq!(parsed.map(|n| n * 2).get_or_else(0), 84);
//!
//! let deferred = Deferred::new(|| 21).map(|n| n * 2);
//! assert_eq!(*deferred.force(), 42);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and functions.
///
/// # Usage
///
/// ```rust
/// use fplite::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "control")]
    pub use crate::control::*;
}

#[cfg(feature = "control")]
pub mod control;
