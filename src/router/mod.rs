//! # Router Module
//!
//! Matches an incoming `(method, path)` pair against the operations derived
//! from the API document and extracts path parameters.
//!
//! ## Matching
//!
//! Paths are compared segment by segment. A literal segment must match
//! exactly, `{name}` matches any single non-empty segment and captures it
//! (percent-decoded), and `prefix{name}suffix` captures what lies between
//! the literal parts. Methods are compared case-sensitively.
//!
//! The table is ordered by specificity at startup and overlapping routes are
//! a [`ConfigurationError`](crate::ConfigurationError), so the result never
//! depends on declaration order.
//!
//! ## Example
//!
//! ```rust,ignore
//! let router = Router::new(api.operations.into_iter().map(Arc::new).collect())?;
//! if let Some(m) = router.route("GET", "/user/3") {
//!     assert_eq!(m.get_path_param("id"), Some("3"));
//! }
//! ```

mod core;
#[cfg(test)]
mod tests;

pub use self::core::{ParamVec, Route, RouteMatch, Router, Segment, MAX_INLINE_PARAMS};
