//! [`Query`] definition.

pub mod deal;
pub mod deals;

/// [`Query`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Query;
