//! HTTP API definitions.

pub mod deal;

use axum::{routing::get, Router};
use serde::Serialize;

/// Successful response envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Always `success`.
    pub status: &'static str,

    /// Payload of the response, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Human-readable message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Wraps the provided `data` into a successful [`Envelope`].
    #[must_use]
    pub fn data(data: T) -> Self {
        Self {
            status: "success",
            data: Some(data),
            message: None,
        }
    }
}

impl Envelope<()> {
    /// Creates a successful [`Envelope`] carrying only a `message`.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Builds the [`Router`] serving the HTTP API.
///
/// Expects the [`Service`] to be provided as an [`Extension`].
///
/// [`Extension`]: axum::Extension
/// [`Service`]: crate::Service
pub fn router() -> Router {
    Router::new()
        .route("/deals", get(deal::list).post(deal::create))
        .route("/deals/stats", get(deal::stats))
        .route(
            "/deals/:id",
            get(deal::get).put(deal::update_status).delete(deal::delete),
        )
}
