//! [`Error`] definitions.

use std::{borrow::Cow, io};

use derive_more::{Display, Error as StdError, From};
use service::domain::deal;

/// Error of a client-side operation.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// Operation requires a signed-in user.
    #[display("authentication required")]
    #[from(ignore)]
    AuthenticationRequired,

    /// Server refused the request.
    #[display("rejected with `{status}` [{code}]: {message}")]
    #[from(ignore)]
    Rejected {
        /// HTTP status code of the response.
        status: u16,

        /// Machine-readable error code.
        code: String,

        /// Human-readable error message.
        message: String,
    },

    /// Request could not be delivered.
    #[display("transport failed: {_0}")]
    Transport(reqwest::Error),

    /// Server responded with no usable body.
    #[display("no response received")]
    #[from(ignore)]
    NoResponse,

    /// Response body could not be decoded.
    #[display("failed to decode response: {_0}")]
    Decode(serde_json::Error),

    /// [`Deal`] is not present in the local cache.
    ///
    /// [`Deal`]: crate::Deal
    #[display("unknown `Deal(id: {_0})`")]
    #[from(ignore)]
    UnknownDeal(#[error(not(source))] deal::Id),

    /// Local storage could not be read or written.
    #[display("local storage failed: {_0}")]
    Persistence(io::Error),
}

impl Error {
    /// Returns a message suitable for showing to the user.
    #[must_use]
    pub fn message(&self) -> Cow<'_, str> {
        match self {
            Self::AuthenticationRequired => {
                "Please sign in to continue.".into()
            }
            Self::Rejected { message, .. } => message.as_str().into(),
            Self::Transport(_) | Self::NoResponse => {
                "Could not reach the server. Please try again.".into()
            }
            Self::Decode(_) => {
                "Received an unexpected response from the server.".into()
            }
            Self::UnknownDeal(_) => "This deal is no longer available.".into(),
            Self::Persistence(_) => "Could not access local storage.".into(),
        }
    }

    /// Indicates whether the server rejected the request because of a
    /// conflicting concurrent change.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Rejected { status: 409, .. })
    }
}

#[cfg(test)]
mod spec {
    use super::Error;

    #[test]
    fn shows_server_message() {
        let err = Error::Rejected {
            status: 409,
            code: "CONFLICT".into(),
            message: "Deal already exists".into(),
        };

        assert_eq!(err.message(), "Deal already exists");
        assert!(err.is_conflict());
    }

    #[test]
    fn hides_internals() {
        assert_eq!(
            Error::NoResponse.message(),
            "Could not reach the server. Please try again.",
        );
        assert!(!Error::AuthenticationRequired.is_conflict());
        assert!(!Error::Rejected {
            status: 400,
            code: "INVALID_INPUT".into(),
            message: String::new(),
        }
        .is_conflict());
    }
}
