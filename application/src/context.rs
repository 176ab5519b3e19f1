//! [`Context`]-related definitions.

use axum::{async_trait, extract::FromRequestParts, RequestPartsExt as _};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeaderRejection,
    TypedHeader,
};
use service::{
    command::{self, Command as _},
    domain::{user::session, Viewer},
};

use crate::{define_error, AsError, Error, Service};

/// Request context of an authenticated caller.
#[derive(Debug)]
pub struct Context {
    /// [`Service`] instance.
    service: Service,

    /// [`Viewer`] the request is made by.
    viewer: Viewer,
}

impl Context {
    /// Returns [`Service`] instance of this [`Context`].
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Returns the authenticated [`Viewer`] of this [`Context`].
    #[must_use]
    pub fn viewer(&self) -> Viewer {
        self.viewer
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service = parts
            .extensions
            .get::<Service>()
            .cloned()
            .ok_or_else(|| Error::internal(&"missing `Service` extension"))?;

        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|e: TypedHeaderRejection| {
                if e.is_missing() {
                    AuthError::AuthorizationRequired.into()
                } else {
                    e.into_error()
                }
            })?;

        #[expect(unsafe_code, reason = "specified in correct header")]
        let token =
            unsafe { session::Token::new_unchecked(bearer.token().to_owned()) };
        let viewer = service
            .execute(command::AuthorizeUserSession { token })
            .await
            .map_err(AsError::into_error)?;

        Ok(Self { service, viewer })
    }
}

impl AsError for command::authorize_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::JsonWebTokenDecodeError(_) | Self::UserNotExists(_) => {
                Some(AuthError::InvalidToken.into())
            }
        }
    }
}

define_error! {
    enum AuthError {
        #[code = "UNAUTHENTICATED"]
        #[status = UNAUTHORIZED]
        #[message = "Authorization required"]
        AuthorizationRequired,

        #[code = "UNAUTHENTICATED"]
        #[status = UNAUTHORIZED]
        #[message = "Invalid or expired authorization token"]
        InvalidToken,
    }
}

#[cfg(test)]
mod spec {
    use service::{
        command::authorize_user_session::ExecutionError, domain::user,
    };

    use crate::AsError as _;

    #[test]
    fn unknown_user_is_unauthenticated() {
        let err = ExecutionError::UserNotExists(user::Id::new()).as_error();

        assert_eq!(err.status_code, http::StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, "UNAUTHENTICATED");
    }
}
