//! [`Command`] for authorizing a [`User`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, session, Session},
        User, Viewer,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for authorizing a [`User`] by a bearer [`session::Token`].
#[derive(Clone, Debug, From)]
pub struct AuthorizeUserSession {
    /// [`Session`] token to authorize.
    pub token: session::Token,
}

impl<Db, Ntf> Command<AuthorizeUserSession> for Service<Db, Ntf>
where
    Db: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Viewer;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeUserSession { token } = cmd;

        let session = jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?
        .claims;

        // Role is never trusted from the token, as it may change any time.
        let user = self
            .database()
            .execute(Select(By::new(session.user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::UserNotExists(session.user_id))
            .map_err(tracerr::wrap!())?;

        Ok(Viewer {
            id: user.id,
            role: user.role,
        })
    }
}

/// Error of [`AuthorizeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),

    /// [`User`] the [`Session`] belongs to does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::DateTime;
    use jsonwebtoken::{EncodingKey, Header};

    use crate::{
        domain::{
            user::{self, session, Session},
            Viewer,
        },
        infra::notifier::spec::Recorder,
        spec::{Fixture, JWT_SECRET},
        Command as _,
    };

    use super::{AuthorizeUserSession, ExecutionError};

    fn token(user_id: user::Id, ttl: Duration) -> session::Token {
        let session = Session {
            user_id,
            expires_at: (DateTime::now() + ttl).coerce(),
        };
        let raw = jsonwebtoken::encode(
            &Header::default(),
            &session,
            &EncodingKey::from_secret(JWT_SECRET),
        )
        .unwrap();
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn resolves_viewer_with_stored_role() {
        let f = Fixture::new(Recorder::default()).await;

        let viewer = f
            .service
            .execute(AuthorizeUserSession {
                token: token(f.admin.id, Duration::from_secs(60)),
            })
            .await
            .unwrap();

        assert_eq!(
            viewer,
            Viewer {
                id: f.admin.id,
                role: user::Role::Admin,
            },
        );
    }

    #[tokio::test]
    async fn rejects_unknown_user() {
        let f = Fixture::new(Recorder::default()).await;
        let ghost = user::Id::new();

        let err = f
            .service
            .execute(AuthorizeUserSession {
                token: token(ghost, Duration::from_secs(60)),
            })
            .await
            .unwrap_err();

        assert!(
            matches!(
                err.as_ref(),
                ExecutionError::UserNotExists(id)
                    if *id == ghost,
            ),
            "{err}",
        );
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let f = Fixture::new(Recorder::default()).await;

        let err = f
            .service
            .execute(AuthorizeUserSession {
                token: "not.a.token".parse().unwrap(),
            })
            .await
            .unwrap_err();

        assert!(
            matches!(err.as_ref(), ExecutionError::JsonWebTokenDecodeError(_)),
            "{err}",
        );
    }
}
