//! Service contains the business logic of the deal lifecycle.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;

use std::{fmt, time::Duration};

use common::operations::Notify;
use derive_more::Debug;
use tracing::{self as log, Instrument as _};

use crate::infra::{notifier::Notification, Notifier};
#[cfg(doc)]
use crate::infra::Database;

pub use self::{command::Command, query::Query};

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// [JWT] decoding key.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_decoding_key: jsonwebtoken::DecodingKey,

    /// Maximum time a [`Notification`] delivery may take before being given
    /// up.
    pub notification_timeout: Duration,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Ntf> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Notifier`] of this [`Service`].
    notifier: Ntf,
}

impl<Db, Ntf> Service<Db, Ntf> {
    /// Creates a new [`Service`] with the provided parameters.
    #[must_use]
    pub fn new(config: Config, database: Db, notifier: Ntf) -> Self {
        Self {
            config,
            database,
            notifier,
        }
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Notifier`] of this [`Service`].
    #[must_use]
    pub fn notifier(&self) -> &Ntf {
        &self.notifier
    }

    /// Delivers the provided [`Notification`] in background, without ever
    /// failing or blocking the caller.
    ///
    /// Errors and timeouts are logged and swallowed.
    fn notify(&self, notification: Notification)
    where
        Ntf: Notifier<Notify<Notification>, Err: fmt::Display>
            + Clone
            + Send
            + Sync
            + 'static,
    {
        let notifier = self.notifier.clone();
        let timeout = self.config.notification_timeout;
        let deal_id = notification.deal().code.clone();

        let delivery = async move {
            match tokio::time::timeout(
                timeout,
                notifier.execute(Notify(notification)),
            )
            .await
            {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    log::warn!(
                        %deal_id,
                        "failed to deliver notification: {e}",
                    );
                }
                Err(_) => {
                    log::warn!(
                        %deal_id,
                        "notification delivery timed out after {timeout:?}",
                    );
                }
            }
        };
        _ = tokio::spawn(delivery.in_current_span());
    }
}
