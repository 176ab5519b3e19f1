//! [`Notifier`]-related implementations.

use std::future::Future;

use common::operations::Notify;
use derive_more::{Display, Error as StdError, From};
use serde::Serialize;
use tracerr::Traced;
use tracing as log;

use crate::domain::{deal, user, Deal};

/// Notification delivery.
///
/// Same shape as a [`Handler`], but its deliveries run detached from the
/// operation that caused them, so they must be [`Send`].
///
/// [`Handler`]: common::Handler
pub trait Notifier<Args> {
    /// Type of successful delivery result.
    type Ok;

    /// Type of delivery error.
    type Err;

    /// Delivers the provided arguments.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>> + Send;
}

/// Event worth telling somebody about.
#[derive(Clone, Debug)]
pub enum Notification {
    /// New [`Deal`] was opened, so administrators should review it.
    DealCreated(Deal),

    /// [`Deal`] changed its [`deal::Status`], so both parties should know.
    DealStatusChanged {
        /// [`Deal`] after the change.
        deal: Deal,

        /// [`deal::Status`] before the change.
        from: deal::Status,
    },
}

impl Notification {
    /// Returns the [`Deal`] this [`Notification`] is about.
    #[must_use]
    pub fn deal(&self) -> &Deal {
        match self {
            Self::DealCreated(deal) | Self::DealStatusChanged { deal, .. } => {
                deal
            }
        }
    }

    /// Builds the outgoing [`Payload`] of this [`Notification`].
    fn payload(&self) -> Payload<'_> {
        let deal = self.deal();
        let (event, audience, recipients, previous_status) = match self {
            Self::DealCreated(_) => ("DEAL_CREATED", "admins", vec![], None),
            Self::DealStatusChanged { from, .. } => (
                "DEAL_STATUS_CHANGED",
                "participants",
                vec![deal.buyer.id, deal.seller.id],
                Some(*from),
            ),
        };
        Payload {
            event,
            audience,
            recipients,
            deal_id: AsRef::<str>::as_ref(&deal.code),
            title: AsRef::<str>::as_ref(&deal.snapshot.title),
            status: deal.status,
            previous_status,
        }
    }
}

/// JSON body delivered to a webhook.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Payload<'a> {
    /// Name of the event.
    event: &'static str,

    /// Group of recipients.
    audience: &'static str,

    /// Explicit recipients, if any.
    recipients: Vec<user::Id>,

    /// [`deal::Code`] of the [`Deal`].
    deal_id: &'a str,

    /// [`Deal`] item title.
    title: &'a str,

    /// Current [`deal::Status`].
    status: deal::Status,

    /// Previous [`deal::Status`], if changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_status: Option<deal::Status>,
}

/// [`Notifier`] posting [`Notification`]s to a webhook, or only logging them
/// when no webhook is configured.
#[derive(Clone, Debug, Default)]
pub struct Outbound {
    /// Webhook to post [`Notification`]s to, if any.
    webhook: Option<Webhook>,
}

/// Webhook endpoint of an [`Outbound`] [`Notifier`].
#[derive(Clone, Debug)]
struct Webhook {
    /// HTTP client to post with.
    client: reqwest::Client,

    /// URL to post to.
    url: String,
}

impl Outbound {
    /// Creates a new [`Outbound`] [`Notifier`] only logging [`Notification`]s.
    #[must_use]
    pub fn log_only() -> Self {
        Self::default()
    }

    /// Creates a new [`Outbound`] [`Notifier`] posting [`Notification`]s to
    /// the provided `url`.
    #[must_use]
    pub fn webhook(url: impl Into<String>) -> Self {
        Self {
            webhook: Some(Webhook {
                client: reqwest::Client::new(),
                url: url.into(),
            }),
        }
    }
}

impl Notifier<Notify<Notification>> for Outbound {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Notify(notification): Notify<Notification>,
    ) -> Result<Self::Ok, Self::Err> {
        let payload = notification.payload();
        log::info!(
            event = payload.event,
            deal_id = payload.deal_id,
            status = %payload.status,
            "notifying {}",
            payload.audience,
        );

        let Some(webhook) = &self.webhook else {
            return Ok(());
        };
        _ = webhook
            .client
            .post(&webhook.url)
            .json(&payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(tracerr::from_and_wrap!(=> Error))?;
        Ok(())
    }
}

/// [`Notifier`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// Webhook request failed.
    #[display("Webhook request failed: {_0}")]
    Webhook(reqwest::Error),
}
