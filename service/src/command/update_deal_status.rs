//! [`Command`] for moving a [`Deal`] into another [`deal::Status`].

use std::fmt;

use common::operations::{
    By, Commit, Insert, Notify, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{deal, user, Activity, Deal, Viewer},
    infra::{database, notifier::Notification, Database, Notifier},
    Service,
};

use super::Command;

/// [`Command`] for moving a [`Deal`] into another [`deal::Status`].
#[derive(Clone, Debug)]
pub struct UpdateDealStatus {
    /// ID of the [`Deal`] to update.
    pub deal_id: deal::Id,

    /// [`deal::Status`] to move the [`Deal`] into.
    pub status: deal::Status,

    /// [`deal::CancellationReason`], required for [`deal::Status::Cancelled`].
    pub cancellation_reason: Option<deal::CancellationReason>,

    /// [`deal::Revision`] the caller has seen, if it cares about lost
    /// updates.
    pub expected_revision: Option<deal::Revision>,

    /// [`Viewer`] updating the [`Deal`].
    pub initiator: Viewer,
}

impl<Db, Ntf> Command<UpdateDealStatus> for Service<Db, Ntf>
where
    Db: Database<
            Select<By<Option<Deal>, deal::Id>>,
            Ok = Option<Deal>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Update<Deal>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Insert<Activity>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<Notify<Notification>, Err: fmt::Display>
        + Clone
        + Send
        + Sync
        + 'static,
{
    type Ok = Deal;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateDealStatus,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateDealStatus {
            deal_id,
            status,
            cancellation_reason,
            expected_revision,
            initiator,
        } = cmd;

        let mut deal = self
            .database()
            .execute(Select(By::<Option<Deal>, _>::new(deal_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|d| initiator.can_see(d))
            .ok_or(E::DealNotExists(deal_id))
            .map_err(tracerr::wrap!())?;

        let allowed = initiator.is_admin()
            || initiator.is_seller_of(&deal)
            || (initiator.is_buyer_of(&deal)
                && status == deal::Status::Cancelled);
        if !allowed {
            return Err(tracerr::new!(E::Forbidden {
                user: initiator.id,
                status,
            }));
        }

        if let Some(expected) = expected_revision {
            if expected != deal.revision {
                return Err(tracerr::new!(E::RevisionMismatch(deal_id)));
            }
        }

        let from = deal.status;
        deal.transition(status, cancellation_reason)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let updated = tx
            .execute(Update(deal.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !updated {
            // Either removed or updated by somebody else in the meantime.
            return Err(tracerr::new!(E::RevisionMismatch(deal_id)));
        }
        tx.execute(Insert(Activity::deal_status_changed(
            initiator.id,
            &deal,
            from,
        )))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        drop(tx);

        self.notify(Notification::DealStatusChanged {
            deal: deal.clone(),
            from,
        });

        Ok(deal)
    }
}

/// Error of [`UpdateDealStatus`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Deal`] does not exist or is not visible to the initiator.
    #[display("`Deal(id: {_0})` does not exist")]
    DealNotExists(#[error(not(source))] deal::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Initiator is not allowed to set the requested [`deal::Status`].
    #[display("`User(id: {user})` is not allowed to set `{status}` status")]
    Forbidden {
        /// ID of the initiator.
        user: user::Id,

        /// Requested [`deal::Status`].
        status: deal::Status,
    },

    /// [`Deal`] was changed since the initiator has seen it.
    #[display("`Deal(id: {_0})` was changed concurrently")]
    RevisionMismatch(#[error(not(source))] deal::Id),

    /// Requested [`deal::Status`] cannot be reached.
    #[display("Invalid transition: {_0}")]
    #[from]
    Transition(deal::TransitionError),
}
