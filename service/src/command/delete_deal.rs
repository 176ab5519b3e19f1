//! [`Command`] for removing a [`Deal`].

use common::operations::{
    By, Commit, Delete, Insert, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{deal, user, Activity, Deal, Viewer},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for removing a [`Deal`].
///
/// Only closed [`Deal`]s may be removed, and only by administrators.
#[derive(Clone, Copy, Debug)]
pub struct DeleteDeal {
    /// ID of the [`Deal`] to remove.
    pub deal_id: deal::Id,

    /// [`Viewer`] removing the [`Deal`].
    pub initiator: Viewer,
}

impl<Db, Ntf> Command<DeleteDeal> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Deal>, deal::Id>>,
            Ok = Option<Deal>,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Deal, deal::Id>>,
            Err = Traced<database::Error>,
        > + Database<Insert<Activity>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Deal;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: DeleteDeal) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let DeleteDeal { deal_id, initiator } = cmd;

        if !initiator.is_admin() {
            return Err(tracerr::new!(E::NotAdmin(initiator.id)));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let deal = tx
            .execute(Select(By::<Option<Deal>, _>::new(deal_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::DealNotExists(deal_id))
            .map_err(tracerr::wrap!())?;
        if deal.is_active() {
            return Err(tracerr::new!(E::DealActive {
                id: deal_id,
                status: deal.status,
            }));
        }

        tx.execute(Delete(By::<Deal, _>::new(deal_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Insert(Activity::deal_deleted(initiator.id, &deal)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(deal)
    }
}

/// Error of [`DeleteDeal`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Deal`] is still being negotiated.
    #[display("`Deal(id: {id})` is still `{status}`")]
    DealActive {
        /// ID of the [`Deal`].
        id: deal::Id,

        /// Current [`deal::Status`] of the [`Deal`].
        status: deal::Status,
    },

    /// [`Deal`] does not exist.
    #[display("`Deal(id: {_0})` does not exist")]
    DealNotExists(#[error(not(source))] deal::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Initiator is not an administrator.
    #[display("`User(id: {_0})` is not an administrator")]
    NotAdmin(#[error(not(source))] user::Id),
}
