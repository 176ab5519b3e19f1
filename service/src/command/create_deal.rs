//! [`Command`] for opening a new [`Deal`].

use std::{collections::HashMap, fmt};

use common::operations::{
    By, Commit, Insert, Notify, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{deal, item, user, Activity, Deal, Item, User, Viewer},
    infra::{database, notifier::Notification, Database, Notifier},
    Service,
};

use super::Command;

/// [`Command`] for opening a new [`Deal`].
#[derive(Clone, Debug)]
pub struct CreateDeal {
    /// ID of the buying [`User`].
    pub buyer_id: user::Id,

    /// ID of the selling [`User`].
    pub seller_id: user::Id,

    /// [`Item`] to open the [`Deal`] on.
    pub item: item::Ref,

    /// [`deal::Message`] of the buyer.
    pub message: deal::Message,

    /// [`deal::Tag`] of the [`Deal`], if any.
    pub tag: Option<deal::Tag>,

    /// [`Viewer`] opening the [`Deal`].
    pub initiator: Viewer,
}

impl<Db, Ntf> Command<CreateDeal> for Service<Db, Ntf>
where
    Db: Database<
            Select<By<Option<Item>, item::Ref>>,
            Ok = Option<Item>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<HashMap<user::Id, User>, [user::Id; 2]>>,
            Ok = HashMap<user::Id, User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Deal>, deal::Key>>,
            Ok = Option<Deal>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<Deal>, Err = Traced<database::Error>>
        + Database<Insert<Activity>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Ntf: Notifier<Notify<Notification>, Err: fmt::Display>
        + Clone
        + Send
        + Sync
        + 'static,
{
    type Ok = Deal;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateDeal) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateDeal {
            buyer_id,
            seller_id,
            item,
            message,
            tag,
            initiator,
        } = cmd;

        if !initiator.is_admin() && initiator.id != buyer_id {
            return Err(tracerr::new!(E::NotBuyer(initiator.id)));
        }
        if buyer_id == seller_id {
            return Err(tracerr::new!(E::SelfDeal(buyer_id)));
        }

        let item = self
            .database()
            .execute(Select(By::<Option<Item>, _>::new(item)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ItemNotExists(item))
            .map_err(tracerr::wrap!())?;

        let mut users = self
            .database()
            .execute(Select(By::new([buyer_id, seller_id])))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let buyer = users
            .remove(&buyer_id)
            .ok_or(E::UserNotExists(buyer_id))
            .map_err(tracerr::wrap!())?;
        let seller = users
            .remove(&seller_id)
            .ok_or(E::UserNotExists(seller_id))
            .map_err(tracerr::wrap!())?;
        if item.owner_id != seller_id {
            return Err(tracerr::new!(E::NotOwner {
                seller_id,
                item: item.to_ref(),
            }));
        }

        let key = deal::Key {
            buyer_id,
            seller_id,
            item: item.to_ref(),
        };
        let existing = self
            .database()
            .execute(Select(By::<Option<Deal>, _>::new(key)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(deal) = existing {
            return Err(tracerr::new!(E::DealExists(deal.id)));
        }

        let deal = Deal::open(
            deal::Party::from(&buyer),
            deal::Party::from(&seller),
            item.to_ref(),
            item.snapshot(),
            message,
            tag.unwrap_or_default(),
        );

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Concurrent creations of the same `deal::Key` are only caught here.
        let inserted = tx.execute(Insert(deal.clone())).await;
        if let Err(e) = &inserted {
            if e.as_ref()
                .is_unique_violation(Some(database::DEALS_UNIQUE_KEY))
            {
                return Err(tracerr::new!(E::DuplicateKey));
            }
        }
        inserted
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Insert(Activity::deal_created(initiator.id, &deal)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        drop(tx);

        self.notify(Notification::DealCreated(deal.clone()));

        Ok(deal)
    }
}

/// Error of [`CreateDeal`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Deal`] on the same [`deal::Key`] already exists.
    #[display("`Deal(id: {_0})` on the same key already exists")]
    DealExists(#[error(not(source))] deal::Id),

    /// [`Deal`] on the same [`deal::Key`] was opened concurrently.
    #[display("`Deal` on the same key already exists")]
    DuplicateKey,

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Item`] does not exist.
    #[display("`Item(id: {}, kind: {})` does not exist", _0.id, _0.kind)]
    ItemNotExists(#[error(not(source))] item::Ref),

    /// Non-administrator tries to open a [`Deal`] on behalf of somebody else.
    #[display("`User(id: {_0})` may only open `Deal`s as a buyer")]
    NotBuyer(#[error(not(source))] user::Id),

    /// Seller of a [`Deal`] doesn't own its [`Item`].
    #[display(
        "`User(id: {seller_id})` doesn't own `Item(id: {}, kind: {})`",
        item.id,
        item.kind,
    )]
    NotOwner {
        /// ID of the seller [`User`].
        seller_id: user::Id,

        /// [`Item`] the seller doesn't own.
        item: item::Ref,
    },

    /// [`User`] tries to open a [`Deal`] with themselves.
    #[display("`User(id: {_0})` cannot open a `Deal` with themselves")]
    SelfDeal(#[error(not(source))] user::Id),

    /// [`User`] does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use std::{str::FromStr as _, time::Duration};

    use common::operations::{By, Select};
    use futures::future;
    use tokio::time;

    use crate::{
        domain::{activity, deal, item, user, Deal},
        infra::{
            notifier::{
                spec::{Failing, Recorder, Stalled},
                Notification,
            },
            Database as _,
        },
        spec::{viewer, Fixture},
        Command as _,
    };

    use super::{CreateDeal, ExecutionError};

    fn command<N>(f: &Fixture<N>) -> CreateDeal {
        CreateDeal {
            buyer_id: f.buyer.id,
            seller_id: f.seller.id,
            item: f.item.to_ref(),
            message: deal::Message::new("Is it still available?").unwrap(),
            tag: None,
            initiator: viewer(&f.buyer),
        }
    }

    #[tokio::test]
    async fn opens_pending_deal() {
        let f = Fixture::new(Recorder::default()).await;

        let deal = f.service.execute(command(&f)).await.unwrap();

        assert_eq!(deal.status, deal::Status::Pending);
        assert_eq!(deal.buyer.id, f.buyer.id);
        assert_eq!(deal.seller.id, f.seller.id);
        assert_eq!(deal.item, f.item.to_ref());
        assert_eq!(deal.snapshot, f.item.snapshot());
        assert_eq!(deal.tag, deal::Tag::from_str("inquiry").unwrap());
        assert_eq!(deal.revision, deal::Revision::INITIAL);

        let stored = f
            .service
            .database()
            .execute(Select(By::<Option<Deal>, _>::new(deal.id)))
            .await
            .unwrap();
        assert_eq!(stored.map(|d| d.code), Some(deal.code.clone()));

        let activities = f.service.database().activities().await;
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].action, activity::Action::DealCreated);
        assert_eq!(activities[0].actor_id, f.buyer.id);

        let notified = f.service.notifier().recorded().await;
        assert!(matches!(
            notified.as_slice(),
            [Notification::DealCreated(d)] if d.id == deal.id,
        ));
    }

    #[tokio::test]
    async fn rejects_duplicate() {
        let f = Fixture::new(Recorder::default()).await;
        let first = f.service.execute(command(&f)).await.unwrap();

        let err = f.service.execute(command(&f)).await.unwrap_err();

        assert!(
            matches!(
                err.as_ref(),
                ExecutionError::DealExists(id)
                    if *id == first.id,
            ),
            "{err}",
        );
        assert_eq!(f.service.database().activities().await.len(), 1);
    }

    #[tokio::test]
    async fn rejects_concurrent_duplicates() {
        let f = Fixture::new(Recorder::default()).await;

        let results = future::join_all(
            (0..4).map(|_| f.service.execute(command(&f))),
        )
        .await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                matches!(
                    err.as_ref(),
                    ExecutionError::DealExists(_)
                        | ExecutionError::DuplicateKey,
                ),
                "{err}",
            );
        }
    }

    #[tokio::test]
    async fn rejects_unknown_item() {
        let f = Fixture::new(Recorder::default()).await;
        let missing = item::Ref {
            id: item::Id::new(),
            kind: item::Kind::Car,
        };
        // Same ID under another kind is a different item.
        let other_kind = item::Ref {
            kind: item::Kind::Land,
            ..f.item.to_ref()
        };

        for item in [missing, other_kind] {
            let err = f
                .service
                .execute(CreateDeal {
                    item,
                    ..command(&f)
                })
                .await
                .unwrap_err();

            assert!(
                matches!(
                    err.as_ref(),
                    ExecutionError::ItemNotExists(r)
                        if *r == item,
                ),
                "{err}",
            );
        }
        assert!(f.service.database().activities().await.is_empty());
    }

    #[tokio::test]
    async fn rejects_unknown_user() {
        let f = Fixture::new(Recorder::default()).await;
        let ghost = user::Id::new();

        let err = f
            .service
            .execute(CreateDeal {
                seller_id: ghost,
                ..command(&f)
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
    async fn seller_must_own_item() {
        let f = Fixture::new(Recorder::default()).await;

        let err = f
            .service
            .execute(CreateDeal {
                seller_id: f.stranger.id,
                ..command(&f)
            })
            .await
            .unwrap_err();

        assert!(
            matches!(
                err.as_ref(),
                ExecutionError::NotOwner { seller_id, item }
                    if *seller_id == f.stranger.id && *item == f.item.to_ref(),
            ),
            "{err}",
        );
        assert!(f.service.database().activities().await.is_empty());
    }

    #[tokio::test]
    async fn only_buyer_or_admin_opens() {
        let f = Fixture::new(Recorder::default()).await;

        let err = f
            .service
            .execute(CreateDeal {
                initiator: viewer(&f.stranger),
                ..command(&f)
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err.as_ref(), ExecutionError::NotBuyer(_)),
            "{err}",
        );

        let deal = f
            .service
            .execute(CreateDeal {
                initiator: viewer(&f.admin),
                ..command(&f)
            })
            .await
            .unwrap();
        assert_eq!(deal.buyer.id, f.buyer.id);
    }

    #[tokio::test]
    async fn survives_failing_notifier() {
        let f = Fixture::new(Failing).await;

        let deal = f.service.execute(command(&f)).await.unwrap();

        assert_eq!(deal.status, deal::Status::Pending);
        assert_eq!(f.service.database().activities().await.len(), 1);
    }

    #[tokio::test]
    async fn does_not_wait_for_stalled_notifier() {
        let f = Fixture::new(Stalled).await;

        let deal = time::timeout(
            Duration::from_millis(100),
            f.service.execute(command(&f)),
        )
        .await
        .expect("returns before notification timeout")
        .unwrap();

        assert_eq!(deal.status, deal::Status::Pending);
    }

    #[tokio::test]
    async fn snapshot_survives_item_change() {
        let f = Fixture::new(Recorder::default()).await;
        let deal = f.service.execute(command(&f)).await.unwrap();

        let mut changed = f.item.clone();
        changed.title = item::Title::new("Renamed listing").unwrap();
        f.service
            .database()
            .execute(common::operations::Insert(changed))
            .await
            .unwrap();

        let stored = f
            .service
            .database()
            .execute(Select(By::<Option<Deal>, _>::new(deal.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.snapshot.title, f.item.title);
    }
}
