//! [`Query`] collection related to the multiple [`Deal`]s.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{user, Deal, Viewer},
    infra::{database, Database},
    read::{self, deal::list},
    Service,
};

use super::Query;

/// Queries a list of [`Deal`]s visible to a [`Viewer`].
#[derive(Clone, Debug)]
pub struct List {
    /// [`Viewer`] asking for the list.
    pub viewer: Viewer,

    /// [`list::Filter`] to apply.
    pub filter: list::Filter,

    /// [`list::Sort`] order of the list.
    pub sort: list::Sort,
}

impl<Db, Ntf> Query<List> for Service<Db, Ntf>
where
    Db: Database<
        Select<By<Vec<Deal>, list::Selector>>,
        Ok = Vec<Deal>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Vec<Deal>;
    type Err = Traced<database::Error>;

    async fn execute(&self, query: List) -> Result<Self::Ok, Self::Err> {
        let List {
            viewer,
            filter,
            sort,
        } = query;

        self.database()
            .execute(Select(By::new(list::Selector {
                scope: list::Scope::of(&viewer),
                filter,
                sort,
            })))
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Queries [`read::deal::Stats`] over all the [`Deal`]s.
///
/// Administrators only.
#[derive(Clone, Copy, Debug)]
pub struct Stats {
    /// [`Viewer`] asking for the [`read::deal::Stats`].
    pub viewer: Viewer,
}

impl<Db, Ntf> Query<Stats> for Service<Db, Ntf>
where
    Db: Database<
        Select<By<read::deal::Stats, ()>>,
        Ok = read::deal::Stats,
        Err = Traced<database::Error>,
    >,
{
    type Ok = read::deal::Stats;
    type Err = Traced<StatsError>;

    async fn execute(&self, query: Stats) -> Result<Self::Ok, Self::Err> {
        use StatsError as E;

        let Stats { viewer } = query;
        if !viewer.is_admin() {
            return Err(tracerr::new!(E::NotAdmin(viewer.id)));
        }

        self.database()
            .execute(Select(By::new(())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`Stats`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum StatsError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Viewer`] is not an administrator.
    #[display("`User(id: {_0})` is not an administrator")]
    NotAdmin(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::operations::Insert;

    use crate::{
        command::UpdateDealStatus,
        domain::{deal, item, user},
        infra::notifier::spec::Recorder,
        read::deal::list,
        spec::{user, viewer, Fixture},
        Command as _, Query as _,
    };

    use super::{List, Stats, StatsError};

    #[tokio::test]
    async fn scopes_list_by_role() {
        let f = Fixture::new(Recorder::default()).await;
        let own = f.open_deal().await;
        let other_buyer = user("Other", user::Role::User);
        f.service
            .database()
            .execute(Insert(other_buyer.clone()))
            .await
            .unwrap();
        let foreign = f.open_deal_on(&other_buyer, &f.seller, &f.item).await;

        let list = |who| List {
            viewer: who,
            filter: list::Filter::default(),
            sort: list::Sort::default(),
        };

        let buyers = f.service.execute(list(viewer(&f.buyer))).await.unwrap();
        assert_eq!(buyers.iter().map(|d| d.id).collect::<Vec<_>>(), [own.id]);

        let sellers = f.service.execute(list(viewer(&f.seller))).await.unwrap();
        assert_eq!(sellers.len(), 2);

        let strangers =
            f.service.execute(list(viewer(&f.stranger))).await.unwrap();
        assert!(strangers.is_empty());

        let admins = f.service.execute(list(viewer(&f.admin))).await.unwrap();
        assert_eq!(admins.len(), 2);
        assert!(admins.iter().any(|d| d.id == foreign.id));
        assert!(admins.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn filters_list() {
        let f = Fixture::new(Recorder::default()).await;
        let first = f.open_deal().await;
        let other_item = f.add_item(&f.seller).await;
        let second = f.open_deal_on(&f.buyer, &f.seller, &other_item).await;
        _ = f
            .service
            .execute(UpdateDealStatus {
                deal_id: second.id,
                status: deal::Status::Accepted,
                cancellation_reason: None,
                expected_revision: None,
                initiator: viewer(&f.seller),
            })
            .await
            .unwrap();

        let accepted = f
            .service
            .execute(List {
                viewer: viewer(&f.buyer),
                filter: list::Filter {
                    status: Some(deal::Status::Accepted),
                    ..list::Filter::default()
                },
                sort: list::Sort::default(),
            })
            .await
            .unwrap();
        assert_eq!(
            accepted.iter().map(|d| d.id).collect::<Vec<_>>(),
            [second.id],
        );

        let needle = first.code.to_string().to_lowercase();
        let searched = f
            .service
            .execute(List {
                viewer: viewer(&f.buyer),
                filter: list::Filter {
                    search: list::Search::new(&needle),
                    ..list::Filter::default()
                },
                sort: list::Sort::default(),
            })
            .await
            .unwrap();
        assert_eq!(
            searched.iter().map(|d| d.id).collect::<Vec<_>>(),
            [first.id],
        );

        let cars = f
            .service
            .execute(List {
                viewer: viewer(&f.buyer),
                filter: list::Filter {
                    item_kind: Some(item::Kind::Car),
                    ..list::Filter::default()
                },
                sort: list::Sort::default(),
            })
            .await
            .unwrap();
        assert!(cars.is_empty());
    }

    #[tokio::test]
    async fn lists_in_stable_order() {
        let f = Fixture::new(Recorder::default()).await;
        for _ in 0..3 {
            let item = f.add_item(&f.seller).await;
            _ = f.open_deal_on(&f.buyer, &f.seller, &item).await;
        }

        let query = || List {
            viewer: viewer(&f.admin),
            filter: list::Filter::default(),
            sort: list::Sort {
                key: list::SortKey::Price,
                order: list::Order::Asc,
            },
        };
        let first = f.service.execute(query()).await.unwrap();
        let second = f.service.execute(query()).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(
            first.iter().map(|d| d.id).collect::<Vec<_>>(),
            second.iter().map(|d| d.id).collect::<Vec<_>>(),
        );
        // Equal prices fall back to ascending IDs.
        assert!(first.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn counts_every_status() {
        let f = Fixture::new(Recorder::default()).await;
        let deal = f.open_deal().await;
        let other_item = f.add_item(&f.seller).await;
        _ = f.open_deal_on(&f.buyer, &f.seller, &other_item).await;
        _ = f
            .service
            .execute(UpdateDealStatus {
                deal_id: deal.id,
                status: deal::Status::Rejected,
                cancellation_reason: None,
                expected_revision: None,
                initiator: viewer(&f.seller),
            })
            .await
            .unwrap();

        let stats = f
            .service
            .execute(Stats {
                viewer: viewer(&f.admin),
            })
            .await
            .unwrap();

        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status.len(), deal::Status::ALL.len());
        assert_eq!(stats.by_status[&deal::Status::Pending], 1);
        assert_eq!(stats.by_status[&deal::Status::Rejected], 1);
        assert_eq!(stats.by_status[&deal::Status::Completed], 0);
    }

    #[tokio::test]
    async fn stats_are_for_admins() {
        let f = Fixture::new(Recorder::default()).await;

        let err = f
            .service
            .execute(Stats {
                viewer: viewer(&f.seller),
            })
            .await
            .unwrap_err();

        assert!(
            matches!(err.as_ref(), StatsError::NotAdmin(_)),
            "{err}",
        );
    }
}
