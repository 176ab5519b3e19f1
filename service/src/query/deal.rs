//! [`Query`] collection related to a single [`Deal`].

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::{deal, Deal, Viewer},
    infra::{database, Database},
    Service,
};

use super::Query;

/// Queries a [`Deal`] by its [`deal::Id`].
///
/// [`Deal`]s invisible to the [`Viewer`] are reported as missing.
#[derive(Clone, Copy, Debug)]
pub struct ById {
    /// ID of the [`Deal`] to query.
    pub id: deal::Id,

    /// [`Viewer`] asking for the [`Deal`].
    pub viewer: Viewer,
}

impl<Db, Ntf> Query<ById> for Service<Db, Ntf>
where
    Db: Database<
        Select<By<Option<Deal>, deal::Id>>,
        Ok = Option<Deal>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Deal>;
    type Err = Traced<database::Error>;

    async fn execute(&self, query: ById) -> Result<Self::Ok, Self::Err> {
        let ById { id, viewer } = query;

        Ok(self
            .database()
            .execute(Select(By::new(id)))
            .await
            .map_err(tracerr::wrap!())?
            .filter(|d| viewer.can_see(d)))
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::deal,
        infra::notifier::spec::Recorder,
        spec::{viewer, Fixture},
        Query as _,
    };

    use super::ById;

    #[tokio::test]
    async fn returns_only_visible() {
        let f = Fixture::new(Recorder::default()).await;
        let deal = f.open_deal().await;

        for user in [&f.buyer, &f.seller, &f.admin] {
            let found = f
                .service
                .execute(ById {
                    id: deal.id,
                    viewer: viewer(user),
                })
                .await
                .unwrap();
            assert_eq!(found.map(|d| d.id), Some(deal.id));
        }

        let hidden = f
            .service
            .execute(ById {
                id: deal.id,
                viewer: viewer(&f.stranger),
            })
            .await
            .unwrap();
        assert!(hidden.is_none());

        let missing = f
            .service
            .execute(ById {
                id: deal::Id::new(),
                viewer: viewer(&f.admin),
            })
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
