//! [`DealStore`] definitions.

use service::domain::{deal, Viewer};
use tracing as log;

use crate::{
    cache::{DealCache, LocalId},
    cart::Cart,
    catalog::{Catalog, Category, Summary},
    deal::Patch,
    remote::{CreateDeal, ListDeals, Remote, UpdateStatus},
    wire::{CreateRequest, UpdateRequest},
    Deal, Error,
};

/// Client-side owner of the [`Deal`]s collection, keeping it consistent
/// with the server.
#[derive(Debug)]
pub struct DealStore<R> {
    /// [`Remote`] to talk to the server with.
    remote: R,

    /// Local [`Deal`]s.
    cache: DealCache,

    /// Listings known to the client.
    catalog: Catalog,

    /// Signed-in user, if any.
    viewer: Option<Viewer>,
}

/// [`Deal`] creation staged in a [`DealStore`] and awaiting the server.
///
/// The [`DealStore`] stays fully usable until the [`Creation`] is settled,
/// so refreshes may interleave with it.
#[derive(Debug)]
#[must_use]
pub struct Creation {
    /// Optimistic entry of the staged [`Deal`].
    local: LocalId,

    /// Category of the listing.
    category: Category,

    /// Request to submit.
    request: CreateRequest,
}

impl Creation {
    /// Returns the [`CreateDeal`] operation to submit to the server.
    pub fn operation(&self) -> CreateDeal {
        CreateDeal(self.request.clone())
    }
}

/// Outcome of a [`DealStore::checkout()`].
#[derive(Debug, Default)]
pub struct Checkout {
    /// [`Deal`]s opened successfully.
    pub opened: Vec<Deal>,

    /// Listings no [`Deal`] could be opened for, with the reason.
    pub failed: Vec<(Summary, Error)>,
}

impl<R> DealStore<R> {
    /// Creates a new [`DealStore`] on top of the provided [`Remote`].
    #[must_use]
    pub fn new(remote: R) -> Self {
        Self::with_cache(remote, DealCache::new())
    }

    /// Creates a new [`DealStore`] starting from a previously saved
    /// [`DealCache`].
    #[must_use]
    pub fn with_cache(remote: R, cache: DealCache) -> Self {
        Self {
            remote,
            cache,
            catalog: Catalog::new(),
            viewer: None,
        }
    }

    /// Signs the provided [`Viewer`] in.
    pub fn sign_in(&mut self, viewer: Viewer) {
        self.viewer = Some(viewer);
    }

    /// Signs the current [`Viewer`] out, forgetting all the cached [`Deal`]s.
    pub fn sign_out(&mut self) {
        self.viewer = None;
        self.cache = DealCache::new();
    }

    /// Returns the signed-in [`Viewer`], if any.
    #[must_use]
    pub fn viewer(&self) -> Option<Viewer> {
        self.viewer
    }

    /// Returns the underlying [`DealCache`].
    #[must_use]
    pub fn cache(&self) -> &DealCache {
        &self.cache
    }

    /// Returns the [`Catalog`] of this [`DealStore`].
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the mutable [`Catalog`] of this [`DealStore`].
    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    /// Returns the [`Remote`] of this [`DealStore`].
    #[must_use]
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Returns the mutable [`Remote`] of this [`DealStore`].
    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    /// Iterates over the [`Deal`]s the signed-in [`Viewer`] may see.
    pub fn deals(&self) -> impl Iterator<Item = &Deal> {
        self.viewer.iter().flat_map(|v| {
            self.cache.deals().filter(move |d| d.is_visible_to(v))
        })
    }

    /// Stages a [`Deal`] for the listing the provided [`Summary`] points to,
    /// showing it optimistically until the returned [`Creation`] is settled.
    ///
    /// The full listing from the [`Catalog`] is preferred over the
    /// [`Summary`].
    ///
    /// # Errors
    ///
    /// With [`Error::AuthenticationRequired`] if nobody is signed in, in
    /// which case nothing is staged.
    pub fn stage_create(
        &mut self,
        category: Category,
        summary: &Summary,
        message: impl Into<String>,
    ) -> Result<Creation, Error> {
        let viewer = self.signed_in()?;
        let message = message.into();

        let (seller, snapshot) = self.catalog.resolve(category, summary);
        let local = self.cache.stage(Deal::draft(
            viewer.id,
            seller,
            summary.id,
            category,
            snapshot,
            message.clone(),
        ));
        Ok(Creation {
            local,
            category,
            request: CreateRequest {
                item: summary.id,
                item_type: category.into(),
                buyer: viewer.id,
                seller,
                message,
                deal_type: None,
            },
        })
    }

    /// Settles the provided [`Creation`] with the server's response.
    ///
    /// The optimistic entry is replaced with the canonical [`Deal`] on
    /// success, and removed otherwise.
    ///
    /// # Errors
    ///
    /// With the server's error, if any.
    pub fn settle_create(
        &mut self,
        creation: Creation,
        res: Result<Deal, Error>,
    ) -> Result<Deal, Error> {
        let (local, category) = (creation.local, creation.category);

        match res {
            Ok(deal) => {
                log::info!("opened `Deal(id: {})`", deal.id);
                self.cache.confirm(local, deal.clone());
                Ok(deal)
            }
            Err(e) => {
                log::warn!("failed to open deal for `{category}` listing: {e}");
                self.cache.discard(local);
                Err(e)
            }
        }
    }

    fn signed_in(&self) -> Result<Viewer, Error> {
        self.viewer.ok_or(Error::AuthenticationRequired)
    }
}

impl<R> DealStore<R>
where
    R: Remote<ListDeals, Ok = Vec<Deal>, Err = Error>,
{
    /// Replaces the cached [`Deal`]s with the ones on the server.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthenticationRequired`] if nobody is signed in.
    /// - If the [`Remote`] fails.
    pub async fn refresh(&mut self) -> Result<(), Error> {
        _ = self.signed_in()?;

        let deals = self.remote.execute(ListDeals).await?;
        log::debug!("refreshed {} deals", deals.len());
        self.cache.replace(deals);
        Ok(())
    }
}

impl<R> DealStore<R>
where
    R: Remote<CreateDeal, Ok = Deal, Err = Error>,
{
    /// Opens a new [`Deal`] for the listing the provided [`Summary`] points
    /// to.
    ///
    /// The [`Deal`] is shown optimistically while the request is in flight,
    /// and removed again if the server refuses it.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthenticationRequired`] if nobody is signed in.
    /// - If the [`Remote`] fails.
    pub async fn create(
        &mut self,
        category: Category,
        summary: &Summary,
        message: impl Into<String>,
    ) -> Result<Deal, Error> {
        let creation = self.stage_create(category, summary, message)?;
        let res = self.remote.execute(creation.operation()).await;
        self.settle_create(creation, res)
    }

    /// Opens a [`Deal`] for every listing in the provided [`Cart`].
    ///
    /// Every listing is tried independently, and only the successful ones
    /// are removed from the [`Cart`].
    ///
    /// # Errors
    ///
    /// With [`Error::AuthenticationRequired`] if nobody is signed in, in
    /// which case nothing is tried.
    pub async fn checkout(
        &mut self,
        cart: &mut Cart,
        message: &str,
    ) -> Result<Checkout, Error> {
        _ = self.signed_in()?;

        let mut outcome = Checkout::default();
        for line in cart.lines().to_vec() {
            match self.create(line.category, &line, message).await {
                Ok(deal) => {
                    _ = cart.remove(line.category, line.id);
                    outcome.opened.push(deal);
                }
                Err(e) => outcome.failed.push((line, e)),
            }
        }
        Ok(outcome)
    }
}

impl<R> DealStore<R>
where
    R: Remote<ListDeals, Ok = Vec<Deal>, Err = Error>
        + Remote<UpdateStatus, Ok = Deal, Err = Error>,
{
    /// Moves the cached [`Deal`] with the provided ID into the provided
    /// `status`.
    ///
    /// If the server reports a conflicting change, the whole collection is
    /// refreshed so the caller sees the current state.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthenticationRequired`] if nobody is signed in.
    /// - [`Error::UnknownDeal`] if the [`Deal`] is not cached.
    /// - If the [`Remote`] fails.
    pub async fn update_status(
        &mut self,
        id: deal::Id,
        status: deal::Status,
        cancellation_reason: Option<String>,
    ) -> Result<Deal, Error> {
        _ = self.signed_in()?;
        let revision =
            self.cache.get(id).ok_or(Error::UnknownDeal(id))?.revision;

        let res = self
            .remote
            .execute(UpdateStatus {
                id,
                request: UpdateRequest {
                    status,
                    cancellation_reason,
                    revision: Some(revision),
                },
            })
            .await;
        match res {
            Ok(updated) => {
                let merged = self.cache.merge(id, Patch::from(&updated))?;
                Ok(merged.clone())
            }
            Err(e) => {
                if e.is_conflict() {
                    log::info!("`Deal(id: {id})` changed remotely, refreshing");
                    if let Err(e) = self.refresh().await {
                        log::warn!("failed to refresh deals: {e}");
                    }
                }
                Err(e)
            }
        }
    }
}
