//! [`DealCache`] definitions.

use std::{collections::HashSet, fs, io, path::Path};

use service::domain::{deal, Viewer};

use crate::{deal::Patch, Deal, Error};

/// Marker of a [`Deal`] staged locally and not confirmed by the server yet.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct LocalId(u64);

/// Entry of a [`DealCache`].
#[derive(Clone, Debug)]
pub enum Entry {
    /// [`Deal`] as last seen from the server.
    Canonical(Deal),

    /// [`Deal`] staged locally while its creation is in flight.
    Optimistic(LocalId, Deal),
}

impl Entry {
    /// Returns the [`Deal`] of this [`Entry`].
    #[must_use]
    pub fn deal(&self) -> &Deal {
        match self {
            Self::Canonical(d) | Self::Optimistic(_, d) => d,
        }
    }

    fn deal_mut(&mut self) -> &mut Deal {
        match self {
            Self::Canonical(d) | Self::Optimistic(_, d) => d,
        }
    }

    fn local_id(&self) -> Option<LocalId> {
        match self {
            Self::Canonical(_) => None,
            Self::Optimistic(id, _) => Some(*id),
        }
    }
}

/// Local collection of [`Deal`]s kept consistent with the server.
#[derive(Clone, Debug, Default)]
pub struct DealCache {
    /// [`Entry`]s in display order.
    entries: Vec<Entry>,

    /// Next [`LocalId`] to hand out.
    next_local: u64,
}

impl DealCache {
    /// Creates an empty [`DealCache`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole collection with the provided canonical [`Deal`]s.
    ///
    /// Optimistic entries survive unless a canonical [`Deal`] with the same
    /// [`Deal::key()`] has arrived.
    pub fn replace(&mut self, canonical: Vec<Deal>) {
        let keys = canonical.iter().map(Deal::key).collect::<HashSet<_>>();

        let mut entries = self
            .entries
            .drain(..)
            .filter(|e| {
                matches!(e, Entry::Optimistic(..))
                    && !keys.contains(&e.deal().key())
            })
            .collect::<Vec<_>>();
        entries.extend(canonical.into_iter().map(Entry::Canonical));
        self.entries = entries;
    }

    /// Stages the provided [`Deal`] as an optimistic entry.
    pub fn stage(&mut self, deal: Deal) -> LocalId {
        let id = LocalId(self.next_local);
        self.next_local += 1;
        self.entries.insert(0, Entry::Optimistic(id, deal));
        id
    }

    /// Replaces the optimistic entry with the provided canonical [`Deal`].
    ///
    /// Any other copy of the canonical [`Deal`] is dropped, so it appears
    /// exactly once.
    pub fn confirm(&mut self, local: LocalId, canonical: Deal) {
        self.entries.retain(|e| {
            e.local_id().is_some() || e.deal().id != canonical.id
        });

        if let Some(e) =
            self.entries.iter_mut().find(|e| e.local_id() == Some(local))
        {
            *e = Entry::Canonical(canonical);
        } else {
            self.entries.insert(0, Entry::Canonical(canonical));
        }
    }

    /// Removes the optimistic entry, if it's still present.
    pub fn discard(&mut self, local: LocalId) {
        self.entries.retain(|e| e.local_id() != Some(local));
    }

    /// Merges the provided [`Patch`] into the [`Deal`] with the provided ID.
    ///
    /// # Errors
    ///
    /// With [`Error::UnknownDeal`] if no such [`Deal`] is cached.
    pub fn merge(
        &mut self,
        id: deal::Id,
        patch: Patch,
    ) -> Result<&Deal, Error> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.deal().id == id)
            .ok_or(Error::UnknownDeal(id))?;
        let d = entry.deal_mut();
        d.apply(patch);
        Ok(d)
    }

    /// Returns the cached [`Deal`] with the provided ID, if any.
    #[must_use]
    pub fn get(&self, id: deal::Id) -> Option<&Deal> {
        self.deals().find(|d| d.id == id)
    }

    /// Iterates over all the cached [`Deal`]s in display order.
    pub fn deals(&self) -> impl Iterator<Item = &Deal> {
        self.entries.iter().map(Entry::deal)
    }

    /// Returns all the [`Entry`]s in display order.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns the number of cached [`Deal`]s in
    /// [`deal::Status::Pending`].
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.deals()
            .filter(|d| d.status == deal::Status::Pending)
            .count()
    }

    /// Returns the number of optimistic entries awaiting confirmation.
    #[must_use]
    pub fn optimistic_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, Entry::Optimistic(..)))
            .count()
    }

    /// Returns the [`Deal`]s the provided [`Viewer`] is allowed to see.
    pub fn visible_to<'s>(
        &'s self,
        viewer: &'s Viewer,
    ) -> impl Iterator<Item = &'s Deal> + 's {
        self.deals().filter(|d| d.is_visible_to(viewer))
    }

    /// Writes the canonical [`Deal`]s into the file at the provided `path`.
    ///
    /// Optimistic entries are never persisted.
    ///
    /// # Errors
    ///
    /// If serialization or writing fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let canonical = self
            .entries
            .iter()
            .filter_map(|e| match e {
                Entry::Canonical(d) => Some(d),
                Entry::Optimistic(..) => None,
            })
            .collect::<Vec<_>>();
        let bytes = serde_json::to_vec(&canonical)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Reads a [`DealCache`] from the file at the provided `path`.
    ///
    /// A missing file yields an empty [`DealCache`].
    ///
    /// # Errors
    ///
    /// If reading or deserialization fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        let deals: Vec<Deal> = serde_json::from_slice(&bytes)?;
        Ok(Self {
            entries: deals.into_iter().map(Entry::Canonical).collect(),
            next_local: 0,
        })
    }
}

#[cfg(test)]
mod spec {
    use service::domain::{deal, item, user, Viewer};

    use super::{DealCache, Entry};
    use crate::{
        catalog::Category,
        deal::{Patch, Snapshot},
        Deal, Error,
    };

    fn draft(buyer: user::Id, seller: user::Id) -> Deal {
        Deal::draft(
            buyer,
            seller,
            item::Id::new(),
            Category::House,
            Snapshot::default(),
            "Hello".into(),
        )
    }

    fn canonical(of: &Deal) -> Deal {
        Deal {
            id: deal::Id::new(),
            code: "DL-00000001".into(),
            ..of.clone()
        }
    }

    #[test]
    fn refresh_keeps_inflight_creation() {
        let (buyer, seller) = (user::Id::new(), user::Id::new());
        let existing = canonical(&draft(buyer, seller));

        let mut cache = DealCache::new();
        cache.replace(vec![existing.clone()]);
        let staged = draft(buyer, seller);
        let local = cache.stage(staged.clone());

        cache.replace(vec![existing.clone()]);
        assert_eq!(cache.optimistic_count(), 1);
        assert_eq!(cache.deals().count(), 2);

        let confirmed = canonical(&staged);
        cache.confirm(local, confirmed.clone());
        assert_eq!(cache.optimistic_count(), 0);
        assert_eq!(cache.deals().count(), 2);
        assert!(matches!(
            cache.entries().first(),
            Some(Entry::Canonical(d)) if d.id == confirmed.id,
        ));
    }

    #[test]
    fn refresh_supersedes_confirmed_placeholder() {
        let (buyer, seller) = (user::Id::new(), user::Id::new());
        let staged = draft(buyer, seller);
        let confirmed = canonical(&staged);

        let mut cache = DealCache::new();
        let local = cache.stage(staged);
        cache.replace(vec![confirmed.clone()]);
        assert_eq!(cache.optimistic_count(), 0);

        cache.confirm(local, confirmed.clone());
        assert_eq!(cache.deals().count(), 1);
        assert_eq!(cache.get(confirmed.id), Some(&confirmed));
    }

    #[test]
    fn discard_leaves_no_placeholder() {
        let mut cache = DealCache::new();
        let local = cache.stage(draft(user::Id::new(), user::Id::new()));

        cache.discard(local);

        assert_eq!(cache.optimistic_count(), 0);
        assert_eq!(cache.deals().count(), 0);
    }

    #[test]
    fn counts_pending_by_status() {
        let pending = canonical(&draft(user::Id::new(), user::Id::new()));
        let accepted = Deal {
            status: deal::Status::Accepted,
            ..canonical(&draft(user::Id::new(), user::Id::new()))
        };
        let mut cache = DealCache::new();
        cache.replace(vec![pending, accepted]);

        assert_eq!(cache.pending_count(), 1);
        assert_eq!(cache.optimistic_count(), 0);

        _ = cache.stage(draft(user::Id::new(), user::Id::new()));
        assert_eq!(cache.pending_count(), 2);
        assert_eq!(cache.optimistic_count(), 1);
    }

    #[test]
    fn merges_partially() {
        let d = canonical(&draft(user::Id::new(), user::Id::new()));
        let mut cache = DealCache::new();
        cache.replace(vec![d.clone()]);

        let merged = cache
            .merge(
                d.id,
                Patch {
                    status: Some(deal::Status::Rejected),
                    revision: Some(d.revision.next()),
                    ..Patch::default()
                },
            )
            .unwrap();
        assert_eq!(merged.status, deal::Status::Rejected);
        assert_eq!(merged.revision, d.revision.next());
        assert_eq!(merged.snapshot, d.snapshot);

        let missing = deal::Id::new();
        assert!(matches!(
            cache.merge(missing, Patch::default()),
            Err(Error::UnknownDeal(id)) if id == missing,
        ));
    }

    #[test]
    fn scopes_by_viewer() {
        let (ann, bob, eve) =
            (user::Id::new(), user::Id::new(), user::Id::new());
        let mut cache = DealCache::new();
        cache.replace(vec![
            canonical(&draft(ann, bob)),
            canonical(&draft(bob, eve)),
        ]);

        let as_user = |id| Viewer {
            id,
            role: user::Role::User,
        };
        assert_eq!(cache.visible_to(&as_user(ann)).count(), 1);
        assert_eq!(cache.visible_to(&as_user(bob)).count(), 2);
        assert_eq!(
            cache
                .visible_to(&Viewer {
                    id: ann,
                    role: user::Role::Admin,
                })
                .count(),
            2,
        );
    }

    #[test]
    fn persists_only_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deals.json");

        let kept = canonical(&draft(user::Id::new(), user::Id::new()));
        let mut cache = DealCache::new();
        cache.replace(vec![kept.clone()]);
        _ = cache.stage(draft(user::Id::new(), user::Id::new()));
        cache.save(&path).unwrap();

        let loaded = DealCache::load(&path).unwrap();
        assert_eq!(loaded.optimistic_count(), 0);
        assert_eq!(loaded.deals().cloned().collect::<Vec<_>>(), vec![kept]);

        let empty = DealCache::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(empty.deals().count(), 0);
    }
}
