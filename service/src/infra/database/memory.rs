//! In-memory [`Database`] implementation.

use std::{collections::HashMap, future::Future, sync::Arc};

use common::operations::{
    By, Commit, Delete, Insert, Select, Transact, Update,
};
use derive_more::{Display, Error as StdError};
use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock};
use tracerr::Traced;

use crate::{
    domain::{deal, item, user, Activity, Deal, Item, User},
    infra::{database, Database},
    read::deal::{list, Stats},
};

/// In-memory [`Database`] client.
#[derive(Clone, Debug, Default)]
pub struct Memory<T = NonTx>(T);

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all the [`Activity`] records written so far, in order.
    pub async fn activities(&self) -> Vec<Activity> {
        self.0 .0.read().await.activities.clone()
    }
}

/// Non-transactional access to a [`Memory`] database.
#[derive(Clone, Debug, Default)]
pub struct NonTx(Arc<RwLock<State>>);

/// Transactional access to a [`Memory`] database.
///
/// Holds the exclusive lock over the [`State`] until committed or dropped.
/// Dropping without a [`Commit`] rolls all the changes back.
#[derive(Clone, Debug)]
pub struct Tx(Arc<Mutex<Option<Open>>>);

/// Open transaction of a [`Tx`].
#[derive(Debug)]
struct Open {
    /// Exclusive access to the [`State`].
    guard: OwnedRwLockWriteGuard<State>,

    /// [`State`] to restore on rollback.
    ///
    /// [`None`] once committed.
    backup: Option<State>,
}

impl Drop for Open {
    fn drop(&mut self) {
        if let Some(backup) = self.backup.take() {
            *self.guard = backup;
        }
    }
}

/// Contents of a [`Memory`] database.
#[derive(Clone, Debug, Default)]
pub struct State {
    /// Stored [`User`]s.
    users: HashMap<user::Id, User>,

    /// Stored catalog [`Item`]s.
    items: HashMap<item::Ref, Item>,

    /// Stored [`Deal`]s.
    deals: HashMap<deal::Id, Deal>,

    /// Appended [`Activity`] records.
    activities: Vec<Activity>,
}

/// Access to the [`State`] of a [`Memory`] database.
pub trait Access {
    /// Runs the provided function over the shared [`State`].
    ///
    /// # Errors
    ///
    /// If the [`State`] cannot be accessed anymore.
    fn read<R>(
        &self,
        f: impl FnOnce(&State) -> R,
    ) -> impl Future<Output = Result<R, Traced<database::Error>>>;

    /// Runs the provided function over the exclusively borrowed [`State`].
    ///
    /// # Errors
    ///
    /// If the [`State`] cannot be accessed anymore.
    fn write<R>(
        &self,
        f: impl FnOnce(&mut State) -> R,
    ) -> impl Future<Output = Result<R, Traced<database::Error>>>;
}

impl Access for NonTx {
    async fn read<R>(
        &self,
        f: impl FnOnce(&State) -> R,
    ) -> Result<R, Traced<database::Error>> {
        Ok(f(&*self.0.read().await))
    }

    async fn write<R>(
        &self,
        f: impl FnOnce(&mut State) -> R,
    ) -> Result<R, Traced<database::Error>> {
        Ok(f(&mut *self.0.write().await))
    }
}

impl Access for Tx {
    async fn read<R>(
        &self,
        f: impl FnOnce(&State) -> R,
    ) -> Result<R, Traced<database::Error>> {
        let open = self.0.lock().await;
        let open = open
            .as_ref()
            .ok_or_else(|| tracerr::new!(Error::TxClosed))
            .map_err(tracerr::map_from)?;
        Ok(f(&open.guard))
    }

    async fn write<R>(
        &self,
        f: impl FnOnce(&mut State) -> R,
    ) -> Result<R, Traced<database::Error>> {
        let mut open = self.0.lock().await;
        let open = open
            .as_mut()
            .ok_or_else(|| tracerr::new!(Error::TxClosed))
            .map_err(tracerr::map_from)?;
        Ok(f(&mut open.guard))
    }
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, StdError)]
pub enum Error {
    /// Unique constraint is violated.
    #[display("`{_0}` constraint is violated")]
    UniqueViolation(#[error(not(source))] &'static str),

    /// [`Tx`] is already committed.
    #[display("`Tx` is already committed")]
    TxClosed,
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::UniqueViolation(c) => constraint.map_or(true, |n| n == *c),
            Self::TxClosed => false,
        }
    }
}

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        let guard = Arc::clone(&self.0 .0).write_owned().await;
        let backup = Some(guard.clone());
        Ok(Memory(Tx(Arc::new(Mutex::new(Some(Open { guard, backup }))))))
    }
}

impl Database<Transact> for Memory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        let mut open = self
            .0
             .0
            .lock()
            .await
            .take()
            .ok_or_else(|| tracerr::new!(Error::TxClosed))
            .map_err(tracerr::map_from)?;
        open.backup = None;
        Ok(())
    }
}

impl<A: Access> Database<Insert<User>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .write(|s| drop(s.users.insert(user.id, user)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A, IDs> Database<Select<By<HashMap<user::Id, User>, IDs>>> for Memory<A>
where
    A: Access,
    IDs: AsRef<[user::Id]>,
{
    type Ok = HashMap<user::Id, User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<user::Id, User>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        self.0
            .read(|s| {
                ids.as_ref()
                    .iter()
                    .filter_map(|id| s.users.get(id))
                    .filter(|u| u.deleted_at.is_none())
                    .map(|u| (u.id, u.clone()))
                    .collect()
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<User>, user::Id>>> for Memory<A> {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.0
            .read(|s| {
                s.users.get(&id).filter(|u| u.deleted_at.is_none()).cloned()
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<Item>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(item): Insert<Item>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .write(|s| drop(s.items.insert(item.to_ref(), item)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<Item>, item::Ref>>> for Memory<A> {
    type Ok = Option<Item>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Item>, item::Ref>>,
    ) -> Result<Self::Ok, Self::Err> {
        let item = by.into_inner();
        self.0
            .read(|s| s.items.get(&item).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<Deal>, deal::Id>>> for Memory<A> {
    type Ok = Option<Deal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Deal>, deal::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.0
            .read(|s| s.deals.get(&id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<Deal>, deal::Key>>> for Memory<A> {
    type Ok = Option<Deal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Deal>, deal::Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = by.into_inner();
        self.0
            .read(|s| s.deals.values().find(|d| d.key() == key).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Vec<Deal>, list::Selector>>> for Memory<A> {
    type Ok = Vec<Deal>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Deal>, list::Selector>>,
    ) -> Result<Self::Ok, Self::Err> {
        let selector = by.into_inner();
        let mut deals = self
            .0
            .read(|s| {
                s.deals
                    .values()
                    .filter(|d| selector.matches(d))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await
            .map_err(tracerr::wrap!())?;
        deals.sort_by(|a, b| selector.sort.compare(a, b));
        Ok(deals)
    }
}

impl<A: Access> Database<Select<By<Stats, ()>>> for Memory<A> {
    type Ok = Stats;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<Stats, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .read(|s| {
                Stats::from_counts(s.deals.values().map(|d| (d.status, 1)))
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<Deal>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(deal): Insert<Deal>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .write(|s| {
                let key = deal.key();
                if s.deals.values().any(|d| d.key() == key && d.id != deal.id)
                {
                    return Err(Error::UniqueViolation(
                        database::DEALS_UNIQUE_KEY,
                    ));
                }
                drop(s.deals.insert(deal.id, deal));
                Ok(())
            })
            .await
            .map_err(tracerr::wrap!())?
            .map_err(tracerr::from_and_wrap!(=> database::Error))
    }
}

impl<A: Access> Database<Update<Deal>> for Memory<A> {
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(deal): Update<Deal>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .write(|s| {
                let Some(stored) = s.deals.get_mut(&deal.id) else {
                    return false;
                };
                if Some(stored.revision) != deal.revision.previous() {
                    return false;
                }
                *stored = deal;
                true
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Delete<By<Deal, deal::Id>>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Deal, deal::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.0
            .write(|s| drop(s.deals.remove(&id)))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<Activity>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(activity): Insert<Activity>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .write(|s| s.activities.push(activity))
            .await
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Commit, Insert, Select, Transact, Update};

    use crate::{
        domain::{deal, Deal},
        infra::{database, Database},
    };

    use super::Memory;

    #[tokio::test]
    async fn rolls_back_uncommitted() {
        let db = Memory::new();
        let deal = deal::spec::deal();

        {
            let tx = db.execute(Transact).await.unwrap();
            tx.execute(Insert(deal.clone())).await.unwrap();
        }

        let found = db
            .execute(Select(By::<Option<Deal>, _>::new(deal.id)))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn keeps_committed() {
        let db = Memory::new();
        let deal = deal::spec::deal();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(deal.clone())).await.unwrap();
        tx.execute(Commit).await.unwrap();
        drop(tx);

        let found = db
            .execute(Select(By::<Option<Deal>, _>::new(deal.key())))
            .await
            .unwrap();
        assert_eq!(found.map(|d| d.id), Some(deal.id));
    }

    #[tokio::test]
    async fn rejects_duplicate_key() {
        let db = Memory::new();
        let deal = deal::spec::deal();
        let mut twin = deal.clone();
        twin.id = deal::Id::new();

        db.execute(Insert(deal)).await.unwrap();
        let err = db.execute(Insert(twin)).await.unwrap_err();

        assert!(err
            .as_ref()
            .is_unique_violation(Some(database::DEALS_UNIQUE_KEY)));
    }

    #[tokio::test]
    async fn updates_only_next_revision() {
        let db = Memory::new();
        let mut deal = deal::spec::deal();
        db.execute(Insert(deal.clone())).await.unwrap();

        deal.transition(deal::Status::Accepted, None).unwrap();
        assert!(db.execute(Update(deal.clone())).await.unwrap());
        assert!(!db.execute(Update(deal.clone())).await.unwrap());
    }
}
