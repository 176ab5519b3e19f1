//! [`Deal`]-related read definitions.

use std::collections::BTreeMap;

use crate::domain::deal;
#[cfg(doc)]
use crate::domain::Deal;

/// Aggregated counts of [`Deal`]s.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stats {
    /// Total number of [`Deal`]s.
    pub total: u64,

    /// Number of [`Deal`]s in each [`deal::Status`].
    ///
    /// Always contains every [`deal::Status`], even with zero count.
    pub by_status: BTreeMap<deal::Status, u64>,
}

impl Stats {
    /// Builds [`Stats`] out of the provided per-[`deal::Status`] counts.
    #[must_use]
    pub fn from_counts(
        counts: impl IntoIterator<Item = (deal::Status, u64)>,
    ) -> Self {
        let mut by_status: BTreeMap<_, _> =
            deal::Status::ALL.iter().map(|&s| (s, 0)).collect();
        for (status, count) in counts {
            *by_status.entry(status).or_default() += count;
        }
        Self {
            total: by_status.values().sum(),
            by_status,
        }
    }
}

pub mod list {
    //! [`Deal`] list definitions.

    use std::cmp::Ordering;

    use common::define_kind;

    use crate::domain::{deal, item, user, viewer, Deal, Viewer};

    /// Selector of a [`Deal`] list.
    #[derive(Clone, Debug)]
    pub struct Selector {
        /// [`Scope`] to select [`Deal`]s from.
        pub scope: Scope,

        /// [`Filter`] to apply.
        pub filter: Filter,

        /// [`Sort`] order of the list.
        pub sort: Sort,
    }

    impl Selector {
        /// Indicates whether the provided [`Deal`] belongs to this
        /// [`Selector`].
        #[must_use]
        pub fn matches(&self, deal: &Deal) -> bool {
            self.scope.contains(deal) && self.filter.matches(deal)
        }
    }

    /// Set of [`Deal`]s a list is restricted to.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum Scope {
        /// Every [`Deal`].
        All,

        /// [`Deal`]s where the [`User`] with the provided ID is either the
        /// buyer or the seller.
        ///
        /// [`User`]: crate::domain::User
        Participant(user::Id),
    }

    impl Scope {
        /// Returns the widest [`Scope`] the provided [`Viewer`] may see.
        #[must_use]
        pub fn of(viewer: &Viewer) -> Self {
            if viewer.is_admin() {
                Self::All
            } else {
                Self::Participant(viewer.id)
            }
        }

        /// Indicates whether the provided [`Deal`] is inside this [`Scope`].
        #[must_use]
        pub fn contains(&self, deal: &Deal) -> bool {
            match *self {
                Self::All => true,
                Self::Participant(id) => viewer::is_visible(
                    user::Role::User,
                    id,
                    deal.buyer.id,
                    deal.seller.id,
                ),
            }
        }
    }

    /// Filter of a [`Deal`] list.
    ///
    /// Every [`None`] field matches anything.
    #[derive(Clone, Debug, Default)]
    pub struct Filter {
        /// [`Search`] over [`deal::Code`]s.
        pub search: Option<Search>,

        /// Exact [`deal::Status`] to match.
        pub status: Option<deal::Status>,

        /// Exact [`deal::Tag`] to match.
        pub tag: Option<deal::Tag>,

        /// Exact [`item::Kind`] to match.
        pub item_kind: Option<item::Kind>,
    }

    impl Filter {
        /// Indicates whether the provided [`Deal`] passes this [`Filter`].
        #[must_use]
        pub fn matches(&self, deal: &Deal) -> bool {
            self.search.as_ref().map_or(true, |s| s.matches(&deal.code))
                && self.status.map_or(true, |s| s == deal.status)
                && self.tag.as_ref().map_or(true, |t| *t == deal.tag)
                && self.item_kind.map_or(true, |k| k == deal.item.kind)
        }
    }

    /// Case-insensitive substring search over [`deal::Code`]s.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub struct Search(String);

    impl Search {
        /// Creates a new [`Search`] out of the provided `input`.
        ///
        /// Returns [`None`] for a blank `input`.
        #[must_use]
        pub fn new(input: impl AsRef<str>) -> Option<Self> {
            let input = input.as_ref().trim();
            (!input.is_empty()).then(|| Self(input.to_uppercase()))
        }

        /// Returns the normalized needle of this [`Search`].
        #[must_use]
        pub fn needle(&self) -> &str {
            &self.0
        }

        /// Indicates whether the provided [`deal::Code`] matches this
        /// [`Search`].
        #[must_use]
        pub fn matches(&self, code: &deal::Code) -> bool {
            AsRef::<str>::as_ref(code).to_uppercase().contains(&self.0)
        }
    }

    define_kind! {
        #[doc = "Key to sort a [`Deal`] list by."]
        enum SortKey {
            #[doc = "[`Deal::created_at`]."]
            #[wire("createdAt")]
            CreatedAt = 1,

            #[doc = "[`Deal::updated_at`]."]
            #[wire("updatedAt")]
            UpdatedAt = 2,

            #[doc = "[`Deal::status`]."]
            #[wire("status")]
            Status = 3,

            #[doc = "[`Deal::code`]."]
            #[wire("dealId")]
            Code = 4,

            #[doc = "[`item::Snapshot::price`]."]
            #[wire("price")]
            Price = 5,
        }
    }

    define_kind! {
        #[doc = "Direction of a [`Sort`]."]
        enum Order {
            #[doc = "Smallest first."]
            #[wire("asc", "ascending")]
            Asc = 1,

            #[doc = "Largest first."]
            #[wire("desc", "descending")]
            Desc = 2,
        }
    }

    /// Sort order of a [`Deal`] list.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct Sort {
        /// [`SortKey`] to sort by.
        pub key: SortKey,

        /// [`Order`] to sort in.
        pub order: Order,
    }

    impl Default for Sort {
        fn default() -> Self {
            Self {
                key: SortKey::CreatedAt,
                order: Order::Desc,
            }
        }
    }

    impl Sort {
        /// Compares the provided [`Deal`]s according to this [`Sort`].
        ///
        /// Ties are broken by [`deal::Id`] in ascending order, regardless of
        /// the [`Order`].
        #[must_use]
        pub fn compare(&self, a: &Deal, b: &Deal) -> Ordering {
            let by_key = match self.key {
                SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
                SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
                SortKey::Code => a.code.cmp(&b.code),
                SortKey::Price => a.snapshot.price.cmp(&b.snapshot.price),
            };
            let by_key = match self.order {
                Order::Asc => by_key,
                Order::Desc => by_key.reverse(),
            };
            by_key.then_with(|| a.id.cmp(&b.id))
        }
    }

    #[cfg(test)]
    mod spec {
        use rust_decimal::Decimal;

        use crate::domain::{deal, item, user, Viewer};

        use super::{Filter, Order, Scope, Search, Selector, Sort, SortKey};

        #[test]
        fn scopes_by_viewer() {
            let deal = deal::spec::deal();
            let buyer = Viewer {
                id: deal.buyer.id,
                role: user::Role::User,
            };
            let admin = Viewer {
                id: user::Id::new(),
                role: user::Role::Admin,
            };

            assert_eq!(Scope::of(&admin), Scope::All);
            assert!(Scope::of(&buyer).contains(&deal));
            assert!(!Scope::Participant(user::Id::new()).contains(&deal));
        }

        #[test]
        fn filters_by_fields() {
            let deal = deal::spec::deal();
            let code = deal.code.to_string();
            let tail = code[5..].to_lowercase();

            let selector = |filter| Selector {
                scope: Scope::All,
                filter,
                sort: Sort::default(),
            };

            assert!(selector(Filter::default()).matches(&deal));
            assert!(selector(Filter {
                search: Search::new(&tail),
                ..Filter::default()
            })
            .matches(&deal));
            assert!(!selector(Filter {
                search: Search::new("zzzzzzzzzz"),
                ..Filter::default()
            })
            .matches(&deal));
            assert!(!selector(Filter {
                status: Some(deal::Status::Accepted),
                ..Filter::default()
            })
            .matches(&deal));
            assert!(selector(Filter {
                tag: deal::Tag::new("inquiry"),
                item_kind: Some(item::Kind::Car),
                ..Filter::default()
            })
            .matches(&deal));
            assert!(!selector(Filter {
                item_kind: Some(item::Kind::Land),
                ..Filter::default()
            })
            .matches(&deal));
        }

        #[test]
        fn blank_search_is_none() {
            assert!(Search::new("   ").is_none());
            assert_eq!(Search::new(" dl-ab ").unwrap().needle(), "DL-AB");
        }

        #[test]
        fn sorts_deterministically() {
            let mut cheap = deal::spec::deal();
            cheap.snapshot.price = item::Price::new(Decimal::ONE).unwrap();
            let mut pricey = deal::spec::deal();
            pricey.snapshot.price = item::Price::new(Decimal::TEN).unwrap();
            let mut twin = deal::spec::deal();
            twin.snapshot.price = item::Price::new(Decimal::TEN).unwrap();

            let mut deals = vec![pricey.clone(), cheap.clone(), twin.clone()];
            let sort = Sort {
                key: SortKey::Price,
                order: Order::Desc,
            };
            deals.sort_by(|a, b| sort.compare(a, b));

            assert_eq!(deals[2].id, cheap.id);
            let (first, second) = if pricey.id < twin.id {
                (pricey.id, twin.id)
            } else {
                (twin.id, pricey.id)
            };
            assert_eq!(deals[0].id, first);
            assert_eq!(deals[1].id, second);
        }
    }
}
