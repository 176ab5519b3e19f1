//! [`Catalog`] of listings known to the client.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use service::domain::{item, user};

use crate::deal::Snapshot;

/// Category of a listing, as the client names it.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Category {
    /// Vehicle.
    Car,

    /// Real estate, named `Property` on the wire.
    House,

    /// Land parcel.
    Land,

    /// Heavy machinery.
    Machine,
}

impl From<Category> for item::Kind {
    fn from(category: Category) -> Self {
        match category {
            Category::Car => Self::Car,
            Category::House => Self::Property,
            Category::Land => Self::Land,
            Category::Machine => Self::Machine,
        }
    }
}

impl From<item::Kind> for Category {
    fn from(kind: item::Kind) -> Self {
        match kind {
            item::Kind::Car => Self::Car,
            item::Kind::Property => Self::House,
            item::Kind::Land => Self::Land,
            item::Kind::Machine => Self::Machine,
        }
    }
}

/// Short form of a listing, as shown in lists and carts.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Summary {
    /// ID of the listing.
    pub id: item::Id,

    /// [`Category`] of the listing.
    pub category: Category,

    /// ID of the user selling the listing.
    pub owner: user::Id,

    /// Title of the listing.
    pub title: String,

    /// Decimal price of the listing.
    pub price: String,

    /// Cover image of the listing.
    pub image: Option<String>,
}

impl Summary {
    /// Builds a [`Snapshot`] out of this [`Summary`] alone.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            title: self.title.clone(),
            price: self.price.clone(),
            images: self.image.iter().cloned().collect(),
            description: String::new(),
            location: String::new(),
        }
    }
}

/// Full listing with all its details.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Listing {
    /// Short form of this [`Listing`].
    pub summary: Summary,

    /// All image URLs of this [`Listing`].
    pub images: Vec<String>,

    /// Description of this [`Listing`].
    pub description: String,

    /// Location of this [`Listing`].
    pub location: String,
}

impl Listing {
    /// Builds a [`Snapshot`] of this [`Listing`].
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            title: self.summary.title.clone(),
            price: self.summary.price.clone(),
            images: self.images.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
        }
    }
}

/// Listings known to the client, keyed by [`Category`] and ID.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    listings: HashMap<(Category, item::Id), Listing>,
}

impl Catalog {
    /// Creates an empty [`Catalog`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the provided [`Listing`].
    pub fn upsert(&mut self, listing: Listing) {
        let key = (listing.summary.category, listing.summary.id);
        _ = self.listings.insert(key, listing);
    }

    /// Removes the [`Listing`] with the provided key, if any.
    pub fn remove(
        &mut self,
        category: Category,
        id: item::Id,
    ) -> Option<Listing> {
        self.listings.remove(&(category, id))
    }

    /// Returns the [`Listing`] with the provided key, if any.
    #[must_use]
    pub fn get(&self, category: Category, id: item::Id) -> Option<&Listing> {
        self.listings.get(&(category, id))
    }

    /// Resolves the seller and the [`Snapshot`] of the listing the provided
    /// [`Summary`] points to.
    ///
    /// The full [`Listing`] is preferred whenever it's known.
    #[must_use]
    pub fn resolve(
        &self,
        category: Category,
        summary: &Summary,
    ) -> (user::Id, Snapshot) {
        self.get(category, summary.id).map_or_else(
            || (summary.owner, summary.snapshot()),
            |l| (l.summary.owner, l.snapshot()),
        )
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use service::domain::{item, user};

    use super::{Catalog, Category, Listing, Summary};

    fn summary(category: Category, owner: user::Id) -> Summary {
        Summary {
            id: item::Id::new(),
            category,
            owner,
            title: "Cottage".into(),
            price: "120000.00".into(),
            image: Some("https://img.example/1.jpg".into()),
        }
    }

    #[test]
    fn house_is_property_on_wire() {
        assert_eq!(item::Kind::from(Category::House), item::Kind::Property);
        assert_eq!(Category::from(item::Kind::Property), Category::House);
        for kind in item::Kind::ALL {
            assert_eq!(item::Kind::from(Category::from(*kind)), *kind);
        }
        assert_eq!(Category::from_str("House").unwrap(), Category::House);
        assert!(Category::from_str("Property").is_err());
    }

    #[test]
    fn prefers_full_listing() {
        let seller = user::Id::new();
        let short = summary(Category::House, seller);

        let mut catalog = Catalog::new();
        let (owner, snapshot) = catalog.resolve(Category::House, &short);
        assert_eq!(owner, seller);
        assert_eq!(snapshot.images, vec!["https://img.example/1.jpg"]);
        assert!(snapshot.description.is_empty());

        catalog.upsert(Listing {
            summary: short.clone(),
            images: vec!["a.jpg".into(), "b.jpg".into()],
            description: "By the lake".into(),
            location: "Riga".into(),
        });
        let (_, snapshot) = catalog.resolve(Category::House, &short);
        assert_eq!(snapshot.images.len(), 2);
        assert_eq!(snapshot.location, "Riga");

        let (_, snapshot) = catalog.resolve(Category::Land, &short);
        assert!(snapshot.location.is_empty());
    }
}
