//! Catalog [`Item`] definitions.
//!
//! Catalog listings are managed elsewhere. Deals only reference them and keep
//! an immutable [`Snapshot`] of what the buyer saw.

use common::define_kind;
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user;
#[cfg(doc)]
use crate::domain::{Deal, User};

/// Catalog listing a [`Deal`] may be opened on.
#[derive(Clone, Debug)]
pub struct Item {
    /// ID of this [`Item`].
    pub id: Id,

    /// [`Kind`] of this [`Item`].
    pub kind: Kind,

    /// ID of the [`User`] listing this [`Item`].
    pub owner_id: user::Id,

    /// [`Title`] of this [`Item`].
    pub title: Title,

    /// [`Price`] of this [`Item`].
    pub price: Price,

    /// [`ImageUrl`]s of this [`Item`].
    pub images: Vec<ImageUrl>,

    /// [`Description`] of this [`Item`].
    pub description: Description,

    /// [`Location`] of this [`Item`].
    pub location: Location,
}

impl Item {
    /// Returns the [`Ref`] pointing to this [`Item`].
    #[must_use]
    pub fn to_ref(&self) -> Ref {
        Ref {
            id: self.id,
            kind: self.kind,
        }
    }

    /// Captures the current state of this [`Item`] as a [`Snapshot`].
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            title: self.title.clone(),
            price: self.price,
            images: self.images.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
        }
    }
}

/// Reference to an [`Item`] of a specific [`Kind`].
///
/// [`Item`] IDs are only unique within their [`Kind`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Ref {
    /// ID of the referenced [`Item`].
    pub id: Id,

    /// [`Kind`] of the referenced [`Item`].
    pub kind: Kind,
}

/// Denormalized state of an [`Item`] captured when a [`Deal`] is created.
///
/// Stays intact when the [`Item`] is edited or removed afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Snapshot {
    /// [`Title`] of the [`Item`].
    pub title: Title,

    /// [`Price`] of the [`Item`].
    pub price: Price,

    /// [`ImageUrl`]s of the [`Item`].
    pub images: Vec<ImageUrl>,

    /// [`Description`] of the [`Item`].
    pub description: Description,

    /// [`Location`] of the [`Item`].
    pub location: Location,
}

/// ID of an [`Item`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

define_kind! {
    #[doc = "Kind of an [`Item`]."]
    enum Kind {
        #[doc = "Vehicle."]
        #[wire("Car")]
        Car = 1,

        #[doc = "House or any other real estate."]
        #[wire("Property")]
        Property = 2,

        #[doc = "Land parcel."]
        #[wire("Land")]
        Land = 3,

        #[doc = "Heavy machinery."]
        #[wire("Machine")]
        Machine = 4,
    }
}

/// Title of an [`Item`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Title(String);

impl Title {
    /// Creates a new [`Title`] if the given `title` is valid.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Option<Self> {
        let title = title.into();
        (title.trim() == title && !title.is_empty() && title.len() <= 512)
            .then_some(Self(title))
    }
}

impl FromStr for Title {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Title`")
    }
}

/// Asking price of an [`Item`].
#[derive(Clone, Copy, Debug, Display, Eq, Into, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Price(Decimal);

impl Price {
    /// Creates a new [`Price`] if the given `amount` is not negative.
    #[must_use]
    pub fn new(amount: Decimal) -> Option<Self> {
        (!amount.is_sign_negative()).then_some(Self(amount))
    }

    /// Returns the amount of this [`Price`].
    #[must_use]
    pub fn amount(self) -> Decimal {
        self.0
    }
}

/// URL of an [`Item`] image.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct ImageUrl(String);

impl ImageUrl {
    /// Creates a new [`ImageUrl`] if the given `url` is valid.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Option<Self> {
        let url = url.into();
        (!url.is_empty() && !url.contains(char::is_whitespace))
            .then_some(Self(url))
    }
}

/// Description of an [`Item`].
///
/// May be empty.
#[derive(AsRef, Clone, Debug, Default, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Description(String);

impl Description {
    /// Creates a new [`Description`] if the given `text` is not too long.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        (text.len() <= 8192).then_some(Self(text))
    }
}

/// Human-readable location of an [`Item`].
///
/// May be empty.
#[derive(AsRef, Clone, Debug, Default, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Location(String);

impl Location {
    /// Creates a new [`Location`] if the given `text` is not too long.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        (text.len() <= 512).then_some(Self(text))
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{ImageUrl, Kind, Price, Title};

    #[test]
    fn parses_wire_kind() {
        assert_eq!(Kind::from_str("Car").unwrap(), Kind::Car);
        assert_eq!(Kind::from_str("Property").unwrap(), Kind::Property);
        assert_eq!(Kind::from_str("Land").unwrap(), Kind::Land);
        assert_eq!(Kind::from_str("Machine").unwrap(), Kind::Machine);

        assert!(Kind::from_str("House").is_err());
        assert!(Kind::from_str("car").is_err());
    }

    #[test]
    fn validates_fields() {
        assert!(Title::new("Red sedan").is_some());
        assert!(Title::new("").is_none());
        assert!(Title::new(" padded ").is_none());

        assert!(Price::new(Decimal::new(1_999_900, 2)).is_some());
        assert!(Price::new(Decimal::ZERO).is_some());
        assert!(Price::new(Decimal::new(-1, 0)).is_none());

        assert!(ImageUrl::new("https://cdn.example.com/1.jpg").is_some());
        assert!(ImageUrl::new("not a url").is_none());
    }
}
