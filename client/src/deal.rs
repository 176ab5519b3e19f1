//! Client-side [`Deal`] representation.

use common::DateTime;
use serde::{Deserialize, Serialize};
use service::domain::{deal, item, user, viewer, Viewer};

use crate::catalog::Category;

/// [`Deal`] as kept by the client.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    /// ID of this [`Deal`].
    pub id: deal::Id,

    /// Human-readable short code, empty until confirmed by the server.
    pub code: String,

    /// Buying [`Party`].
    pub buyer: Party,

    /// Selling [`Party`].
    pub seller: Party,

    /// ID of the listing this [`Deal`] is about.
    pub item: item::Id,

    /// [`Category`] of the listing.
    pub category: Category,

    /// State of the listing when this [`Deal`] was opened.
    pub snapshot: Snapshot,

    /// Message of the buyer.
    pub message: String,

    /// Free-form classification.
    pub tag: String,

    /// Reason this [`Deal`] was cancelled for.
    pub cancellation_reason: Option<String>,

    /// Current lifecycle status.
    pub status: deal::Status,

    /// Revision last seen from the server.
    pub revision: deal::Revision,

    /// When this [`Deal`] was created.
    pub created_at: DateTime,

    /// When this [`Deal`] was last updated.
    pub updated_at: DateTime,

    /// When this [`Deal`] was completed.
    pub completed_at: Option<DateTime>,

    /// When this [`Deal`] was cancelled.
    pub cancelled_at: Option<DateTime>,
}

/// Uniqueness key of a [`Deal`].
pub type Key = (user::Id, user::Id, item::Id, Category);

impl Deal {
    /// Creates a local draft of a [`Deal`] not yet known to the server.
    #[must_use]
    pub fn draft(
        buyer: user::Id,
        seller: user::Id,
        item: item::Id,
        category: Category,
        snapshot: Snapshot,
        message: String,
    ) -> Self {
        let now = DateTime::now();
        Self {
            id: deal::Id::new(),
            code: String::new(),
            buyer: Party::unresolved(buyer),
            seller: Party::unresolved(seller),
            item,
            category,
            snapshot,
            message,
            tag: String::new(),
            cancellation_reason: None,
            status: deal::Status::Pending,
            revision: deal::Revision::INITIAL,
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancelled_at: None,
        }
    }

    /// Returns the uniqueness [`Key`] of this [`Deal`].
    #[must_use]
    pub fn key(&self) -> Key {
        (self.buyer.id, self.seller.id, self.item, self.category)
    }

    /// Indicates whether the provided [`Viewer`] may see this [`Deal`].
    #[must_use]
    pub fn is_visible_to(&self, viewer: &Viewer) -> bool {
        viewer::is_visible(
            viewer.role,
            viewer.id,
            self.buyer.id,
            self.seller.id,
        )
    }

    /// Applies the provided [`Patch`], keeping local values for the fields it
    /// leaves out.
    pub fn apply(&mut self, patch: Patch) {
        let Patch {
            status,
            revision,
            cancellation_reason,
            updated_at,
            completed_at,
            cancelled_at,
        } = patch;

        if let Some(status) = status {
            self.status = status;
        }
        if let Some(revision) = revision {
            self.revision = revision;
        }
        if let Some(reason) = cancellation_reason {
            self.cancellation_reason = Some(reason);
        }
        if let Some(at) = updated_at {
            self.updated_at = at;
        }
        if let Some(at) = completed_at {
            self.completed_at = Some(at);
        }
        if let Some(at) = cancelled_at {
            self.cancelled_at = Some(at);
        }
    }
}

/// Participant of a [`Deal`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Party {
    /// ID of the user.
    pub id: user::Id,

    /// Display name, empty until resolved by the server.
    pub name: String,

    /// Contact email.
    pub email: Option<String>,

    /// Contact phone.
    pub phone: Option<String>,
}

impl Party {
    /// Creates a [`Party`] whose details are not known yet.
    #[must_use]
    pub fn unresolved(id: user::Id) -> Self {
        Self {
            id,
            name: String::new(),
            email: None,
            phone: None,
        }
    }
}

/// State of a listing captured when a [`Deal`] was opened.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Snapshot {
    /// Title of the listing.
    pub title: String,

    /// Decimal price of the listing.
    pub price: String,

    /// Image URLs of the listing.
    pub images: Vec<String>,

    /// Description of the listing.
    pub description: String,

    /// Location of the listing.
    pub location: String,
}

/// Partial update of a [`Deal`].
///
/// [`None`] fields leave the local value untouched.
#[derive(Clone, Debug, Default)]
pub struct Patch {
    /// New status.
    pub status: Option<deal::Status>,

    /// New revision.
    pub revision: Option<deal::Revision>,

    /// New cancellation reason.
    pub cancellation_reason: Option<String>,

    /// New update time.
    pub updated_at: Option<DateTime>,

    /// New completion time.
    pub completed_at: Option<DateTime>,

    /// New cancellation time.
    pub cancelled_at: Option<DateTime>,
}

impl From<&Deal> for Patch {
    fn from(deal: &Deal) -> Self {
        Self {
            status: Some(deal.status),
            revision: Some(deal.revision),
            cancellation_reason: deal.cancellation_reason.clone(),
            updated_at: Some(deal.updated_at),
            completed_at: deal.completed_at,
            cancelled_at: deal.cancelled_at,
        }
    }
}

#[cfg(test)]
mod spec {
    use service::domain::{deal, item, user, Viewer};

    use super::{Deal, Patch, Snapshot};
    use crate::catalog::Category;

    fn deal() -> Deal {
        Deal::draft(
            user::Id::new(),
            user::Id::new(),
            item::Id::new(),
            Category::Car,
            Snapshot::default(),
            "Still available?".into(),
        )
    }

    #[test]
    fn patch_keeps_absent_fields() {
        let mut d = deal();
        d.cancellation_reason = Some("stale".into());
        let created = d.created_at;

        d.apply(Patch {
            status: Some(deal::Status::Accepted),
            ..Patch::default()
        });

        assert_eq!(d.status, deal::Status::Accepted);
        assert_eq!(d.revision, deal::Revision::INITIAL);
        assert_eq!(d.cancellation_reason.as_deref(), Some("stale"));
        assert_eq!(d.created_at, created);
        assert_eq!(d.message, "Still available?");
    }

    #[test]
    fn mirrors_server_visibility() {
        let d = deal();
        let stranger = user::Id::new();

        assert!(d.is_visible_to(&Viewer {
            id: d.buyer.id,
            role: user::Role::User,
        }));
        assert!(d.is_visible_to(&Viewer {
            id: d.seller.id,
            role: user::Role::User,
        }));
        assert!(!d.is_visible_to(&Viewer {
            id: stranger,
            role: user::Role::User,
        }));
        assert!(d.is_visible_to(&Viewer {
            id: stranger,
            role: user::Role::Admin,
        }));
    }
}
