//! [`Viewer`] definitions.

use serde::{Deserialize, Serialize};

use crate::domain::{user, Deal};
#[cfg(doc)]
use crate::domain::User;

/// Authenticated caller of a query or a command.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Viewer {
    /// ID of the calling [`User`].
    pub id: user::Id,

    /// [`user::Role`] of the calling [`User`].
    pub role: user::Role,
}

impl Viewer {
    /// Indicates whether this [`Viewer`] is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == user::Role::Admin
    }

    /// Indicates whether this [`Viewer`] is allowed to see the provided
    /// [`Deal`].
    #[must_use]
    pub fn can_see(&self, deal: &Deal) -> bool {
        is_visible(self.role, self.id, deal.buyer.id, deal.seller.id)
    }

    /// Indicates whether this [`Viewer`] is the seller of the provided
    /// [`Deal`].
    #[must_use]
    pub fn is_seller_of(&self, deal: &Deal) -> bool {
        self.id == deal.seller.id
    }

    /// Indicates whether this [`Viewer`] is the buyer of the provided
    /// [`Deal`].
    #[must_use]
    pub fn is_buyer_of(&self, deal: &Deal) -> bool {
        self.id == deal.buyer.id
    }
}

/// Role-scoped visibility of a [`Deal`].
///
/// Administrators see everything, anybody else sees only the [`Deal`]s they
/// buy or sell.
#[must_use]
pub fn is_visible(
    role: user::Role,
    viewer_id: user::Id,
    buyer_id: user::Id,
    seller_id: user::Id,
) -> bool {
    match role {
        user::Role::Admin => true,
        user::Role::User => viewer_id == buyer_id || viewer_id == seller_id,
    }
}

#[cfg(test)]
mod spec {
    use crate::domain::{deal, user};

    use super::{is_visible, Viewer};

    #[test]
    fn admin_sees_everything() {
        let (a, b, c) = (user::Id::new(), user::Id::new(), user::Id::new());

        assert!(is_visible(user::Role::Admin, a, b, c));
        assert!(is_visible(user::Role::Admin, a, a, c));
    }

    #[test]
    fn user_sees_only_own() {
        let (a, b, c) = (user::Id::new(), user::Id::new(), user::Id::new());

        assert!(is_visible(user::Role::User, a, a, b));
        assert!(is_visible(user::Role::User, b, a, b));
        assert!(!is_visible(user::Role::User, c, a, b));
    }

    #[test]
    fn viewer_checks_deal() {
        let deal = deal::spec::deal();
        let buyer = Viewer {
            id: deal.buyer.id,
            role: user::Role::User,
        };
        let stranger = Viewer {
            id: user::Id::new(),
            role: user::Role::User,
        };
        let admin = Viewer {
            id: user::Id::new(),
            role: user::Role::Admin,
        };

        assert!(buyer.can_see(&deal));
        assert!(buyer.is_buyer_of(&deal));
        assert!(!buyer.is_seller_of(&deal));
        assert!(!stranger.can_see(&deal));
        assert!(admin.can_see(&deal));
        assert!(admin.is_admin());
    }
}
