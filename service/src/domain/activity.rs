//! [`Activity`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, DateTimeOf};
use derive_more::{Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::{deal, user, Deal};
#[cfg(doc)]
use crate::domain::User;

/// Append-only audit record of something happened to an entity.
#[derive(Clone, Debug)]
pub struct Activity {
    /// ID of this [`Activity`].
    pub id: Id,

    /// ID of the [`User`] who performed this [`Activity`].
    pub actor_id: user::Id,

    /// [`Action`] performed.
    pub action: Action,

    /// [`EntityType`] the [`Action`] was performed upon.
    pub entity_type: EntityType,

    /// ID of the entity the [`Action`] was performed upon.
    pub entity_id: Uuid,

    /// Human-readable description of this [`Activity`].
    pub description: String,

    /// [`DateTime`] when this [`Activity`] happened.
    pub timestamp: DateTimeOf<Self>,

    /// Arbitrary JSON object describing this [`Activity`] in details.
    pub metadata: serde_json::Value,
}

impl Activity {
    /// Records the creation of the provided [`Deal`].
    #[must_use]
    pub fn deal_created(actor_id: user::Id, deal: &Deal) -> Self {
        Self::on_deal(
            actor_id,
            Action::DealCreated,
            deal,
            format!("Deal {} created", deal.code),
            json!({
                "dealId": deal.code.to_string(),
                "itemId": deal.item.id,
                "itemType": deal.item.kind,
                "buyerId": deal.buyer.id,
                "sellerId": deal.seller.id,
            }),
        )
    }

    /// Records a [`deal::Status`] change of the provided [`Deal`].
    #[must_use]
    pub fn deal_status_changed(
        actor_id: user::Id,
        deal: &Deal,
        from: deal::Status,
    ) -> Self {
        Self::on_deal(
            actor_id,
            Action::DealStatusChanged,
            deal,
            format!("Deal {} moved from {from} to {}", deal.code, deal.status),
            json!({
                "dealId": deal.code.to_string(),
                "from": from,
                "to": deal.status,
                "revision": deal.revision,
                "cancellationReason": deal
                    .cancellation_reason
                    .as_ref()
                    .map(ToString::to_string),
            }),
        )
    }

    /// Records a removal of the provided [`Deal`].
    #[must_use]
    pub fn deal_deleted(actor_id: user::Id, deal: &Deal) -> Self {
        Self::on_deal(
            actor_id,
            Action::DealDeleted,
            deal,
            format!("Deal {} deleted", deal.code),
            json!({
                "dealId": deal.code.to_string(),
                "status": deal.status,
            }),
        )
    }

    fn on_deal(
        actor_id: user::Id,
        action: Action,
        deal: &Deal,
        description: String,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Id::new(),
            actor_id,
            action,
            entity_type: EntityType::Deal,
            entity_id: deal.id.into(),
            description,
            timestamp: DateTimeOf::now(),
            metadata,
        }
    }
}

/// ID of an [`Activity`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
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
    #[doc = "Action recorded by an [`Activity`]."]
    enum Action {
        #[doc = "[`Deal`] was opened."]
        #[wire("DEAL_CREATED")]
        DealCreated = 1,

        #[doc = "[`Deal`] changed its status."]
        #[wire("DEAL_STATUS_CHANGED")]
        DealStatusChanged = 2,

        #[doc = "[`Deal`] was removed."]
        #[wire("DEAL_DELETED")]
        DealDeleted = 3,
    }
}

define_kind! {
    #[doc = "Type of an entity an [`Activity`] is recorded upon."]
    enum EntityType {
        #[doc = "[`Deal`]."]
        #[wire("Deal")]
        Deal = 1,
    }
}

#[cfg(test)]
mod spec {
    use crate::domain::{deal, user};

    use super::{Action, Activity, EntityType};

    #[test]
    fn records_status_change() {
        let mut deal = deal::spec::deal();
        let actor = user::Id::new();
        deal.transition(deal::Status::Accepted, None).unwrap();

        let activity =
            Activity::deal_status_changed(actor, &deal, deal::Status::Pending);

        assert_eq!(activity.action, Action::DealStatusChanged);
        assert_eq!(activity.entity_type, EntityType::Deal);
        assert_eq!(activity.actor_id, actor);
        assert_eq!(activity.metadata["from"], "pending");
        assert_eq!(activity.metadata["to"], "accepted");
        assert_eq!(activity.metadata["revision"], 2);
        assert_eq!(activity.metadata["dealId"], deal.code.to_string());
    }
}
