//! Wire format of the deal HTTP API.
//!
//! Everything the server vocabulary differs in is translated here, so the
//! rest of the client deals with normalized values only.

use common::DateTime;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use service::domain::{deal, item, user};

use crate::{
    deal::{Party, Snapshot},
    Deal, Error,
};

/// Response envelope of the HTTP API.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// Either `success` or `error`.
    pub status: String,

    /// Payload of a successful response.
    pub data: Option<T>,

    /// Error code of a failed response.
    pub code: Option<String>,

    /// Human-readable message.
    pub message: Option<String>,
}

/// Decodes the provided response `body` received with the provided HTTP
/// `status`.
///
/// # Errors
///
/// - [`Error::NoResponse`] if the `body` is empty or carries no payload.
/// - [`Error::Decode`] if the `body` is not a valid [`Envelope`].
/// - [`Error::Rejected`] if the server reported a failure.
pub fn decode<T: DeserializeOwned>(
    status: u16,
    body: &[u8],
) -> Result<T, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::NoResponse);
    }

    let envelope: Envelope<T> = serde_json::from_slice(body)?;
    if !(200..300).contains(&status) || envelope.status != "success" {
        return Err(Error::Rejected {
            status,
            code: envelope.code.unwrap_or_else(|| "UNKNOWN".into()),
            message: envelope
                .message
                .unwrap_or_else(|| "Request failed".into()),
        });
    }

    envelope.data.ok_or(Error::NoResponse)
}

/// [`Deal`] as sent by the server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDeal {
    id: deal::Id,
    deal_id: String,
    buyer: Party,
    seller: Party,
    item: item::Id,
    item_type: item::Kind,
    item_snapshot: Snapshot,
    message: String,
    deal_type: String,
    #[serde(default)]
    cancellation_reason: Option<String>,
    status: deal::Status,
    revision: deal::Revision,
    created_at: DateTime,
    updated_at: DateTime,
    #[serde(default)]
    completed_at: Option<DateTime>,
    #[serde(default)]
    cancelled_at: Option<DateTime>,
}

impl From<WireDeal> for Deal {
    fn from(w: WireDeal) -> Self {
        Self {
            id: w.id,
            code: w.deal_id,
            buyer: w.buyer,
            seller: w.seller,
            item: w.item,
            category: w.item_type.into(),
            snapshot: w.item_snapshot,
            message: w.message,
            tag: w.deal_type,
            cancellation_reason: w.cancellation_reason,
            status: w.status,
            revision: w.revision,
            created_at: w.created_at,
            updated_at: w.updated_at,
            completed_at: w.completed_at,
            cancelled_at: w.cancelled_at,
        }
    }
}

/// Payload carrying a single [`WireDeal`].
#[derive(Debug, Deserialize)]
pub struct One {
    /// The [`WireDeal`].
    pub deal: WireDeal,
}

/// Payload carrying multiple [`WireDeal`]s.
#[derive(Debug, Deserialize)]
pub struct Many {
    /// The [`WireDeal`]s.
    pub deals: Vec<WireDeal>,
}

/// Body of a deal creation request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    /// ID of the listing.
    pub item: item::Id,

    /// Kind of the listing, in server vocabulary.
    pub item_type: item::Kind,

    /// ID of the buying user.
    pub buyer: user::Id,

    /// ID of the selling user.
    pub seller: user::Id,

    /// Message of the buyer.
    pub message: String,

    /// Free-form classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_type: Option<String>,
}

/// Body of a deal status update request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    /// Status to move the deal into.
    pub status: deal::Status,

    /// Reason of the cancellation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,

    /// Revision the update is based on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<deal::Revision>,
}

#[cfg(test)]
mod spec {
    use serde_json::json;
    use service::domain::{deal, item, user};

    use super::{decode, CreateRequest, Many, One};
    use crate::{catalog::Category, Deal, Error};

    fn body(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    fn wire_deal(status: &str) -> serde_json::Value {
        json!({
            "id": "5f0c3c1e-0d6c-4b7e-9a57-0f1f3a2b4c5d",
            "dealId": "DL-4Q0ZK7M2",
            "buyer": {
                "id": "0b8f6f7e-3b1c-4a55-8d25-6a2a3f1c9e10",
                "name": "Ann",
                "email": null,
                "phone": null,
            },
            "seller": {
                "id": "7c1d2e3f-4a5b-4c6d-8e9f-0a1b2c3d4e5f",
                "name": "Bob",
                "email": "bob@example.com",
                "phone": null,
            },
            "item": "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d",
            "itemType": "Property",
            "itemSnapshot": {
                "title": "Cottage",
                "price": "120000.00",
                "images": [],
                "description": "",
                "location": "Riga",
            },
            "message": "Hi",
            "dealType": "standard",
            "status": status,
            "revision": 2,
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-02T10:00:00Z",
        })
    }

    #[test]
    fn normalizes_server_vocabulary() {
        let many: Many = decode(
            200,
            &body(&json!({
                "status": "success",
                "data": {"deals": [wire_deal("approved")]},
            })),
        )
        .unwrap();
        let d = Deal::from(many.deals.into_iter().next().unwrap());

        assert_eq!(d.category, Category::House);
        assert_eq!(d.status, deal::Status::Accepted);
        assert_eq!(d.revision, deal::Revision::new(2).unwrap());
        assert_eq!(d.code, "DL-4Q0ZK7M2");
        assert_eq!(d.seller.email.as_deref(), Some("bob@example.com"));
        assert_eq!(d.completed_at, None);
    }

    #[test]
    fn rejects_zero_revision() {
        let mut d = wire_deal("pending");
        d["revision"] = json!(0);

        let res = decode::<One>(
            200,
            &body(&json!({"status": "success", "data": {"deal": d}})),
        );

        assert!(matches!(res, Err(Error::Decode(_))), "{res:?}");
    }

    #[test]
    fn sends_server_vocabulary() {
        let req = CreateRequest {
            item: item::Id::new(),
            item_type: Category::House.into(),
            buyer: user::Id::new(),
            seller: user::Id::new(),
            message: "Hi".into(),
            deal_type: None,
        };
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["itemType"], "Property");
        assert!(json.get("dealType").is_none());
    }

    #[test]
    fn surfaces_rejection() {
        let err = decode::<Many>(
            409,
            &body(&json!({
                "status": "error",
                "code": "CONFLICT",
                "message": "Deal was changed by someone else",
            })),
        )
        .unwrap_err();

        assert!(
            matches!(
                &err,
                Error::Rejected { status: 409, code, .. } if code == "CONFLICT",
            ),
            "{err}",
        );
    }

    #[test]
    fn absent_body_is_failure() {
        assert!(matches!(decode::<Many>(200, b""), Err(Error::NoResponse)));
        assert!(matches!(
            decode::<Many>(200, &body(&json!({"status": "success"}))),
            Err(Error::NoResponse),
        ));
        assert!(matches!(
            decode::<Many>(502, b"<html>Bad Gateway</html>"),
            Err(Error::Decode(_)),
        ));
    }
}
