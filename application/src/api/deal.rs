//! [`Deal`]-related HTTP API definitions.

use std::collections::BTreeMap;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query,
    },
    response::IntoResponse,
    Json,
};
use common::Handler as _;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, CreateDeal, DeleteDeal, UpdateDealStatus},
    domain::{self, deal, item, user, Viewer},
    query,
    read::deal::list,
};
use uuid::Uuid;

use crate::{api::Envelope, define_error, AsError, Context, Error};

/// Wire representation of a [`domain::Deal`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    /// Unique identifier of the [`domain::Deal`].
    pub id: deal::Id,

    /// Human-readable short code of the [`domain::Deal`].
    pub deal_id: String,

    /// Buying [`Party`].
    pub buyer: Party,

    /// Selling [`Party`].
    pub seller: Party,

    /// ID of the catalog item.
    pub item: item::Id,

    /// Kind of the catalog item.
    pub item_type: item::Kind,

    /// State of the catalog item when the [`domain::Deal`] was opened.
    pub item_snapshot: Snapshot,

    /// Message left by the buyer.
    pub message: String,

    /// Tag of the [`domain::Deal`].
    pub deal_type: String,

    /// Reason the [`domain::Deal`] was cancelled for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,

    /// Current status.
    pub status: deal::Status,

    /// Revision to pass back for lost-update detection.
    pub revision: deal::Revision,

    /// When the [`domain::Deal`] was created.
    pub created_at: deal::CreationDateTime,

    /// When the [`domain::Deal`] was last updated.
    pub updated_at: deal::UpdateDateTime,

    /// When the [`domain::Deal`] was completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<deal::CompletionDateTime>,

    /// When the [`domain::Deal`] was cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<deal::CancellationDateTime>,
}

impl From<domain::Deal> for Deal {
    fn from(deal: domain::Deal) -> Self {
        let domain::Deal {
            id,
            code,
            buyer,
            seller,
            item,
            snapshot,
            message,
            tag,
            cancellation_reason,
            status,
            revision,
            created_at,
            updated_at,
            completed_at,
            cancelled_at,
        } = deal;

        Self {
            id,
            deal_id: code.to_string(),
            buyer: buyer.into(),
            seller: seller.into(),
            item: item.id,
            item_type: item.kind,
            item_snapshot: snapshot.into(),
            message: message.to_string(),
            deal_type: tag.to_string(),
            cancellation_reason: cancellation_reason.map(|r| r.to_string()),
            status,
            revision,
            created_at,
            updated_at,
            completed_at,
            cancelled_at,
        }
    }
}

/// Wire representation of a [`deal::Party`].
#[derive(Clone, Debug, Serialize)]
pub struct Party {
    /// ID of the user.
    pub id: user::Id,

    /// Name of the user.
    pub name: String,

    /// Email of the user.
    pub email: Option<String>,

    /// Phone of the user.
    pub phone: Option<String>,
}

impl From<deal::Party> for Party {
    fn from(party: deal::Party) -> Self {
        Self {
            id: party.id,
            name: party.name.to_string(),
            email: party.email.map(|e| e.to_string()),
            phone: party.phone.map(|p| p.to_string()),
        }
    }
}

/// Wire representation of an [`item::Snapshot`].
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    /// Title of the item.
    pub title: String,

    /// Decimal price of the item.
    pub price: String,

    /// Image URLs of the item.
    pub images: Vec<String>,

    /// Description of the item.
    pub description: String,

    /// Location of the item.
    pub location: String,
}

impl From<item::Snapshot> for Snapshot {
    fn from(snapshot: item::Snapshot) -> Self {
        Self {
            title: snapshot.title.to_string(),
            price: snapshot.price.to_string(),
            images: snapshot.images.iter().map(ToString::to_string).collect(),
            description: snapshot.description.to_string(),
            location: snapshot.location.to_string(),
        }
    }
}

/// Single [`Deal`] payload.
#[derive(Debug, Serialize)]
pub struct One {
    /// The [`Deal`].
    pub deal: Deal,
}

/// Multiple [`Deal`]s payload.
#[derive(Debug, Serialize)]
pub struct Many {
    /// The [`Deal`]s.
    pub deals: Vec<Deal>,
}

/// Statistics payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Total number of [`Deal`]s.
    pub total: u64,

    /// Number of [`Deal`]s in each status.
    pub counts_by_status: BTreeMap<deal::Status, u64>,
}

/// Query parameters of the [`list`] endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Substring of the short code to search for.
    pub search: Option<String>,

    /// Exact status to match.
    pub status: Option<String>,

    /// Exact tag to match.
    pub deal_type: Option<String>,

    /// Exact item kind to match.
    pub item_type: Option<String>,

    /// Key to sort by.
    pub sort_by: Option<String>,

    /// Direction to sort in.
    pub sort_order: Option<String>,
}

impl ListParams {
    /// Parses these [`ListParams`] into a [`list::Filter`] and a
    /// [`list::Sort`].
    ///
    /// Empty parameters are ignored.
    ///
    /// # Errors
    ///
    /// If any of the parameters is malformed.
    pub fn parse(self) -> Result<(list::Filter, list::Sort), Error> {
        fn given(p: Option<String>) -> Option<String> {
            p.filter(|v| !v.trim().is_empty())
        }

        let filter = list::Filter {
            search: self.search.as_deref().and_then(list::Search::new),
            status: given(self.status)
                .map(|s| s.parse().map_err(|_| DealError::InvalidStatus))
                .transpose()?,
            tag: given(self.deal_type)
                .map(|t| deal::Tag::new(t).ok_or_else(|| invalid("dealType")))
                .transpose()?,
            item_kind: given(self.item_type)
                .map(|k| k.parse().map_err(|_| DealError::InvalidItemType))
                .transpose()?,
        };

        let default = list::Sort::default();
        let sort = list::Sort {
            key: given(self.sort_by)
                .map(|k| k.parse().map_err(|_| invalid("sortBy")))
                .transpose()?
                .unwrap_or(default.key),
            order: given(self.sort_order)
                .map(|o| o.parse().map_err(|_| invalid("sortOrder")))
                .transpose()?
                .unwrap_or(default.order),
        };

        Ok((filter, sort))
    }
}

/// Request body of the [`create`] endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
    /// ID of the catalog item.
    pub item: Uuid,

    /// Kind of the catalog item.
    pub item_type: String,

    /// ID of the buying user.
    pub buyer: Uuid,

    /// ID of the selling user.
    pub seller: Uuid,

    /// Message of the buyer.
    #[serde(default)]
    pub message: String,

    /// Tag of the deal.
    pub deal_type: Option<String>,
}

impl CreateBody {
    /// Parses this [`CreateBody`] into a [`CreateDeal`] command.
    ///
    /// # Errors
    ///
    /// If any of the fields is malformed.
    pub fn parse(self, initiator: Viewer) -> Result<CreateDeal, Error> {
        let Self {
            item,
            item_type,
            buyer,
            seller,
            message,
            deal_type,
        } = self;

        Ok(CreateDeal {
            buyer_id: buyer.into(),
            seller_id: seller.into(),
            item: item::Ref {
                id: item.into(),
                kind: item_type
                    .parse()
                    .map_err(|_| DealError::InvalidItemType)?,
            },
            message: deal::Message::new(message)
                .ok_or_else(|| invalid("message"))?,
            tag: deal_type
                .filter(|t| !t.trim().is_empty())
                .map(|t| deal::Tag::new(t).ok_or_else(|| invalid("dealType")))
                .transpose()?,
            initiator,
        })
    }
}

/// Request body of the [`update_status`] endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    /// Status to move the deal into.
    pub status: String,

    /// Reason of cancelling the deal.
    pub cancellation_reason: Option<String>,

    /// Revision of the deal the caller has seen.
    pub revision: Option<i32>,
}

impl UpdateBody {
    /// Parses this [`UpdateBody`] into an [`UpdateDealStatus`] command.
    ///
    /// # Errors
    ///
    /// If any of the fields is malformed.
    pub fn parse(
        self,
        deal_id: deal::Id,
        initiator: Viewer,
    ) -> Result<UpdateDealStatus, Error> {
        let Self {
            status,
            cancellation_reason,
            revision,
        } = self;

        Ok(UpdateDealStatus {
            deal_id,
            status: status.parse().map_err(|_| DealError::InvalidStatus)?,
            cancellation_reason: cancellation_reason
                .filter(|r| !r.trim().is_empty())
                .map(|r| {
                    deal::CancellationReason::new(r)
                        .ok_or_else(|| invalid("cancellationReason"))
                })
                .transpose()?,
            expected_revision: revision
                .map(|r| {
                    deal::Revision::new(r).ok_or_else(|| invalid("revision"))
                })
                .transpose()?,
            initiator,
        })
    }
}

/// Creates an [`Error`] about the malformed `field`.
fn invalid(field: &str) -> Error {
    Error::invalid_input(&format!("invalid `{field}`"))
}

/// Parses the provided path segment into a [`deal::Id`].
///
/// Malformed IDs are reported the same way as missing [`Deal`]s.
fn deal_id(raw: &str) -> Result<deal::Id, Error> {
    Uuid::parse_str(raw)
        .map(deal::Id::from)
        .map_err(|_| DealError::NotFound.into())
}

/// Lists [`Deal`]s visible to the caller.
#[tracing::instrument(skip_all, fields(otel.name = "GET /deals"))]
pub async fn list(
    ctx: Context,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, Error> {
    let Query(params) = params.map_err(AsError::into_error)?;
    let (filter, sort) = params.parse()?;

    let deals = ctx
        .service()
        .execute(query::deals::List {
            viewer: ctx.viewer(),
            filter,
            sort,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(Envelope::data(Many {
        deals: deals.into_iter().map(Into::into).collect(),
    })))
}

/// Returns a single [`Deal`] visible to the caller.
#[tracing::instrument(skip_all, fields(otel.name = "GET /deals/:id"))]
pub async fn get(
    ctx: Context,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let deal = ctx
        .service()
        .execute(query::deal::ById {
            id: deal_id(&id)?,
            viewer: ctx.viewer(),
        })
        .await
        .map_err(AsError::into_error)?
        .ok_or(DealError::NotFound)?;

    Ok(Json(Envelope::data(One { deal: deal.into() })))
}

/// Opens a new [`Deal`].
#[tracing::instrument(skip_all, fields(otel.name = "POST /deals"))]
pub async fn create(
    ctx: Context,
    body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(body) = body.map_err(AsError::into_error)?;
    let cmd = body.parse(ctx.viewer())?;

    let deal = ctx
        .service()
        .execute(cmd)
        .await
        .map_err(AsError::into_error)?;

    Ok((
        http::StatusCode::CREATED,
        Json(Envelope::data(One { deal: deal.into() })),
    ))
}

/// Moves a [`Deal`] into another status.
#[tracing::instrument(skip_all, fields(otel.name = "PUT /deals/:id"))]
pub async fn update_status(
    ctx: Context,
    Path(id): Path<String>,
    body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let id = deal_id(&id)?;
    let Json(body) = body.map_err(AsError::into_error)?;
    let cmd = body.parse(id, ctx.viewer())?;

    let deal = ctx
        .service()
        .execute(cmd)
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(Envelope::data(One { deal: deal.into() })))
}

/// Removes a closed [`Deal`].
#[tracing::instrument(skip_all, fields(otel.name = "DELETE /deals/:id"))]
pub async fn delete(
    ctx: Context,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let deal = ctx
        .service()
        .execute(DeleteDeal {
            deal_id: deal_id(&id)?,
            initiator: ctx.viewer(),
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(Envelope::message(format!("Deal {} deleted", deal.code))))
}

/// Returns [`Stats`] over all the [`Deal`]s.
#[tracing::instrument(skip_all, fields(otel.name = "GET /deals/stats"))]
pub async fn stats(ctx: Context) -> Result<impl IntoResponse, Error> {
    let stats = ctx
        .service()
        .execute(query::deals::Stats {
            viewer: ctx.viewer(),
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(Envelope::data(Stats {
        total: stats.total,
        counts_by_status: stats.by_status,
    })))
}

impl AsError for command::create_deal::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::DealExists(_) | Self::DuplicateKey => {
                Some(DealError::Exists.into())
            }
            Self::ItemNotExists(_) => Some(DealError::ItemNotFound.into()),
            Self::UserNotExists(_) => Some(DealError::UserNotFound.into()),
            Self::NotBuyer(_) => Some(DealError::NotBuyer.into()),
            Self::SelfDeal(_) => Some(DealError::SelfDeal.into()),
            Self::NotOwner { .. } => Some(DealError::NotOwner.into()),
        }
    }
}

impl AsError for command::update_deal_status::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::DealNotExists(_) => Some(DealError::NotFound.into()),
            Self::Forbidden { .. } => Some(DealError::Forbidden.into()),
            Self::RevisionMismatch(_) => Some(DealError::Stale.into()),
            Self::Transition(deal::TransitionError::NotAllowed { .. }) => {
                Some(DealError::InvalidTransition.into())
            }
            Self::Transition(
                deal::TransitionError::CancellationReasonRequired,
            ) => Some(DealError::ReasonRequired.into()),
        }
    }
}

impl AsError for command::delete_deal::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::DealActive { .. } => Some(DealError::Active.into()),
            Self::DealNotExists(_) => Some(DealError::NotFound.into()),
            Self::NotAdmin(_) => Some(DealError::NotAdmin.into()),
        }
    }
}

impl AsError for query::deals::StatsError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::NotAdmin(_) => Some(DealError::NotAdmin.into()),
        }
    }
}

define_error! {
    enum DealError {
        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Deal not found"]
        NotFound,

        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Item not found"]
        ItemNotFound,

        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Buyer or seller not found"]
        UserNotFound,

        #[code = "CONFLICT"]
        #[status = CONFLICT]
        #[message = "Deal for this buyer, seller and item already exists"]
        Exists,

        #[code = "CONFLICT"]
        #[status = CONFLICT]
        #[message = "Deal was changed by someone else, reload and retry"]
        Stale,

        #[code = "INVALID_STATUS"]
        #[status = BAD_REQUEST]
        #[message = "Unknown deal status"]
        InvalidStatus,

        #[code = "INVALID_INPUT"]
        #[status = BAD_REQUEST]
        #[message = "Unknown item type"]
        InvalidItemType,

        #[code = "INVALID_INPUT"]
        #[status = BAD_REQUEST]
        #[message = "Cancelling a deal requires a reason"]
        ReasonRequired,

        #[code = "INVALID_INPUT"]
        #[status = BAD_REQUEST]
        #[message = "Buyer and seller must differ"]
        SelfDeal,

        #[code = "INVALID_INPUT"]
        #[status = BAD_REQUEST]
        #[message = "Seller must own the item"]
        NotOwner,

        #[code = "INVALID_STATE"]
        #[status = CONFLICT]
        #[message = "Deal cannot move into the requested status"]
        InvalidTransition,

        #[code = "INVALID_STATE"]
        #[status = CONFLICT]
        #[message = "Active deals cannot be deleted"]
        Active,

        #[code = "FORBIDDEN"]
        #[status = FORBIDDEN]
        #[message = "Not allowed to change this deal"]
        Forbidden,

        #[code = "FORBIDDEN"]
        #[status = FORBIDDEN]
        #[message = "Deals may only be opened by their buyer"]
        NotBuyer,

        #[code = "FORBIDDEN"]
        #[status = FORBIDDEN]
        #[message = "Administrator privileges required"]
        NotAdmin,
    }
}

#[cfg(test)]
mod spec {
    use service::{
        command::{create_deal, update_deal_status::ExecutionError},
        domain::{deal, item, user, Viewer},
        read::deal::list,
    };
    use uuid::Uuid;

    use crate::AsError as _;

    use super::{CreateBody, ListParams, UpdateBody};

    fn viewer() -> Viewer {
        Viewer {
            id: user::Id::new(),
            role: user::Role::User,
        }
    }

    #[test]
    fn parses_list_params() {
        let (filter, sort) = ListParams {
            search: Some(" dl-1 ".into()),
            status: Some("approved".into()),
            item_type: Some("Land".into()),
            sort_by: Some("price".into()),
            sort_order: Some("asc".into()),
            ..ListParams::default()
        }
        .parse()
        .unwrap();

        assert_eq!(filter.search.unwrap().needle(), "DL-1");
        assert_eq!(filter.status, Some(deal::Status::Accepted));
        assert_eq!(filter.item_kind, Some(item::Kind::Land));
        assert_eq!(filter.tag, None);
        assert_eq!(sort.key, list::SortKey::Price);
        assert_eq!(sort.order, list::Order::Asc);
    }

    #[test]
    fn defaults_list_params() {
        let (filter, sort) = ListParams {
            status: Some(String::new()),
            ..ListParams::default()
        }
        .parse()
        .unwrap();

        assert_eq!(filter.status, None);
        assert_eq!(sort, list::Sort::default());
    }

    #[test]
    fn rejects_unknown_status() {
        let err = ListParams {
            status: Some("archived".into()),
            ..ListParams::default()
        }
        .parse()
        .unwrap_err();
        assert_eq!(err.code, "INVALID_STATUS");
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);

        let err = UpdateBody {
            status: "archived".into(),
            cancellation_reason: None,
            revision: None,
        }
        .parse(deal::Id::new(), viewer())
        .unwrap_err();
        assert_eq!(err.code, "INVALID_STATUS");
    }

    #[test]
    fn rejects_client_vocabulary_item_type() {
        let body = |kind: &str| CreateBody {
            item: Uuid::new_v4(),
            item_type: kind.into(),
            buyer: Uuid::new_v4(),
            seller: Uuid::new_v4(),
            message: "Hi".into(),
            deal_type: None,
        };

        let cmd = body("Property").parse(viewer()).unwrap();
        assert_eq!(cmd.item.kind, item::Kind::Property);
        assert_eq!(cmd.tag, None);

        let err = body("House").parse(viewer()).unwrap_err();
        assert_eq!(err.code, "INVALID_INPUT");
    }

    #[test]
    fn blank_reason_is_absent() {
        let cmd = UpdateBody {
            status: "cancelled".into(),
            cancellation_reason: Some("   ".into()),
            revision: Some(2),
        }
        .parse(deal::Id::new(), viewer())
        .unwrap();

        assert!(cmd.cancellation_reason.is_none());
        assert_eq!(cmd.expected_revision, deal::Revision::new(2));
    }

    #[test]
    fn maps_service_errors() {
        let cases = [
            (
                ExecutionError::DealNotExists(deal::Id::new()),
                http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                ExecutionError::RevisionMismatch(deal::Id::new()),
                http::StatusCode::CONFLICT,
                "CONFLICT",
            ),
            (
                ExecutionError::Transition(
                    deal::TransitionError::NotAllowed {
                        from: deal::Status::Completed,
                        to: deal::Status::Pending,
                    },
                ),
                http::StatusCode::CONFLICT,
                "INVALID_STATE",
            ),
            (
                ExecutionError::Transition(
                    deal::TransitionError::CancellationReasonRequired,
                ),
                http::StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
            ),
            (
                ExecutionError::Forbidden {
                    user: user::Id::new(),
                    status: deal::Status::Completed,
                },
                http::StatusCode::FORBIDDEN,
                "FORBIDDEN",
            ),
        ];

        for (err, status, code) in cases {
            let err = err.as_error();
            assert_eq!(err.status_code, status, "{err}");
            assert_eq!(err.code, code, "{err}");
        }
    }

    #[test]
    fn rejects_foreign_seller() {
        let err = create_deal::ExecutionError::NotOwner {
            seller_id: user::Id::new(),
            item: item::Ref {
                id: item::Id::new(),
                kind: item::Kind::Car,
            },
        }
        .as_error();

        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "INVALID_INPUT");
    }
}
