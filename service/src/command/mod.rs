//! [`Command`] definition.

pub mod authorize_user_session;
pub mod create_deal;
pub mod delete_deal;
pub mod update_deal_status;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_user_session::AuthorizeUserSession, create_deal::CreateDeal,
    delete_deal::DeleteDeal, update_deal_status::UpdateDealStatus,
};
