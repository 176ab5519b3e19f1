//! Domain definitions.

pub mod activity;
pub mod deal;
pub mod item;
pub mod user;
pub mod viewer;

pub use self::{
    activity::Activity, deal::Deal, item::Item, user::User, viewer::Viewer,
};
