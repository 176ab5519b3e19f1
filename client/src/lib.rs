//! Client keeping a local collection of deals consistent with the server.
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod cache;
pub mod cart;
pub mod catalog;
pub mod deal;
pub mod error;
pub mod remote;
pub mod store;
pub mod wire;

pub use self::{
    cache::DealCache,
    cart::Cart,
    catalog::Catalog,
    deal::Deal,
    error::Error,
    remote::{Http, Remote},
    store::DealStore,
};
