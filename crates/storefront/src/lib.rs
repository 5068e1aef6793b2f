//! Bazaar storefront client state.
//!
//! Keeps client-side mirrors of the cart and wishlist consistent with the
//! remote Gateway, caches catalog reads, and publishes user-facing notices
//! for every change. Start from [`Storefront`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod state;
pub mod sync;
pub mod telemetry;

pub use error::{Result, SyncError};
pub use state::Storefront;
