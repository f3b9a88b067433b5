//! Upstream dataset sources
//!
//! A source produces the complete province tree in one call. The loader
//! depends only on the [`DivisionSource`] trait so tests can substitute a
//! canned or failing source without a network.

pub mod open_api;
pub mod traits;

pub use open_api::OpenApiDivisionSource;
pub use traits::DivisionSource;
