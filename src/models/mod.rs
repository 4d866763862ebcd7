//! Data models for the movie shelf.
//!
//! These are both the persisted document shape and the REST payloads.

mod movie;
mod user;

pub use movie::*;
pub use user::*;
