//! Domain types shared by every audioshelf crate
//!
//! - `identity`: normalized ASIN / ISBN-10 keys
//! - `name`: components parsed out of a folder name
//! - `common`: timestamps

mod common;
mod identity;
mod name;

pub use common::Timestamp;
pub use identity::{Identity, IdentityError, IdentityKind, IDENTITY_LEN};
pub use name::ParsedName;
