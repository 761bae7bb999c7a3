//! audioshelf core types
//!
//! Identity keys, parsed folder names, timestamps and the error taxonomy shared
//! by the reconciliation crates.

pub mod error;
pub mod types;

pub use error::{AppError, ErrorSeverity, RecoveryAction, Result};
pub use types::{Identity, IdentityError, IdentityKind, ParsedName, Timestamp, IDENTITY_LEN};
