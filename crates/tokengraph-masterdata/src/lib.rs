//! tokengraph-masterdata: token and address lookup services.
//!
//! Each book is built once per chain and passed by reference to whatever
//! needs it. A lookup never fails: it returns the record, or defaults, plus
//! whether the key was known.

pub mod addresses;
pub mod error;
mod source;
pub mod tokens;

pub use addresses::{AddressBook, AddressInfo, AddressRecord};
pub use error::MasterDataError;
pub use tokens::{token_usage, TokenBook, TokenInfo, TokenRecord, TokenUsage};
