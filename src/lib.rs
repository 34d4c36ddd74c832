mod client;
mod decode;
mod error;
mod logger;
mod protocol;
mod store;
mod types;

pub use client::{HailinClient, HailinClientBuilder};
pub use decode::{decode, partial_record};
pub use error::{Error, Result};
pub use store::{FileTokenStore, TokenStore};
pub use types::*;
