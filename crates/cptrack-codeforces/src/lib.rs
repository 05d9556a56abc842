//! Codeforces platform adapter: typed API client, topic derivation and
//! conversion into the shared domain types.

pub mod client;
pub mod error;
pub mod normalize;
mod retry;
pub mod topics;
pub mod types;

pub use client::CodeforcesClient;
pub use error::CodeforcesError;
