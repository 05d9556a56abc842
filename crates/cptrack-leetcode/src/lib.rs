//! LeetCode platform adapter: GraphQL client and conversion into the shared
//! domain types.

pub mod client;
pub mod error;
pub mod normalize;
pub mod types;

pub use client::LeetcodeClient;
pub use error::LeetcodeError;
