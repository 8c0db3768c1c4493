//! Case Router — assigns support cases to routing targets by matching the
//! first message's TO/CC recipients against configured rules.

pub mod cache;
pub mod config;
pub mod error;
pub mod routing;
pub mod store;
