//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;

#[cfg(test)]
mod tests;

pub use cli::FollowArgs;
pub use types::{KeySpec, OutputFormat, PositiveU64};

pub(crate) use defaults::DEFAULT_USER_AGENT;
pub(crate) use parsers::{parse_header, parse_key_spec};
