//! Multiplexed long-poll client for load-testing consoles.
//!
//! The [`poller`] module is the library surface: one task owns the
//! `{key: token}` registry and keeps a single poll request outstanding for
//! every live key, fanning updates out to per-key listeners. The remaining
//! modules back the `livepoll` command-line follower.
pub mod args;
pub mod config;
pub mod entry;
pub mod error;
mod logger;
pub mod output;
pub mod poller;
mod shutdown;
