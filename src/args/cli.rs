use clap::Parser;
use std::time::Duration;

use super::defaults::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_DELAY};
use super::parsers::{parse_duration_arg, parse_header, parse_key_spec, parse_positive_u64};
use super::types::{KeySpec, OutputFormat, PositiveU64};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Follow live values from a load-testing console over a single multiplexed long poll."
)]
pub struct FollowArgs {
    /// Console base URL (the poll endpoint is <url>/ui/poll)
    #[arg(long, short)]
    pub url: Option<String>,

    /// Key to follow, optionally with a resume token as 'key=token'; the token follows the last '=' (repeatable)
    #[arg(long = "key", short = 'k', value_parser = parse_key_spec)]
    pub keys: Vec<KeySpec>,

    /// HTTP headers in 'Key: Value' format (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Client-side timeout for one poll (supports ms/s/m/h)
    #[arg(long = "request-timeout", default_value = DEFAULT_REQUEST_TIMEOUT, value_parser = parse_duration_arg)]
    pub request_timeout: Duration,

    /// Delay before retrying after a failed poll (supports ms/s/m/h)
    #[arg(long = "retry-delay", default_value = DEFAULT_RETRY_DELAY, value_parser = parse_duration_arg)]
    pub retry_delay: Duration,

    /// Output format for updates
    #[arg(long = "output-format", default_value = "text", ignore_case = true)]
    pub output_format: OutputFormat,

    /// Exit after printing this many updates
    #[arg(long = "max-updates", value_parser = parse_positive_u64)]
    pub max_updates: Option<PositiveU64>,

    /// Path to config file (TOML or JSON)
    #[arg(long, short)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Disable colored log output
    #[arg(long = "no-color")]
    pub no_color: bool,
}
