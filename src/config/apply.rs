use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{FollowArgs, PositiveU64, parse_header, parse_key_spec};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

/// Applies configuration values to CLI arguments.
///
/// Values given on the command line win over the config file.
///
/// # Errors
///
/// Returns an error when a config value is invalid.
pub fn apply_config(
    args: &mut FollowArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if !is_cli(matches, "url")
        && let Some(url) = config.url.clone()
    {
        args.url = Some(url);
    }

    if !is_cli(matches, "keys")
        && let Some(keys) = config.keys.as_ref()
    {
        let mut parsed = Vec::with_capacity(keys.len());
        for key in keys {
            parsed.push(
                parse_key_spec(key)
                    .map_err(|err| AppError::config(ConfigError::InvalidKey { source: err }))?,
            );
        }
        args.keys = parsed;
    }

    if !is_cli(matches, "headers")
        && let Some(headers) = config.headers.as_ref()
    {
        let mut parsed = Vec::with_capacity(headers.len());
        for header in headers {
            parsed.push(
                parse_header(header)
                    .map_err(|err| AppError::config(ConfigError::InvalidHeader { source: err }))?,
            );
        }
        args.headers = parsed;
    }

    if !is_cli(matches, "request_timeout")
        && let Some(timeout) = config.request_timeout.as_ref()
    {
        args.request_timeout = timeout.to_duration().map_err(|err| {
            AppError::config(ConfigError::InvalidDuration {
                field: "request_timeout",
                source: err,
            })
        })?;
    }

    if !is_cli(matches, "retry_delay")
        && let Some(delay) = config.retry_delay.as_ref()
    {
        args.retry_delay = delay.to_duration().map_err(|err| {
            AppError::config(ConfigError::InvalidDuration {
                field: "retry_delay",
                source: err,
            })
        })?;
    }

    if !is_cli(matches, "output_format")
        && let Some(format) = config.output_format
    {
        args.output_format = format;
    }

    if !is_cli(matches, "max_updates")
        && let Some(max) = config.max_updates
    {
        args.max_updates = Some(PositiveU64::try_from(max).map_err(|err| {
            AppError::config(ConfigError::ValueTooSmall {
                field: "max_updates",
                source: err,
            })
        })?);
    }

    if !is_cli(matches, "verbose")
        && let Some(verbose) = config.verbose
    {
        args.verbose = verbose;
    }

    if !is_cli(matches, "no_color")
        && let Some(no_color) = config.no_color
    {
        args.no_color = no_color;
    }

    Ok(())
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}
