use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};

use super::parsers::{parse_duration, parse_header, parse_key_spec};
use super::{FollowArgs, KeySpec, OutputFormat};
use crate::error::ValidationError;

fn parse(args: &[&str]) -> Result<FollowArgs, String> {
    let matches = FollowArgs::command()
        .try_get_matches_from(args)
        .map_err(|err| format!("parse failed: {}", err))?;
    FollowArgs::from_arg_matches(&matches).map_err(|err| format!("from matches failed: {}", err))
}

#[test]
fn defaults_apply_without_flags() -> Result<(), String> {
    let args = parse(&["livepoll"])?;
    if args.request_timeout != Duration::from_secs(60) {
        return Err(format!("Unexpected timeout: {:?}", args.request_timeout));
    }
    if args.retry_delay != Duration::from_secs(1) {
        return Err(format!("Unexpected retry delay: {:?}", args.retry_delay));
    }
    if args.output_format != OutputFormat::Text || args.max_updates.is_some() {
        return Err("Unexpected output defaults".to_owned());
    }
    if !args.keys.is_empty() || args.url.is_some() {
        return Err("Expected no keys or url".to_owned());
    }
    Ok(())
}

#[test]
fn repeated_keys_keep_order_and_tokens() -> Result<(), String> {
    let args = parse(&[
        "livepoll",
        "-u",
        "http://localhost:6373",
        "-k",
        "sample",
        "--key",
        "threads=12",
        "--output-format",
        "JSON",
        "--max-updates",
        "3",
    ])?;
    let expected = vec![
        KeySpec {
            key: "sample".to_owned(),
            token: None,
        },
        KeySpec {
            key: "threads".to_owned(),
            token: Some("12".to_owned()),
        },
    ];
    if args.keys != expected {
        return Err(format!("Unexpected keys: {:?}", args.keys));
    }
    if args.output_format != OutputFormat::Json {
        return Err("Expected json output".to_owned());
    }
    if args.max_updates.map(|value| value.get()) != Some(3) {
        return Err("Expected max updates 3".to_owned());
    }
    Ok(())
}

#[test]
fn zero_max_updates_is_rejected() -> Result<(), String> {
    if parse(&["livepoll", "--max-updates", "0"]).is_ok() {
        return Err("Expected --max-updates 0 to fail".to_owned());
    }
    Ok(())
}

#[test]
fn key_spec_rejects_empty_parts() -> Result<(), String> {
    match parse_key_spec(" ") {
        Err(ValidationError::EmptyKey) => {}
        other => return Err(format!("Unexpected result: {:?}", other)),
    }
    match parse_key_spec("=7") {
        Err(ValidationError::EmptyKey) => {}
        other => return Err(format!("Unexpected result: {:?}", other)),
    }
    match parse_key_spec("sample=") {
        Err(ValidationError::InvalidKeySpec { value }) if value == "sample=" => Ok(()),
        other => Err(format!("Unexpected result: {:?}", other)),
    }
}

#[test]
fn key_spec_token_follows_last_equals() -> Result<(), String> {
    let spec = parse_key_spec(" a=b =-1").map_err(|err| err.to_string())?;
    if spec.key != "a=b" || spec.token.as_deref() != Some("-1") {
        return Err(format!("Unexpected key entry: {:?}", spec));
    }
    Ok(())
}

#[test]
fn header_requires_colon() -> Result<(), String> {
    let (name, value) = parse_header("X-Test:  yes ").map_err(|err| err.to_string())?;
    if name != "X-Test" || value != "yes" {
        return Err(format!("Unexpected header: {}={}", name, value));
    }
    if parse_header("no-colon").is_ok() {
        return Err("Expected header without colon to fail".to_owned());
    }
    Ok(())
}

#[test]
fn durations_accept_units() -> Result<(), String> {
    let cases = [
        ("250ms", Duration::from_millis(250)),
        ("5", Duration::from_secs(5)),
        ("2m", Duration::from_secs(120)),
        ("1h", Duration::from_secs(3600)),
    ];
    for (input, expected) in cases {
        let parsed = parse_duration(input).map_err(|err| err.to_string())?;
        if parsed != expected {
            return Err(format!("{} parsed as {:?}", input, parsed));
        }
    }
    for bad in ["", "ms", "0s", "5d"] {
        if parse_duration(bad).is_ok() {
            return Err(format!("Expected '{}' to fail", bad));
        }
    }
    Ok(())
}
