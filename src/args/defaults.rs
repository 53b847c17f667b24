pub(crate) const DEFAULT_USER_AGENT: &str = concat!("livepoll/", env!("CARGO_PKG_VERSION"));

/// Client-side backstop; consoles hold a poll for well under a minute.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: &str = "60s";
pub(crate) const DEFAULT_RETRY_DELAY: &str = "1s";
