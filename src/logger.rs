use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Environment variables consulted for a filter, in order.
const FILTER_ENV_VARS: [&str; 2] = ["LIVEPOLL_LOG", "RUST_LOG"];

/// Filter used when no environment override is set.
///
/// Dependencies (reqwest, hyper) stay at `warn` so poll round trips do not
/// drown out the follower's own messages.
fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level)
}

fn env_directives() -> Option<String> {
    FILTER_ENV_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|value| !value.trim().is_empty())
}

fn build_filter(override_directives: Option<&str>, verbose: bool) -> EnvFilter {
    let fallback = default_directives(verbose);
    override_directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

/// Installs the global subscriber. Logs go to stderr; stdout carries updates.
pub fn init_logging(verbose: bool, no_color: bool) {
    let filter = build_filter(env_directives().as_deref(), verbose);

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}
