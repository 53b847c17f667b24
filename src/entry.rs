use std::ffi::OsString;
use std::path::Path;

use clap::{ArgMatches, CommandFactory, FromArgMatches};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::args::{FollowArgs, KeySpec, OutputFormat};
use crate::config::{DEFAULT_CONFIG_FILES, apply_config, load_config};
use crate::error::{AppError, AppResult, ValidationError};
use crate::output::UpdatePrinter;
use crate::poller::{
    HttpTransport, HttpTransportConfig, Listener, PollerConfig, Scope, spawn_poller,
};
use crate::shutdown::{setup_signal_shutdown_handler, shutdown_channel};

/// Validated inputs for following a console.
struct FollowPlan {
    transport: HttpTransportConfig,
    poller: PollerConfig,
    keys: Vec<KeySpec>,
    output_format: OutputFormat,
    max_updates: Option<u64>,
}

impl FollowPlan {
    fn new(args: FollowArgs) -> AppResult<Self> {
        let Some(base_url) = args.url else {
            tracing::error!("Missing URL (set --url or provide in config).");
            return Err(AppError::validation(ValidationError::MissingUrl));
        };
        if args.keys.is_empty() {
            tracing::error!("No keys to follow (set --key or provide in config).");
            return Err(AppError::validation(ValidationError::MissingKeys));
        }
        Ok(Self {
            transport: HttpTransportConfig {
                base_url,
                request_timeout: args.request_timeout,
                headers: args.headers,
            },
            poller: PollerConfig {
                retry_delay: args.retry_delay,
            },
            keys: args.keys,
            output_format: args.output_format,
            max_updates: args.max_updates.map(|max| max.get()),
        })
    }
}

/// Runs the `livepoll` CLI.
///
/// # Errors
///
/// Returns an error when arguments or config are invalid, or the runtime fails.
pub fn run() -> AppResult<()> {
    let Some((mut args, matches)) = parse_args()? else {
        return Ok(());
    };

    merge_config(&mut args, &matches)?;
    crate::logger::init_logging(args.verbose, args.no_color);
    let plan = FollowPlan::new(args)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(follow(plan))
}

fn parse_args() -> AppResult<Option<(FollowArgs, ArgMatches)>> {
    let mut cmd = FollowArgs::command();
    let raw_args: Vec<OsString> = std::env::args_os().collect();

    if should_show_help(&raw_args) {
        cmd.print_help()?;
        println!();
        return Ok(None);
    }

    let matches = cmd.get_matches_from(raw_args);
    let args = FollowArgs::from_arg_matches(&matches)?;

    Ok(Some((args, matches)))
}

fn should_show_help(raw_args: &[OsString]) -> bool {
    let treat_as_empty =
        matches!(raw_args, [] | [_]) || matches!(raw_args, [_, second] if second == "--");
    if !treat_as_empty {
        return false;
    }

    !has_default_config()
}

fn has_default_config() -> bool {
    DEFAULT_CONFIG_FILES
        .iter()
        .any(|path| Path::new(path).exists())
}

fn merge_config(args: &mut FollowArgs, matches: &ArgMatches) -> AppResult<()> {
    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(args, matches, &config)?;
    }
    Ok(())
}

async fn follow(plan: FollowPlan) -> AppResult<()> {
    let transport = HttpTransport::new(&plan.transport)?;
    info!(
        "Following {} key(s) at {}",
        plan.keys.len(),
        transport.endpoint()
    );
    let (handle, poller_task) = spawn_poller(transport, plan.poller);

    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel::<(String, Value)>();
    let mut scope = handle.scope();
    subscribe_keys(&mut scope, &plan.keys, &updates_tx)?;
    drop(updates_tx);

    let (shutdown_tx, mut shutdown_rx) = shutdown_channel();
    let signal_task = setup_signal_shutdown_handler(&shutdown_tx);

    let mut printer = UpdatePrinter::new(plan.output_format, std::io::stdout());
    let mut printed: u64 = 0;
    let result: AppResult<()> = loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Shutdown requested");
                break Ok(());
            }
            update = updates_rx.recv() => {
                let Some((key, value)) = update else {
                    break Ok(());
                };
                if let Err(err) = printer.print(&key, &value) {
                    break Err(err);
                }
                printed = printed.saturating_add(1);
                if plan.max_updates.is_some_and(|max| printed >= max) {
                    debug!(printed, "Reached max updates");
                    break Ok(());
                }
            }
        }
    };

    scope.close();
    handle.shutdown();
    drop(shutdown_tx.send(()));
    poller_task.await?;
    signal_task.await?;
    result
}

fn subscribe_keys(
    scope: &mut Scope,
    keys: &[KeySpec],
    updates: &mpsc::UnboundedSender<(String, Value)>,
) -> AppResult<()> {
    for spec in keys {
        let updates = updates.clone();
        let listener = Listener::new(move |key, value| {
            drop(updates.send((key.to_owned(), value.clone())));
        });
        scope.subscribe(&spec.key, spec.token.as_deref(), listener)?;
    }
    Ok(())
}
