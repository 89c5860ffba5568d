//! Forecast settlement controller
//!
//! Resolves recorded sports forecasts against provider results and settles
//! them as HIT/MISS, with an optional unit-stake value bet.
//!
//! ## Commands
//!
//! - `run-once`: one resolution pass over every due forecast (scheduler trigger)
//! - `loop`: a pass every `RESOLUTION_INTERVAL_MINS` until Ctrl-C
//! - `override --id <ID> --score <HOME-AWAY>`: settle one forecast by hand
//! - `import <FILE>`: load a JSON array of forecasts
//! - `status`: counts per state and the manual-review queue
//!
//! `--db <PATH>` overrides `FORECAST_DB_PATH` for any command.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use settle_bot::config;
use settle_bot::manual::{apply_override, import_forecasts, parse_score};
use settle_bot::paths;
use settle_bot::resolution::{run_pass, run_pass_until, ResolutionContext, ResolverSettings};
use settle_bot::storage::ForecastStore;

fn arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn usage() -> String {
    [
        "Usage: controller [--db <PATH>] <COMMAND>",
        "",
        "Commands:",
        "  run-once                              Resolve every due forecast once",
        "  loop                                  Resolve on an interval until Ctrl-C",
        "  override --id <ID> --score <H-A>      Settle one forecast from a manual score",
        "  import <FILE>                         Import forecasts from a JSON array",
        "  status                                Show counts per state",
    ]
    .join("\n")
}

fn open_store(args: &[String]) -> Result<ForecastStore> {
    let db_path = arg_value(args, "--db")
        .map(|p| paths::resolve_user_path(p).to_string_lossy().into_owned())
        .unwrap_or_else(|| config::forecast_db_path().to_string());
    ForecastStore::open(&db_path)
}

async fn run_loop(ctx: &ResolutionContext, store: &ForecastStore, settings: &ResolverSettings) -> Result<()> {
    let interval_mins = config::resolution_interval_mins().max(1);
    info!("[RESOLVE] Loop mode: a pass every {}m (Ctrl-C to stop)", interval_mins);

    let stop = Arc::new(AtomicBool::new(false));
    let wake = Arc::new(tokio::sync::Notify::new());
    {
        let stop = stop.clone();
        let wake = wake.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("[RESOLVE] Ctrl-C received; finishing the current forecast");
                stop.store(true, Ordering::SeqCst);
                wake.notify_one();
            }
        });
    }

    loop {
        if let Err(e) = run_pass_until(ctx, store, settings, Utc::now(), &stop).await {
            error!("[RESOLVE] Pass failed: {:#}", e);
        }
        if stop.load(Ordering::SeqCst) {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval_mins * 60)) => {}
            _ = wake.notified() => break,
        }
    }

    info!("[RESOLVE] Stopped");
    Ok(())
}

fn print_status(store: &ForecastStore) -> Result<()> {
    let counts = store.counts_by_state()?;
    if counts.is_empty() {
        println!("No forecasts stored");
    }
    for (state, n) in &counts {
        println!("{:<20} {}", state.as_str(), n);
    }

    let parked = store.needs_review()?;
    if !parked.is_empty() {
        println!();
        println!("Needs manual review:");
        for rec in parked {
            println!(
                "  {} | {} | kickoff {} | {} attempts | {}",
                rec.forecast.id,
                rec.forecast.match_label,
                rec.forecast.kickoff.format("%Y-%m-%d %H:%M"),
                rec.attempts,
                rec.review_reason.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    // Note: the binary crate is `controller`, while the shared library crate is `settle_bot`.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info")
                    .add_directive("controller=info".parse().unwrap())
                    .add_directive("settle_bot=info".parse().unwrap())
                    .add_directive("matchday=info".parse().unwrap())
            }),
        )
        .init();

    paths::load_dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", usage());
        return Ok(());
    }

    // First argument that is neither a flag nor a flag's value
    let command = args
        .iter()
        .enumerate()
        .find(|(i, a)| !a.starts_with("--") && (*i == 0 || !args[i - 1].starts_with("--")))
        .map(|(_, a)| a.as_str())
        .unwrap_or("");

    match command {
        "run-once" => {
            let store = open_store(&args)?;
            let ctx = ResolutionContext::from_env()?;
            let settings = ResolverSettings::from_env();
            let summary = run_pass(&ctx, &store, &settings, Utc::now()).await?;
            if summary.errors > 0 {
                warn!("[RESOLVE] {} forecasts hit errors and stay pending", summary.errors);
            }
        }
        "loop" => {
            let store = open_store(&args)?;
            let ctx = ResolutionContext::from_env()?;
            let settings = ResolverSettings::from_env();
            run_loop(&ctx, &store, &settings).await?;
        }
        "override" => {
            let id = arg_value(&args, "--id").context("override needs --id <ID>")?;
            let score = arg_value(&args, "--score").context("override needs --score <HOME-AWAY>")?;
            let (home, away) = parse_score(&score)?;
            let store = open_store(&args)?;
            let ctx = ResolutionContext::from_env()?;
            let result = apply_override(&store, &ctx.matcher, &id, home, away, Utc::now())?;
            println!(
                "{} settled: {} ({} {}){}",
                id,
                result.outcome,
                result.actual_result,
                result.actual_score,
                match (result.value_bet_outcome, result.value_bet_profit) {
                    (Some(o), Some(p)) => format!(", value bet {} {:+.2}", o, p),
                    _ => String::new(),
                }
            );
        }
        "import" => {
            let pos = args.iter().position(|a| a == "import").unwrap_or(0);
            let file = args.get(pos + 1).context("import needs a file path")?;
            let store = open_store(&args)?;
            let summary = import_forecasts(&store, paths::resolve_user_path(file), Utc::now())?;
            println!(
                "Imported {} forecasts ({} duplicates, {} rejected)",
                summary.inserted, summary.duplicates, summary.rejected
            );
        }
        "status" => {
            let store = open_store(&args)?;
            print_status(&store)?;
        }
        other => {
            eprintln!("{}", usage());
            bail!("Unknown command {:?}", other);
        }
    }

    Ok(())
}
