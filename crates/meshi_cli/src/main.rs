use anyhow::Result;
use clap::Parser;
use meshi_core::{Catalog, MeshiConfig, SeededRandom, SignalId};
use meshi_dispatch::DispatchStatus;
use meshi_ether::Ether;
use meshi_feed::ProcessingLedger;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod render;

/// Keeps ledger draws off the dispatch random stream when a seed is shared.
const LEDGER_SEED_SALT: u64 = 0x5eed_1ed9;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config
    #[arg(short, long, default_value = "meshi.toml")]
    config: PathBuf,

    /// JSON file with the signal list (defaults to the built-in demo feed)
    #[arg(long)]
    signals: Option<PathBuf>,

    /// Signal tuner position, 0-100
    #[arg(short, long)]
    sensitivity: Option<u8>,

    /// Seed for every simulated outcome
    #[arg(long)]
    seed: Option<u64>,

    /// Dispatch an agent to this signal (repeatable)
    #[arg(short, long = "dispatch", value_name = "ID")]
    dispatch: Vec<String>,

    /// Route this signal to its referral contact (repeatable)
    #[arg(short, long = "refer", value_name = "ID")]
    refer: Vec<String>,

    /// Retry declined dispatches up to this many times
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Skip the simulated handshake latency
    #[arg(long)]
    instant: bool,

    /// Show this many processing ledger entries
    #[arg(long, default_value_t = 0)]
    ledger: usize,

    /// Print the final session as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    // 1. Config, with CLI flags on top of file + env
    let mut config = MeshiConfig::load_or_default(&args.config);
    if let Some(s) = args.sensitivity {
        config.feed.initial_sensitivity = s.min(100);
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.instant {
        config.dispatch = config.dispatch.instant();
    }
    config.validate()?;

    // 2. Catalog
    let catalog = match &args.signals {
        Some(path) => Catalog::load(path)?,
        None => Catalog::seeded(),
    };

    // 3. Session + ledger
    let ether = Ether::from_config(&config, catalog);
    let ledger = ProcessingLedger::new(
        config.ledger.clone(),
        Arc::new(SeededRandom::from_option(
            config.seed.map(|s| s ^ LEDGER_SEED_SALT),
        )),
    );
    let ledger_task = (args.ledger > 0).then(|| ledger.start());

    if !args.json {
        render::print_feed(&ether);
    }

    // 4. Referrals
    for raw in &args.refer {
        let id = SignalId::new(raw.as_str());
        let contact = ether
            .signals()
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.referral_match.as_ref())
            .map(|r| r.contact_name.clone());
        let Some(contact) = contact else {
            warn!("Signal {} has no referral match", id);
            continue;
        };
        match ether.request_referral(&id, &contact).await {
            Ok(true) if !args.json => println!("↪ {} routed to {}'s agent", id, contact),
            Ok(_) => {}
            Err(e) => warn!("Referral {} rejected: {}", id, e),
        }
    }

    // 5. Dispatches, then retries of declined ones
    let mut pending: Vec<SignalId> = args
        .dispatch
        .iter()
        .map(|s| SignalId::new(s.as_str()))
        .collect();
    let mut round = 0;
    loop {
        let mut events = ether.subscribe();
        for id in &pending {
            if let Err(e) = ether.request_dispatch(id).await {
                warn!("Dispatch {} rejected: {}", id, e);
                if !args.json {
                    println!("✗ {}: {}", id, e);
                }
            }
        }
        render::follow_dispatches(&ether, &mut events, !args.json).await;

        let mut declined = Vec::new();
        for id in &pending {
            if let Some(state) = ether.dispatch_state(id).await {
                if state.status == DispatchStatus::Failed {
                    declined.push(id.clone());
                }
            }
        }
        if declined.is_empty() || round >= args.retries {
            break;
        }
        round += 1;
        info!("Retrying {} declined dispatches (round {})", declined.len(), round);
        for id in &declined {
            ether.retry_dispatch(id).await?;
        }
        pending = declined;
    }

    // 6. Report
    if args.ledger > 0 {
        ledger.wait_for_entries(args.ledger).await;
    }
    ledger.stop();
    if let Some(task) = ledger_task {
        let _ = task.await;
    }
    let snapshot = ether.snapshot().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        render::print_summary(&snapshot);
        if args.ledger > 0 {
            render::print_ledger(&ledger, args.ledger).await;
        }
    }

    Ok(())
}
