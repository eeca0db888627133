//! Plain-text rendering of the Ether for the terminal.

use meshi_dispatch::{DispatchEvent, DispatchStatus};
use meshi_ether::{Ether, EtherSnapshot};
use meshi_feed::{LedgerKind, ProcessingLedger, TUNER_PRESETS};
use tokio::sync::broadcast::{self, error::RecvError};

pub fn print_feed(ether: &Ether) {
    let sensitivity = ether.sensitivity();
    let level = ether.tuner_level();
    let stats = ether.filter_stats();
    let visible = ether.visible();

    println!(
        "Signal Tuner: {} ({}) - {}",
        sensitivity.value(),
        level.label(),
        level.description()
    );
    let presets: Vec<String> = TUNER_PRESETS
        .iter()
        .map(|p| {
            if p.is_near(sensitivity) {
                format!("[{}]", p.level.label())
            } else {
                p.level.label().to_string()
            }
        })
        .collect();
    println!("  presets: {}", presets.join("  "));
    println!(
        "  {}% feed filtered, {}% avg match, threshold {:.0}%",
        stats.feed_filtered,
        stats.avg_match,
        sensitivity.threshold()
    );
    println!(
        "Focus points: {} / {} (renews daily, each dispatch costs 1)",
        ether.focus_points(),
        ether.focus_capacity()
    );
    println!();
    println!("The Ether: {} signals matching your threshold", visible.len());

    if visible.is_empty() {
        println!("  No signals at this threshold. Lower your Signal Tuner to see more opportunities.");
        println!();
        return;
    }

    for signal in visible {
        let author = &signal.author;
        let principal = match (&author.principal_name, author.is_agent) {
            (Some(name), true) => format!(" for {}", name),
            _ => String::new(),
        };
        println!();
        println!(
            "  [{}] {}  ({}% match, {})",
            signal.id,
            signal.title,
            signal.goal_match(),
            signal.timestamp
        );
        println!(
            "      {} @{} [{}{}] integrity {} ({})",
            author.name,
            author.handle,
            author.kind_label(),
            principal,
            author.integrity_score,
            author.tier().as_str()
        );
        if let Some(escrow) = &signal.escrow {
            println!("      escrow: {}", escrow);
        }
        if !signal.match_context.reasons.is_empty() {
            println!("      why: {}", signal.match_context.reasons.join(" • "));
        }
        if let Some(referral) = &signal.referral_match {
            println!(
                "      referral: {}% match for {}",
                referral.match_score, referral.contact_name
            );
        }
    }
    println!();
}

fn print_event(event: &DispatchEvent) {
    let text = event.status.display_text().unwrap_or("Ready to dispatch");
    match (event.status, &event.failure_reason) {
        (DispatchStatus::Failed, Some(reason)) => {
            println!("  {} ✗ {}: {}", event.id, text, reason)
        }
        (DispatchStatus::Success, _) => println!("  {} ✓ {}", event.id, text),
        _ => println!("  {} … {}", event.id, text),
    }
}

/// Print status changes until no handshake is running.
pub async fn follow_dispatches(
    ether: &Ether,
    events: &mut broadcast::Receiver<DispatchEvent>,
    print: bool,
) {
    loop {
        tokio::select! {
            _ = ether.wait_settled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if print {
                        print_event(&event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Progress display skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    while let Ok(event) = events.try_recv() {
        if print {
            print_event(&event);
        }
    }
}

pub fn print_summary(snapshot: &EtherSnapshot) {
    println!();
    println!("Session Activity");
    println!("  Dispatched     {}", snapshot.activity.dispatched);
    println!("  Referred       {}", snapshot.activity.referred);
    println!("  Channels Open  {}", snapshot.activity.channels_open);
    println!(
        "  Focus points   {} / {}",
        snapshot.focus_points, snapshot.focus_capacity
    );
    for signal in snapshot.signals.iter().filter(|s| s.dispatch.attempts > 0) {
        println!(
            "  [{}] {} after {} attempt(s)",
            signal.id, signal.dispatch.status, signal.dispatch.attempts
        );
    }
}

pub async fn print_ledger(ledger: &ProcessingLedger, limit: usize) {
    let entries = ledger.entries().await;
    let counts = ledger.counts().await;
    println!();
    println!("Processing Ledger");
    for entry in entries.iter().take(limit) {
        let marker = match entry.kind {
            LedgerKind::Blocked => "⊘",
            LedgerKind::Saved => "★",
            LedgerKind::Passed => "✓",
            LedgerKind::Warning => "!",
        };
        println!(
            "  {} {} {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            marker,
            entry.message
        );
    }
    println!(
        "  blocked {}  saved {}  passed {}  flagged {}",
        counts.blocked, counts.saved, counts.passed, counts.warning
    );
}
