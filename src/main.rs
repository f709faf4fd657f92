//! Mon Arena Server
//!
//! Authoritative backend for turn-based creature battles.
//! Runs a demo battle end to end and verifies the signed replay.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use mon_arena::{
    game::replay::totals,
    service::battle::ReplayView,
    service::memory::{
        InMemoryCatalog, InMemoryStore, RecordingNotifier, RecordingStats, StaticTypeData,
    },
    BattleService, Creature, Outcome, ReplaySigner, Stats, TypeChart, BATTLE_TTL_SECS, VERSION,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG overrides the default level)
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Mon Arena Server v{}", VERSION);
    info!("Battle TTL: {} seconds", BATTLE_TTL_SECS);

    demo_battle().await
}

fn creature(id: u32, name: &str, types: &[&str], stats: [i32; 4]) -> Creature {
    Creature {
        id,
        name: name.to_string(),
        types: types.iter().map(|t| t.to_string()).collect(),
        stats: Stats {
            hp: stats[0],
            attack: stats[1],
            defense: stats[2],
            speed: stats[3],
        },
    }
}

fn demo_chart() -> TypeChart {
    let mut chart = TypeChart::new();
    chart.insert(
        "fire".into(),
        [("grass".to_string(), 2.0), ("water".to_string(), 0.5)].into(),
    );
    chart.insert(
        "water".into(),
        [("fire".to_string(), 2.0), ("grass".to_string(), 0.5)].into(),
    );
    chart.insert(
        "grass".into(),
        [("water".to_string(), 2.0), ("fire".to_string(), 0.5)].into(),
    );
    chart
}

/// Run one bot-vs-bot battle to completion and verify its replay.
async fn demo_battle() -> Result<()> {
    info!("=== Starting Demo Battle ===");

    let mut catalog = InMemoryCatalog::new();
    catalog.add(1, creature(101, "Embercub", &["fire"], [44, 58, 40, 66]));
    catalog.add(1, creature(102, "Pebblit", &["rock"], [52, 46, 62, 30]));
    catalog.add(2, creature(201, "Sproutle", &["grass"], [46, 50, 44, 52]));
    catalog.add(2, creature(202, "Dribblet", &["water"], [48, 54, 46, 58]));

    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let stats = Arc::new(RecordingStats::new());
    let service = BattleService::new(
        store,
        Arc::new(catalog),
        Arc::new(StaticTypeData::new(demo_chart())),
        notifier,
        stats,
        ReplaySigner::new(b"demo-secret".to_vec()),
        BATTLE_TTL_SECS,
    );

    let row = service.start_battle(1, 2, &[101, 102], &[201, 202]).await?;
    info!("Battle ID: {}", row.id);
    info!("Seed: {}", row.seed);
    info!("First actor: {}", row.state.next_actor.as_str());

    // Both sides play greedily until someone runs out of creatures
    let mut actions = 0usize;
    loop {
        let a = service.bot_autoplay(row.id, 1, 1).await?;
        let b = service.bot_autoplay(row.id, 2, 1).await?;
        actions += a + b;
        if a + b == 0 {
            break;
        }
        if actions > 400 {
            anyhow::bail!("demo battle did not finish within 400 actions");
        }
    }
    info!("Actions submitted: {}", actions);

    // Fetch and verify the signed replay
    let ReplayView::Final(signed) = service.get_replay(row.id, 1).await? else {
        anyhow::bail!("battle still active after autoplay");
    };
    info!("=== Battle Results ===");
    match &signed.replay.outcome {
        Outcome::Decisive { winner, loser } => {
            info!("Winner: side {}", winner.as_str());
            info!("Loser: side {}", loser.as_str());
        }
        Outcome::Draw { reason } => info!("Draw ({})", reason),
    }
    info!("Half-turns recorded: {}", signed.replay.turns.len());

    let (a, b) = totals(&signed.replay.turns);
    info!(
        "Side a: {} damage, {} crits, {} misses",
        a.damage, a.crits, a.misses
    );
    info!(
        "Side b: {} damage, {} crits, {} misses",
        b.damage, b.crits, b.misses
    );
    info!("Signature: {}", signed.signature);

    // Verify integrity, then show that tampering is caught
    let signer = ReplaySigner::new(b"demo-secret".to_vec());
    if signer.verify(&signed.replay, &signed.signature) {
        info!("INTEGRITY VERIFIED: Signature matches!");
    } else {
        anyhow::bail!("stored replay failed verification");
    }

    let mut tampered = signed.replay.clone();
    tampered.seed ^= 1;
    if signer.verify(&tampered, &signed.signature) {
        anyhow::bail!("tampered replay passed verification");
    }
    info!("TAMPER CHECK: Altered replay rejected as expected");

    Ok(())
}
