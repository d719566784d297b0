// ============================================================================
// Basic Usage Example
// ============================================================================

use capacity_matcher::prelude::*;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "logging")]
fn init_logging() {
    if let Err(e) = capacity_matcher::utils::init_logging("capacity_matcher=debug") {
        eprintln!("{}", e);
    }
}

#[cfg(not(feature = "logging"))]
fn init_logging() {}

fn main() {
    init_logging();

    println!("=== Capacity Matcher Example ===\n");

    let engine = Arc::new(
        MatchingEngine::builder("resource-sharing")
            .sweep_every(Duration::from_millis(250))
            .build(Arc::new(LoggingEventHandler))
            .unwrap(),
    );
    let sweeper = engine.start_sweeper().unwrap();

    println!("Created engine {}\n", engine.name());

    let now = Utc::now();
    let sf = PartitionKey::new("SF", RankingPolicy::MinLatency);

    // List providers with different latency scores
    println!("Listing providers in {}...", sf);
    for (name, score) in [("hello", 3), ("world", 2), ("test", 1), ("provider4", 4)] {
        let id = engine.add_provider(NewProvider::new(
            format!("0x{}", name),
            name,
            "SF",
            Decimal::from(score),
            now,
            now + ChronoDuration::hours(1),
        ));
        println!("  {} -> {:?}", name, id);
    }

    // An empty window is dropped
    let rejected = engine.add_provider(NewProvider::new(
        "0xbad",
        "bad",
        "SF",
        Decimal::ONE,
        now,
        now,
    ));
    println!("  bad -> {:?}", rejected);

    println!("\n=== Ranked Providers ===");
    for provider in engine.providers_in(&sf) {
        println!("  {} @ {}", provider.name, provider.score);
    }

    // Consumers take the head, one provider each
    println!("\n=== Submitting Consumers ===");
    for i in 0..3 {
        let outcome = engine.add_consumer(NewConsumer::new(
            "0xconsumer",
            format!("job{}", i),
            "SF",
            Decimal::from(10),
            Duration::from_secs(600),
            now + ChronoDuration::hours(2),
        ));

        match outcome {
            ConsumerOutcome::Matched(record) => {
                println!(
                    "  {} matched {} at price {} starting {}",
                    record.consumer_name, record.provider_name, record.price, record.start
                );
            },
            ConsumerOutcome::Unmatched => println!("  job{} found no provider", i),
        }
    }

    println!("\n=== Consumer Ledger ===");
    for (index, record) in engine
        .matches_of(&Address::from("0xconsumer"))
        .iter()
        .enumerate()
    {
        println!("  [{}] {} -> {}", index, record.provider_name, record.id);
    }

    println!("\n=== Remaining Providers ===");
    let mut cursor = engine.head_of(&sf);
    while let Some(id) = cursor {
        if let Ok(provider) = engine.provider_at(&id) {
            println!("  {} @ {}", provider.name, provider.score);
        }
        cursor = engine.next_of(&sf, &id);
    }

    println!("\n{:?}", engine.stats());

    if let Some(worker) = sweeper {
        worker.stop();
    }
}
