//! Concurrent routing while snapshots are being republished.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use payment_rules_engine::config::EngineConfig;
use payment_rules_engine::model::{Action, Condition, RequestContext, RoutingRule};
use payment_rules_engine::snapshot::InMemoryStore;

mod common;

fn rules(version: u32) -> Vec<RoutingRule> {
    vec![
        RoutingRule::new("high", 10)
            .when(Condition::new("amount", ">", 1000))
            .then(Action::set_route(format!("HIGH-v{}", version))),
        RoutingRule::new("rest", 20).then(Action::set_route(format!("REST-v{}", version))),
    ]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_routing_under_concurrent_reloads() {
    let store = Arc::new(InMemoryStore::new(rules(0), Vec::new()));
    let service = Arc::new(common::loaded_service(store.clone(), &EngineConfig::default()));
    let stop = Arc::new(AtomicBool::new(false));

    let reloader = {
        let service = service.clone();
        let store = store.clone();
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || {
            let mut version = 0;
            while !stop.load(Ordering::Relaxed) {
                version += 1;
                store.replace_rules(rules(version));
                service.reload().unwrap();
                std::thread::sleep(Duration::from_millis(2));
            }
            version
        })
    };

    let concurrency = 8;
    let requests_per_task = 2_000;
    let inconsistent = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let mut workers = Vec::new();
    for worker in 0..concurrency {
        let service = service.clone();
        let inconsistent = inconsistent.clone();
        workers.push(tokio::spawn(async move {
            for i in 0..requests_per_task {
                let amount = if (worker + i) % 2 == 0 { 5_000 } else { 10 };
                let ctx = RequestContext::new()
                    .with_tenant("tenant-A")
                    .with_attribute("amount", amount);
                let decision = service.route(&ctx);

                // Route and rule must come from one snapshot.
                let route = decision.route.unwrap_or_default();
                let expected = if amount > 1000 { "high" } else { "rest" };
                let prefix = if amount > 1000 { "HIGH-v" } else { "REST-v" };
                if decision.matched_rule.as_deref() != Some(expected) || !route.starts_with(prefix) {
                    inconsistent.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }
    let elapsed = start.elapsed();

    stop.store(true, Ordering::Relaxed);
    let versions = reloader.await.unwrap();

    let total = (concurrency * requests_per_task) as u64;
    let stats = service.stats();
    println!(
        "{} decisions in {:?} across {} reloads ({:.0}/s), cache hit ratio {:.2}",
        total,
        elapsed,
        versions,
        total as f64 / elapsed.as_secs_f64(),
        stats.cache_hit_ratio
    );

    assert_eq!(inconsistent.load(Ordering::Relaxed), 0);
    assert_eq!(stats.evaluations, total);
    assert!(versions > 0);
    assert!(service.generation() > 1);
}
