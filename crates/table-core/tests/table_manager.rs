//! End-to-end request handling against fake processes and a scripted dealer.

mod common;

use common::{fold_script, FakeDealerLauncher, Table};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::time::Duration;
use table_core::{ErrorCategory, MatchId, MatchStore, PokerAction};

#[tokio::test]
async fn start_match_launches_dealer_opponents_and_proxy() {
    let table = Table::new(fold_script()).await;

    table.handle("start", "m1", json!({})).await;

    assert_eq!(table.alerts.count(), 0, "alerts: {:?}", table.alerts.messages());
    assert_eq!(table.dealer.launch_count(), 1);
    assert!(table.has_proxy("m1").await);

    let record = table.load("m1").await;
    let ports = record.port_numbers.clone().expect("ports saved on the record");
    assert_eq!(ports.len(), 3);
    assert_eq!(ports[1], 20001);
    let hash = record.game_def_hash.expect("game definition saved");
    assert_eq!(hash["number_of_players"], 3);

    let commands = table.processes.commands.lock().unwrap().clone();
    assert_eq!(
        commands,
        vec![
            vec!["./tilt_bot", "--aggressive", "127.0.0.1", "20001"],
            vec!["./chump_bot", "127.0.0.1", "20002"],
        ]
    );

    // The human's first decision was announced.
    let published = table.publisher.published.lock().unwrap().clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "realtime");
    assert_eq!(published[0].1, json!({"channel": "player-action-in-m1"}));
}

#[tokio::test]
async fn dealer_start_is_idempotent() {
    let table = Table::new(Vec::new()).await;
    let mut record = table.load("m1").await;

    let first = table
        .manager
        .ensure_dealer_started(&mut record, BTreeMap::new())
        .await
        .unwrap();
    let second = table
        .manager
        .ensure_dealer_started(&mut record, BTreeMap::new())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(table.dealer.launch_count(), 1);
    assert_eq!(table.load("m1").await.port_numbers, Some(first.port_numbers));
}

#[tokio::test]
async fn dead_dealer_is_replaced() {
    let table = Table::new(Vec::new()).await;
    let mut record = table.load("m1").await;

    let first = table
        .manager
        .ensure_dealer_started(&mut record, BTreeMap::new())
        .await
        .unwrap();
    table.probe.kill(first.pid);

    let second = table
        .manager
        .ensure_dealer_started(&mut record, BTreeMap::new())
        .await
        .unwrap();
    assert_ne!(first.pid, second.pid);
    assert_eq!(table.dealer.launch_count(), 2);
}

#[tokio::test]
async fn proxy_start_is_idempotent() {
    let table = Table::new(fold_script()).await;
    table.handle("start", "m1", json!({})).await;

    table.handle("start_proxy", "m1", json!({})).await;
    table.handle("start_proxy", "m1", json!({})).await;

    assert_eq!(table.alerts.count(), 0, "alerts: {:?}", table.alerts.messages());
    assert_eq!(table.dealer.connections.load(Ordering::SeqCst), 1);
    assert_eq!(table.publisher.count(), 1);
}

#[tokio::test]
async fn proxy_without_dealer_is_reported() {
    let table = Table::new(Vec::new()).await;

    table.handle("start_proxy", "m1", json!({})).await;

    let alerts = table.alerts.alerts.lock().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, ErrorCategory::Config);
    assert!(alerts[0].1.contains("Dealer not started"));
    assert_eq!(alerts[0].2.request, "start_proxy");
    assert_eq!(alerts[0].2.match_id, MatchId::new("m1"));
}

#[tokio::test]
async fn fold_is_forwarded_and_match_end_clears_registry() {
    let table = Table::new(fold_script()).await;
    table.handle("start", "m1", json!({})).await;
    assert!(table.manager.registry().contains(&MatchId::new("m1")));

    table.handle("play", "m1", json!({"action": "fold"})).await;

    assert_eq!(table.alerts.count(), 0, "alerts: {:?}", table.alerts.messages());
    assert_eq!(
        table.dealer.received(),
        vec!["VERSION:2.0.0", "MATCHSTATE:0:0:c:Ah2c||:f"]
    );
    assert!(!table.manager.registry().contains(&MatchId::new("m1")));
    assert_eq!(table.publisher.count(), 2);
}

#[tokio::test]
async fn action_for_unknown_match_is_a_no_op() {
    let table = Table::new(Vec::new()).await;
    table.store.save_match(&table.record("m3")).await.unwrap();

    table
        .manager
        .play(&MatchId::new("m3"), &PokerAction::Call)
        .await
        .unwrap();
    table.handle("play", "m3", json!({"action": "call"})).await;

    assert_eq!(table.alerts.count(), 0);
    assert_eq!(table.publisher.count(), 0);
    assert!(table.manager.registry().is_empty());
}

#[tokio::test]
async fn sweep_reclaims_dead_dealer_on_unrelated_start() {
    let table = Table::new(Vec::new()).await;
    table.store.save_match(&table.record("m2")).await.unwrap();

    let mut m1 = table.load("m1").await;
    let dealer = table
        .manager
        .ensure_dealer_started(&mut m1, BTreeMap::new())
        .await
        .unwrap();
    table.probe.kill(dealer.pid);
    assert!(table.manager.registry().contains(&MatchId::new("m1")));

    let mut m2 = table.load("m2").await;
    table
        .manager
        .ensure_dealer_started(&mut m2, BTreeMap::new())
        .await
        .unwrap();

    assert!(!table.manager.registry().contains(&MatchId::new("m1")));
    assert!(table.manager.registry().contains(&MatchId::new("m2")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dealer_starts_launch_one_dealer() {
    let table = Table::with_dealer(|probe| {
        FakeDealerLauncher::new(probe, 0, Vec::new()).with_delay(Duration::from_millis(50))
    })
    .await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = table.manager.clone();
            let mut record = table.record("m1");
            tokio::spawn(async move {
                manager
                    .ensure_dealer_started(&mut record, BTreeMap::new())
                    .await
                    .unwrap()
            })
        })
        .collect();

    let infos: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(table.dealer.launch_count(), 1);
    assert!(infos.iter().all(|info| *info == infos[0]));
}

#[tokio::test]
async fn delete_irrelevant_matches_skips_match_lookup() {
    let table = Table::new(Vec::new()).await;
    let mut stale = table.record("stale");
    stale.updated_at = chrono::Utc::now() - chrono::Duration::days(3);
    std::fs::create_dir_all(table.store.dir()).unwrap();
    std::fs::write(
        table.store.dir().join("stale.json"),
        serde_json::to_string(&stale).unwrap(),
    )
    .unwrap();

    table
        .handle("delete_irrelevant_matches", "no-such-match", json!({}))
        .await;

    assert_eq!(table.alerts.count(), 0);
    assert!(table
        .store
        .load_match(&MatchId::new("stale"))
        .await
        .is_err());
    assert!(table.store.load_match(&MatchId::new("m1")).await.is_ok());
}

#[tokio::test]
async fn unrecognized_request_is_ignored() {
    let table = Table::new(Vec::new()).await;

    table.handle("reticulate_splines", "m1", json!({})).await;

    assert_eq!(table.alerts.count(), 0);
    assert_eq!(table.dealer.launch_count(), 0);
}

#[tokio::test]
async fn handler_errors_alert_exactly_once() {
    let table = Table::new(Vec::new()).await;

    table.handle("play", "m1", json!({})).await;
    table.handle("start", "missing", json!({})).await;

    let alerts = table.alerts.alerts.lock().unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].0, ErrorCategory::Config);
    assert!(alerts[0].1.contains("action"));
    assert_eq!(alerts[1].0, ErrorCategory::Persistence);
}

#[tokio::test]
async fn dealer_launch_failure_is_alerted_and_leaves_no_entry() {
    let table =
        Table::with_dealer(|probe| FakeDealerLauncher::new(probe, 0, Vec::new()).failing()).await;

    table.handle("start", "m1", json!({})).await;

    assert_eq!(table.alerts.count(), 1);
    assert!(table.processes.commands.lock().unwrap().is_empty());
    assert!(table.manager.registry().is_empty());
}

#[tokio::test]
async fn unknown_bot_stops_match_start() {
    let table = Table::new(Vec::new()).await;
    let mut record = table.record("m1");
    record.player_names[2] = "Ghost".to_string();
    table.store.save_match(&record).await.unwrap();

    table.handle("start", "m1", json!({})).await;

    assert_eq!(table.dealer.launch_count(), 1);
    assert!(table.processes.commands.lock().unwrap().is_empty());
    assert!(!table.has_proxy("m1").await);
    assert_eq!(table.alerts.messages(), vec!["No bot named \"Ghost\" in the roster"]);
}

#[tokio::test]
async fn dealer_options_reach_the_launcher() {
    let table = Table::new(Vec::new()).await;

    table
        .handle(
            "start",
            "m1",
            json!({"options": {"t": null, "start_timeout": 5000}}),
        )
        .await;

    let args = table.dealer.last_args.lock().unwrap().clone().unwrap();
    assert_eq!(args.match_name, "match-m1");
    assert_eq!(args.number_of_hands, 10);
    assert_eq!(args.player_names, vec!["Human", "Tilt", "Chump"]);
    assert_eq!(args.options["t"], "");
    assert_eq!(args.options["start_timeout"], "5000");
}

#[tokio::test]
async fn match_over_at_proxy_start_leaves_no_entry() {
    // The scripted dealer hangs up right after the handshake.
    let table = Table::new(Vec::new()).await;

    table.handle("start", "m1", json!({})).await;

    assert_eq!(table.alerts.count(), 0, "alerts: {:?}", table.alerts.messages());
    assert!(!table.manager.registry().contains(&MatchId::new("m1")));
    assert_eq!(table.publisher.count(), 1);
}

#[tokio::test]
async fn overlapping_start_and_start_proxy_keep_both_record_fields() {
    let table = Table::with_dealer(|probe| {
        FakeDealerLauncher::new(probe, 0, fold_script()).with_delay(Duration::from_millis(300))
    })
    .await;

    // Both requests load the record before the dealer reports its ports.
    let start = table.handle("start", "m1", json!({}));
    let proxy = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        table.handle("start_proxy", "m1", json!({})).await;
    };
    tokio::join!(start, proxy);

    assert_eq!(table.alerts.count(), 0, "alerts: {:?}", table.alerts.messages());
    assert_eq!(table.dealer.connections.load(Ordering::SeqCst), 1);
    let record = table.load("m1").await;
    assert_eq!(record.port_numbers.map(|ports| ports.len()), Some(3));
    assert!(record.game_def_hash.is_some());
}

#[tokio::test]
async fn overlapping_starts_both_find_the_ports() {
    let table = Table::with_dealer(|probe| {
        FakeDealerLauncher::new(probe, 0, fold_script()).with_delay(Duration::from_millis(50))
    })
    .await;

    tokio::join!(
        table.handle("start", "m1", json!({})),
        table.handle("start", "m1", json!({})),
    );

    assert_eq!(table.alerts.count(), 0, "alerts: {:?}", table.alerts.messages());
    assert_eq!(table.dealer.launch_count(), 1);
    assert_eq!(table.processes.commands.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn running_dealer_start_keeps_saved_game_definition() {
    let table = Table::new(fold_script()).await;
    table.handle("start", "m1", json!({})).await;

    // A copy loaded before the dealer and proxy started.
    let mut stale = table.record("m1");
    let dealer = table
        .manager
        .ensure_dealer_started(&mut stale, BTreeMap::new())
        .await
        .unwrap();

    assert_eq!(stale.port_numbers, Some(dealer.port_numbers.clone()));
    assert!(stale.game_def_hash.is_some());
    let stored = table.load("m1").await;
    assert_eq!(stored.port_numbers, Some(dealer.port_numbers));
    assert!(stored.game_def_hash.is_some());
}
