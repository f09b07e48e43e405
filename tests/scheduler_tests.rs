//! Monitor loops driven by a manual ticker
//!
//! Ticks are queued by hand; dropping the tick handle exhausts the ticker so
//! the loop exits and `join()` gives a deterministic end point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use depwarden::background::ManualTicker;
use depwarden::config::WardenConfig;
use depwarden::process::{CommandCatalog, CommandOutput, HostOs};
use depwarden::testing::{MapEnv, RecordingSleeper, ScriptedRunner};
use depwarden::{MonitorPhase, Seams, Warden};
use tokio_util::sync::CancellationToken;

fn offline_warden(dir: &std::path::Path, online: Arc<AtomicBool>) -> Warden {
    let mut config = WardenConfig::default();
    config.monitor.log_dir = dir.join("logs");
    config.network.resolver_config = dir.join("resolv.conf");
    config.runtime.daemon_config_path = dir.join("daemon.json").display().to_string();
    config.runtime.daemon_config_user_path = dir.join("user-daemon.json").display().to_string();
    config.database.env_file = dir.join(".env");

    let runner = ScriptedRunner::new(move |spec| {
        if spec.program == "curl" && !online.load(Ordering::SeqCst) {
            Ok(CommandOutput::failed(7, "Failed to connect"))
        } else {
            Ok(CommandOutput::ok("200"))
        }
    });
    Warden::with_seams(
        config,
        Seams {
            runner: Arc::new(runner),
            catalog: CommandCatalog::new(HostOs::Linux, "docker", "linux/amd64", true),
            sleeper: Arc::new(RecordingSleeper::new()),
            env: Arc::new(MapEnv::default()),
        },
    )
}

#[tokio::test(start_paused = true)]
async fn manual_ticks_drive_escalation_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let warden = offline_warden(dir.path(), Arc::new(AtomicBool::new(false)));
    let mut rx = warden.subscribe();

    let (ticker, ticks) = ManualTicker::new();
    let handle = warden
        .network()
        .start_monitoring(Box::new(ticker), CancellationToken::new());
    for _ in 0..3 {
        assert!(ticks.tick());
    }
    drop(ticks);
    handle.join().await.unwrap();

    let mut labels = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.monitor.to_string(), "network");
        labels.push(event.kind.label());
    }
    assert_eq!(
        labels,
        vec!["degraded", "degraded", "degraded", "critical", "repair-success"]
    );
    let state = warden.network().state().await;
    assert_eq!(state.consecutive_failures, 3);
    assert_eq!(state.phase, Some(MonitorPhase::Repairing));
    assert!(!state.in_repair);
}

#[tokio::test(start_paused = true)]
async fn stopped_monitor_runs_no_further_ticks() {
    let dir = tempfile::tempdir().unwrap();
    let warden = offline_warden(dir.path(), Arc::new(AtomicBool::new(true)));

    let (ticker, ticks) = ManualTicker::new();
    let handle = warden
        .network()
        .start_monitoring(Box::new(ticker), CancellationToken::new());
    handle.stop();
    assert!(handle.is_stopped());
    ticks.tick();
    handle.join().await.unwrap();

    assert!(warden.network().last_health_status().await.is_none());
    assert_eq!(warden.network().state().await.phase, None);
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_parent_token_stops_both_interval_loops() {
    let dir = tempfile::tempdir().unwrap();
    let warden = offline_warden(dir.path(), Arc::new(AtomicBool::new(true)));
    let cancel = CancellationToken::new();

    let running = warden.start(&cancel);
    // First interval tick is immediate.
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    cancel.cancel();
    running.network.join().await.unwrap();
    running.database.join().await.unwrap();

    assert!(warden.network().last_health_status().await.unwrap().is_healthy());
    assert!(warden.database().last_validation_result().await.is_some());
}
