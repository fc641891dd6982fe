//! Unit tests for startup reconciliation, settings reactions and alarm handling.

#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use common::{harness, FakeLoader, FakePower, FakeScheduler, Harness};
use ticketwatch::managers::background::Background;
use ticketwatch::managers::monitor::CycleReport;
use ticketwatch::services::config_cache::ConfigService;
use ticketwatch::services::power::PowerManager;
use ticketwatch::services::scheduler::{AlarmFire, Scheduler, TokioScheduler};
use ticketwatch::types::settings::ALARM_NAME;

const URL: &str = "https://dash.example.com/tickets";

struct Setup {
    h: Harness,
    scheduler: Arc<FakeScheduler>,
    power: Arc<FakePower>,
    background: Arc<Background>,
}

fn setup(url: &str) -> Setup {
    let h = harness(url, FakeLoader::with_counters("1", "0", "0"));
    let scheduler = Arc::new(FakeScheduler::default());
    let power = Arc::new(FakePower::default());
    let background = Arc::new(Background::new(
        h.store.clone(),
        h.config.clone() as Arc<dyn ConfigService>,
        scheduler.clone(),
        h.monitor.clone(),
        power.clone(),
    ));
    Setup {
        h,
        scheduler,
        power,
        background,
    }
}

/// Writes a setting and feeds the resulting change to the background.
async fn write(s: &Setup, key: &str, value: Value) -> Option<JoinHandle<CycleReport>> {
    let mut changes = s.h.store.subscribe();
    s.h.store.set(key, value).await.unwrap();
    let change = changes.recv().await.unwrap();
    s.background.handle_change(&change).await
}

// ─── Startup ───

#[tokio::test(start_paused = true)]
async fn test_init_without_url_does_not_schedule() {
    let s = setup("");
    s.h.store.set("monitorEnabled", json!(true)).await.unwrap();

    assert!(s.background.init_monitoring().await.is_none());
    assert!(!s.scheduler.is_scheduled(ALARM_NAME));
    assert_eq!(s.h.loader.opened_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_init_enabled_checks_now_and_schedules() {
    let s = setup(URL);
    s.h.store.set("monitorEnabled", json!(true)).await.unwrap();
    s.h.store.set("checkIntervalMinutes", json!(5)).await.unwrap();

    let check = s.background.init_monitoring().await.expect("immediate check");

    assert_eq!(s.scheduler.period(ALARM_NAME), Some(Duration::from_secs(300)));
    assert!(matches!(check.await.unwrap(), CycleReport::Completed { .. }));
    assert_eq!(s.h.loader.opened_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_init_disabled_clears_stale_schedule() {
    let s = setup(URL);
    s.scheduler.create(ALARM_NAME, Duration::from_secs(60));

    assert!(s.background.init_monitoring().await.is_none());
    assert!(!s.scheduler.is_scheduled(ALARM_NAME));
}

#[tokio::test(start_paused = true)]
async fn test_init_applies_keep_awake() {
    let s = setup("");
    s.h.store.set("keepAwake", json!(true)).await.unwrap();

    s.background.init_monitoring().await;

    assert!(s.power.is_active());
}

// ─── Settings changes ───

#[tokio::test(start_paused = true)]
async fn test_enabling_runs_check_and_schedules() {
    let s = setup(URL);
    s.h.store.set("checkIntervalMinutes", json!(3)).await.unwrap();

    let check = write(&s, "monitorEnabled", json!(true)).await.expect("check started");

    assert_eq!(s.scheduler.period(ALARM_NAME), Some(Duration::from_secs(180)));
    assert!(matches!(check.await.unwrap(), CycleReport::Completed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_disabling_clears_schedule() {
    let s = setup(URL);
    write(&s, "monitorEnabled", json!(true)).await;

    assert!(write(&s, "monitorEnabled", json!(false)).await.is_none());
    assert!(!s.scheduler.is_scheduled(ALARM_NAME));
}

#[tokio::test(start_paused = true)]
async fn test_enabling_without_url_is_ignored() {
    let s = setup("");

    assert!(write(&s, "monitorEnabled", json!(true)).await.is_none());
    assert!(!s.scheduler.is_scheduled(ALARM_NAME));
}

#[tokio::test(start_paused = true)]
async fn test_interval_change_reschedules_only_when_enabled() {
    let s = setup(URL);

    write(&s, "checkIntervalMinutes", json!(10)).await;
    assert!(!s.scheduler.is_scheduled(ALARM_NAME));

    write(&s, "monitorEnabled", json!(true)).await;
    write(&s, "checkIntervalMinutes", json!(15)).await;
    assert_eq!(s.scheduler.period(ALARM_NAME), Some(Duration::from_secs(900)));

    write(&s, "checkIntervalMinutes", json!(0)).await;
    assert_eq!(s.scheduler.period(ALARM_NAME), Some(Duration::from_secs(60)));
}

#[tokio::test(start_paused = true)]
async fn test_clearing_url_stops_schedule() {
    let s = setup(URL);
    write(&s, "monitorUrl", json!(URL)).await;
    write(&s, "monitorEnabled", json!(true)).await;
    assert!(s.scheduler.is_scheduled(ALARM_NAME));

    write(&s, "monitorUrl", json!("")).await;

    assert!(!s.scheduler.is_scheduled(ALARM_NAME));
    assert!(s.h.config.monitor_url().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_setting_url_while_enabled_starts_schedule() {
    let s = setup("");
    s.h.store.set("monitorEnabled", json!(true)).await.unwrap();
    s.h.store.set("checkIntervalMinutes", json!(2)).await.unwrap();

    let check = write(&s, "monitorUrl", json!(URL)).await;

    assert!(check.is_none());
    assert_eq!(s.h.config.monitor_url().as_deref(), Some(URL));
    assert_eq!(s.scheduler.period(ALARM_NAME), Some(Duration::from_secs(120)));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(s.h.loader.opened_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_keep_awake_follows_setting() {
    let s = setup(URL);

    write(&s, "keepAwake", json!(true)).await;
    assert!(s.power.is_active());

    write(&s, "keepAwake", json!(false)).await;
    assert!(!s.power.is_active());
    assert_eq!(s.power.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_keys_are_ignored() {
    let s = setup(URL);

    assert!(write(&s, "enableSound", json!(true)).await.is_none());
    assert_eq!(s.scheduler.creates.load(Ordering::SeqCst), 0);
}

// ─── Alarms ───

#[tokio::test(start_paused = true)]
async fn test_alarm_runs_check_for_known_name_only() {
    let s = setup(URL);
    s.scheduler.create(ALARM_NAME, Duration::from_secs(60));
    s.scheduler.create("somethingElse", Duration::from_secs(60));

    let other = s.scheduler.fire("somethingElse").unwrap();
    assert!(s.background.handle_alarm(&other).is_none());

    let fire = s.scheduler.fire(ALARM_NAME).unwrap();
    let check = s.background.handle_alarm(&fire).expect("check started");
    assert!(matches!(check.await.unwrap(), CycleReport::Completed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_alarm_without_url_is_ignored() {
    let s = setup("");
    s.scheduler.create(ALARM_NAME, Duration::from_secs(60));
    let fire = s.scheduler.fire(ALARM_NAME).unwrap();
    assert!(s.background.handle_alarm(&fire).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_alarm_for_unscheduled_name_is_ignored() {
    let s = setup(URL);
    assert!(s.background.handle_alarm(&AlarmFire::new(ALARM_NAME, 1)).is_none());
    assert_eq!(s.h.loader.opened_count(), 0);
}

/// Background driven by the real tokio scheduler.
fn setup_with_timers() -> (Setup, Arc<Background>, mpsc::UnboundedReceiver<AlarmFire>) {
    let s = setup(URL);
    let (scheduler, fires) = TokioScheduler::new();
    let background = Arc::new(Background::new(
        s.h.store.clone(),
        s.h.config.clone() as Arc<dyn ConfigService>,
        Arc::new(scheduler),
        s.h.monitor.clone(),
        s.power.clone(),
    ));
    (s, background, fires)
}

async fn write_to(
    s: &Setup,
    background: &Background,
    key: &str,
    value: Value,
) -> Option<JoinHandle<CycleReport>> {
    let mut changes = s.h.store.subscribe();
    s.h.store.set(key, value).await.unwrap();
    let change = changes.recv().await.unwrap();
    background.handle_change(&change).await
}

#[tokio::test(start_paused = true)]
async fn test_fire_queued_before_disable_starts_nothing() {
    let (s, background, mut fires) = setup_with_timers();
    let first = write_to(&s, &background, "monitorEnabled", json!(true)).await.unwrap();
    first.await.unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    write_to(&s, &background, "monitorEnabled", json!(false)).await;

    let queued = fires.try_recv().expect("fire queued before the schedule was cleared");
    let opened = s.h.loader.opened_count();
    assert!(background.handle_alarm(&queued).is_none());
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(s.h.loader.opened_count(), opened);
}

#[tokio::test(start_paused = true)]
async fn test_fire_queued_before_interval_change_is_dropped() {
    let (s, background, mut fires) = setup_with_timers();
    write_to(&s, &background, "monitorEnabled", json!(true)).await.unwrap().await.unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    write_to(&s, &background, "checkIntervalMinutes", json!(5)).await;

    let stale = fires.try_recv().expect("fire from the one-minute schedule");
    assert!(background.handle_alarm(&stale).is_none());

    tokio::time::sleep(Duration::from_secs(301)).await;
    let fresh = fires.try_recv().expect("fire from the five-minute schedule");
    let check = background.handle_alarm(&fresh).expect("check started");
    assert!(matches!(check.await.unwrap(), CycleReport::Completed { .. }));
}

// ─── Event loop ───

#[tokio::test(start_paused = true)]
async fn test_run_reacts_to_changes_and_stops_on_shutdown() {
    let s = setup(URL);
    let (alarm_tx, alarm_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let changes = s.h.store.subscribe();
    let task = tokio::spawn(s.background.clone().run(changes, alarm_rx, shutdown_rx));

    s.h.store.set("monitorEnabled", json!(true)).await.unwrap();
    while !s.scheduler.is_scheduled(ALARM_NAME) {
        tokio::task::yield_now().await;
    }

    alarm_tx.send(s.scheduler.fire(ALARM_NAME).unwrap()).unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(s.h.loader.opened_count() >= 1);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}
