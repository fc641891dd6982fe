//! Unit tests for the alert popup: parameter handling, rendering and the
//! one-shot sound retry.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use serde_json::json;

use common::{assets_dir, locales_dir, memory_store, tuning, FakePlayer};
use ticketwatch::managers::alert_window::{
    build_alert_view, on_alert_ready, render_alert_html, AlertParams, NEUTRAL_COLOR,
};
use ticketwatch::services::localization_engine::{LocalizationEngine, LocalizationEngineTrait};
use ticketwatch::services::settings_store::{KeyValueStore, SqliteStore};
use ticketwatch::services::sound::PlaybackOutcome;
use ticketwatch::types::counters::{AlertEvent, Category};

fn i18n(locale: &str) -> LocalizationEngine {
    let mut engine = LocalizationEngine::new(locales_dir());
    engine.initialize().expect("bundled locales");
    engine.set_locale(locale).unwrap();
    engine
}

fn danger_params() -> AlertParams {
    AlertParams::from_event(&AlertEvent::new(Category::Danger, 7))
}

async fn sound_on() -> Arc<SqliteStore> {
    let store = memory_store();
    store.set("enableSound", json!(true)).await.unwrap();
    store
}

// ─── Display values ───

#[test]
fn test_known_category_uses_translated_title_and_color() {
    let view = build_alert_view(&danger_params(), &i18n("en"));

    assert_eq!(view.category, Some(Category::Danger));
    assert_eq!(view.title, "🚨 New Trouble Ticket");
    assert_eq!(view.details, "Current Ticket Count: 7");
    assert_eq!(view.color, "#E60028");
}

#[test]
fn test_title_follows_active_language() {
    let english = build_alert_view(&danger_params(), &i18n("en"));
    let german = build_alert_view(&danger_params(), &i18n("de"));

    assert_ne!(german.title, english.title);
    assert!(german.details.contains('7'));
}

#[test]
fn test_unknown_type_falls_back_to_neutral() {
    let params = AlertParams::from_query("?type=purple&title=Hello&color=%23FF00FF&value=3");

    let view = build_alert_view(&params, &i18n("en"));

    assert_eq!(view.category, None);
    assert_eq!(view.title, "New Ticket");
    assert_eq!(view.color, NEUTRAL_COLOR);
}

#[test]
fn test_color_parameter_is_ignored() {
    let mut params = danger_params();
    params.color = "red;background:url(x)".to_string();

    assert_eq!(build_alert_view(&params, &i18n("en")).color, "#E60028");
}

#[test]
fn test_rendered_page_escapes_parameters() {
    let params = AlertParams::from_query("?type=warning&value=%3Cscript%3Ealert(1)%3C%2Fscript%3E");

    let html = render_alert_html(&params, &i18n("en"));

    assert!(!html.contains("<script>alert(1)"));
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(html.contains("background-color:#FFD33D"));
    assert!(html.contains("⚠️ New Cross Connect"));
    assert!(html.contains(">Settings</a>"));
}

#[test]
fn test_locator_round_trips_through_query() {
    let params = danger_params();
    let locator = params.to_locator();

    assert!(locator.starts_with("ticketwatch://localhost/alert?"));
    assert_eq!(AlertParams::from_query(&locator), params);
}

// ─── Sound ───

#[tokio::test(start_paused = true)]
async fn test_sound_disabled_skips_playback() {
    let store = memory_store();
    let player = Arc::new(FakePlayer::default());

    let outcome = on_alert_ready(store.as_ref(), player.clone(), &assets_dir(), &danger_params(), &tuning()).await;

    assert_eq!(outcome, PlaybackOutcome::Skipped);
    assert_eq!(player.attempt_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sound_plays_bundled_file_at_volume() {
    let store = sound_on().await;
    let player = Arc::new(FakePlayer::default());

    let outcome = on_alert_ready(store.as_ref(), player.clone(), &assets_dir(), &danger_params(), &tuning()).await;

    assert_eq!(outcome, PlaybackOutcome::Played);
    let attempts = player.attempts.lock().unwrap().clone();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].0, assets_dir().join("sounds/new-trouble-ticket.wav"));
    assert!((attempts[0].1 - 0.7).abs() < f32::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_sound_retries_once() {
    let store = sound_on().await;
    let player = Arc::new(FakePlayer::failing(1));

    let outcome = on_alert_ready(store.as_ref(), player.clone(), &assets_dir(), &danger_params(), &tuning()).await;

    assert_eq!(outcome, PlaybackOutcome::PlayedOnRetry);
    assert_eq!(player.attempt_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sound_gives_up_after_second_failure() {
    let store = sound_on().await;
    let player = Arc::new(FakePlayer::failing(5));

    let outcome = on_alert_ready(store.as_ref(), player.clone(), &assets_dir(), &danger_params(), &tuning()).await;

    assert!(matches!(outcome, PlaybackOutcome::Failed(_)));
    assert_eq!(player.attempt_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_sound_is_never_played() {
    let store = sound_on().await;
    let player = Arc::new(FakePlayer::default());
    let mut params = danger_params();
    params.sound = "../../etc/passwd".to_string();

    let outcome = on_alert_ready(store.as_ref(), player.clone(), &assets_dir(), &params, &tuning()).await;

    assert!(matches!(outcome, PlaybackOutcome::Failed(_)));
    assert_eq!(player.attempt_count(), 0);
}
