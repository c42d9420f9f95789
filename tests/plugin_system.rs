// tests/plugin_system.rs
mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use survey_plugin_host::plugins::official::EmailNotifier;
use survey_plugin_host::plugins::{
    DispatchError, ExecutionError, HealthCheck, LoadError, Plugin, PluginOutcome, PoolConfig,
    RegistryError, TaskPayload, WorkerPool,
};
use survey_plugin_host::utils::config::{EmailNotifierSettings, Settings, SmtpSettings};
use survey_plugin_host::Application;
use tokio::sync::oneshot;
use tokio_test::{assert_err, assert_ok};

use common::{manager, CountingPlugin, FailingPlugin, PanickingPlugin, ProbedPlugin};

#[test_log::test]
fn test_duplicate_registration_keeps_first() {
    let manager = manager();
    assert_ok!(manager.register(CountingPlugin::with_version("audit", "1.0.0")));

    let err = assert_err!(manager.register(CountingPlugin::with_version("audit", "2.0.0")));
    assert_eq!(err, RegistryError::DuplicateName("audit".into()));
    assert_eq!(manager.get("audit").unwrap().metadata().version, "1.0.0");
}

#[test_log::test]
fn test_invalid_metadata_never_retrievable() {
    let manager = manager();

    let err = assert_err!(manager.register(CountingPlugin::with_version("", "1.0.0")));
    assert!(matches!(err, RegistryError::InvalidMetadata { .. }));
    let err = assert_err!(manager.register(CountingPlugin::with_version("audit", "")));
    assert!(matches!(err, RegistryError::InvalidMetadata { .. }));

    assert!(manager.get("").is_none());
    assert!(manager.get("audit").is_none());
}

#[test_log::test]
fn test_load_ordered_is_all_or_nothing() {
    let manager = manager();
    assert_ok!(manager.register(CountingPlugin::new("a")));

    let result = manager.load_ordered(&["a", "b"]);
    assert_eq!(result.err(), Some(LoadError::PluginNotFound("b".into())));

    let loaded = assert_ok!(manager.load_ordered(&["a"]));
    assert_eq!(loaded.len(), 1);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_execute_all_is_bounded_by_slowest_plugin() {
    let manager = manager();
    let delay = Duration::from_millis(300);
    let plugins: Vec<_> = ["slow_a", "slow_b", "slow_c", "slow_d"]
        .iter()
        .map(|name| CountingPlugin::slow(name, delay))
        .collect();
    for plugin in &plugins {
        assert_ok!(manager.register(plugin.clone()));
    }

    let started = Instant::now();
    let outcomes = assert_ok!(
        manager
            .execute_all(&["slow_a", "slow_b", "slow_c", "slow_d"])
            .await
    );
    let elapsed = started.elapsed();

    assert!(elapsed >= delay, "returned before plugins finished: {:?}", elapsed);
    assert!(elapsed < delay * 2, "plugins ran serially: {:?}", elapsed);
    assert!(outcomes.iter().all(PluginOutcome::is_started));
    for plugin in &plugins {
        assert_eq!(plugin.calls(), 1);
    }
}

#[test_log::test(tokio::test)]
async fn test_panicking_plugin_does_not_stop_others() {
    let manager = manager();
    let counter = CountingPlugin::new("counter");
    assert_ok!(manager.register(PanickingPlugin::new("faulty")));
    assert_ok!(manager.register(counter.clone()));
    assert_ok!(manager.register(FailingPlugin::new("refusing")));

    let outcomes = assert_ok!(manager.execute_all(&["faulty", "counter", "refusing"]).await);

    assert_eq!(counter.calls(), 1);
    assert!(matches!(
        &outcomes[0],
        PluginOutcome::Panicked { name, message }
            if name == "faulty" && message == "plugin faulty blew up"
    ));
    assert!(outcomes[1].is_started());
    assert!(matches!(&outcomes[2], PluginOutcome::Failed { name, .. } if name == "refusing"));
}

#[test_log::test(tokio::test)]
async fn test_execute_plugin_list_follows_configured_order() {
    let manager = manager().with_order(vec!["second".into(), "first".into()]);
    let first = CountingPlugin::new("first");
    let second = CountingPlugin::new("second");
    let idle = CountingPlugin::new("not_configured");
    assert_ok!(manager.register(first.clone()));
    assert_ok!(manager.register(second.clone()));
    assert_ok!(manager.register(idle.clone()));

    let outcomes = assert_ok!(manager.execute_plugin_list().await);

    let names: Vec<&str> = outcomes.iter().map(PluginOutcome::name).collect();
    assert_eq!(names, vec!["second", "first"]);
    assert_eq!(idle.calls(), 0);
}

#[test_log::test(tokio::test)]
async fn test_execute_by_name_with_legacy_params() {
    let manager = manager();
    assert_ok!(manager.register(FailingPlugin::new("webhook")));

    let params: HashMap<String, serde_json::Value> = [
        ("creator_email".to_string(), json!("owner@example.com")),
        ("survey_title".to_string(), json!("Parking survey")),
    ]
    .into_iter()
    .collect();
    let payload = assert_ok!(TaskPayload::from_params(&params));

    let err = assert_err!(manager.execute_by_name("webhook", Some(payload)).await);
    match err {
        DispatchError::Execution { plugin, source } => {
            assert_eq!(plugin, "webhook");
            assert!(matches!(source, ExecutionError::UnsupportedPayload { kind, .. } if kind == "response_notice"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let err = assert_err!(manager.execute_by_name("missing", None).await);
    assert!(matches!(err, DispatchError::PluginNotFound(_)));
}

#[test_log::test(tokio::test)]
async fn test_pool_submit_is_non_blocking_and_survives_panics() {
    let pool = assert_ok!(WorkerPool::new("integration", "0.1.0", PoolConfig::new(2, 100)));
    let counter = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel::<()>();

    let gated = counter.clone();
    assert_ok!(pool.submit(async move {
        let _ = gate.await;
        gated.fetch_add(1, Ordering::SeqCst);
    }));
    // The gated task cannot have finished: nothing has released it yet.
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    assert_ok!(pool.submit(async { panic!("task fault") }));
    let after = counter.clone();
    assert_ok!(pool.submit(async move {
        after.fetch_add(1, Ordering::SeqCst);
    }));

    let _ = release.send(());
    pool.wait_idle().await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    let metrics = pool.metrics();
    assert_eq!(metrics.submitted, 3);
    assert_eq!(metrics.panicked, 1);
    assert_eq!(metrics.completed, 2);
}

#[test_log::test(tokio::test)]
async fn test_plugin_status_and_health_report() {
    let manager = manager().with_order(vec!["up".into(), "down".into(), "plain".into()]);
    assert_ok!(manager.register(ProbedPlugin::new("up", true, "active: serving")));
    assert_ok!(manager.register(ProbedPlugin::new("down", false, "error: upstream gone")));
    assert_ok!(manager.register(CountingPlugin::new("plain")));

    assert_eq!(
        manager.plugin_status("down"),
        Some(("error: upstream gone".to_string(), false))
    );

    let report = assert_ok!(manager.health_report());
    let healthy: Vec<(&str, bool)> = report.iter().map(|h| (h.name.as_str(), h.healthy)).collect();
    assert_eq!(healthy, vec![("up", true), ("down", false), ("plain", true)]);
}

fn complete_smtp() -> EmailNotifierSettings {
    EmailNotifierSettings {
        smtp: SmtpSettings {
            host: "smtp.example.com".into(),
            port: 2525,
            username: "mailer".into(),
            password: "secret".into(),
            from: "Surveys <surveys@example.com>".into(),
        },
        ..Default::default()
    }
}

#[test_log::test(tokio::test)]
async fn test_email_notifier_ready_before_any_task() {
    let notifier = EmailNotifier::from_settings(&complete_smtp());

    assert!(notifier.is_healthy());
    assert_eq!(HealthCheck::status(&notifier), "active: ready to send emails");

    let pool = notifier.pool().unwrap();
    assert_eq!(pool.config().worker_count, 20);
    assert_eq!(pool.config().scale_threshold, 100);
    assert_eq!(pool.metrics().submitted, 0);
}

#[test_log::test(tokio::test)]
async fn test_application_keeps_disabled_notifier_registered() {
    let mut settings = Settings::default();
    settings.plugins.order = vec!["email_notifier".into()];
    let app = Application::new(settings);

    let (status, healthy) = app.plugin_manager().plugin_status("email_notifier").unwrap();
    assert!(!healthy);
    assert_eq!(status, "disabled: incomplete SMTP configuration");

    let outcomes = assert_ok!(app.start().await);
    assert!(matches!(&outcomes[0], PluginOutcome::Failed { error, .. } if error.contains("incomplete SMTP")));

    let payload = assert_ok!(TaskPayload::response_notice("owner@example.com", "Gym survey"));
    let err = assert_err!(app.plugin_manager().execute_by_name("email_notifier", Some(payload)).await);
    assert!(matches!(
        err,
        DispatchError::Execution { source: ExecutionError::Disabled(_), .. }
    ));

    assert_ok!(app.shutdown().await);
}

#[test_log::test(tokio::test)]
async fn test_application_start_fails_on_unknown_configured_plugin() {
    let mut settings = Settings::default();
    settings.plugins.order = vec!["email_notifier".into(), "sms_notifier".into()];
    let app = Application::new(settings);

    let err = assert_err!(app.start().await);
    assert!(err.to_string().contains("sms_notifier"));
}
