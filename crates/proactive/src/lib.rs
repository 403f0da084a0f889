//! Cooperative scheduler of named background tasks — spec.md §4.9.
//!
//! Grounded on `crates/runtime/src/server/mod.rs`'s Task-C proactive loop:
//! a `tokio::select!` between a fixed poll sleep and a shutdown `watch`
//! channel, an `Instant`-based "has this task's interval elapsed" guard,
//! and the `is_in_window` day/night-cycle helper — generalized here from
//! one hard-coded task to an arbitrary named-task registry.

mod trigger;

pub use trigger::Trigger;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};

use omnibrain_bus::EventBus;
use omnibrain_scoring::NotificationLevel;

/// How often the engine wakes up to check which tasks are due. Matches the
/// teacher's Task-C poll cadence.
const TICK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub data: Value,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>, data: Value) -> Self {
        Self { level, title: title.into(), message: message.into(), data }
    }
}

/// Shared context passed to every task handler. Intentionally a thin,
/// opaque bag — handlers are implemented by whoever wires up Memory,
/// KnowledgeGraph, and the LLM client; this crate only drives the clock.
pub type Resources = Arc<dyn std::any::Any + Send + Sync>;

#[async_trait]
pub trait ProactiveHandler: Send + Sync {
    async fn run(&self, resources: &Resources) -> anyhow::Result<Option<Vec<Notification>>>;
}

struct Task {
    name: String,
    trigger: Trigger,
    handler: Arc<dyn ProactiveHandler>,
    last_run: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub name: String,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub next_due: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub task_count: usize,
    pub tasks: Vec<TaskStatus>,
}

pub struct ProactiveEngine {
    tasks: Mutex<Vec<Task>>,
    bus: Arc<EventBus>,
    resources: Resources,
    running: std::sync::atomic::AtomicBool,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl ProactiveEngine {
    pub fn new(bus: Arc<EventBus>, resources: Resources) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            tasks: Mutex::new(Vec::new()),
            bus,
            resources,
            running: std::sync::atomic::AtomicBool::new(false),
            cancel_tx,
            cancel_rx,
        }
    }

    pub async fn register(&self, name: impl Into<String>, trigger: Trigger, handler: Arc<dyn ProactiveHandler>) {
        self.tasks.lock().await.push(Task {
            name: name.into(),
            trigger,
            handler,
            last_run: None,
            last_error: None,
        });
    }

    /// Registers the six default tasks with reasonable cadences: the two
    /// sync checks run every 5 minutes, pattern detection hourly, the
    /// morning/evening briefings at fixed times, and the weekly briefing
    /// on Monday morning.
    pub async fn register_defaults(&self, handlers: DefaultHandlers) {
        self.register("check_emails", Trigger::Interval(Duration::from_secs(5 * 60)), handlers.check_emails).await;
        self.register("check_calendar", Trigger::Interval(Duration::from_secs(5 * 60)), handlers.check_calendar).await;
        self.register("detect_patterns", Trigger::Interval(Duration::from_secs(60 * 60)), handlers.detect_patterns).await;
        self.register("morning_briefing", Trigger::TimeOfDay("08:00".to_string()), handlers.morning_briefing).await;
        self.register("evening_briefing", Trigger::TimeOfDay("18:00".to_string()), handlers.evening_briefing).await;
        self.register("weekly_briefing", Trigger::Weekly("MON 09:00".to_string()), handlers.weekly_briefing).await;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Enters the 60-second tick loop. Returns once `stop()` is called and
    /// the in-flight tick has settled.
    pub async fn run(&self, notify: impl Fn(&Notification) + Send + Sync) {
        self.running.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut cancel_rx = self.cancel_rx.clone();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(TICK_INTERVAL) => {}
                changed = cancel_rx.changed() => {
                    if changed.is_ok() && *cancel_rx.borrow() {
                        break;
                    }
                    continue;
                }
            }

            self.run_due_tasks(&notify).await;
        }

        self.running.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    async fn run_due_tasks(&self, notify: &impl Fn(&Notification)) {
        let now = Utc::now();
        let due_indices: Vec<usize> = {
            let tasks = self.tasks.lock().await;
            tasks
                .iter()
                .enumerate()
                .filter(|(_, t)| t.trigger.is_due(now, t.last_run))
                .map(|(i, _)| i)
                .collect()
        };

        for idx in due_indices {
            let (name, handler) = {
                let tasks = self.tasks.lock().await;
                (tasks[idx].name.clone(), tasks[idx].handler.clone())
            };

            match handler.run(&self.resources).await {
                Ok(Some(notifications)) => {
                    for n in notifications {
                        notify(&n);
                        self.bus.publish(
                            omnibrain_bus::TOPIC_NOTIFICATION,
                            serde_json::json!({"level": n.level.as_str(), "title": n.title, "message": n.message, "data": n.data}),
                        );
                    }
                    let mut tasks = self.tasks.lock().await;
                    tasks[idx].last_run = Some(now);
                    tasks[idx].last_error = None;
                }
                Ok(None) => {
                    let mut tasks = self.tasks.lock().await;
                    tasks[idx].last_run = Some(now);
                    tasks[idx].last_error = None;
                }
                Err(err) => {
                    tracing::warn!(task = %name, %err, "proactive task failed");
                    let fyi = Notification::new(
                        NotificationLevel::Fyi,
                        format!("{name} failed"),
                        err.to_string(),
                        Value::Null,
                    );
                    notify(&fyi);
                    self.bus.publish(
                        omnibrain_bus::TOPIC_NOTIFICATION,
                        serde_json::json!({"level": "fyi", "title": fyi.title, "message": fyi.message}),
                    );
                    let mut tasks = self.tasks.lock().await;
                    tasks[idx].last_run = Some(now);
                    tasks[idx].last_error = Some(err.to_string());
                }
            }
        }
    }

    /// Signals the tick loop to exit after the current tick settles.
    pub fn stop(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub async fn get_status(&self) -> EngineStatus {
        let tasks = self.tasks.lock().await;
        let now = Utc::now();
        EngineStatus {
            running: self.is_running(),
            task_count: tasks.len(),
            tasks: tasks
                .iter()
                .map(|t| TaskStatus {
                    name: t.name.clone(),
                    last_run: t.last_run,
                    last_error: t.last_error.clone(),
                    next_due: t.trigger.next_due(now, t.last_run),
                })
                .collect(),
        }
    }
}

/// Handler bundle for `register_defaults`. Each field corresponds to one
/// of spec.md §4.9's six named default tasks.
pub struct DefaultHandlers {
    pub check_emails: Arc<dyn ProactiveHandler>,
    pub check_calendar: Arc<dyn ProactiveHandler>,
    pub detect_patterns: Arc<dyn ProactiveHandler>,
    pub morning_briefing: Arc<dyn ProactiveHandler>,
    pub evening_briefing: Arc<dyn ProactiveHandler>,
    pub weekly_briefing: Arc<dyn ProactiveHandler>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl ProactiveHandler for CountingHandler {
        async fn run(&self, _resources: &Resources) -> anyhow::Result<Option<Vec<Notification>>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl ProactiveHandler for FailingHandler {
        async fn run(&self, _resources: &Resources) -> anyhow::Result<Option<Vec<Notification>>> {
            Err(anyhow::anyhow!("boom"))
        }
    }

    fn engine() -> ProactiveEngine {
        let bus = Arc::new(EventBus::new());
        let resources: Resources = Arc::new(());
        ProactiveEngine::new(bus, resources)
    }

    #[tokio::test]
    async fn never_run_task_is_immediately_due() {
        let e = engine();
        let counter = Arc::new(AtomicUsize::new(0));
        e.register("t", Trigger::Interval(Duration::from_secs(300)), Arc::new(CountingHandler(counter.clone()))).await;
        e.run_due_tasks(&|_| {}).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn interval_task_does_not_rerun_before_due() {
        let e = engine();
        let counter = Arc::new(AtomicUsize::new(0));
        e.register("t", Trigger::Interval(Duration::from_secs(300)), Arc::new(CountingHandler(counter.clone()))).await;
        e.run_due_tasks(&|_| {}).await;
        e.run_due_tasks(&|_| {}).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_task_records_last_error_and_continues() {
        let e = engine();
        e.register("boom", Trigger::Interval(Duration::from_secs(300)), Arc::new(FailingHandler)).await;
        e.run_due_tasks(&|_| {}).await;
        let status = e.get_status().await;
        assert_eq!(status.tasks[0].last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn status_reports_task_count() {
        let e = engine();
        let counter = Arc::new(AtomicUsize::new(0));
        e.register("a", Trigger::Interval(Duration::from_secs(60)), Arc::new(CountingHandler(counter.clone()))).await;
        e.register("b", Trigger::Interval(Duration::from_secs(60)), Arc::new(CountingHandler(counter))).await;
        let status = e.get_status().await;
        assert_eq!(status.task_count, 2);
        assert!(!status.running);
    }

    #[tokio::test]
    async fn stop_halts_the_tick_loop() {
        let e = Arc::new(engine());
        let e2 = e.clone();
        let handle = tokio::spawn(async move { e2.run(|_| {}).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(e.is_running());
        e.stop();
        handle.await.unwrap();
        assert!(!e.is_running());
    }
}
