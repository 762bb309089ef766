// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The persistent scheduler.
//!
//! A periodic tick asks the store for due tasks and hands each one, as
//! a synthetic `[SYSTEM_SCHEDULED_TASK]` briefing, to the registered
//! firing handler. The attempt record (last run, completion or
//! reschedule) commits before the tick yields, so a `once` task can
//! never fire twice.

pub mod seed;
pub mod trigger;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use mnemos_core::time::{human_time, now_ts};
use mnemos_core::types::{ScheduledTask, TaskStatus, Trigger};
use mnemos_core::Error;
use mnemos_storage::Store;

/// Receiver of scheduled firings, implemented by the orchestrator.
///
/// The handler runs with the task-management tool hidden so the model
/// cannot schedule further tasks from inside a scheduled turn.
#[async_trait]
pub trait FiringHandler: Send + Sync {
    async fn handle_scheduled(&self, prompt: String) -> Result<(), Error>;
}

/// Fixed preamble of every synthetic scheduled prompt.
pub const SCHEDULED_TASK_PREAMBLE: &str = "[SYSTEM_SCHEDULED_TASK]";

/// Compose the synthetic user-role briefing for a firing.
pub fn synthetic_prompt(task: &ScheduledTask, tz: Tz) -> String {
    format!(
        "{SCHEDULED_TASK_PREAMBLE} Scheduled task \"{}\" fired at {}.\n\
         This is a briefing for you to act upon, not a message typed by \
         the user.\n\nTask briefing: {}",
        task.name,
        human_time(task.next_run_at, tz),
        task.message
    )
}

/// Durable timer over the store's scheduled tasks.
pub struct Scheduler {
    store: Store,
    handler: Arc<dyn FiringHandler>,
    poll_interval: Duration,
    tz: Tz,
}

impl Scheduler {
    pub fn new(
        store: Store,
        handler: Arc<dyn FiringHandler>,
        poll_interval: Duration,
        tz: Tz,
    ) -> Scheduler {
        Scheduler {
            store,
            handler,
            poll_interval,
            tz,
        }
    }

    /// Create and persist a task from a parsed trigger. Returns the id.
    pub async fn create_task(
        &self,
        name: &str,
        trigger: Trigger,
        message: &str,
        now: i64,
    ) -> Result<String, Error> {
        let task = build_task(name, trigger, message, now)?;
        let task_id = task.task_id.clone();
        self.store.upsert_task(&task).await?;
        info!(task_id = task_id.as_str(), name, "task created");
        Ok(task_id)
    }

    /// Run one tick: fire every active task due at `now`, in
    /// `next_run_at` order. Returns how many firings were attempted.
    ///
    /// Each attempt's bookkeeping commits before the next firing starts,
    /// so a concurrent or re-entrant tick never sees the task as due.
    pub async fn tick_once(&self, now: i64) -> Result<usize, Error> {
        let due = self.store.tasks_due(now).await?;
        let mut fired = 0;

        for task in due {
            fired += 1;
            let prompt = synthetic_prompt(&task, self.tz);

            // Commit the attempt first: a once task must not refire
            // even if the handler fails or the process dies mid-call.
            self.store.finish_task_firing(&task, now).await?;

            debug!(task_id = task.task_id.as_str(), "firing task");
            if let Err(e) = self.handler.handle_scheduled(prompt).await {
                error!(
                    task_id = task.task_id.as_str(),
                    error = %e,
                    kind = e.kind(),
                    "scheduled firing failed"
                );
            }
        }

        Ok(fired)
    }

    /// Poll until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval = ?self.poll_interval, "scheduler started");
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick_once(now_ts()).await {
                        error!(error = %e, kind = e.kind(), "scheduler tick failed");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("scheduler stopped");
                    break;
                }
            }
        }
    }
}

/// Assemble a new active task, deriving `next_run_at` from the trigger.
pub fn build_task(
    name: &str,
    trigger: Trigger,
    message: &str,
    now: i64,
) -> Result<ScheduledTask, Error> {
    if name.trim().is_empty() {
        return Err(Error::BadArgument("task name must be non-empty".into()));
    }
    if message.trim().is_empty() {
        return Err(Error::BadArgument("task message must be non-empty".into()));
    }
    let next_run_at = match trigger {
        Trigger::Once { timestamp } => timestamp,
        Trigger::Interval { interval_secs } => now + interval_secs,
    };
    if next_run_at <= 0 {
        return Err(Error::BadArgument(
            "trigger resolves to a non-positive timestamp".into(),
        ));
    }
    Ok(ScheduledTask {
        task_id: uuid::Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        trigger,
        message: message.to_string(),
        created_at: now,
        next_run_at,
        last_run_at: None,
        status: TaskStatus::Active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Handler recording every prompt it receives.
    struct RecordingHandler {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingHandler {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(RecordingHandler {
                prompts: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl FiringHandler for RecordingHandler {
        async fn handle_scheduled(&self, prompt: String) -> Result<(), Error> {
            self.prompts.lock().unwrap().push(prompt);
            if self.fail {
                Err(Error::upstream("handler failed"))
            } else {
                Ok(())
            }
        }
    }

    async fn harness(fail: bool) -> (Scheduler, Arc<RecordingHandler>, Store, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db"), 4).await.unwrap();
        let handler = RecordingHandler::new(fail);
        let scheduler = Scheduler::new(
            store.clone(),
            handler.clone(),
            Duration::from_secs(1),
            chrono_tz::UTC,
        );
        (scheduler, handler, store, dir)
    }

    #[tokio::test]
    async fn once_task_fires_exactly_once() {
        let (scheduler, handler, store, _dir) = harness(false).await;
        scheduler
            .create_task("ping", Trigger::Once { timestamp: 100 }, "M", 50)
            .await
            .unwrap();

        assert_eq!(scheduler.tick_once(99).await.unwrap(), 0);
        assert_eq!(scheduler.tick_once(100).await.unwrap(), 1);
        assert_eq!(handler.count(), 1);
        assert!(handler.prompts.lock().unwrap()[0].contains("[SYSTEM_SCHEDULED_TASK]"));
        assert!(handler.prompts.lock().unwrap()[0].contains("M"));

        // Many further ticks: never fires again.
        for now in 101..140 {
            assert_eq!(scheduler.tick_once(now).await.unwrap(), 0);
        }
        assert_eq!(handler.count(), 1);

        let tasks = store.all_tasks(None).await.unwrap();
        assert_eq!(tasks[0].status, TaskStatus::Completed);
        assert_eq!(tasks[0].last_run_at, Some(100));
    }

    #[tokio::test]
    async fn interval_task_cadence_within_poll_slack() {
        let (scheduler, handler, store, _dir) = harness(false).await;
        scheduler
            .create_task("tick", Trigger::Interval { interval_secs: 3 }, "T", 100)
            .await
            .unwrap();

        // Poll every second for ~13 seconds: 4 firings expected.
        let mut firings = Vec::new();
        for now in 101..=113 {
            if scheduler.tick_once(now).await.unwrap() > 0 {
                firings.push(now);
            }
        }
        assert_eq!(firings, vec![103, 106, 109, 112]);
        assert_eq!(handler.count(), 4);

        // |next_run_at - last_run_at - interval| == 0 with exact ticks.
        let task = store.all_tasks(None).await.unwrap().remove(0);
        assert_eq!(task.next_run_at - task.last_run_at.unwrap(), 3);
        assert_eq!(task.status, TaskStatus::Active);
    }

    #[tokio::test]
    async fn late_ticks_catch_up_without_drift_explosion() {
        let (scheduler, handler, _store, _dir) = harness(false).await;
        scheduler
            .create_task("tick", Trigger::Interval { interval_secs: 5 }, "T", 100)
            .await
            .unwrap();

        // The poll that finally runs at 120 fires once, then the task
        // is rescheduled relative to the firing time.
        assert_eq!(scheduler.tick_once(120).await.unwrap(), 1);
        assert_eq!(scheduler.tick_once(121).await.unwrap(), 0);
        assert_eq!(scheduler.tick_once(125).await.unwrap(), 1);
        assert_eq!(handler.count(), 2);
    }

    #[tokio::test]
    async fn failed_once_firing_still_completes() {
        let (scheduler, handler, store, _dir) = harness(true).await;
        scheduler
            .create_task("flaky", Trigger::Once { timestamp: 10 }, "M", 5)
            .await
            .unwrap();

        assert_eq!(scheduler.tick_once(10).await.unwrap(), 1);
        assert_eq!(handler.count(), 1);

        // Predictability over availability: no retry storm.
        assert_eq!(scheduler.tick_once(11).await.unwrap(), 0);
        let task = store.all_tasks(None).await.unwrap().remove(0);
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn due_tasks_fire_in_next_run_order() {
        let (scheduler, handler, _store, _dir) = harness(false).await;
        scheduler
            .create_task("second", Trigger::Once { timestamp: 20 }, "B", 1)
            .await
            .unwrap();
        scheduler
            .create_task("first", Trigger::Once { timestamp: 10 }, "A", 1)
            .await
            .unwrap();

        scheduler.tick_once(30).await.unwrap();
        let prompts = handler.prompts.lock().unwrap();
        assert!(prompts[0].contains("\"first\""));
        assert!(prompts[1].contains("\"second\""));
    }

    #[test]
    fn build_task_validates_inputs() {
        assert_eq!(
            build_task("", Trigger::Once { timestamp: 10 }, "m", 1)
                .unwrap_err()
                .kind(),
            "bad_argument"
        );
        assert_eq!(
            build_task("n", Trigger::Once { timestamp: 10 }, "", 1)
                .unwrap_err()
                .kind(),
            "bad_argument"
        );
        let task = build_task("n", Trigger::Interval { interval_secs: 60 }, "m", 100).unwrap();
        assert_eq!(task.next_run_at, 160);
        assert_eq!(task.status, TaskStatus::Active);
    }

    #[test]
    fn synthetic_prompt_contains_required_parts() {
        let task = build_task("morning check", Trigger::Once { timestamp: 1000 }, "say hi", 1)
            .unwrap();
        let prompt = synthetic_prompt(&task, chrono_tz::UTC);
        assert!(prompt.starts_with(SCHEDULED_TASK_PREAMBLE));
        assert!(prompt.contains("morning check"));
        assert!(prompt.contains("say hi"));
        assert!(prompt.contains("1970-01-01 00:16:40"));
    }
}
