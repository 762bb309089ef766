// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in `scheduled_task` tool: reminders and recurring briefings,
//! backed by the scheduler and the store.

use async_trait::async_trait;
use chrono_tz::Tz;
use serde::Deserialize;

use mnemos_core::time::{format_interval, human_time, now_ts};
use mnemos_core::types::{ScheduledTask, TaskStatus, Trigger};
use mnemos_core::Error;
use mnemos_scheduler::{build_task, trigger::parse_trigger};
use mnemos_storage::Store;

use crate::tool::Tool;

pub const SCHEDULED_TASK_TOOL_NAME: &str = "scheduled_task";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TaskArgs {
    action: Option<String>,
    task_id: Option<String>,
    name: Option<String>,
    trigger_type: Option<String>,
    time: Option<String>,
    message: Option<String>,
}

/// Task management exposed to the model. Hidden during scheduled turns
/// by the registry filter.
pub struct ScheduledTaskTool {
    store: Store,
    tz: Tz,
}

impl ScheduledTaskTool {
    pub fn new(store: Store, tz: Tz) -> ScheduledTaskTool {
        ScheduledTaskTool { store, tz }
    }

    async fn create(&self, args: &TaskArgs) -> Result<String, Error> {
        let name = args
            .name
            .as_deref()
            .ok_or_else(|| Error::BadArgument("'name' is required for create".into()))?;
        let trigger_type = args.trigger_type.as_deref().ok_or_else(|| {
            Error::BadArgument("'trigger_type' is required for create (once or interval)".into())
        })?;
        let time = args
            .time
            .as_deref()
            .ok_or_else(|| Error::BadArgument("'time' is required for create".into()))?;
        let message = args
            .message
            .as_deref()
            .ok_or_else(|| Error::BadArgument("'message' is required for create".into()))?;

        let now = now_ts();
        let trigger = parse_trigger(trigger_type, time, now, self.tz)?;
        let task = build_task(name, trigger, message, now)?;
        let task_id = task.task_id.clone();
        self.store.upsert_task(&task).await?;

        Ok(match trigger {
            Trigger::Once { timestamp } => format!(
                "Task created (ID: {task_id})\nName: {name}\nType: one-time\nTrigger at: {}\nMessage: {message}",
                human_time(timestamp, self.tz)
            ),
            Trigger::Interval { interval_secs } => format!(
                "Task created (ID: {task_id})\nName: {name}\nType: recurring\nInterval: {}\nNext run: {}\nMessage: {message}",
                format_interval(interval_secs),
                human_time(task.next_run_at, self.tz)
            ),
        })
    }

    async fn list(&self) -> Result<String, Error> {
        let tasks = self.store.all_tasks(Some(TaskStatus::Active)).await?;
        if tasks.is_empty() {
            return Ok("No active tasks found.".to_string());
        }
        let mut out = format!("Active tasks ({}):\n", tasks.len());
        for task in &tasks {
            out.push('\n');
            out.push_str(&self.render(task));
            out.push('\n');
        }
        Ok(out.trim_end().to_string())
    }

    async fn get(&self, task_id: Option<&str>) -> Result<String, Error> {
        let task = self.require(task_id).await?;
        Ok(self.render(&task))
    }

    async fn cancel(&self, task_id: Option<&str>) -> Result<String, Error> {
        let task = self.require(task_id).await?;
        self.store
            .set_task_status(&task.task_id, TaskStatus::Completed)
            .await?;
        Ok(format!("Task cancelled: {}", task.name))
    }

    async fn pause(&self, task_id: Option<&str>) -> Result<String, Error> {
        let task = self.require(task_id).await?;
        if task.status != TaskStatus::Active {
            return Ok(format!(
                "Task is not active (current status: {})",
                task.status
            ));
        }
        self.store
            .set_task_status(&task.task_id, TaskStatus::Paused)
            .await?;
        Ok(format!("Task paused: {}", task.name))
    }

    async fn resume(&self, task_id: Option<&str>) -> Result<String, Error> {
        let task = self.require(task_id).await?;
        if task.status != TaskStatus::Paused {
            return Ok(format!(
                "Task is not paused (current status: {})",
                task.status
            ));
        }
        self.store
            .set_task_status(&task.task_id, TaskStatus::Active)
            .await?;
        Ok(format!("Task resumed: {}", task.name))
    }

    async fn require(&self, task_id: Option<&str>) -> Result<ScheduledTask, Error> {
        let task_id =
            task_id.ok_or_else(|| Error::BadArgument("'task_id' is required".into()))?;
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {task_id}")))
    }

    fn render(&self, task: &ScheduledTask) -> String {
        let mut out = format!(
            "Task: {}\nID: {}\nStatus: {}\n",
            task.name, task.task_id, task.status
        );
        match task.trigger {
            Trigger::Once { timestamp } => {
                out.push_str(&format!("Type: once\nTrigger at: {}\n", human_time(timestamp, self.tz)));
            }
            Trigger::Interval { interval_secs } => {
                out.push_str(&format!(
                    "Type: interval\nInterval: {}\nNext run: {}\n",
                    format_interval(interval_secs),
                    human_time(task.next_run_at, self.tz)
                ));
            }
        }
        if let Some(last) = task.last_run_at {
            out.push_str(&format!("Last run: {}\n", human_time(last, self.tz)));
        }
        out.push_str(&format!("Message: {}", task.message));
        out
    }
}

#[async_trait]
impl Tool for ScheduledTaskTool {
    fn name(&self) -> &str {
        SCHEDULED_TASK_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Manage scheduled tasks: reminders and recurring briefings. Use \
         when the user asks to be reminded, wants a recurring message, or \
         wants to inspect, pause, resume, or cancel an existing task. For \
         one-time tasks 'time' accepts an epoch timestamp, an ISO datetime, \
         'in N minutes/hours/days', 'tomorrow', or 'next week'; recurring \
         tasks use an interval like '30s', '5m', '1h', '1d', '1w'."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["create", "list", "get", "pause", "resume", "cancel"],
                    "description": "Operation to perform."
                },
                "task_id": {
                    "type": "string",
                    "description": "Task identifier; required for get, pause, resume, cancel. Obtain it from 'list'."
                },
                "name": {
                    "type": "string",
                    "description": "Descriptive task name (create only)."
                },
                "trigger_type": {
                    "type": "string",
                    "enum": ["once", "interval"],
                    "description": "'once' for a single reminder, 'interval' for recurring (create only)."
                },
                "time": {
                    "type": "string",
                    "description": "When to trigger: '2026-02-01 14:30:00', 'in 30 minutes', 'tomorrow' for once; '1h', '1d' for interval (create only)."
                },
                "message": {
                    "type": "string",
                    "description": "The briefing delivered when the task fires (create only)."
                }
            },
            "required": ["action"]
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<String, Error> {
        let args: TaskArgs = serde_json::from_value(args)
            .map_err(|e| Error::BadArgument(format!("invalid scheduled_task arguments: {e}")))?;

        match args.action.as_deref() {
            Some("create") => self.create(&args).await,
            Some("list") => self.list().await,
            Some("get") => self.get(args.task_id.as_deref()).await,
            Some("cancel") => self.cancel(args.task_id.as_deref()).await,
            Some("pause") => self.pause(args.task_id.as_deref()).await,
            Some("resume") => self.resume(args.task_id.as_deref()).await,
            Some(other) => Err(Error::BadArgument(format!("unknown action '{other}'"))),
            None => Err(Error::BadArgument("'action' is required".into())),
        }
    }
}
