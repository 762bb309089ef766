// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled-task persistence.
//!
//! The firing bookkeeping is a single UPDATE so a `once` task can never
//! be observed due again after its first firing (the historical refire
//! bug this schema exists to prevent).

use rusqlite::params;
use tracing::debug;

use mnemos_core::types::{ScheduledTask, TaskStatus, Trigger};
use mnemos_core::Error;

use crate::database::{map_store_err, Store};

const TASK_COLUMNS: &str =
    "task_id, name, trigger_type, trigger_config, message, created_at, next_run_at, last_run_at, status";

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<ScheduledTask> {
    let trigger_type: String = row.get(2)?;
    let trigger_config: String = row.get(3)?;
    let status: String = row.get(8)?;
    let trigger = Trigger::from_parts(&trigger_type, &trigger_config).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            e.to_string().into(),
        )
    })?;
    Ok(ScheduledTask {
        task_id: row.get(0)?,
        name: row.get(1)?,
        trigger,
        message: row.get(4)?,
        created_at: row.get(5)?,
        next_run_at: row.get(6)?,
        last_run_at: row.get(7)?,
        status: status.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Text,
                format!("unknown task status: {status}").into(),
            )
        })?,
    })
}

impl Store {
    /// Insert or replace a task by id.
    pub async fn upsert_task(&self, task: &ScheduledTask) -> Result<(), Error> {
        if task.next_run_at <= 0 {
            return Err(Error::BadArgument(
                "next_run_at must be a positive timestamp".into(),
            ));
        }
        let task = task.clone();
        let task_id = task.task_id.clone();
        self.connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO scheduled_tasks
                     (task_id, name, trigger_type, trigger_config, message,
                      created_at, next_run_at, last_run_at, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        task.task_id,
                        task.name,
                        task.trigger.type_str(),
                        task.trigger.config_json(),
                        task.message,
                        task.created_at,
                        task.next_run_at,
                        task.last_run_at,
                        task.status.to_string(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_store_err)?;
        debug!(task_id = task_id.as_str(), "task upserted");
        Ok(())
    }

    /// Active tasks with `next_run_at <= now`, soonest first.
    pub async fn tasks_due(&self, now: i64) -> Result<Vec<ScheduledTask>, Error> {
        self.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM scheduled_tasks
                     WHERE status = 'active' AND next_run_at <= ?1
                     ORDER BY next_run_at ASC"
                ))?;
                let tasks = stmt
                    .query_map(params![now], row_to_task)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tasks)
            })
            .await
            .map_err(map_store_err)
    }

    /// Fetch one task by id.
    pub async fn get_task(&self, task_id: &str) -> Result<Option<ScheduledTask>, Error> {
        let task_id = task_id.to_string();
        self.connection()
            .call(move |conn| {
                let result = conn.query_row(
                    &format!("SELECT {TASK_COLUMNS} FROM scheduled_tasks WHERE task_id = ?1"),
                    params![task_id],
                    row_to_task,
                );
                match result {
                    Ok(task) => Ok(Some(task)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(map_store_err)
    }

    /// All tasks, optionally filtered by status, soonest first.
    pub async fn all_tasks(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<ScheduledTask>, Error> {
        self.connection()
            .call(move |conn| {
                let mut tasks = Vec::new();
                match status {
                    Some(status) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {TASK_COLUMNS} FROM scheduled_tasks
                             WHERE status = ?1 ORDER BY next_run_at ASC"
                        ))?;
                        for row in stmt.query_map(params![status.to_string()], row_to_task)? {
                            tasks.push(row?);
                        }
                    }
                    None => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {TASK_COLUMNS} FROM scheduled_tasks ORDER BY next_run_at ASC"
                        ))?;
                        for row in stmt.query_map([], row_to_task)? {
                            tasks.push(row?);
                        }
                    }
                }
                Ok(tasks)
            })
            .await
            .map_err(map_store_err)
    }

    /// Update only the status of a task.
    pub async fn set_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<(), Error> {
        let task_id = task_id.to_string();
        let call_task_id = task_id.clone();
        let changed = self
            .connection()
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE scheduled_tasks SET status = ?1 WHERE task_id = ?2",
                    params![status.to_string(), call_task_id],
                )?;
                Ok(n)
            })
            .await
            .map_err(map_store_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("task {task_id}")));
        }
        Ok(())
    }

    /// Record a firing attempt atomically: stamps `last_run_at`, and in
    /// the same statement either completes a `once` task or advances an
    /// `interval` task's `next_run_at`. Committed before returning, so a
    /// re-entrant tick can never observe the task as still due.
    pub async fn finish_task_firing(
        &self,
        task: &ScheduledTask,
        now: i64,
    ) -> Result<(), Error> {
        let task_id = task.task_id.clone();
        let changed = match task.trigger {
            Trigger::Once { .. } => {
                let id = task_id.clone();
                self.connection()
                    .call(move |conn| {
                        let n = conn.execute(
                            "UPDATE scheduled_tasks
                             SET last_run_at = ?1, status = 'completed'
                             WHERE task_id = ?2",
                            params![now, id],
                        )?;
                        Ok(n)
                    })
                    .await
                    .map_err(map_store_err)?
            }
            Trigger::Interval { interval_secs } => {
                let id = task_id.clone();
                let next = now + interval_secs;
                self.connection()
                    .call(move |conn| {
                        let n = conn.execute(
                            "UPDATE scheduled_tasks
                             SET last_run_at = ?1, next_run_at = ?2
                             WHERE task_id = ?3",
                            params![now, next, id],
                        )?;
                        Ok(n)
                    })
                    .await
                    .map_err(map_store_err)?
            }
        };
        if changed == 0 {
            return Err(Error::NotFound(format!("task {task_id}")));
        }
        debug!(task_id = task_id.as_str(), "firing recorded");
        Ok(())
    }

    /// Look up a task by its seed identity `(name, trigger)`; used to
    /// make seed-file loading idempotent.
    pub async fn find_task_by_identity(
        &self,
        name: &str,
        trigger: &Trigger,
    ) -> Result<Option<String>, Error> {
        let name = name.to_string();
        let trigger_type = trigger.type_str().to_string();
        let trigger_config = trigger.config_json();
        self.connection()
            .call(move |conn| {
                let result = conn.query_row(
                    "SELECT task_id FROM scheduled_tasks
                     WHERE name = ?1 AND trigger_type = ?2 AND trigger_config = ?3",
                    params![name, trigger_type, trigger_config],
                    |row| row.get::<_, String>(0),
                );
                match result {
                    Ok(id) => Ok(Some(id)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(map_store_err)
    }
}
