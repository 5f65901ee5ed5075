//! SQLite-backed store for definitions, executions, staff tasks, and prompts.

use chrono::{DateTime, Utc};
use clientchain_core::error::{ClientChainError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use crate::actions::Action;
use crate::definitions::{Trigger, WorkflowDefinition, WorkflowStatus};
use crate::execution::{ExecutionStatus, WorkflowExecution};

pub struct AutomationDb {
    conn: Mutex<Connection>,
}

impl AutomationDb {
    /// Open or create the automation database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| ClientChainError::Storage(format!("automation open: {e}")))?;
        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                triggers TEXT NOT NULL,          -- JSON array of tagged triggers
                actions TEXT NOT NULL,           -- JSON array of tagged actions
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                context TEXT NOT NULL DEFAULT '{}',
                step_index INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'running',
                started_at TEXT NOT NULL,
                next_step_at TEXT NOT NULL,
                completed_at TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                errors TEXT NOT NULL DEFAULT '[]'
            );

            CREATE INDEX IF NOT EXISTS idx_executions_due
                ON executions(status, next_step_at);

            CREATE TABLE IF NOT EXISTS staff_tasks (
                id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                execution_id TEXT,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS prompts (
                id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                execution_id TEXT,
                kind TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| ClientChainError::Storage(format!("automation migration: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ClientChainError::Storage(format!("automation lock: {e}")))
    }

    // ─── Workflow definitions ──────────────────────────────────────

    /// Create a definition. Empty triggers or actions are rejected.
    pub fn create_workflow(
        &self,
        name: &str,
        triggers: Vec<Trigger>,
        actions: Vec<Action>,
    ) -> Result<WorkflowDefinition> {
        if name.trim().is_empty() {
            return Err(ClientChainError::Validation("workflow name is empty".into()));
        }
        if triggers.is_empty() {
            return Err(ClientChainError::Validation(
                "workflow has no triggers".into(),
            ));
        }
        if actions.is_empty() {
            return Err(ClientChainError::Validation(
                "workflow has no actions".into(),
            ));
        }
        let def = WorkflowDefinition::new(name, triggers, actions);
        self.save_workflow(&def)?;
        tracing::info!("⚙️ Workflow created: {} ({})", def.name, def.id);
        Ok(def)
    }

    fn save_workflow(&self, def: &WorkflowDefinition) -> Result<()> {
        let triggers = serde_json::to_string(&def.triggers)
            .map_err(|e| ClientChainError::Storage(format!("encode triggers: {e}")))?;
        let actions = serde_json::to_string(&def.actions)
            .map_err(|e| ClientChainError::Storage(format!("encode actions: {e}")))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO workflows (id, name, triggers, actions, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                def.id,
                def.name,
                triggers,
                actions,
                def.status.as_str(),
                def.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| ClientChainError::Storage(format!("save workflow: {e}")))?;
        Ok(())
    }

    pub fn get_workflow(&self, id: &str) -> Result<WorkflowDefinition> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, triggers, actions, status, created_at FROM workflows WHERE id = ?1",
            [id],
            Self::row_to_workflow,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                ClientChainError::NotFound(format!("workflow {id}"))
            }
            other => ClientChainError::Storage(format!("get workflow: {other}")),
        })
    }

    fn row_to_workflow(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkflowDefinition> {
        let triggers_str: String = row.get(2)?;
        let actions_str: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        Ok(WorkflowDefinition {
            id: row.get(0)?,
            name: row.get(1)?,
            triggers: serde_json::from_str(&triggers_str)
                .map_err(|e| decode_err(2, format!("bad triggers: {e}")))?,
            actions: serde_json::from_str(&actions_str)
                .map_err(|e| decode_err(3, format!("bad actions: {e}")))?,
            status: WorkflowStatus::parse(&status_str)
                .ok_or_else(|| decode_err(4, format!("bad workflow status {status_str:?}")))?,
            created_at: parse_ts(5, &row.get::<_, String>(5)?)?,
        })
    }

    /// Definitions, optionally filtered by status, oldest first.
    pub fn list_workflows(&self, status: Option<WorkflowStatus>) -> Result<Vec<WorkflowDefinition>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, triggers, actions, status, created_at
                 FROM workflows WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at",
            )
            .map_err(|e| ClientChainError::Storage(format!("list workflows: {e}")))?;
        let rows = stmt
            .query_map([status.map(|s| s.as_str())], Self::row_to_workflow)
            .map_err(|e| ClientChainError::Storage(format!("list workflows: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ClientChainError::Storage(format!("list workflows: {e}")))
    }

    /// Toggle a definition between active and paused.
    pub fn set_workflow_status(&self, id: &str, status: WorkflowStatus) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE workflows SET status = ?1 WHERE id = ?2",
                rusqlite::params![status.as_str(), id],
            )
            .map_err(|e| ClientChainError::Storage(format!("set workflow status: {e}")))?;
        if changed == 0 {
            return Err(ClientChainError::NotFound(format!("workflow {id}")));
        }
        tracing::info!("⚙️ Workflow {} → {}", id, status.as_str());
        Ok(())
    }

    // ─── Executions ──────────────────────────────────────

    pub fn save_execution(&self, exec: &WorkflowExecution) -> Result<()> {
        let context = exec.context.to_string();
        let errors = serde_json::to_string(&exec.errors)
            .map_err(|e| ClientChainError::Storage(format!("encode errors: {e}")))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO executions
             (id, workflow_id, subject_id, context, step_index, status,
              started_at, next_step_at, completed_at, attempts, errors)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                exec.id,
                exec.workflow_id,
                exec.subject_id,
                context,
                exec.step_index as i64,
                exec.status.as_str(),
                exec.started_at.to_rfc3339(),
                exec.next_step_at.to_rfc3339(),
                exec.completed_at.map(|t| t.to_rfc3339()),
                exec.attempts,
                errors,
            ],
        )
        .map_err(|e| ClientChainError::Storage(format!("save execution: {e}")))?;
        Ok(())
    }

    pub fn get_execution(&self, id: &str) -> Result<WorkflowExecution> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, workflow_id, subject_id, context, step_index, status,
                    started_at, next_step_at, completed_at, attempts, errors
             FROM executions WHERE id = ?1",
            [id],
            Self::row_to_execution,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                ClientChainError::NotFound(format!("execution {id}"))
            }
            other => ClientChainError::Storage(format!("get execution: {other}")),
        })
    }

    fn row_to_execution(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkflowExecution> {
        let context_str: String = row.get(3)?;
        let status_str: String = row.get(5)?;
        let errors_str: String = row.get(10)?;
        Ok(WorkflowExecution {
            id: row.get(0)?,
            workflow_id: row.get(1)?,
            subject_id: row.get(2)?,
            context: serde_json::from_str(&context_str)
                .map_err(|e| decode_err(3, format!("bad context: {e}")))?,
            step_index: row.get::<_, i64>(4)? as usize,
            status: ExecutionStatus::parse(&status_str)
                .ok_or_else(|| decode_err(5, format!("bad execution status {status_str:?}")))?,
            started_at: parse_ts(6, &row.get::<_, String>(6)?)?,
            next_step_at: parse_ts(7, &row.get::<_, String>(7)?)?,
            completed_at: match row.get::<_, Option<String>>(8)? {
                Some(s) => Some(parse_ts(8, &s)?),
                None => None,
            },
            attempts: row.get(9)?,
            errors: serde_json::from_str(&errors_str)
                .map_err(|e| decode_err(10, format!("bad errors: {e}")))?,
        })
    }

    /// Ids of running executions due at or before `now`, oldest due first.
    pub fn due_executions(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id FROM executions
                 WHERE status = 'running' AND next_step_at <= ?1
                 ORDER BY next_step_at",
            )
            .map_err(|e| ClientChainError::Storage(format!("due query: {e}")))?;
        let rows = stmt
            .query_map([now.to_rfc3339()], |row| row.get::<_, String>(0))
            .map_err(|e| ClientChainError::Storage(format!("due query: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Executions for one workflow, newest first.
    pub fn executions_for_workflow(&self, workflow_id: &str) -> Result<Vec<WorkflowExecution>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, workflow_id, subject_id, context, step_index, status,
                        started_at, next_step_at, completed_at, attempts, errors
                 FROM executions WHERE workflow_id = ?1 ORDER BY started_at DESC",
            )
            .map_err(|e| ClientChainError::Storage(format!("executions query: {e}")))?;
        let rows = stmt
            .query_map([workflow_id], Self::row_to_execution)
            .map_err(|e| ClientChainError::Storage(format!("executions query: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ClientChainError::Storage(format!("executions query: {e}")))
    }

    // ─── Staff tasks & prompts ──────────────────────────────────────

    /// Open a staff follow-up task. Returns the task id.
    pub fn create_task(
        &self,
        subject_id: &str,
        execution_id: Option<&str>,
        title: &str,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO staff_tasks (id, subject_id, execution_id, title, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id, subject_id, execution_id, title, Utc::now().to_rfc3339()],
        )
        .map_err(|e| ClientChainError::Storage(format!("create task: {e}")))?;
        Ok(id)
    }

    /// Open tasks as (id, subject_id, title) tuples, oldest first.
    pub fn open_tasks(&self) -> Result<Vec<(String, String, String)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, subject_id, title FROM staff_tasks
                 WHERE status = 'open' ORDER BY created_at",
            )
            .map_err(|e| ClientChainError::Storage(format!("tasks query: {e}")))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(|e| ClientChainError::Storage(format!("tasks query: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Record an in-person prompt marker. Returns the prompt id.
    pub fn record_prompt(
        &self,
        subject_id: &str,
        execution_id: Option<&str>,
        kind: &str,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO prompts (id, subject_id, execution_id, kind, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id, subject_id, execution_id, kind, Utc::now().to_rfc3339()],
        )
        .map_err(|e| ClientChainError::Storage(format!("record prompt: {e}")))?;
        Ok(id)
    }

    /// Prompt kinds recorded for a subject, oldest first.
    pub fn prompts_for(&self, subject_id: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT kind FROM prompts WHERE subject_id = ?1 ORDER BY created_at")
            .map_err(|e| ClientChainError::Storage(format!("prompts query: {e}")))?;
        let rows = stmt
            .query_map([subject_id], |row| row.get::<_, String>(0))
            .map_err(|e| ClientChainError::Storage(format!("prompts query: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| decode_err(idx, format!("bad timestamp {s:?}: {e}")))
}

fn decode_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_db(name: &str) -> (AutomationDb, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("clientchain-engine-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        (AutomationDb::open(&dir.join("automation.db")).unwrap(), dir)
    }

    fn sms_workflow(db: &AutomationDb) -> WorkflowDefinition {
        db.create_workflow(
            "welcome",
            vec![Trigger::BookingCompleted],
            vec![Action::SendSms { message: "hi {name}".into() }],
        )
        .unwrap()
    }

    #[test]
    fn test_create_and_round_trip_workflow() {
        let (db, dir) = temp_db("wf-roundtrip");
        let def = db
            .create_workflow(
                "re-engage",
                vec![Trigger::NoReferralSince { days: 30 }],
                vec![
                    Action::Wait { seconds: 5 },
                    Action::SendSms { message: "hi".into() },
                ],
            )
            .unwrap();

        let loaded = db.get_workflow(&def.id).unwrap();
        assert_eq!(loaded.name, "re-engage");
        assert_eq!(loaded.triggers, vec![Trigger::NoReferralSince { days: 30 }]);
        assert_eq!(loaded.actions.len(), 2);
        assert_eq!(loaded.status, WorkflowStatus::Active);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_triggers_or_actions_rejected() {
        let (db, dir) = temp_db("wf-validate");
        assert!(matches!(
            db.create_workflow("x", vec![], vec![Action::Wait { seconds: 1 }]),
            Err(ClientChainError::Validation(_))
        ));
        assert!(matches!(
            db.create_workflow("x", vec![Trigger::BookingCompleted], vec![]),
            Err(ClientChainError::Validation(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_status_toggle_and_filter() {
        let (db, dir) = temp_db("wf-status");
        let def = sms_workflow(&db);
        db.set_workflow_status(&def.id, WorkflowStatus::Paused).unwrap();

        assert!(db.list_workflows(Some(WorkflowStatus::Active)).unwrap().is_empty());
        assert_eq!(db.list_workflows(Some(WorkflowStatus::Paused)).unwrap().len(), 1);
        assert_eq!(db.list_workflows(None).unwrap().len(), 1);

        assert!(matches!(
            db.set_workflow_status("ghost", WorkflowStatus::Active),
            Err(ClientChainError::NotFound(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_execution_round_trip_and_due_query() {
        let (db, dir) = temp_db("exec-due");
        let def = sms_workflow(&db);
        let now = Utc::now();

        let mut due = WorkflowExecution::new(&def.id, "subj-1", json!({"a": 1}), now);
        due.errors.push("earlier hiccup".into());
        db.save_execution(&due).unwrap();

        let mut later = WorkflowExecution::new(&def.id, "subj-2", json!({}), now);
        later.next_step_at = now + chrono::Duration::hours(1);
        db.save_execution(&later).unwrap();

        let mut done = WorkflowExecution::new(&def.id, "subj-3", json!({}), now);
        done.status = ExecutionStatus::Completed;
        db.save_execution(&done).unwrap();

        let loaded = db.get_execution(&due.id).unwrap();
        assert_eq!(loaded.context, json!({"a": 1}));
        assert_eq!(loaded.errors, vec!["earlier hiccup".to_string()]);

        let ids = db.due_executions(now).unwrap();
        assert_eq!(ids, vec![due.id.clone()]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_tasks_and_prompts_persist() {
        let (db, dir) = temp_db("tasks");
        db.create_task("subj-1", None, "Call about referral").unwrap();
        db.record_prompt("subj-1", None, "friend_tag").unwrap();

        let tasks = db.open_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].2, "Call about referral");
        assert_eq!(db.prompts_for("subj-1").unwrap(), vec!["friend_tag".to_string()]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_rows_surface_storage_errors() {
        let (db, dir) = temp_db("corrupt");
        let def = sms_workflow(&db);

        db.lock()
            .unwrap()
            .execute(
                "UPDATE workflows SET triggers = 'not-json' WHERE id = ?1",
                [&def.id],
            )
            .unwrap();
        assert!(matches!(
            db.get_workflow(&def.id),
            Err(ClientChainError::Storage(_))
        ));

        // A garbled due time must not decode as "due now".
        let exec = WorkflowExecution::new(&def.id, "subj-1", json!({}), Utc::now());
        db.save_execution(&exec).unwrap();
        db.lock()
            .unwrap()
            .execute(
                "UPDATE executions SET next_step_at = 'whenever' WHERE id = ?1",
                [&exec.id],
            )
            .unwrap();
        assert!(matches!(
            db.get_execution(&exec.id),
            Err(ClientChainError::Storage(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }
}
