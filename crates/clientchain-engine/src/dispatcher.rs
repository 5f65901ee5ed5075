//! Trigger dispatcher — fans domain events out into executions.

use clientchain_core::error::{ClientChainError, Result};
use clientchain_policy::Clock;
use std::sync::Arc;

use crate::execution::WorkflowExecution;
use crate::runner::ExecutionRunner;
use crate::store::AutomationDb;

/// Matches incoming events against active definitions and creates one
/// execution per match. Creation is the contract; the immediate advance
/// afterwards is fire-and-continue, with the sweep as the backstop.
pub struct TriggerDispatcher {
    db: Arc<AutomationDb>,
    runner: Arc<ExecutionRunner>,
    clock: Arc<dyn Clock>,
}

impl TriggerDispatcher {
    pub fn new(db: Arc<AutomationDb>, runner: Arc<ExecutionRunner>, clock: Arc<dyn Clock>) -> Self {
        Self { db, runner, clock }
    }

    /// Handle a domain event. The payload must carry `subject_id`; every
    /// active definition with a matching trigger gets its own execution.
    /// Returns the created execution ids.
    pub async fn dispatch(
        &self,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<Vec<String>> {
        let subject_id = payload["subject_id"]
            .as_str()
            .ok_or_else(|| {
                ClientChainError::Validation("event payload missing subject_id".into())
            })?
            .to_string();

        let definitions =
            self.db.list_workflows(Some(crate::definitions::WorkflowStatus::Active))?;
        let now = self.clock.now();

        let mut created = Vec::new();
        for def in &definitions {
            if def.matching_trigger(event_type, &payload).is_none() {
                continue;
            }
            let exec = WorkflowExecution::new(&def.id, &subject_id, payload.clone(), now);
            self.db.save_execution(&exec)?;
            tracing::info!(
                "⚡ Event {} matched workflow {} → execution {}",
                event_type,
                def.name,
                exec.id
            );
            created.push(exec.id);
        }

        // Advance each fresh execution once, synchronously. An error here is
        // recorded and logged, never surfaced to the event producer.
        for id in &created {
            if let Err(e) = self.runner.advance(id).await {
                tracing::warn!("⚠️ Immediate advance of execution {id} failed: {e}");
            }
        }

        Ok(created)
    }

    /// Manually start a workflow against a subject, bypassing trigger
    /// matching. The operator-surface `run` endpoint.
    pub async fn run_workflow(
        &self,
        workflow_id: &str,
        subject_id: &str,
        context: serde_json::Value,
    ) -> Result<String> {
        let def = self.db.get_workflow(workflow_id)?;
        let exec = WorkflowExecution::new(&def.id, subject_id, context, self.clock.now());
        self.db.save_execution(&exec)?;
        tracing::info!("▶️ Manual run of workflow {} → execution {}", def.name, exec.id);

        if let Err(e) = self.runner.advance(&exec.id).await {
            tracing::warn!("⚠️ Immediate advance of execution {} failed: {e}", exec.id);
        }
        Ok(exec.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::definitions::{Trigger, WorkflowStatus};
    use crate::execution::ExecutionStatus;
    use chrono::{TimeZone, Utc};
    use clientchain_channels::RecordingChannel;
    use clientchain_core::config::PolicyConfig;
    use clientchain_core::types::SubjectProfile;
    use clientchain_ledger::LedgerDb;
    use clientchain_policy::{InMemoryCounter, ManualClock, PolicyPipeline};
    use serde_json::json;

    struct Rig {
        dispatcher: TriggerDispatcher,
        db: Arc<AutomationDb>,
        ledger: Arc<LedgerDb>,
        channel: Arc<RecordingChannel>,
        dir: std::path::PathBuf,
    }

    impl Drop for Rig {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    fn rig(name: &str) -> Rig {
        let dir = std::env::temp_dir().join(format!("clientchain-dispatch-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();

        let db = Arc::new(AutomationDb::open(&dir.join("automation.db")).unwrap());
        let ledger = Arc::new(LedgerDb::open(&dir.join("ledger.db")).unwrap());
        let clock = Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap(),
        ));
        let counter = Arc::new(InMemoryCounter::new(clock.clone()));
        let policy = Arc::new(PolicyPipeline::standard(
            &PolicyConfig::default(),
            counter,
            clock.clone(),
        ));
        let channel = Arc::new(RecordingChannel::new());
        let runner = Arc::new(ExecutionRunner::new(
            db.clone(),
            ledger.clone(),
            policy,
            channel.clone(),
            channel.clone(),
            clock.clone(),
        ));
        let dispatcher = TriggerDispatcher::new(db.clone(), runner, clock);
        Rig { dispatcher, db, ledger, channel, dir }
    }

    fn seed(rig: &Rig) -> SubjectProfile {
        let subject = SubjectProfile::new("Ada").with_phone("+15550001111");
        rig.ledger.save_subject(&subject).unwrap();
        subject
    }

    #[tokio::test]
    async fn test_one_execution_per_matching_definition() {
        let rig = rig("fanout");
        let subject = seed(&rig);
        rig.db
            .create_workflow(
                "thank you",
                vec![Trigger::BookingCompleted],
                vec![Action::SendSms { message: "thanks!".into() }],
            )
            .unwrap();
        rig.db
            .create_workflow(
                "review ask",
                vec![Trigger::BookingCompleted],
                vec![Action::CreateTask { title: "Ask for review".into() }],
            )
            .unwrap();
        rig.db
            .create_workflow(
                "unrelated",
                vec![Trigger::ReferralCreated],
                vec![Action::AddCredits { amount: 1 }],
            )
            .unwrap();

        let ids = rig
            .dispatcher
            .dispatch("booking_completed", json!({"subject_id": subject.id}))
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        // Both advanced synchronously to completion.
        for id in &ids {
            let exec = rig.db.get_execution(id).unwrap();
            assert_eq!(exec.status, ExecutionStatus::Completed);
        }
        assert_eq!(rig.channel.sent_count(), 1);
        assert_eq!(rig.db.open_tasks().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_paused_definitions_do_not_match() {
        let rig = rig("paused");
        let subject = seed(&rig);
        let def = rig
            .db
            .create_workflow(
                "thank you",
                vec![Trigger::BookingCompleted],
                vec![Action::SendSms { message: "thanks!".into() }],
            )
            .unwrap();
        rig.db.set_workflow_status(&def.id, WorkflowStatus::Paused).unwrap();

        let ids = rig
            .dispatcher
            .dispatch("booking_completed", json!({"subject_id": subject.id}))
            .await
            .unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_parameterized_trigger_gates_on_payload() {
        let rig = rig("threshold");
        let subject = seed(&rig);
        rig.db
            .create_workflow(
                "hot lead",
                vec![Trigger::LeadScoreAbove { threshold: 80 }],
                vec![Action::CreateTask { title: "Call hot lead".into() }],
            )
            .unwrap();

        let low = rig
            .dispatcher
            .dispatch("lead_score_above", json!({"subject_id": subject.id, "score": 60}))
            .await
            .unwrap();
        assert!(low.is_empty());

        let high = rig
            .dispatcher
            .dispatch("lead_score_above", json!({"subject_id": subject.id, "score": 95}))
            .await
            .unwrap();
        assert_eq!(high.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_subject_id_is_a_validation_error() {
        let rig = rig("no-subject");
        assert!(matches!(
            rig.dispatcher.dispatch("booking_completed", json!({})).await,
            Err(ClientChainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_run_bypasses_trigger_matching() {
        let rig = rig("manual");
        let subject = seed(&rig);
        let def = rig
            .db
            .create_workflow(
                "re-engage",
                vec![Trigger::NoReferralSince { days: 30 }],
                vec![Action::SendSms { message: "we miss you".into() }],
            )
            .unwrap();

        let exec_id = rig
            .dispatcher
            .run_workflow(&def.id, &subject.id, json!({}))
            .await
            .unwrap();
        let exec = rig.db.get_execution(&exec_id).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(rig.channel.sent_count(), 1);
    }
}
