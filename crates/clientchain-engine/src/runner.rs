//! The execution runner — advances one execution through its action list.
//!
//! The runner is the only writer of execution rows. Progress is persisted
//! after every step, before the next side effect runs, so a crash resumes at
//! the last completed index instead of re-running or skipping a step. A
//! per-execution async lock keeps two concurrent callers from racing on the
//! same row.

use chrono::Duration;
use clientchain_core::error::{ClientChainError, Result};
use clientchain_core::traits::{EmailSender, SmsSender};
use clientchain_core::types::{ChannelKind, SubjectProfile};
use clientchain_ledger::{CreditDirection, CreditSource, LedgerDb};
use clientchain_policy::{Clock, PolicyPipeline};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::actions::{Action, render_message};
use crate::execution::{ExecutionStatus, WorkflowExecution};
use crate::store::AutomationDb;

pub struct ExecutionRunner {
    db: Arc<AutomationDb>,
    ledger: Arc<LedgerDb>,
    policy: Arc<PolicyPipeline>,
    sms: Arc<dyn SmsSender>,
    email: Arc<dyn EmailSender>,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// What one non-wait step did.
enum StepOutcome {
    Done,
    Skipped(String),
}

impl ExecutionRunner {
    pub fn new(
        db: Arc<AutomationDb>,
        ledger: Arc<LedgerDb>,
        policy: Arc<PolicyPipeline>,
        sms: Arc<dyn SmsSender>,
        email: Arc<dyn EmailSender>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            ledger,
            policy,
            sms,
            email,
            clock,
            http: reqwest::Client::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<AutomationDb> {
        &self.db
    }

    /// One async mutex per execution id. The map only grows; execution ids
    /// are bounded by executions ever touched in this process.
    fn lock_for(&self, execution_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| ClientChainError::Execution(format!("lock table: {e}")))?;
        Ok(locks
            .entry(execution_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    /// Advance an execution until it suspends, completes, or fails. Only one
    /// caller per execution id runs at a time; a second concurrent call
    /// waits, then no-ops on the already-advanced row.
    pub async fn advance(&self, execution_id: &str) -> Result<()> {
        let lock = self.lock_for(execution_id)?;
        let _guard = lock.lock().await;

        let mut exec = self.db.get_execution(execution_id)?;
        if exec.status.is_terminal() {
            return Ok(());
        }
        let def = self.db.get_workflow(&exec.workflow_id)?;
        if def.status != crate::definitions::WorkflowStatus::Active {
            tracing::debug!("⏸️ Workflow {} paused; execution {} held", def.id, exec.id);
            return Ok(());
        }
        let mut subject = self.ledger.get_subject(&exec.subject_id)?;

        exec.attempts += 1;
        while exec.step_index < def.actions.len() {
            let action = def.actions[exec.step_index].clone();

            if let Action::Wait { seconds } = action {
                // Sole suspension point. Index moves past the wait before
                // persisting so the resume lands on the next action.
                exec.step_index += 1;
                exec.next_step_at = self.clock.now() + Duration::seconds(seconds as i64);
                self.db.save_execution(&exec)?;
                tracing::info!(
                    "⏳ Execution {} dormant until {} (step {})",
                    exec.id,
                    exec.next_step_at.to_rfc3339(),
                    exec.step_index
                );
                return Ok(());
            }

            match self.run_step(&exec, &def.id, &action, &mut subject).await {
                Ok(StepOutcome::Done) => {
                    tracing::debug!("▶️ Execution {} step {} [{}]", exec.id, exec.step_index, action.kind());
                }
                Ok(StepOutcome::Skipped(reason)) => {
                    tracing::info!(
                        "⤼ Execution {} step {} [{}] skipped: {}",
                        exec.id,
                        exec.step_index,
                        action.kind(),
                        reason
                    );
                }
                Err(e) => {
                    exec.errors.push(format!("step {} [{}]: {e}", exec.step_index, action.kind()));
                    exec.status = ExecutionStatus::Failed;
                    self.db.save_execution(&exec)?;
                    tracing::warn!("❌ Execution {} failed at step {}: {e}", exec.id, exec.step_index);
                    return Ok(());
                }
            }

            exec.step_index += 1;
            self.db.save_execution(&exec)?;
        }

        exec.status = ExecutionStatus::Completed;
        exec.completed_at = Some(self.clock.now());
        self.db.save_execution(&exec)?;
        tracing::info!("✅ Execution {} completed ({} steps)", exec.id, exec.step_index);
        Ok(())
    }

    /// Run one side-effecting action. A policy veto or missing address is a
    /// skip, not an error; anything returned as `Err` is terminal for the
    /// execution.
    async fn run_step(
        &self,
        exec: &WorkflowExecution,
        workflow_id: &str,
        action: &Action,
        subject: &mut SubjectProfile,
    ) -> Result<StepOutcome> {
        match action {
            Action::Wait { .. } => Ok(StepOutcome::Done),

            Action::SendSms { message } => {
                self.send_guarded_sms(subject, message).await
            }

            Action::SendEmail { subject: mail_subject, body } => {
                if self.policy.evaluate(subject, ChannelKind::Email).is_veto() {
                    return Ok(StepOutcome::Skipped("policy veto".into()));
                }
                let Some(to) = subject.address(ChannelKind::Email) else {
                    return Ok(StepOutcome::Skipped("no email on file".into()));
                };
                let body = render_message(body, &subject.name, subject.credits);
                self.email.send_email(to, mail_subject, &body).await?;
                Ok(StepOutcome::Done)
            }

            Action::AddCredits { amount } => {
                let entry = self.ledger.apply_credit(
                    &subject.id,
                    *amount,
                    CreditDirection::Earned,
                    CreditSource::Workflow,
                    Some(workflow_id),
                    None,
                )?;
                subject.credits = entry.balance_after;
                Ok(StepOutcome::Done)
            }

            Action::UpdateSubject { fields } => {
                *subject = self.ledger.merge_fields(&subject.id, fields)?;
                Ok(StepOutcome::Done)
            }

            Action::InvokeWebhook { url } => {
                let resp = self
                    .http
                    .post(url)
                    .json(&serde_json::json!({
                        "executionId": exec.id,
                        "workflowId": workflow_id,
                        "subjectId": subject.id,
                        "context": exec.context,
                    }))
                    .timeout(std::time::Duration::from_secs(10))
                    .send()
                    .await
                    .map_err(|e| ClientChainError::Channel(format!("webhook {url}: {e}")))?;
                if !resp.status().is_success() {
                    return Err(ClientChainError::Channel(format!(
                        "webhook {url}: HTTP {}",
                        resp.status()
                    )));
                }
                Ok(StepOutcome::Done)
            }

            Action::CreateTask { title } => {
                self.db.create_task(&subject.id, Some(&exec.id), title)?;
                Ok(StepOutcome::Done)
            }

            Action::RecordPrompt { kind } => {
                self.db.record_prompt(&subject.id, Some(&exec.id), kind)?;
                Ok(StepOutcome::Done)
            }

            Action::NotifyReferrer { message, credit_amount } => {
                let Some(referrer_id) = exec.referrer_id() else {
                    return Ok(StepOutcome::Skipped("no referrer in context".into()));
                };
                let mut referrer = match self.ledger.get_subject(referrer_id) {
                    Ok(r) => r,
                    Err(ClientChainError::NotFound(_)) => {
                        return Ok(StepOutcome::Skipped(format!(
                            "referrer {referrer_id} not on file"
                        )));
                    }
                    Err(e) => return Err(e),
                };

                // Guards run against the referrer: they are the recipient.
                let sms_outcome = self.send_guarded_sms(&referrer, message).await?;

                // The credit grant is not a messaging action; a vetoed SMS
                // does not forfeit it.
                if *credit_amount > 0 {
                    self.ledger.apply_credit(
                        &referrer.id,
                        *credit_amount,
                        CreditDirection::Earned,
                        CreditSource::Workflow,
                        Some(workflow_id),
                        Some("referral reward"),
                    )?;
                    referrer.credits += credit_amount;
                }
                Ok(sms_outcome)
            }
        }
    }

    async fn send_guarded_sms(
        &self,
        recipient: &SubjectProfile,
        message: &str,
    ) -> Result<StepOutcome> {
        if self.policy.evaluate(recipient, ChannelKind::Sms).is_veto() {
            return Ok(StepOutcome::Skipped("policy veto".into()));
        }
        let Some(to) = recipient.address(ChannelKind::Sms) else {
            return Ok(StepOutcome::Skipped("no phone on file".into()));
        };
        let body = render_message(message, &recipient.name, recipient.credits);
        self.sms.send_sms(to, &body).await?;
        Ok(StepOutcome::Done)
    }
}
