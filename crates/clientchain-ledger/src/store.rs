//! SQLite-backed subject and credit-ledger store.

use chrono::{DateTime, Utc};
use clientchain_core::error::{ClientChainError, Result};
use clientchain_core::types::SubjectProfile;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use crate::entry::{CreditDirection, CreditSource, LedgerEntry};

/// Persistence for subjects and their credit history. Balance mutations and
/// ledger appends happen in one transaction; the balance column is never
/// written outside `apply_credit`.
pub struct LedgerDb {
    conn: Mutex<Connection>,
}

impl LedgerDb {
    /// Open or create the ledger database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| ClientChainError::Storage(format!("ledger open: {e}")))?;
        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS subjects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                phone TEXT,
                email TEXT,
                timezone TEXT,                   -- fixed UTC offset, e.g. '+08:00'
                credits INTEGER NOT NULL DEFAULT 0,
                opt_out_sms INTEGER NOT NULL DEFAULT 0,
                opt_out_email INTEGER NOT NULL DEFAULT 0,
                marketing_consent INTEGER,       -- NULL = never asked
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS credit_ledger (
                id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                direction TEXT NOT NULL,         -- 'earned' | 'redeemed'
                amount INTEGER NOT NULL,
                balance_before INTEGER NOT NULL,
                balance_after INTEGER NOT NULL,
                source TEXT NOT NULL,
                reference_id TEXT,
                description TEXT,
                expires_at TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (subject_id) REFERENCES subjects(id)
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_subject
                ON credit_ledger(subject_id, created_at);
            ",
        )
        .map_err(|e| ClientChainError::Storage(format!("ledger migration: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ClientChainError::Storage(format!("ledger lock: {e}")))
    }

    // ─── Subjects ──────────────────────────────────────

    /// Insert or replace a subject row.
    pub fn save_subject(&self, subject: &SubjectProfile) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO subjects
             (id, name, phone, email, timezone, credits, opt_out_sms, opt_out_email,
              marketing_consent, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                subject.id,
                subject.name,
                subject.phone,
                subject.email,
                subject.timezone,
                subject.credits,
                subject.opt_out_sms as i32,
                subject.opt_out_email as i32,
                subject.marketing_consent.map(|c| c as i32),
                subject.created_at.to_rfc3339(),
                subject.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| ClientChainError::Storage(format!("save subject: {e}")))?;
        Ok(())
    }

    pub fn get_subject(&self, id: &str) -> Result<SubjectProfile> {
        let conn = self.lock()?;
        Self::query_subject(&conn, id)
    }

    fn query_subject(conn: &Connection, id: &str) -> Result<SubjectProfile> {
        conn.query_row(
            "SELECT id, name, phone, email, timezone, credits, opt_out_sms, opt_out_email,
                    marketing_consent, created_at, updated_at
             FROM subjects WHERE id = ?1",
            [id],
            Self::row_to_subject,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                ClientChainError::NotFound(format!("subject {id}"))
            }
            other => ClientChainError::Storage(format!("get subject: {other}")),
        })
    }

    fn row_to_subject(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubjectProfile> {
        Ok(SubjectProfile {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            email: row.get(3)?,
            timezone: row.get(4)?,
            credits: row.get(5)?,
            opt_out_sms: row.get::<_, i32>(6)? != 0,
            opt_out_email: row.get::<_, i32>(7)? != 0,
            marketing_consent: row.get::<_, Option<i32>>(8)?.map(|c| c != 0),
            created_at: parse_ts(9, &row.get::<_, String>(9)?)?,
            updated_at: parse_ts(10, &row.get::<_, String>(10)?)?,
        })
    }

    pub fn list_subjects(&self) -> Result<Vec<SubjectProfile>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, phone, email, timezone, credits, opt_out_sms, opt_out_email,
                        marketing_consent, created_at, updated_at
                 FROM subjects ORDER BY created_at",
            )
            .map_err(|e| ClientChainError::Storage(format!("list subjects: {e}")))?;
        let rows = stmt
            .query_map([], Self::row_to_subject)
            .map_err(|e| ClientChainError::Storage(format!("list subjects: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ClientChainError::Storage(format!("list subjects: {e}")))
    }

    /// Apply a partial JSON patch to a subject's profile fields. Only the
    /// keys present in `fields` change; `credits` is deliberately not
    /// patchable here (balances move only through [`Self::apply_credit`]).
    pub fn merge_fields(&self, id: &str, fields: &serde_json::Value) -> Result<SubjectProfile> {
        let obj = fields.as_object().ok_or_else(|| {
            ClientChainError::Validation("subject patch must be a JSON object".into())
        })?;

        // Read-patch-write under one transaction, and the UPDATE leaves the
        // credits column alone: only apply_credit writes the balance.
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| ClientChainError::Storage(format!("subject tx: {e}")))?;
        let mut subject = Self::query_subject(&tx, id)?;

        for (key, value) in obj {
            match key.as_str() {
                "name" => {
                    if let Some(v) = value.as_str() {
                        subject.name = v.to_string();
                    }
                }
                "phone" => subject.phone = value.as_str().map(|v| v.to_string()),
                "email" => subject.email = value.as_str().map(|v| v.to_string()),
                "timezone" => subject.timezone = value.as_str().map(|v| v.to_string()),
                "opt_out_sms" => {
                    if let Some(v) = value.as_bool() {
                        subject.opt_out_sms = v;
                    }
                }
                "opt_out_email" => {
                    if let Some(v) = value.as_bool() {
                        subject.opt_out_email = v;
                    }
                }
                "marketing_consent" => subject.marketing_consent = value.as_bool(),
                "credits" => {
                    return Err(ClientChainError::Validation(
                        "credits cannot be patched directly; use the ledger".into(),
                    ));
                }
                unknown => {
                    return Err(ClientChainError::Validation(format!(
                        "unknown subject field: {unknown}"
                    )));
                }
            }
        }
        subject.updated_at = Utc::now();

        tx.execute(
            "UPDATE subjects
             SET name = ?1, phone = ?2, email = ?3, timezone = ?4,
                 opt_out_sms = ?5, opt_out_email = ?6, marketing_consent = ?7,
                 updated_at = ?8
             WHERE id = ?9",
            rusqlite::params![
                subject.name,
                subject.phone,
                subject.email,
                subject.timezone,
                subject.opt_out_sms as i32,
                subject.opt_out_email as i32,
                subject.marketing_consent.map(|c| c as i32),
                subject.updated_at.to_rfc3339(),
                subject.id,
            ],
        )
        .map_err(|e| ClientChainError::Storage(format!("patch subject: {e}")))?;
        tx.commit()
            .map_err(|e| ClientChainError::Storage(format!("patch commit: {e}")))?;
        Ok(subject)
    }

    // ─── Credits ──────────────────────────────────────

    /// Move credits and append the matching ledger entry atomically. A
    /// redemption that would overdraw the balance fails without writing
    /// anything.
    pub fn apply_credit(
        &self,
        subject_id: &str,
        amount: i64,
        direction: CreditDirection,
        source: CreditSource,
        reference_id: Option<&str>,
        description: Option<&str>,
    ) -> Result<LedgerEntry> {
        if amount <= 0 {
            return Err(ClientChainError::Validation(format!(
                "credit amount must be positive, got {amount}"
            )));
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| ClientChainError::Storage(format!("ledger tx: {e}")))?;

        let subject = Self::query_subject(&tx, subject_id)?;
        let balance_before = subject.credits;
        let balance_after = match direction {
            CreditDirection::Earned => balance_before + amount,
            CreditDirection::Redeemed => {
                if balance_before < amount {
                    return Err(ClientChainError::Validation(format!(
                        "insufficient credits: balance {balance_before}, requested {amount}"
                    )));
                }
                balance_before - amount
            }
        };

        let now = Utc::now();
        let entry = LedgerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            subject_id: subject_id.to_string(),
            direction,
            amount,
            balance_before,
            balance_after,
            source,
            reference_id: reference_id.map(|r| r.to_string()),
            description: description.map(|d| d.to_string()),
            expires_at: None,
            created_at: now,
        };

        tx.execute(
            "UPDATE subjects SET credits = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![balance_after, now.to_rfc3339(), subject_id],
        )
        .map_err(|e| ClientChainError::Storage(format!("update balance: {e}")))?;
        tx.execute(
            "INSERT INTO credit_ledger
             (id, subject_id, direction, amount, balance_before, balance_after,
              source, reference_id, description, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                entry.id,
                entry.subject_id,
                entry.direction.as_str(),
                entry.amount,
                entry.balance_before,
                entry.balance_after,
                entry.source.as_str(),
                entry.reference_id,
                entry.description,
                entry.expires_at.map(|t| t.to_rfc3339()),
                entry.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| ClientChainError::Storage(format!("append ledger: {e}")))?;
        tx.commit()
            .map_err(|e| ClientChainError::Storage(format!("ledger commit: {e}")))?;

        tracing::info!(
            "💰 Credits {} {} for subject {}: {} → {}",
            entry.direction.as_str(),
            amount,
            subject_id,
            balance_before,
            balance_after
        );
        Ok(entry)
    }

    /// Redeem credits against the balance.
    pub fn redeem(
        &self,
        subject_id: &str,
        amount: i64,
        description: Option<&str>,
    ) -> Result<LedgerEntry> {
        self.apply_credit(
            subject_id,
            amount,
            CreditDirection::Redeemed,
            CreditSource::Redemption,
            None,
            description,
        )
    }

    /// Entries for a subject, oldest first.
    pub fn entries_for(&self, subject_id: &str) -> Result<Vec<LedgerEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, subject_id, direction, amount, balance_before, balance_after,
                        source, reference_id, description, expires_at, created_at
                 FROM credit_ledger WHERE subject_id = ?1 ORDER BY created_at, id",
            )
            .map_err(|e| ClientChainError::Storage(format!("ledger query: {e}")))?;
        let rows = stmt
            .query_map([subject_id], |row| {
                let direction_str: String = row.get(2)?;
                let source_str: String = row.get(6)?;
                Ok(LedgerEntry {
                    id: row.get(0)?,
                    subject_id: row.get(1)?,
                    direction: CreditDirection::parse(&direction_str)
                        .ok_or_else(|| decode_err(2, format!("bad direction {direction_str:?}")))?,
                    amount: row.get(3)?,
                    balance_before: row.get(4)?,
                    balance_after: row.get(5)?,
                    source: CreditSource::parse(&source_str)
                        .ok_or_else(|| decode_err(6, format!("bad source {source_str:?}")))?,
                    reference_id: row.get(7)?,
                    description: row.get(8)?,
                    expires_at: match row.get::<_, Option<String>>(9)? {
                        Some(s) => Some(parse_ts(9, &s)?),
                        None => None,
                    },
                    created_at: parse_ts(10, &row.get::<_, String>(10)?)?,
                })
            })
            .map_err(|e| ClientChainError::Storage(format!("ledger query: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ClientChainError::Storage(format!("ledger query: {e}")))
    }

    /// Current balance straight from the subject row.
    pub fn balance(&self, subject_id: &str) -> Result<i64> {
        Ok(self.get_subject(subject_id)?.credits)
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

    fn temp_db(name: &str) -> (LedgerDb, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("clientchain-ledger-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        (LedgerDb::open(&dir.join("ledger.db")).unwrap(), dir)
    }

    #[test]
    fn test_save_and_get_subject() {
        let (db, dir) = temp_db("save-get");
        let mut subject = SubjectProfile::new("Ada").with_phone("+15550001111");
        subject.marketing_consent = Some(true);
        db.save_subject(&subject).unwrap();

        let loaded = db.get_subject(&subject.id).unwrap();
        assert_eq!(loaded.name, "Ada");
        assert_eq!(loaded.phone.as_deref(), Some("+15550001111"));
        assert_eq!(loaded.marketing_consent, Some(true));
        assert_eq!(loaded.credits, 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_get_missing_subject_is_not_found() {
        let (db, dir) = temp_db("missing");
        assert!(matches!(
            db.get_subject("nope"),
            Err(ClientChainError::NotFound(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_earn_then_redeem_keeps_balance_and_history_consistent() {
        let (db, dir) = temp_db("earn-redeem");
        let subject = SubjectProfile::new("Ada");
        db.save_subject(&subject).unwrap();

        db.apply_credit(
            &subject.id,
            100,
            CreditDirection::Earned,
            CreditSource::Referral,
            Some("ref-1"),
            None,
        )
        .unwrap();
        db.apply_credit(
            &subject.id,
            75,
            CreditDirection::Earned,
            CreditSource::Workflow,
            Some("wf-1"),
            None,
        )
        .unwrap();
        let redeemed = db.redeem(&subject.id, 40, Some("gift card")).unwrap();

        assert_eq!(redeemed.balance_before, 175);
        assert_eq!(redeemed.balance_after, 135);
        assert_eq!(db.balance(&subject.id).unwrap(), 135);

        let entries = db.entries_for(&subject.id).unwrap();
        assert_eq!(entries.len(), 3);
        let sum: i64 = entries.iter().map(|e| e.delta()).sum();
        assert_eq!(sum, 135);
        // Each entry's after-balance is the next entry's before-balance.
        for pair in entries.windows(2) {
            assert_eq!(pair[0].balance_after, pair[1].balance_before);
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_overdraw_fails_and_writes_nothing() {
        let (db, dir) = temp_db("overdraw");
        let subject = SubjectProfile::new("Ada");
        db.save_subject(&subject).unwrap();
        db.apply_credit(
            &subject.id,
            30,
            CreditDirection::Earned,
            CreditSource::Booking,
            None,
            None,
        )
        .unwrap();

        let err = db.redeem(&subject.id, 50, None);
        assert!(matches!(err, Err(ClientChainError::Validation(_))));
        assert_eq!(db.balance(&subject.id).unwrap(), 30);
        assert_eq!(db.entries_for(&subject.id).unwrap().len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_non_positive_amounts_are_rejected() {
        let (db, dir) = temp_db("bad-amount");
        let subject = SubjectProfile::new("Ada");
        db.save_subject(&subject).unwrap();

        for amount in [0, -5] {
            let err = db.apply_credit(
                &subject.id,
                amount,
                CreditDirection::Earned,
                CreditSource::Workflow,
                None,
                None,
            );
            assert!(matches!(err, Err(ClientChainError::Validation(_))));
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_merge_fields_patches_only_given_keys() {
        let (db, dir) = temp_db("merge");
        let subject = SubjectProfile::new("Ada").with_phone("+15550001111");
        db.save_subject(&subject).unwrap();

        let patched = db
            .merge_fields(
                &subject.id,
                &serde_json::json!({"opt_out_sms": true, "timezone": "+08:00"}),
            )
            .unwrap();
        assert!(patched.opt_out_sms);
        assert_eq!(patched.timezone.as_deref(), Some("+08:00"));
        assert_eq!(patched.phone.as_deref(), Some("+15550001111"));
        assert_eq!(patched.name, "Ada");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_merge_fields_rejects_credits_and_unknown_keys() {
        let (db, dir) = temp_db("merge-bad");
        let subject = SubjectProfile::new("Ada");
        db.save_subject(&subject).unwrap();

        assert!(db
            .merge_fields(&subject.id, &serde_json::json!({"credits": 999}))
            .is_err());
        assert!(db
            .merge_fields(&subject.id, &serde_json::json!({"shoe_size": 42}))
            .is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_profile_patch_never_clobbers_concurrent_credits() {
        let (db, dir) = temp_db("patch-race");
        let subject = SubjectProfile::new("Ada");
        db.save_subject(&subject).unwrap();

        let db = std::sync::Arc::new(db);
        let crediting = {
            let db = db.clone();
            let id = subject.id.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    db.apply_credit(
                        &id,
                        1,
                        CreditDirection::Earned,
                        CreditSource::Workflow,
                        None,
                        None,
                    )
                    .unwrap();
                }
            })
        };
        let patching = {
            let db = db.clone();
            let id = subject.id.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    db.merge_fields(&id, &serde_json::json!({"name": format!("Ada {i}")}))
                        .unwrap();
                }
            })
        };
        crediting.join().unwrap();
        patching.join().unwrap();

        // Every earned credit survives the interleaved profile patches, and
        // the balance still equals the ledger sum.
        assert_eq!(db.balance(&subject.id).unwrap(), 500);
        let entries = db.entries_for(&subject.id).unwrap();
        assert_eq!(entries.len(), 500);
        assert_eq!(entries.iter().map(|e| e.delta()).sum::<i64>(), 500);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_rows_surface_storage_errors() {
        let (db, dir) = temp_db("corrupt");
        let subject = SubjectProfile::new("Ada");
        db.save_subject(&subject).unwrap();
        db.apply_credit(
            &subject.id,
            10,
            CreditDirection::Earned,
            CreditSource::Workflow,
            None,
            None,
        )
        .unwrap();

        db.lock()
            .unwrap()
            .execute(
                "UPDATE credit_ledger SET direction = 'sideways' WHERE subject_id = ?1",
                [&subject.id],
            )
            .unwrap();
        assert!(matches!(
            db.entries_for(&subject.id),
            Err(ClientChainError::Storage(_))
        ));

        db.lock()
            .unwrap()
            .execute(
                "UPDATE subjects SET created_at = 'not-a-time' WHERE id = ?1",
                [&subject.id],
            )
            .unwrap();
        assert!(matches!(
            db.get_subject(&subject.id),
            Err(ClientChainError::Storage(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }
}
