// 🗄️ Persistence - SQLite + WAL, one transaction per bundle
//
// The store is the only place where shared state is mutated. A bundle is
// written inside a single IMMEDIATE transaction: the write lock is taken up
// front, so two concurrent commits touching the same tracked entity serialize
// instead of interleaving. Any failure drops the transaction (rollback).

use crate::error::{Result, TrackerError};
use crate::model::{Enrollment, Event, ImportStrategy, TrackedEntity, TrackerBundle, TrackerType};
use crate::preheat::TrackerPreheat;
use crate::report::{CommitSummary, TrackerTypeReport};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// COLLABORATOR CONTRACT
// ============================================================================

pub trait TrackerStore {
    /// Which bundle uids already exist. Read-only.
    fn preheat(&self, bundle: &TrackerBundle) -> Result<TrackerPreheat>;

    /// All-or-nothing write of a validated bundle
    fn commit(&mut self, bundle: &TrackerBundle) -> Result<CommitSummary>;
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// One row per committed bundle
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub bundle_id: String,
    pub bundle_hash: String,
    pub import_strategy: String,
    pub actor: String,
    pub data: serde_json::Value,
}

impl AuditEntry {
    pub fn for_bundle(bundle: &TrackerBundle, summary: &CommitSummary) -> Result<Self> {
        Ok(AuditEntry {
            entry_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            bundle_id: bundle.id.to_string(),
            bundle_hash: bundle.content_hash()?,
            import_strategy: bundle.import_strategy.as_str().to_string(),
            actor: bundle.user.clone(),
            data: serde_json::to_value(summary)?,
        })
    }
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCounts {
    pub tracked_entities: i64,
    pub enrollments: i64,
    pub events: i64,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases silently keep "memory"
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tracked_entities (
            uid TEXT PRIMARY KEY NOT NULL,
            org_unit TEXT NOT NULL,
            tracked_entity_type TEXT,
            attributes TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments (
            uid TEXT PRIMARY KEY NOT NULL,
            tracked_entity TEXT NOT NULL REFERENCES tracked_entities(uid),
            program TEXT NOT NULL,
            org_unit TEXT NOT NULL,
            status TEXT NOT NULL,
            enrolled_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            uid TEXT PRIMARY KEY NOT NULL,
            enrollment TEXT REFERENCES enrollments(uid),
            program TEXT,
            program_stage TEXT,
            org_unit TEXT NOT NULL,
            status TEXT NOT NULL,
            occurred_at TEXT,
            data_values TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            bundle_id TEXT NOT NULL,
            bundle_hash TEXT NOT NULL,
            import_strategy TEXT NOT NULL,
            actor TEXT NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_tracked_entity ON enrollments(tracked_entity)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_enrollment ON events(enrollment)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_bundle ON audit_log(bundle_id)",
        [],
    )?;

    Ok(())
}

fn table(kind: TrackerType) -> &'static str {
    match kind {
        TrackerType::TrackedEntity => "tracked_entities",
        TrackerType::Enrollment => "enrollments",
        TrackerType::Event => "events",
    }
}

fn row_exists(conn: &Connection, kind: TrackerType, uid: &str) -> Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE uid = ?1", table(kind));
    let found: Option<i64> = conn.query_row(&sql, [uid], |row| row.get(0)).optional()?;
    Ok(found.is_some())
}

/// Stored rows holding a foreign key to `parent`
fn stored_children(
    conn: &Connection,
    parent_kind: TrackerType,
    parent: &str,
) -> Result<Vec<String>> {
    let sql = match parent_kind {
        TrackerType::TrackedEntity => {
            "SELECT uid FROM enrollments WHERE tracked_entity = ?1 ORDER BY uid"
        }
        TrackerType::Enrollment => "SELECT uid FROM events WHERE enrollment = ?1 ORDER BY uid",
        TrackerType::Event => return Ok(Vec::new()),
    };

    let mut stmt = conn.prepare(sql)?;
    let children = stmt
        .query_map([parent], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(children)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteTrackerStore {
    conn: Connection,
}

impl SqliteTrackerStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // a second writer waits for the IMMEDIATE lock instead of failing at once
        conn.busy_timeout(Duration::from_secs(5))?;
        setup_database(&conn)?;
        info!(path = %path.display(), "tracker database opened");
        Ok(SqliteTrackerStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteTrackerStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn exists(&self, kind: TrackerType, uid: &str) -> Result<bool> {
        row_exists(&self.conn, kind, uid)
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |kind: TrackerType| -> Result<i64> {
            let sql = format!("SELECT COUNT(*) FROM {}", table(kind));
            Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
        };

        Ok(StoreCounts {
            tracked_entities: count(TrackerType::TrackedEntity)?,
            enrollments: count(TrackerType::Enrollment)?,
            events: count(TrackerType::Event)?,
        })
    }

    /// Audit rows for a bundle, oldest first
    pub fn audit_entries(&self, bundle_id: &Uuid) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT entry_id, timestamp, bundle_id, bundle_hash, import_strategy, actor, data
             FROM audit_log
             WHERE bundle_id = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map([bundle_id.to_string()], |row| {
                let timestamp_str: String = row.get(1)?;
                let data_json: String = row.get(6)?;
                Ok((
                    row.get::<_, String>(0)?,
                    timestamp_str,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    data_json,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(entry_id, timestamp, bundle_id, bundle_hash, import_strategy, actor, data)| {
                Ok(AuditEntry {
                    entry_id,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map_err(|e| {
                            TrackerError::Commit(format!("corrupt audit timestamp: {}", e))
                        })?
                        .with_timezone(&Utc),
                    bundle_id,
                    bundle_hash,
                    import_strategy,
                    actor,
                    data: serde_json::from_str(&data)?,
                })
            })
            .collect()
    }
}

impl TrackerStore for SqliteTrackerStore {
    fn preheat(&self, bundle: &TrackerBundle) -> Result<TrackerPreheat> {
        let mut preheat = TrackerPreheat::new();

        let uids = bundle
            .tracked_entities
            .iter()
            .map(|te| (TrackerType::TrackedEntity, te.uid.as_str()))
            .chain(
                bundle
                    .enrollments
                    .iter()
                    .map(|en| (TrackerType::Enrollment, en.uid.as_str())),
            )
            .chain(bundle.events.iter().map(|ev| (TrackerType::Event, ev.uid.as_str())))
            // referenced parents, so the rule chain can resolve links to stored data
            .chain(
                bundle
                    .enrollments
                    .iter()
                    .filter_map(|en| en.tracked_entity.as_deref())
                    .map(|uid| (TrackerType::TrackedEntity, uid)),
            )
            .chain(
                bundle
                    .events
                    .iter()
                    .filter_map(|ev| ev.enrollment.as_deref())
                    .map(|uid| (TrackerType::Enrollment, uid)),
            );

        for (kind, uid) in uids.filter(|(_, uid)| !uid.is_empty()) {
            if !preheat.exists(kind, uid) && row_exists(&self.conn, kind, uid)? {
                preheat.insert(kind, uid);
            }
        }

        // a delete has to take stored children with it, or the FK would block the commit
        if bundle.import_strategy == ImportStrategy::Delete {
            let parents: Vec<(TrackerType, &str)> = bundle
                .tracked_entities
                .iter()
                .map(|te| (TrackerType::TrackedEntity, te.uid.as_str()))
                .chain(
                    bundle
                        .enrollments
                        .iter()
                        .map(|en| (TrackerType::Enrollment, en.uid.as_str())),
                )
                .filter(|(kind, uid)| preheat.exists(*kind, uid))
                .collect();
            for (kind, parent) in parents {
                for child in stored_children(&self.conn, kind, parent)? {
                    preheat.insert_child(kind, parent, &child);
                }
            }
        }

        debug!(bundle = %bundle.id, existing = preheat.len(), "preheat loaded");
        Ok(preheat)
    }

    fn commit(&mut self, bundle: &TrackerBundle) -> Result<CommitSummary> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let strategy = bundle.import_strategy;
        let now = Utc::now().to_rfc3339();
        let mut summary = CommitSummary::default();

        if strategy == ImportStrategy::Delete {
            // children first
            for ev in &bundle.events {
                delete_row(&tx, TrackerType::Event, &ev.uid, &mut summary.events)?;
            }
            for en in &bundle.enrollments {
                delete_row(&tx, TrackerType::Enrollment, &en.uid, &mut summary.enrollments)?;
            }
            for te in &bundle.tracked_entities {
                let report = &mut summary.tracked_entities;
                delete_row(&tx, TrackerType::TrackedEntity, &te.uid, report)?;
            }
        } else {
            // parents first: enrollments reference tracked entities, events reference enrollments
            for te in &bundle.tracked_entities {
                write_tracked_entity(&tx, te, strategy, &now, &mut summary.tracked_entities)?;
            }
            for en in &bundle.enrollments {
                write_enrollment(&tx, en, strategy, &now, &mut summary.enrollments)?;
            }
            for ev in &bundle.events {
                write_event(&tx, ev, strategy, &now, &mut summary.events)?;
            }
        }

        insert_audit_entry(&tx, &AuditEntry::for_bundle(bundle, &summary)?)?;
        tx.commit()?;

        info!(
            bundle = %bundle.id,
            strategy = strategy.as_str(),
            written = summary.total(),
            "bundle committed"
        );
        Ok(summary)
    }
}

// ============================================================================
// WRITES
// ============================================================================

/// Resolve CREATE_AND_UPDATE into a concrete operation
fn effective_strategy(
    conn: &Connection,
    strategy: ImportStrategy,
    kind: TrackerType,
    uid: &str,
) -> Result<ImportStrategy> {
    Ok(match strategy {
        ImportStrategy::CreateAndUpdate if row_exists(conn, kind, uid)? => ImportStrategy::Update,
        ImportStrategy::CreateAndUpdate => ImportStrategy::Create,
        other => other,
    })
}

/// An UPDATE/DELETE that touched nothing means the row vanished after preheat
fn expect_one_row(changed: usize, kind: TrackerType, uid: &str) -> Result<()> {
    if changed == 1 {
        Ok(())
    } else {
        Err(TrackerError::Commit(format!(
            "{} `{}` does not exist",
            kind.as_str(),
            uid
        )))
    }
}

fn write_tracked_entity(
    conn: &Connection,
    te: &TrackedEntity,
    strategy: ImportStrategy,
    now: &str,
    counts: &mut TrackerTypeReport,
) -> Result<()> {
    let attributes = serde_json::to_string(&te.attributes)?;

    match effective_strategy(conn, strategy, TrackerType::TrackedEntity, &te.uid)? {
        ImportStrategy::Update => {
            let changed = conn.execute(
                "UPDATE tracked_entities
                 SET org_unit = ?2, tracked_entity_type = ?3, attributes = ?4, updated_at = ?5
                 WHERE uid = ?1",
                params![te.uid, te.org_unit, te.tracked_entity_type, attributes, now],
            )?;
            expect_one_row(changed, TrackerType::TrackedEntity, &te.uid)?;
            counts.updated += 1;
        }
        _ => {
            conn.execute(
                "INSERT INTO tracked_entities (
                    uid, org_unit, tracked_entity_type, attributes, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![te.uid, te.org_unit, te.tracked_entity_type, attributes, now],
            )?;
            counts.created += 1;
        }
    }

    Ok(())
}

fn write_enrollment(
    conn: &Connection,
    en: &Enrollment,
    strategy: ImportStrategy,
    now: &str,
    counts: &mut TrackerTypeReport,
) -> Result<()> {
    let enrolled_at = en.enrolled_at.map(|dt| dt.to_rfc3339());

    match effective_strategy(conn, strategy, TrackerType::Enrollment, &en.uid)? {
        ImportStrategy::Update => {
            let changed = conn.execute(
                "UPDATE enrollments
                 SET tracked_entity = ?2, program = ?3, org_unit = ?4, status = ?5,
                     enrolled_at = ?6, updated_at = ?7
                 WHERE uid = ?1",
                params![
                    en.uid,
                    en.tracked_entity,
                    en.program,
                    en.org_unit,
                    en.status.as_str(),
                    enrolled_at,
                    now
                ],
            )?;
            expect_one_row(changed, TrackerType::Enrollment, &en.uid)?;
            counts.updated += 1;
        }
        _ => {
            conn.execute(
                "INSERT INTO enrollments (
                    uid, tracked_entity, program, org_unit, status,
                    enrolled_at, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    en.uid,
                    en.tracked_entity,
                    en.program,
                    en.org_unit,
                    en.status.as_str(),
                    enrolled_at,
                    now
                ],
            )?;
            counts.created += 1;
        }
    }

    Ok(())
}

fn write_event(
    conn: &Connection,
    ev: &Event,
    strategy: ImportStrategy,
    now: &str,
    counts: &mut TrackerTypeReport,
) -> Result<()> {
    let data_values = serde_json::to_string(&ev.data_values)?;
    let occurred_at = ev.occurred_at.map(|dt| dt.to_rfc3339());

    match effective_strategy(conn, strategy, TrackerType::Event, &ev.uid)? {
        ImportStrategy::Update => {
            let changed = conn.execute(
                "UPDATE events
                 SET enrollment = ?2, program = ?3, program_stage = ?4, org_unit = ?5,
                     status = ?6, occurred_at = ?7, data_values = ?8, updated_at = ?9
                 WHERE uid = ?1",
                params![
                    ev.uid,
                    ev.enrollment,
                    ev.program,
                    ev.program_stage,
                    ev.org_unit,
                    ev.status.as_str(),
                    occurred_at,
                    data_values,
                    now
                ],
            )?;
            expect_one_row(changed, TrackerType::Event, &ev.uid)?;
            counts.updated += 1;
        }
        _ => {
            conn.execute(
                "INSERT INTO events (
                    uid, enrollment, program, program_stage, org_unit, status,
                    occurred_at, data_values, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    ev.uid,
                    ev.enrollment,
                    ev.program,
                    ev.program_stage,
                    ev.org_unit,
                    ev.status.as_str(),
                    occurred_at,
                    data_values,
                    now
                ],
            )?;
            counts.created += 1;
        }
    }

    Ok(())
}

fn delete_row(
    conn: &Connection,
    kind: TrackerType,
    uid: &str,
    counts: &mut TrackerTypeReport,
) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE uid = ?1", table(kind));
    let changed = conn.execute(&sql, [uid])?;
    expect_one_row(changed, kind, uid)?;
    counts.deleted += 1;
    Ok(())
}

/// Insert entry into audit trail
pub fn insert_audit_entry(conn: &Connection, entry: &AuditEntry) -> Result<()> {
    let data_json = serde_json::to_string(&entry.data)?;

    conn.execute(
        "INSERT INTO audit_log (
            entry_id, timestamp, bundle_id, bundle_hash, import_strategy, actor, data
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.entry_id,
            entry.timestamp.to_rfc3339(),
            entry.bundle_id,
            entry.bundle_hash,
            entry.import_strategy,
            entry.actor,
            data_json,
        ],
    )?;

    Ok(())
}
