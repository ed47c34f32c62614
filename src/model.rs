// 📦 Tracker bundle - the unit of import
//
// A bundle holds tracked entities, enrollments and events exactly as the
// materializer produced them. Cross-entity references are opaque uid strings,
// resolved later against the metadata snapshot and the preheat.

use crate::error::{Result, TrackerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use uuid::Uuid;

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStrategy {
    #[default]
    Create,
    Update,
    CreateAndUpdate,
    Delete,
}

impl ImportStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStrategy::Create => "CREATE",
            ImportStrategy::Update => "UPDATE",
            ImportStrategy::CreateAndUpdate => "CREATE_AND_UPDATE",
            ImportStrategy::Delete => "DELETE",
        }
    }
}

/// Entity kind, used to scope report entries and commit counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackerType {
    TrackedEntity,
    Enrollment,
    Event,
}

impl TrackerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerType::TrackedEntity => "TRACKED_ENTITY",
            TrackerType::Enrollment => "ENROLLMENT",
            TrackerType::Event => "EVENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "ACTIVE",
            EnrollmentStatus::Completed => "COMPLETED",
            EnrollmentStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    #[default]
    Active,
    Completed,
    Schedule,
    Skipped,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "ACTIVE",
            EventStatus::Completed => "COMPLETED",
            EventStatus::Schedule => "SCHEDULE",
            EventStatus::Skipped => "SKIPPED",
        }
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntity {
    pub uid: String,

    #[serde(default)]
    pub org_unit: Option<String>,

    #[serde(default)]
    pub tracked_entity_type: Option<String>,

    /// Attribute uid -> value
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub uid: String,

    #[serde(default)]
    pub tracked_entity: Option<String>,

    #[serde(default)]
    pub program: Option<String>,

    #[serde(default)]
    pub org_unit: Option<String>,

    #[serde(default)]
    pub enrolled_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValue {
    pub data_element: String,
    pub value: String,
}

impl DataValue {
    pub fn new(data_element: &str, value: &str) -> Self {
        DataValue {
            data_element: data_element.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub uid: String,

    #[serde(default)]
    pub enrollment: Option<String>,

    #[serde(default)]
    pub program: Option<String>,

    #[serde(default)]
    pub program_stage: Option<String>,

    #[serde(default)]
    pub org_unit: Option<String>,

    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub status: EventStatus,

    #[serde(default)]
    pub data_values: Vec<DataValue>,
}

// ============================================================================
// BUNDLE
// ============================================================================

/// One import request. Owned by exactly one validation/commit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerBundle {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Acting user (already resolved by the caller)
    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub import_strategy: ImportStrategy,

    #[serde(default)]
    pub tracked_entities: Vec<TrackedEntity>,

    #[serde(default)]
    pub enrollments: Vec<Enrollment>,

    #[serde(default)]
    pub events: Vec<Event>,
}

impl TrackerBundle {
    pub fn new(user: &str, import_strategy: ImportStrategy) -> Self {
        TrackerBundle {
            id: Uuid::new_v4(),
            user: user.to_string(),
            import_strategy,
            tracked_entities: Vec::new(),
            enrollments: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Parse a bundle document and reject structurally unusable input
    pub fn from_json(json: &str) -> Result<Self> {
        let bundle: TrackerBundle = serde_json::from_str(json)?;
        bundle.check_unique_uids()?;
        Ok(bundle)
    }

    pub fn entity_count(&self) -> usize {
        self.tracked_entities.len() + self.enrollments.len() + self.events.len()
    }

    /// SHA-256 over strategy + entities. The bundle id is left out so that
    /// resubmitting the same content yields the same hash.
    pub fn content_hash(&self) -> Result<String> {
        let content = serde_json::to_vec(&(
            self.import_strategy,
            &self.tracked_entities,
            &self.enrollments,
            &self.events,
        ))?;

        let mut hasher = Sha256::new();
        hasher.update(&content);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Two records of the same kind sharing a uid cannot be committed
    /// deterministically, so they are a malformed bundle rather than a report entry.
    pub fn check_unique_uids(&self) -> Result<()> {
        check_unique(
            TrackerType::TrackedEntity,
            self.tracked_entities.iter().map(|te| te.uid.as_str()),
        )?;
        check_unique(
            TrackerType::Enrollment,
            self.enrollments.iter().map(|en| en.uid.as_str()),
        )?;
        check_unique(
            TrackerType::Event,
            self.events.iter().map(|ev| ev.uid.as_str()),
        )
    }
}

fn check_unique<'a>(kind: TrackerType, uids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for uid in uids.filter(|uid| !uid.is_empty()) {
        if !seen.insert(uid) {
            return Err(TrackerError::MalformedBundle(format!(
                "duplicate {} uid `{}`",
                kind.as_str(),
                uid
            )));
        }
    }
    Ok(())
}

/// Load a bundle document from disk
pub fn load_bundle(path: &Path) -> Result<TrackerBundle> {
    let content = std::fs::read_to_string(path)?;
    TrackerBundle::from_json(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_from_json_defaults() {
        let json = r#"{
            "user": "M5zQapPyTZI",
            "events": [
                {
                    "uid": "ZwwuwNp6gVd",
                    "orgUnit": "DiszpKrYNg8",
                    "program": "eBAyeGv0exc",
                    "dataValues": [{ "dataElement": "qrur9Dvnyt5", "value": "22" }]
                }
            ]
        }"#;

        let bundle = TrackerBundle::from_json(json).unwrap();

        assert_eq!(bundle.import_strategy, ImportStrategy::Create);
        assert_eq!(bundle.events.len(), 1);
        assert_eq!(bundle.events[0].program_stage, None);
        assert_eq!(bundle.events[0].status, EventStatus::Active);
        assert_eq!(bundle.events[0].data_values[0].value, "22");
        assert!(bundle.tracked_entities.is_empty());
    }

    #[test]
    fn test_duplicate_uid_is_malformed() {
        let json = r#"{
            "events": [
                { "uid": "ZwwuwNp6gVd" },
                { "uid": "ZwwuwNp6gVd" }
            ]
        }"#;

        let err = TrackerBundle::from_json(json).unwrap_err();
        assert!(matches!(err, TrackerError::MalformedBundle(_)));
    }

    #[test]
    fn test_content_hash_ignores_bundle_id() {
        let mut first = TrackerBundle::new("admin", ImportStrategy::Create);
        first.events.push(Event {
            uid: "ZwwuwNp6gVd".to_string(),
            ..Default::default()
        });

        let mut second = first.clone();
        second.id = Uuid::new_v4();

        let hash = first.content_hash().unwrap();
        assert_eq!(hash, second.content_hash().unwrap());
        assert_eq!(hash.len(), 64, "SHA-256 hash should be 64 hex characters");

        second.import_strategy = ImportStrategy::Update;
        assert_ne!(hash, second.content_hash().unwrap());
    }
}
