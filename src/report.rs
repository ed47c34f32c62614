// 📑 Reports - validation findings and commit outcome as plain data
//
// Error codes are a published contract: callers and tests key on them, so a
// code is never renumbered or reused for another condition.

use crate::model::TrackerType;
use serde::Serialize;

// ============================================================================
// ERROR CODES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrackerErrorCode {
    /// Tracked entity already exists (CREATE)
    E1002,
    /// Event org unit not found
    E1011,
    /// Enrollment into a program without registration
    E1014,
    /// Event org unit not assigned to program
    E1029,
    /// Event already exists (CREATE)
    E1030,
    /// Event does not exist (UPDATE/DELETE)
    E1032,
    /// Event enrollment not found
    E1033,
    /// Event program stage not found
    E1035,
    /// Enrollment org unit not assigned to program
    E1041,
    /// Tracked entity org unit not found
    E1049,
    /// Tracked entity does not exist (UPDATE/DELETE)
    E1063,
    /// Enrollment tracked entity not found
    E1068,
    /// Enrollment program not found
    E1069,
    /// Enrollment org unit not found
    E1070,
    /// Enrollment already exists (CREATE)
    E1080,
    /// Enrollment does not exist (UPDATE/DELETE)
    E1081,
    /// Registration program event without a valid program stage
    E1086,
    /// Event program not found
    E1088,
    /// Program stage does not belong to the event program
    E1089,
    /// Tracked entity to delete still has stored enrollments outside the bundle
    E1100,
    /// Enrollment to delete still has stored events outside the bundle
    E1103,
    /// Missing required property
    E1123,
    /// Event without data values (warning)
    W1001,
}

impl TrackerErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerErrorCode::E1002 => "E1002",
            TrackerErrorCode::E1011 => "E1011",
            TrackerErrorCode::E1014 => "E1014",
            TrackerErrorCode::E1029 => "E1029",
            TrackerErrorCode::E1030 => "E1030",
            TrackerErrorCode::E1032 => "E1032",
            TrackerErrorCode::E1033 => "E1033",
            TrackerErrorCode::E1035 => "E1035",
            TrackerErrorCode::E1041 => "E1041",
            TrackerErrorCode::E1049 => "E1049",
            TrackerErrorCode::E1063 => "E1063",
            TrackerErrorCode::E1068 => "E1068",
            TrackerErrorCode::E1069 => "E1069",
            TrackerErrorCode::E1070 => "E1070",
            TrackerErrorCode::E1080 => "E1080",
            TrackerErrorCode::E1081 => "E1081",
            TrackerErrorCode::E1086 => "E1086",
            TrackerErrorCode::E1088 => "E1088",
            TrackerErrorCode::E1089 => "E1089",
            TrackerErrorCode::E1100 => "E1100",
            TrackerErrorCode::E1103 => "E1103",
            TrackerErrorCode::E1123 => "E1123",
            TrackerErrorCode::W1001 => "W1001",
        }
    }

    /// Message template; `{n}` is replaced by the n-th argument
    pub fn template(&self) -> &'static str {
        match self {
            TrackerErrorCode::E1002 => "TrackedEntity: `{0}`, already exists.",
            TrackerErrorCode::E1011 => "Could not find OrganisationUnit: `{0}`, linked to Event.",
            TrackerErrorCode::E1014 => {
                "Provided Program: `{0}`, is a Program without registration. \
                 An Enrollment cannot be created into Program without registration."
            }
            TrackerErrorCode::E1029 => {
                "Event OrganisationUnit: `{0}`, and Program: `{1}`, don't match."
            }
            TrackerErrorCode::E1030 => "Event: `{0}`, already exists.",
            TrackerErrorCode::E1032 => "Event: `{0}`, does not exist.",
            TrackerErrorCode::E1033 => "Could not find Enrollment: `{0}`, linked to Event.",
            TrackerErrorCode::E1035 => "Could not find ProgramStage: `{0}`, linked to Event.",
            TrackerErrorCode::E1041 => {
                "Enrollment OrganisationUnit: `{0}`, and Program: `{1}`, don't match."
            }
            TrackerErrorCode::E1049 => {
                "Could not find OrganisationUnit: `{0}`, linked to Tracked Entity."
            }
            TrackerErrorCode::E1063 => "TrackedEntity: `{0}`, does not exist.",
            TrackerErrorCode::E1068 => {
                "Could not find TrackedEntity: `{0}`, linked to Enrollment."
            }
            TrackerErrorCode::E1069 => "Could not find Program: `{0}`, linked to Enrollment.",
            TrackerErrorCode::E1070 => {
                "Could not find OrganisationUnit: `{0}`, linked to Enrollment."
            }
            TrackerErrorCode::E1080 => "Enrollment: `{0}`, already exists.",
            TrackerErrorCode::E1081 => "Enrollment: `{0}`, does not exist.",
            TrackerErrorCode::E1086 => {
                "Event: `{0}`, has a Program: `{1}`, that is a registration \
                 but its ProgramStage is not valid or missing."
            }
            TrackerErrorCode::E1088 => "Could not find Program: `{1}`, linked to Event: `{0}`.",
            TrackerErrorCode::E1089 => {
                "Event: `{0}`, references a ProgramStage: `{1}`, \
                 that does not belong to Program: `{2}`."
            }
            TrackerErrorCode::E1100 => {
                "TrackedEntity: `{0}`, cannot be deleted while Enrollment: `{1}`, \
                 is stored and not deleted in the same bundle."
            }
            TrackerErrorCode::E1103 => {
                "Enrollment: `{0}`, cannot be deleted while Event: `{1}`, \
                 is stored and not deleted in the same bundle."
            }
            TrackerErrorCode::E1123 => "Missing required {0} property: `{1}`.",
            TrackerErrorCode::W1001 => "Event: `{0}`, has no data values.",
        }
    }

    pub fn format(&self, args: &[&str]) -> String {
        let mut message = self.template().to_string();
        for (i, arg) in args.iter().enumerate() {
            message = message.replace(&format!("{{{}}}", i), arg);
        }
        message
    }
}

impl std::fmt::Display for TrackerErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// REPORT ENTRIES
// ============================================================================

/// Reference to the offending entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub tracker_type: TrackerType,
    pub uid: String,
}

impl EntityRef {
    pub fn new(tracker_type: TrackerType, uid: &str) -> Self {
        EntityRef {
            tracker_type,
            uid: uid.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerErrorReport {
    pub error_code: TrackerErrorCode,
    pub message: String,
    #[serde(flatten)]
    pub entity: EntityRef,
}

impl TrackerErrorReport {
    pub fn new(entity: EntityRef, code: TrackerErrorCode, args: &[&str]) -> Self {
        TrackerErrorReport {
            error_code: code,
            message: code.format(args),
            entity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerWarningReport {
    pub warning_code: TrackerErrorCode,
    pub message: String,
    #[serde(flatten)]
    pub entity: EntityRef,
}

impl TrackerWarningReport {
    pub fn new(entity: EntityRef, code: TrackerErrorCode, args: &[&str]) -> Self {
        TrackerWarningReport {
            warning_code: code,
            message: code.format(args),
            entity,
        }
    }
}

// ============================================================================
// VALIDATION REPORT (aggregator)
// ============================================================================

/// Unit-level findings, in the order the unit emitted them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitReport {
    pub unit: &'static str,
    pub errors: Vec<TrackerErrorReport>,
    pub warnings: Vec<TrackerWarningReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerValidationReport {
    pub error_reports: Vec<TrackerErrorReport>,
    pub warning_reports: Vec<TrackerWarningReport>,
}

impl TrackerValidationReport {
    /// Concatenate unit reports in chain order. No deduplication: the same
    /// code legitimately appears once per offending entity.
    pub fn aggregate<I>(units: I) -> Self
    where
        I: IntoIterator<Item = UnitReport>,
    {
        let mut report = TrackerValidationReport::default();
        for unit in units {
            report.error_reports.extend(unit.errors);
            report.warning_reports.extend(unit.warnings);
        }
        report
    }

    /// Empty error sequence is the one and only validity criterion
    pub fn is_valid(&self) -> bool {
        self.error_reports.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warning_reports.is_empty()
    }

    pub fn error_codes(&self) -> Vec<TrackerErrorCode> {
        self.error_reports.iter().map(|e| e.error_code).collect()
    }

    pub fn errors_for(&self, tracker_type: TrackerType, uid: &str) -> Vec<&TrackerErrorReport> {
        self.error_reports
            .iter()
            .filter(|e| e.entity.tracker_type == tracker_type && e.entity.uid == uid)
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} error(s), {} warning(s)",
            self.error_reports.len(),
            self.warning_reports.len()
        )
    }
}

// ============================================================================
// BUNDLE REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackerStatus {
    Ok,
    Warning,
    Error,
}

impl TrackerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerStatus::Ok => "OK",
            TrackerStatus::Warning => "WARNING",
            TrackerStatus::Error => "ERROR",
        }
    }
}

/// Commit counts for one entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerTypeReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl TrackerTypeReport {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSummary {
    pub tracked_entities: TrackerTypeReport,
    pub enrollments: TrackerTypeReport,
    pub events: TrackerTypeReport,
}

impl CommitSummary {
    pub fn total(&self) -> usize {
        self.tracked_entities.total() + self.enrollments.total() + self.events.total()
    }
}

/// Final outcome of one bundle. Built once at the end of the pipeline through
/// one of the constructors below; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerBundleReport {
    status: TrackerStatus,
    type_reports: CommitSummary,
    error_reports: Vec<TrackerErrorReport>,
    warning_reports: Vec<TrackerWarningReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

impl TrackerBundleReport {
    pub fn committed(type_reports: CommitSummary, validation: &TrackerValidationReport) -> Self {
        let status = if validation.has_warnings() {
            TrackerStatus::Warning
        } else {
            TrackerStatus::Ok
        };

        TrackerBundleReport {
            status,
            type_reports,
            error_reports: Vec::new(),
            warning_reports: validation.warning_reports.clone(),
            failure: None,
        }
    }

    pub fn rejected_by_validation(validation: &TrackerValidationReport) -> Self {
        TrackerBundleReport {
            status: TrackerStatus::Error,
            type_reports: CommitSummary::default(),
            error_reports: validation.error_reports.clone(),
            warning_reports: validation.warning_reports.clone(),
            failure: None,
        }
    }

    /// Infra failure (rolled-back commit, malformed bundle): zero counts, only
    /// the failure detail
    pub fn rejected_by_commit(failure: String) -> Self {
        TrackerBundleReport {
            status: TrackerStatus::Error,
            type_reports: CommitSummary::default(),
            error_reports: Vec::new(),
            warning_reports: Vec::new(),
            failure: Some(failure),
        }
    }

    pub fn status(&self) -> TrackerStatus {
        self.status
    }

    pub fn type_reports(&self) -> &CommitSummary {
        &self.type_reports
    }

    pub fn error_reports(&self) -> &[TrackerErrorReport] {
        &self.error_reports
    }

    pub fn warning_reports(&self) -> &[TrackerWarningReport] {
        &self.warning_reports
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &'static str, codes: &[(TrackerErrorCode, &str)]) -> UnitReport {
        UnitReport {
            unit: name,
            errors: codes
                .iter()
                .map(|(code, uid)| {
                    TrackerErrorReport::new(EntityRef::new(TrackerType::Event, uid), *code, &[uid])
                })
                .collect(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_message_formatting() {
        let args = ["ZwwuwNp6gVd", "A03MvHHogjR", "eBAyeGv0exc"];
        let message = TrackerErrorCode::E1089.format(&args);
        assert_eq!(
            message,
            "Event: `ZwwuwNp6gVd`, references a ProgramStage: `A03MvHHogjR`, \
             that does not belong to Program: `eBAyeGv0exc`."
        );
    }

    #[test]
    fn test_aggregate_keeps_order_and_duplicates() {
        let report = TrackerValidationReport::aggregate(vec![
            unit("org_unit", &[(TrackerErrorCode::E1011, "a"), (TrackerErrorCode::E1011, "b")]),
            unit("empty", &[]),
            unit("program", &[(TrackerErrorCode::E1088, "a")]),
        ]);

        assert_eq!(
            report.error_codes(),
            vec![TrackerErrorCode::E1011, TrackerErrorCode::E1011, TrackerErrorCode::E1088]
        );
        assert_eq!(report.errors_for(TrackerType::Event, "a").len(), 2);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_warning_only_report_is_valid() {
        let report = TrackerValidationReport::aggregate(vec![UnitReport {
            unit: "data_values",
            errors: Vec::new(),
            warnings: vec![TrackerWarningReport::new(
                EntityRef::new(TrackerType::Event, "ZwwuwNp6gVd"),
                TrackerErrorCode::W1001,
                &["ZwwuwNp6gVd"],
            )],
        }]);

        assert!(report.is_valid());
        assert!(report.has_warnings());

        let bundle_report = TrackerBundleReport::committed(CommitSummary::default(), &report);
        assert_eq!(bundle_report.status(), TrackerStatus::Warning);
    }

    #[test]
    fn test_report_json_shape() {
        let entry = TrackerErrorReport::new(
            EntityRef::new(TrackerType::Event, "ZwwuwNp6gVd"),
            TrackerErrorCode::E1011,
            &["missing0000"],
        );
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["errorCode"], "E1011");
        assert_eq!(json["trackerType"], "EVENT");
        assert_eq!(json["uid"], "ZwwuwNp6gVd");
    }
}
