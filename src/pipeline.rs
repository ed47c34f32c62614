// 🚦 Commit Pipeline - MATERIALIZED → VALIDATED → COMMITTED / REJECTED
//
// State is an explicit tag on the run, never inferred from side effects.
// There is no path out of COMMITTED or REJECTED: a rejected bundle has to be
// corrected and resubmitted as a new run.

use crate::error::{Result, TrackerError};
use crate::metadata::MetadataProvider;
use crate::model::TrackerBundle;
use crate::preheat::TrackerPreheat;
use crate::report::{TrackerBundleReport, TrackerValidationReport};
use crate::db::TrackerStore;
use crate::validation::{apply_resolved_references, RuleChain};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BundleState {
    Materialized,
    Validated,
    Committed,
    Rejected,
}

impl BundleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleState::Materialized => "MATERIALIZED",
            BundleState::Validated => "VALIDATED",
            BundleState::Committed => "COMMITTED",
            BundleState::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BundleState::Committed | BundleState::Rejected)
    }
}

/// Why a run ended in REJECTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rejection {
    Malformed,
    Validation,
    Commit,
}

// ============================================================================
// BUNDLE RUN
// ============================================================================

/// One bundle moving through the pipeline
#[derive(Debug)]
pub struct BundleRun {
    bundle: TrackerBundle,
    state: BundleState,
    rejection: Option<Rejection>,
    validation_report: Option<TrackerValidationReport>,
    bundle_report: Option<TrackerBundleReport>,
}

impl BundleRun {
    pub fn new(bundle: TrackerBundle) -> Self {
        BundleRun {
            bundle,
            state: BundleState::Materialized,
            rejection: None,
            validation_report: None,
            bundle_report: None,
        }
    }

    pub fn bundle(&self) -> &TrackerBundle {
        &self.bundle
    }

    pub fn state(&self) -> BundleState {
        self.state
    }

    pub fn rejection(&self) -> Option<Rejection> {
        self.rejection
    }

    pub fn validation_report(&self) -> Option<&TrackerValidationReport> {
        self.validation_report.as_ref()
    }

    /// Present once the run is terminal
    pub fn bundle_report(&self) -> Option<&TrackerBundleReport> {
        self.bundle_report.as_ref()
    }

    fn require(&self, expected: BundleState, action: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TrackerError::IllegalTransition {
                action,
                state: self.state.as_str(),
            })
        }
    }

    fn reject(&mut self, cause: Rejection, report: TrackerBundleReport) {
        self.state = BundleState::Rejected;
        self.rejection = Some(cause);
        self.bundle_report = Some(report);
    }

    /// MATERIALIZED → VALIDATED, or → REJECTED when the report has errors.
    /// A malformed bundle (duplicate uids) is rejected and returned as an error.
    pub fn validate(
        &mut self,
        chain: &RuleChain,
        metadata: &dyn MetadataProvider,
        preheat: &TrackerPreheat,
    ) -> Result<BundleState> {
        self.require(BundleState::Materialized, "validate")?;

        if let Err(e) = self.bundle.check_unique_uids() {
            warn!(bundle = %self.bundle.id, error = %e, "bundle rejected as malformed");
            self.reject(
                Rejection::Malformed,
                TrackerBundleReport::rejected_by_commit(e.to_string()),
            );
            return Err(e);
        }

        let report = chain.validate(&self.bundle, metadata, preheat);

        if report.is_valid() {
            // commit writes what validation resolved, not the raw payload
            apply_resolved_references(&mut self.bundle, metadata);
            self.state = BundleState::Validated;
            info!(
                bundle = %self.bundle.id,
                warnings = report.warning_reports.len(),
                "bundle validated"
            );
        } else {
            info!(
                bundle = %self.bundle.id,
                errors = report.error_reports.len(),
                "bundle rejected by validation"
            );
            self.reject(
                Rejection::Validation,
                TrackerBundleReport::rejected_by_validation(&report),
            );
        }

        self.validation_report = Some(report);
        Ok(self.state)
    }

    /// VALIDATED → COMMITTED, or → REJECTED on rollback.
    ///
    /// A store failure is carried in the bundle report; only calling this from
    /// the wrong state is an error.
    pub fn commit<S: TrackerStore + ?Sized>(&mut self, store: &mut S) -> Result<BundleState> {
        self.require(BundleState::Validated, "commit")?;

        let validation = self.validation_report.take().unwrap_or_default();

        match store.commit(&self.bundle) {
            Ok(summary) => {
                self.state = BundleState::Committed;
                self.bundle_report = Some(TrackerBundleReport::committed(summary, &validation));
                info!(bundle = %self.bundle.id, written = summary.total(), "bundle committed");
            }
            Err(e) => {
                warn!(bundle = %self.bundle.id, error = %e, "commit rolled back");
                self.reject(
                    Rejection::Commit,
                    TrackerBundleReport::rejected_by_commit(e.to_string()),
                );
            }
        }

        self.validation_report = Some(validation);
        Ok(self.state)
    }

    pub fn into_report(self) -> TrackerImportReport {
        TrackerImportReport {
            bundle_id: self.bundle.id,
            state: self.state,
            rejection: self.rejection,
            validation_report: self.validation_report.unwrap_or_default(),
            bundle_report: self.bundle_report,
        }
    }
}

/// Everything a caller gets back from one import
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerImportReport {
    pub bundle_id: Uuid,
    pub state: BundleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    pub validation_report: TrackerValidationReport,
    /// None only if the run never reached a terminal state
    pub bundle_report: Option<TrackerBundleReport>,
}

// ============================================================================
// IMPORTER
// ============================================================================

/// Wires metadata, rule chain and store together for one or many bundles
pub struct TrackerImporter<'a> {
    metadata: &'a dyn MetadataProvider,
    chain: RuleChain,
}

impl<'a> TrackerImporter<'a> {
    pub fn new(metadata: &'a dyn MetadataProvider) -> Self {
        TrackerImporter {
            metadata,
            chain: RuleChain::default(),
        }
    }

    pub fn with_chain(mut self, chain: RuleChain) -> Self {
        self.chain = chain;
        self
    }

    /// Dry run: preheat + rule chain, no writes
    pub fn validate<S: TrackerStore + ?Sized>(
        &self,
        bundle: &TrackerBundle,
        store: &S,
    ) -> Result<TrackerValidationReport> {
        bundle.check_unique_uids()?;
        let preheat = store.preheat(bundle)?;
        Ok(self.chain.validate(bundle, self.metadata, &preheat))
    }

    pub fn import<S: TrackerStore + ?Sized>(
        &self,
        bundle: TrackerBundle,
        store: &mut S,
    ) -> Result<TrackerImportReport> {
        info!(
            bundle = %bundle.id,
            user = %bundle.user,
            strategy = bundle.import_strategy.as_str(),
            entities = bundle.entity_count(),
            "import started"
        );

        let preheat = store.preheat(&bundle)?;
        let mut run = BundleRun::new(bundle);

        if run.validate(&self.chain, self.metadata, &preheat)? == BundleState::Validated {
            run.commit(store)?;
        }

        Ok(run.into_report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SqliteTrackerStore, StoreCounts};
    use crate::fixtures::*;
    use crate::model::{ImportStrategy, TrackerType};
    use crate::report::{CommitSummary, TrackerErrorCode, TrackerStatus};

    /// Store that always fails at commit time
    struct BrokenStore;

    impl TrackerStore for BrokenStore {
        fn preheat(&self, _bundle: &TrackerBundle) -> Result<TrackerPreheat> {
            Ok(TrackerPreheat::new())
        }

        fn commit(&mut self, _bundle: &TrackerBundle) -> Result<CommitSummary> {
            Err(TrackerError::Commit("disk on fire".to_string()))
        }
    }

    #[test]
    fn test_valid_bundle_commits_ok() {
        let metadata = basic_metadata();
        let mut store = SqliteTrackerStore::open_in_memory().unwrap();

        let report = TrackerImporter::new(&metadata)
            .import(basic_bundle(), &mut store)
            .unwrap();

        assert_eq!(report.state, BundleState::Committed);
        let bundle_report = report.bundle_report.unwrap();
        assert_eq!(bundle_report.status(), TrackerStatus::Ok);
        assert_eq!(bundle_report.type_reports().tracked_entities.created, 2);
        assert_eq!(bundle_report.type_reports().enrollments.created, 2);
        assert_eq!(bundle_report.type_reports().events.created, 8);
        assert_eq!(
            store.counts().unwrap(),
            StoreCounts { tracked_entities: 2, enrollments: 2, events: 8 }
        );
    }

    #[test]
    fn test_invalid_bundle_rejected_without_writes() {
        let metadata = basic_metadata();
        let mut store = SqliteTrackerStore::open_in_memory().unwrap();
        let mut bundle = basic_bundle();
        bundle.events[4].org_unit = Some(UNKNOWN.to_string());

        let report = TrackerImporter::new(&metadata).import(bundle, &mut store).unwrap();

        assert_eq!(report.state, BundleState::Rejected);
        assert_eq!(report.rejection, Some(Rejection::Validation));
        let bundle_report = report.bundle_report.unwrap();
        assert_eq!(bundle_report.status(), TrackerStatus::Error);
        assert_eq!(bundle_report.error_reports().len(), 1);
        assert_eq!(bundle_report.error_reports()[0].error_code, TrackerErrorCode::E1011);
        assert_eq!(bundle_report.type_reports().total(), 0);
        assert_eq!(store.counts().unwrap(), StoreCounts::default());
    }

    #[test]
    fn test_conflict_after_validation_rolls_back() {
        let metadata = basic_metadata();
        let mut store = SqliteTrackerStore::open_in_memory().unwrap();
        let bundle = basic_bundle();

        // preheat taken while the store is still empty
        let preheat = store.preheat(&bundle).unwrap();
        let mut run = BundleRun::new(bundle);
        assert_eq!(
            run.validate(&RuleChain::default(), &metadata, &preheat).unwrap(),
            BundleState::Validated
        );

        // a concurrent writer lands one of our events first
        store
            .commit(&single_event_bundle(event(
                "OTmjvJDn0Fu",
                Some(NGELEHUN),
                Some(INPATIENT),
                None,
            )))
            .unwrap();

        assert_eq!(run.commit(&mut store).unwrap(), BundleState::Rejected);
        assert_eq!(run.rejection(), Some(Rejection::Commit));

        let bundle_report = run.bundle_report().unwrap();
        assert_eq!(bundle_report.status(), TrackerStatus::Error);
        assert!(bundle_report.failure().is_some());
        assert_eq!(bundle_report.type_reports().total(), 0);
        assert_eq!(
            store.counts().unwrap(),
            StoreCounts { tracked_entities: 0, enrollments: 0, events: 1 }
        );
        assert!(!store.exists(TrackerType::TrackedEntity, "PQfMcpmXeFE").unwrap());
    }

    #[test]
    fn test_store_failure_is_reported_not_raised() {
        let metadata = basic_metadata();

        let report = TrackerImporter::new(&metadata)
            .import(basic_bundle(), &mut BrokenStore)
            .unwrap();

        assert_eq!(report.state, BundleState::Rejected);
        let bundle_report = report.bundle_report.unwrap();
        assert_eq!(bundle_report.failure(), Some("Commit failed: disk on fire"));
        assert!(bundle_report.error_reports().is_empty());
    }

    #[test]
    fn test_illegal_transitions() {
        let metadata = basic_metadata();
        let preheat = TrackerPreheat::new();
        let chain = RuleChain::default();
        let mut store = SqliteTrackerStore::open_in_memory().unwrap();
        let mut run = BundleRun::new(basic_bundle());

        let early = run.commit(&mut store);
        assert!(matches!(
            early,
            Err(TrackerError::IllegalTransition { action: "commit", state: "MATERIALIZED" })
        ));

        run.validate(&chain, &metadata, &preheat).unwrap();
        run.commit(&mut store).unwrap();
        assert!(run.state().is_terminal());

        assert!(matches!(
            run.validate(&chain, &metadata, &preheat),
            Err(TrackerError::IllegalTransition { action: "validate", state: "COMMITTED" })
        ));
        assert!(matches!(
            run.commit(&mut store),
            Err(TrackerError::IllegalTransition { action: "commit", state: "COMMITTED" })
        ));
    }

    #[test]
    fn test_rejected_run_cannot_commit() {
        let metadata = basic_metadata();
        let mut store = SqliteTrackerStore::open_in_memory().unwrap();
        let mut run = BundleRun::new(single_event_bundle(event(
            "ZwwuwNp6gVd",
            Some(UNKNOWN),
            Some(INPATIENT),
            None,
        )));

        let state = run
            .validate(&RuleChain::default(), &metadata, &TrackerPreheat::new())
            .unwrap();

        assert_eq!(state, BundleState::Rejected);
        assert!(matches!(
            run.commit(&mut store),
            Err(TrackerError::IllegalTransition { action: "commit", state: "REJECTED" })
        ));
    }

    #[test]
    fn test_warnings_commit_with_warning_status() {
        let metadata = basic_metadata();
        let mut store = SqliteTrackerStore::open_in_memory().unwrap();
        let mut ev = event("ZwwuwNp6gVd", Some(NGELEHUN), Some(INPATIENT), None);
        ev.data_values.clear();

        let report = TrackerImporter::new(&metadata)
            .import(single_event_bundle(ev), &mut store)
            .unwrap();

        assert_eq!(report.state, BundleState::Committed);
        let bundle_report = report.bundle_report.unwrap();
        assert_eq!(bundle_report.status(), TrackerStatus::Warning);
        assert_eq!(bundle_report.warning_reports().len(), 1);
        assert_eq!(store.counts().unwrap().events, 1);
    }

    #[test]
    fn test_duplicate_uids_are_malformed() {
        let metadata = basic_metadata();
        let mut store = SqliteTrackerStore::open_in_memory().unwrap();
        let mut bundle = basic_bundle();
        bundle.events.push(bundle.events[0].clone());

        let importer = TrackerImporter::new(&metadata);
        assert!(matches!(
            importer.validate(&bundle, &store),
            Err(TrackerError::MalformedBundle(_))
        ));
        assert!(matches!(
            importer.import(bundle, &mut store),
            Err(TrackerError::MalformedBundle(_))
        ));
        assert_eq!(store.counts().unwrap(), StoreCounts::default());
    }

    #[test]
    fn test_dry_run_then_update_and_delete() {
        let metadata = basic_metadata();
        let mut store = SqliteTrackerStore::open_in_memory().unwrap();
        let importer = TrackerImporter::new(&metadata);
        importer.import(basic_bundle(), &mut store).unwrap();

        // second CREATE of the same content collides with storage
        let report = importer.validate(&basic_bundle(), &store).unwrap();
        let errors = report.errors_for(TrackerType::TrackedEntity, "PQfMcpmXeFE");
        assert_eq!(errors[0].error_code, TrackerErrorCode::E1002);

        let mut update = basic_bundle();
        update.import_strategy = ImportStrategy::Update;
        let report = importer.import(update, &mut store).unwrap();
        assert_eq!(report.bundle_report.unwrap().type_reports().total(), 12);

        let mut delete = TrackerBundle::new(USER, ImportStrategy::Delete);
        delete.events.push(crate::model::Event {
            uid: "jxgFyJEMUPf".to_string(),
            ..Default::default()
        });
        let report = importer.import(delete, &mut store).unwrap();
        assert_eq!(report.state, BundleState::Committed);
        assert_eq!(report.bundle_report.unwrap().type_reports().events.deleted, 1);
        assert_eq!(store.counts().unwrap().events, 7);
    }

    #[test]
    fn test_commit_stores_resolved_program_and_stage() {
        let metadata = basic_metadata();
        let mut store = SqliteTrackerStore::open_in_memory().unwrap();

        let report = TrackerImporter::new(&metadata)
            .import(basic_bundle(), &mut store)
            .unwrap();
        assert_eq!(report.state, BundleState::Committed);

        let stored = |uid: &str| {
            store
                .connection()
                .query_row(
                    "SELECT program, program_stage FROM events WHERE uid = ?1",
                    [uid],
                    |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?)),
                )
                .unwrap()
        };

        // single stage of a program without registration
        assert_eq!(
            stored("OTmjvJDn0Fu"),
            (Some(INPATIENT.to_string()), Some(INPATIENT_STAGE.to_string()))
        );
        // program taken from the stage owner
        assert_eq!(
            stored("jxgFyJEMUPf"),
            (Some(INPATIENT.to_string()), Some(INPATIENT_STAGE.to_string()))
        );
    }

    #[test]
    fn test_delete_tracked_entity_with_stored_enrollment_is_rejected() {
        let metadata = basic_metadata();
        let mut store = SqliteTrackerStore::open_in_memory().unwrap();
        let importer = TrackerImporter::new(&metadata);
        importer.import(basic_bundle(), &mut store).unwrap();

        let mut delete = TrackerBundle::new(USER, ImportStrategy::Delete);
        delete.tracked_entities.push(tracked_entity("PQfMcpmXeFE", NGELEHUN));
        let report = importer.import(delete, &mut store).unwrap();

        assert_eq!(report.state, BundleState::Rejected);
        assert_eq!(report.rejection, Some(Rejection::Validation));
        let bundle_report = report.bundle_report.unwrap();
        assert_eq!(bundle_report.error_reports().len(), 1);
        assert_eq!(bundle_report.error_reports()[0].error_code, TrackerErrorCode::E1100);
        assert!(bundle_report.failure().is_none());
        assert_eq!(
            store.counts().unwrap(),
            StoreCounts { tracked_entities: 2, enrollments: 2, events: 8 }
        );
    }
}
