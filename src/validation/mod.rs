// 🔗 Rule Chain Validator
//
// A fixed, explicitly ordered list of small stateless units. Each unit looks
// at one entity kind through a resolved view and emits zero or more entries.
// Every applicable unit runs for every entity: one bad record can surface
// several independent violations. Report order = registration order, then
// bundle order within a unit.

pub mod context;
pub mod enrollment;
pub mod event;
pub mod reporter;
pub mod tracked_entity;

pub use context::{EnrollmentView, EventView, TrackedEntityView, ValidationContext};
pub use reporter::ValidationErrorReporter;

use crate::metadata::MetadataProvider;
use crate::model::{ImportStrategy, TrackerBundle, TrackerType};
use crate::preheat::TrackerPreheat;
use crate::report::{TrackerErrorCode, TrackerValidationReport};
use tracing::{debug, info};

// ============================================================================
// UNITS
// ============================================================================

pub type TrackedEntityCheck =
    fn(&TrackedEntityView<'_>, &ValidationContext<'_>, &mut ValidationErrorReporter);
pub type EnrollmentCheck =
    fn(&EnrollmentView<'_>, &ValidationContext<'_>, &mut ValidationErrorReporter);
pub type EventCheck = fn(&EventView<'_>, &ValidationContext<'_>, &mut ValidationErrorReporter);

#[derive(Clone, Copy)]
pub enum UnitCheck {
    TrackedEntity(TrackedEntityCheck),
    Enrollment(EnrollmentCheck),
    Event(EventCheck),
}

#[derive(Clone, Copy)]
pub struct ValidationUnit {
    pub name: &'static str,
    /// DELETE bundles only need uid + existence; other units are skipped
    pub on_delete: bool,
    pub check: UnitCheck,
}

impl ValidationUnit {
    pub fn tracked_entity(name: &'static str, check: TrackedEntityCheck) -> Self {
        ValidationUnit { name, on_delete: false, check: UnitCheck::TrackedEntity(check) }
    }

    pub fn enrollment(name: &'static str, check: EnrollmentCheck) -> Self {
        ValidationUnit { name, on_delete: false, check: UnitCheck::Enrollment(check) }
    }

    pub fn event(name: &'static str, check: EventCheck) -> Self {
        ValidationUnit { name, on_delete: false, check: UnitCheck::Event(check) }
    }

    pub fn runs_on_delete(mut self) -> Self {
        self.on_delete = true;
        self
    }

    fn applies_to(&self, strategy: ImportStrategy) -> bool {
        strategy != ImportStrategy::Delete || self.on_delete
    }
}

/// Shared by the three `*_import_strategy` units
pub(crate) fn check_import_strategy(
    ctx: &ValidationContext<'_>,
    kind: TrackerType,
    uid: &str,
    (already_exists, does_not_exist): (TrackerErrorCode, TrackerErrorCode),
    reporter: &mut ValidationErrorReporter,
) {
    if uid.is_empty() {
        return;
    }

    let exists = ctx.exists_in_storage(kind, uid);
    match ctx.strategy() {
        ImportStrategy::Create if exists => {
            reporter.add_error(kind, uid, already_exists, &[uid]);
        }
        ImportStrategy::Update | ImportStrategy::Delete if !exists => {
            reporter.add_error(kind, uid, does_not_exist, &[uid]);
        }
        _ => {}
    }
}

// ============================================================================
// CHAIN
// ============================================================================

pub struct RuleChain {
    units: Vec<ValidationUnit>,
}

impl RuleChain {
    pub fn new(units: Vec<ValidationUnit>) -> Self {
        RuleChain { units }
    }

    pub fn unit_names(&self) -> Vec<&'static str> {
        self.units.iter().map(|u| u.name).collect()
    }

    /// Run every applicable unit over the bundle. Never fails: findings are data.
    pub fn validate(
        &self,
        bundle: &TrackerBundle,
        metadata: &dyn MetadataProvider,
        preheat: &TrackerPreheat,
    ) -> TrackerValidationReport {
        let ctx = ValidationContext::new(bundle, preheat);

        let tracked_entities: Vec<TrackedEntityView<'_>> = bundle
            .tracked_entities
            .iter()
            .map(|te| TrackedEntityView::resolve(te, metadata))
            .collect();
        let enrollments: Vec<EnrollmentView<'_>> = bundle
            .enrollments
            .iter()
            .map(|en| EnrollmentView::resolve(en, metadata))
            .collect();
        let events: Vec<EventView<'_>> = bundle
            .events
            .iter()
            .map(|ev| EventView::resolve(ev, metadata))
            .collect();

        let unit_reports = self
            .units
            .iter()
            .filter(|unit| unit.applies_to(ctx.strategy()))
            .map(|unit| {
                let mut reporter = ValidationErrorReporter::new(unit.name);

                match unit.check {
                    UnitCheck::TrackedEntity(check) => {
                        for view in &tracked_entities {
                            check(view, &ctx, &mut reporter);
                        }
                    }
                    UnitCheck::Enrollment(check) => {
                        for view in &enrollments {
                            check(view, &ctx, &mut reporter);
                        }
                    }
                    UnitCheck::Event(check) => {
                        for view in &events {
                            check(view, &ctx, &mut reporter);
                        }
                    }
                }

                debug!(
                    unit = reporter.unit(),
                    errors = reporter.error_count(),
                    warnings = reporter.warning_count(),
                    "validation unit finished"
                );
                reporter.finish()
            });

        let report = TrackerValidationReport::aggregate(unit_reports);

        info!(
            bundle = %bundle.id,
            strategy = bundle.import_strategy.as_str(),
            entities = bundle.entity_count(),
            errors = report.error_reports.len(),
            warnings = report.warning_reports.len(),
            "bundle validated"
        );

        report
    }
}

impl Default for RuleChain {
    fn default() -> Self {
        RuleChain::new(vec![
            // tracked entities
            ValidationUnit::tracked_entity(
                "tracked_entity_required_properties",
                tracked_entity::required_properties,
            ),
            ValidationUnit::tracked_entity(
                "tracked_entity_org_unit_exists",
                tracked_entity::org_unit_exists,
            ),
            ValidationUnit::tracked_entity(
                "tracked_entity_import_strategy",
                tracked_entity::import_strategy,
            )
            .runs_on_delete(),
            ValidationUnit::tracked_entity(
                "tracked_entity_no_orphaned_enrollments",
                tracked_entity::no_orphaned_enrollments,
            )
            .runs_on_delete(),
            // enrollments
            ValidationUnit::enrollment(
                "enrollment_required_properties",
                enrollment::required_properties,
            ),
            ValidationUnit::enrollment("enrollment_org_unit_exists", enrollment::org_unit_exists),
            ValidationUnit::enrollment("enrollment_program_exists", enrollment::program_exists),
            ValidationUnit::enrollment(
                "enrollment_program_with_registration",
                enrollment::program_with_registration,
            ),
            ValidationUnit::enrollment(
                "enrollment_org_unit_in_program",
                enrollment::org_unit_in_program,
            ),
            ValidationUnit::enrollment(
                "enrollment_tracked_entity_exists",
                enrollment::tracked_entity_exists,
            ),
            ValidationUnit::enrollment("enrollment_import_strategy", enrollment::import_strategy)
                .runs_on_delete(),
            ValidationUnit::enrollment(
                "enrollment_no_orphaned_events",
                enrollment::no_orphaned_events,
            )
            .runs_on_delete(),
            // events
            ValidationUnit::event("event_required_properties", event::required_properties),
            ValidationUnit::event("event_org_unit_exists", event::org_unit_exists),
            ValidationUnit::event("event_program_exists", event::program_exists),
            ValidationUnit::event("event_program_stage_exists", event::program_stage_exists),
            ValidationUnit::event(
                "event_registration_requires_stage",
                event::registration_requires_stage,
            ),
            ValidationUnit::event("event_stage_in_program", event::stage_in_program),
            ValidationUnit::event("event_org_unit_in_program", event::org_unit_in_program),
            ValidationUnit::event("event_enrollment_exists", event::enrollment_exists),
            ValidationUnit::event("event_import_strategy", event::import_strategy).runs_on_delete(),
            ValidationUnit::event("event_data_values", event::data_values),
        ])
    }
}

/// Fill in the program and stage each event resolved to, so the stored row
/// carries them even when the payload left them out. Explicit values are kept.
pub fn apply_resolved_references(bundle: &mut TrackerBundle, metadata: &dyn MetadataProvider) {
    if bundle.import_strategy == ImportStrategy::Delete {
        return;
    }

    let resolved: Vec<(Option<String>, Option<String>, bool)> = bundle
        .events
        .iter()
        .map(|ev| {
            let view = EventView::resolve(ev, metadata);
            (
                view.program.map(|p| p.uid.clone()),
                view.program_stage.map(|s| s.uid.clone()),
                view.stage_defaulted,
            )
        })
        .collect();

    for (event, (program, stage, defaulted)) in bundle.events.iter_mut().zip(resolved) {
        if event.program.is_none() {
            event.program = program;
        }
        if event.program_stage.is_none() {
            event.program_stage = stage;
        }
        if defaulted {
            debug!(
                event = %event.uid,
                stage = event.program_stage.as_deref().unwrap_or_default(),
                "program stage defaulted"
            );
        }
    }
}

/// Validate with the default chain
pub fn validate(
    bundle: &TrackerBundle,
    metadata: &dyn MetadataProvider,
    preheat: &TrackerPreheat,
) -> TrackerValidationReport {
    RuleChain::default().validate(bundle, metadata, preheat)
}
