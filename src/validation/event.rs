// Event units
//
// Dependent units skip silently when a reference they need did not resolve;
// the unit owning that reference has already reported it.

use super::check_import_strategy;
use super::context::{EventView, ValidationContext};
use super::reporter::ValidationErrorReporter;
use crate::model::TrackerType;
use crate::report::TrackerErrorCode;

const NULL: &str = "null";

pub fn required_properties(
    view: &EventView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    let ev = view.event;

    if ev.uid.is_empty() {
        reporter.add_error(TrackerType::Event, &ev.uid, TrackerErrorCode::E1123, &["Event", "uid"]);
    }
    if ev.org_unit.is_none() {
        reporter.add_error(
            TrackerType::Event,
            &ev.uid,
            TrackerErrorCode::E1123,
            &["Event", "orgUnit"],
        );
    }
}

pub fn org_unit_exists(
    view: &EventView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if let Some(org_unit) = view.event.org_unit.as_deref() {
        if view.org_unit.is_none() {
            reporter.add_error(
                TrackerType::Event,
                &view.event.uid,
                TrackerErrorCode::E1011,
                &[org_unit],
            );
        }
    }
}

pub fn program_exists(
    view: &EventView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if view.program.is_none() {
        let program = view.event.program.as_deref().unwrap_or(NULL);
        reporter.add_error(
            TrackerType::Event,
            &view.event.uid,
            TrackerErrorCode::E1088,
            &[view.event.uid.as_str(), program],
        );
    }
}

pub fn program_stage_exists(
    view: &EventView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if view.program_stage.is_none() {
        let stage = view.event.program_stage.as_deref().unwrap_or(NULL);
        reporter.add_error(TrackerType::Event, &view.event.uid, TrackerErrorCode::E1035, &[stage]);
    }
}

/// A registration program has no implicit stage to fall back on
pub fn registration_requires_stage(
    view: &EventView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if let Some(program) = view.program {
        if program.is_registration() && view.program_stage.is_none() {
            reporter.add_error(
                TrackerType::Event,
                &view.event.uid,
                TrackerErrorCode::E1086,
                &[view.event.uid.as_str(), program.uid.as_str()],
            );
        }
    }
}

pub fn stage_in_program(
    view: &EventView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if let (Some(program), Some(stage)) = (view.program, view.program_stage) {
        if stage.program != program.uid {
            reporter.add_error(
                TrackerType::Event,
                &view.event.uid,
                TrackerErrorCode::E1089,
                &[view.event.uid.as_str(), stage.uid.as_str(), program.uid.as_str()],
            );
        }
    }
}

pub fn org_unit_in_program(
    view: &EventView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if let (Some(org_unit), Some(program)) = (view.org_unit, view.program) {
        if !program.is_assigned_to(&org_unit.uid) {
            reporter.add_error(
                TrackerType::Event,
                &view.event.uid,
                TrackerErrorCode::E1029,
                &[org_unit.uid.as_str(), program.uid.as_str()],
            );
        }
    }
}

pub fn enrollment_exists(
    view: &EventView<'_>,
    ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if let Some(enrollment) = view.event.enrollment.as_deref() {
        if !ctx.enrollment_known(enrollment) {
            reporter.add_error(
                TrackerType::Event,
                &view.event.uid,
                TrackerErrorCode::E1033,
                &[enrollment],
            );
        }
    }
}

pub fn import_strategy(
    view: &EventView<'_>,
    ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    check_import_strategy(
        ctx,
        TrackerType::Event,
        &view.event.uid,
        (TrackerErrorCode::E1030, TrackerErrorCode::E1032),
        reporter,
    );
}

/// Warning only
pub fn data_values(
    view: &EventView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if view.event.data_values.is_empty() {
        reporter.add_warning(
            TrackerType::Event,
            &view.event.uid,
            TrackerErrorCode::W1001,
            &[view.event.uid.as_str()],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::model::Event;
    use crate::preheat::TrackerPreheat;
    use crate::report::UnitReport;

    type Check = fn(&EventView<'_>, &ValidationContext<'_>, &mut ValidationErrorReporter);

    fn run(check: Check, ev: Event) -> UnitReport {
        let metadata = basic_metadata();
        let preheat = TrackerPreheat::new();
        let bundle = single_event_bundle(ev);
        let ctx = ValidationContext::new(&bundle, &preheat);

        let mut reporter = ValidationErrorReporter::new("test");
        check(&EventView::resolve(&bundle.events[0], &metadata), &ctx, &mut reporter);
        reporter.finish()
    }

    fn codes(report: &UnitReport) -> Vec<TrackerErrorCode> {
        report.errors.iter().map(|e| e.error_code).collect()
    }

    #[test]
    fn test_program_exists_accepts_program_derived_from_stage() {
        let ev = event("ZwwuwNp6gVd", Some(NGELEHUN), None, Some(INPATIENT_STAGE));
        assert!(run(program_exists, ev).errors.is_empty());

        let ev = event("ZwwuwNp6gVd", Some(NGELEHUN), Some(UNKNOWN), Some(INPATIENT_STAGE));
        assert_eq!(codes(&run(program_exists, ev)), vec![TrackerErrorCode::E1088]);
    }

    #[test]
    fn test_program_stage_message_names_null() {
        let ev = event("ZwwuwNp6gVd", Some(NGELEHUN), None, None);
        let report = run(program_stage_exists, ev);

        assert_eq!(codes(&report), vec![TrackerErrorCode::E1035]);
        assert!(report.errors[0].message.contains("`null`"));
    }

    #[test]
    fn test_event_program_stage_defaults() {
        let ev = event("ZwwuwNp6gVd", Some(NGELEHUN), Some(INPATIENT), None);

        assert!(run(program_stage_exists, ev.clone()).errors.is_empty());
        assert!(run(registration_requires_stage, ev).errors.is_empty());
    }

    #[test]
    fn test_registration_requires_stage_skips_without_program() {
        let ev = event("ZwwuwNp6gVd", Some(NGELEHUN), Some(UNKNOWN), None);
        assert!(run(registration_requires_stage, ev).errors.is_empty());

        let ev = event("ZwwuwNp6gVd", Some(NGELEHUN), Some(CHILD_PROGRAMME), Some(UNKNOWN));
        assert_eq!(codes(&run(registration_requires_stage, ev)), vec![TrackerErrorCode::E1086]);
    }

    #[test]
    fn test_stage_in_program() {
        let matching = event("ZwwuwNp6gVd", Some(NGELEHUN), Some(CHILD_PROGRAMME), Some(BIRTH));
        assert!(run(stage_in_program, matching).errors.is_empty());

        let foreign = event(
            "ZwwuwNp6gVd",
            Some(NGELEHUN),
            Some(CHILD_PROGRAMME),
            Some(INPATIENT_STAGE),
        );
        let report = run(stage_in_program, foreign);
        assert_eq!(codes(&report), vec![TrackerErrorCode::E1089]);
        assert!(report.errors[0].message.contains(INPATIENT_STAGE));

        // nothing to compare when the stage is unknown
        let unknown = event("ZwwuwNp6gVd", Some(NGELEHUN), Some(CHILD_PROGRAMME), Some(UNKNOWN));
        assert!(run(stage_in_program, unknown).errors.is_empty());
    }

    #[test]
    fn test_org_unit_in_program() {
        let ev = event("ZwwuwNp6gVd", Some(NJANDAMA), Some(INPATIENT), Some(INPATIENT_STAGE));
        assert_eq!(codes(&run(org_unit_in_program, ev)), vec![TrackerErrorCode::E1029]);
    }

    #[test]
    fn test_unknown_enrollment() {
        let ev = enrolled_event("ZwwuwNp6gVd", UNKNOWN, BIRTH);
        assert_eq!(codes(&run(enrollment_exists, ev)), vec![TrackerErrorCode::E1033]);
    }

    #[test]
    fn test_empty_data_values_only_warns() {
        let mut ev = event("ZwwuwNp6gVd", Some(NGELEHUN), Some(INPATIENT), Some(INPATIENT_STAGE));
        ev.data_values.clear();

        let report = run(data_values, ev);

        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].warning_code, TrackerErrorCode::W1001);
    }
}
