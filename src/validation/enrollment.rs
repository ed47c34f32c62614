// Enrollment units

use super::check_import_strategy;
use super::context::{EnrollmentView, ValidationContext};
use super::reporter::ValidationErrorReporter;
use crate::model::{ImportStrategy, TrackerType};
use crate::report::TrackerErrorCode;

pub fn required_properties(
    view: &EnrollmentView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    let en = view.enrollment;

    let missing = [
        ("uid", en.uid.is_empty()),
        ("orgUnit", en.org_unit.is_none()),
        ("program", en.program.is_none()),
        ("trackedEntity", en.tracked_entity.is_none()),
    ];

    for (field, _) in missing.iter().filter(|(_, is_missing)| *is_missing) {
        reporter.add_error(
            TrackerType::Enrollment,
            &en.uid,
            TrackerErrorCode::E1123,
            &["Enrollment", *field],
        );
    }
}

pub fn org_unit_exists(
    view: &EnrollmentView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if let Some(org_unit) = view.enrollment.org_unit.as_deref() {
        if view.org_unit.is_none() {
            reporter.add_error(
                TrackerType::Enrollment,
                &view.enrollment.uid,
                TrackerErrorCode::E1070,
                &[org_unit],
            );
        }
    }
}

pub fn program_exists(
    view: &EnrollmentView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if let Some(program) = view.enrollment.program.as_deref() {
        if view.program.is_none() {
            reporter.add_error(
                TrackerType::Enrollment,
                &view.enrollment.uid,
                TrackerErrorCode::E1069,
                &[program],
            );
        }
    }
}

/// Only registration programs accept enrollments
pub fn program_with_registration(
    view: &EnrollmentView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if let Some(program) = view.program {
        if !program.is_registration() {
            reporter.add_error(
                TrackerType::Enrollment,
                &view.enrollment.uid,
                TrackerErrorCode::E1014,
                &[program.uid.as_str()],
            );
        }
    }
}

pub fn org_unit_in_program(
    view: &EnrollmentView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if let (Some(org_unit), Some(program)) = (view.org_unit, view.program) {
        if !program.is_assigned_to(&org_unit.uid) {
            reporter.add_error(
                TrackerType::Enrollment,
                &view.enrollment.uid,
                TrackerErrorCode::E1041,
                &[org_unit.uid.as_str(), program.uid.as_str()],
            );
        }
    }
}

pub fn tracked_entity_exists(
    view: &EnrollmentView<'_>,
    ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if let Some(te) = view.enrollment.tracked_entity.as_deref() {
        if !ctx.tracked_entity_known(te) {
            reporter.add_error(
                TrackerType::Enrollment,
                &view.enrollment.uid,
                TrackerErrorCode::E1068,
                &[te],
            );
        }
    }
}

pub fn import_strategy(
    view: &EnrollmentView<'_>,
    ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    check_import_strategy(
        ctx,
        TrackerType::Enrollment,
        &view.enrollment.uid,
        (TrackerErrorCode::E1080, TrackerErrorCode::E1081),
        reporter,
    );
}

/// DELETE only: stored events must go in the same bundle
pub fn no_orphaned_events(
    view: &EnrollmentView<'_>,
    ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if ctx.strategy() != ImportStrategy::Delete {
        return;
    }

    let uid = view.enrollment.uid.as_str();
    for event in ctx.children_left_behind(TrackerType::Enrollment, uid) {
        reporter.add_error(TrackerType::Enrollment, uid, TrackerErrorCode::E1103, &[uid, event]);
    }
}
