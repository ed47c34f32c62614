// Tracked entity units

use super::check_import_strategy;
use super::context::{TrackedEntityView, ValidationContext};
use super::reporter::ValidationErrorReporter;
use crate::model::{ImportStrategy, TrackerType};
use crate::report::TrackerErrorCode;

pub fn required_properties(
    view: &TrackedEntityView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    let te = view.tracked_entity;

    if te.uid.is_empty() {
        reporter.add_error(
            TrackerType::TrackedEntity,
            &te.uid,
            TrackerErrorCode::E1123,
            &["TrackedEntity", "uid"],
        );
    }
    if te.org_unit.is_none() {
        reporter.add_error(
            TrackerType::TrackedEntity,
            &te.uid,
            TrackerErrorCode::E1123,
            &["TrackedEntity", "orgUnit"],
        );
    }
}

pub fn org_unit_exists(
    view: &TrackedEntityView<'_>,
    _ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    let te = view.tracked_entity;

    if let Some(org_unit) = te.org_unit.as_deref() {
        if view.org_unit.is_none() {
            reporter.add_error(
                TrackerType::TrackedEntity,
                &te.uid,
                TrackerErrorCode::E1049,
                &[org_unit],
            );
        }
    }
}

pub fn import_strategy(
    view: &TrackedEntityView<'_>,
    ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    check_import_strategy(
        ctx,
        TrackerType::TrackedEntity,
        &view.tracked_entity.uid,
        (TrackerErrorCode::E1002, TrackerErrorCode::E1063),
        reporter,
    );
}

/// DELETE only: stored enrollments must go in the same bundle
pub fn no_orphaned_enrollments(
    view: &TrackedEntityView<'_>,
    ctx: &ValidationContext<'_>,
    reporter: &mut ValidationErrorReporter,
) {
    if ctx.strategy() != ImportStrategy::Delete {
        return;
    }

    let uid = view.tracked_entity.uid.as_str();
    for enrollment in ctx.children_left_behind(TrackerType::TrackedEntity, uid) {
        reporter.add_error(
            TrackerType::TrackedEntity,
            uid,
            TrackerErrorCode::E1100,
            &[uid, enrollment],
        );
    }
}
