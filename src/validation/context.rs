// Validation context + resolved entity views
//
// References are resolved against the snapshot once per entity; every unit
// then reads the same typed view instead of looking things up again.

use crate::entities::{OrganisationUnit, Program, ProgramStage};
use crate::metadata::MetadataProvider;
use crate::model::{Enrollment, Event, ImportStrategy, TrackedEntity, TrackerBundle, TrackerType};
use crate::preheat::TrackerPreheat;
use std::collections::HashSet;

// ============================================================================
// CONTEXT
// ============================================================================

/// Read-only inputs shared by all units for one validation run
pub struct ValidationContext<'a> {
    preheat: &'a TrackerPreheat,
    strategy: ImportStrategy,
    bundle_tracked_entities: HashSet<&'a str>,
    bundle_enrollments: HashSet<&'a str>,
    bundle_events: HashSet<&'a str>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(bundle: &'a TrackerBundle, preheat: &'a TrackerPreheat) -> Self {
        ValidationContext {
            preheat,
            strategy: bundle.import_strategy,
            bundle_tracked_entities: bundle
                .tracked_entities
                .iter()
                .map(|te| te.uid.as_str())
                .collect(),
            bundle_enrollments: bundle.enrollments.iter().map(|en| en.uid.as_str()).collect(),
            bundle_events: bundle.events.iter().map(|ev| ev.uid.as_str()).collect(),
        }
    }

    pub fn strategy(&self) -> ImportStrategy {
        self.strategy
    }

    pub fn exists_in_storage(&self, kind: TrackerType, uid: &str) -> bool {
        self.preheat.exists(kind, uid)
    }

    /// Tracked entity submitted in this bundle or already stored
    pub fn tracked_entity_known(&self, uid: &str) -> bool {
        self.bundle_tracked_entities.contains(uid)
            || self.exists_in_storage(TrackerType::TrackedEntity, uid)
    }

    /// Enrollment submitted in this bundle or already stored
    pub fn enrollment_known(&self, uid: &str) -> bool {
        self.bundle_enrollments.contains(uid)
            || self.exists_in_storage(TrackerType::Enrollment, uid)
    }

    /// Stored children of `parent` that this bundle does not delete along with it
    pub fn children_left_behind(&self, parent_kind: TrackerType, parent: &str) -> Vec<&'a str> {
        let in_bundle = match parent_kind {
            TrackerType::TrackedEntity => &self.bundle_enrollments,
            TrackerType::Enrollment => &self.bundle_events,
            TrackerType::Event => return Vec::new(),
        };

        self.preheat
            .children(parent_kind, parent)
            .iter()
            .map(String::as_str)
            .filter(|child| !in_bundle.contains(child))
            .collect()
    }
}

// ============================================================================
// VIEWS
// ============================================================================

pub struct TrackedEntityView<'a> {
    pub tracked_entity: &'a TrackedEntity,
    pub org_unit: Option<&'a OrganisationUnit>,
}

impl<'a> TrackedEntityView<'a> {
    pub fn resolve(tracked_entity: &'a TrackedEntity, metadata: &'a dyn MetadataProvider) -> Self {
        TrackedEntityView {
            tracked_entity,
            org_unit: tracked_entity
                .org_unit
                .as_deref()
                .and_then(|uid| metadata.resolve_org_unit(uid)),
        }
    }
}

pub struct EnrollmentView<'a> {
    pub enrollment: &'a Enrollment,
    pub org_unit: Option<&'a OrganisationUnit>,
    pub program: Option<&'a Program>,
}

impl<'a> EnrollmentView<'a> {
    pub fn resolve(enrollment: &'a Enrollment, metadata: &'a dyn MetadataProvider) -> Self {
        EnrollmentView {
            enrollment,
            org_unit: enrollment
                .org_unit
                .as_deref()
                .and_then(|uid| metadata.resolve_org_unit(uid)),
            program: enrollment
                .program
                .as_deref()
                .and_then(|uid| metadata.resolve_program(uid)),
        }
    }
}

pub struct EventView<'a> {
    pub event: &'a Event,
    pub org_unit: Option<&'a OrganisationUnit>,
    /// Explicit program, or the owner of the explicit stage when the event
    /// names no program
    pub program: Option<&'a Program>,
    /// Explicit stage, or the single stage of an event program when the
    /// event names no stage
    pub program_stage: Option<&'a ProgramStage>,
    pub stage_defaulted: bool,
}

impl<'a> EventView<'a> {
    pub fn resolve(event: &'a Event, metadata: &'a dyn MetadataProvider) -> Self {
        let org_unit = event
            .org_unit
            .as_deref()
            .and_then(|uid| metadata.resolve_org_unit(uid));

        let explicit_stage = event
            .program_stage
            .as_deref()
            .and_then(|uid| metadata.resolve_program_stage(uid));

        let program = match event.program.as_deref() {
            Some(uid) => metadata.resolve_program(uid),
            None => explicit_stage.and_then(|stage| metadata.resolve_program(&stage.program)),
        };

        let (program_stage, stage_defaulted) = match (event.program_stage.as_deref(), program) {
            (Some(_), _) => (explicit_stage, false),
            (None, Some(program)) if !program.is_registration() => {
                let stage = program.single_stage();
                (stage, stage.is_some())
            }
            (None, _) => (None, false),
        };

        EventView {
            event,
            org_unit,
            program,
            program_stage,
            stage_defaulted,
        }
    }
}
