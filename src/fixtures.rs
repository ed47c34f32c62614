// Shared test fixtures: a small Sierra Leone style metadata set and helpers
// for building bundles against it.

use crate::entities::{OrganisationUnit, Program, ProgramStage, ProgramType};
use crate::metadata::MetadataSnapshot;
use crate::model::{DataValue, Enrollment, Event, ImportStrategy, TrackedEntity, TrackerBundle};

pub const NGELEHUN: &str = "DiszpKrYNg8";
pub const NJANDAMA: &str = "g8upMTyEZGZ";

/// WITH_REGISTRATION, two stages, assigned to both org units
pub const CHILD_PROGRAMME: &str = "IpHINAT79UW";
pub const BIRTH: &str = "A03MvHHogjR";
pub const POSTNATAL: &str = "ZzYYXq4fJie";

/// WITHOUT_REGISTRATION, one stage, assigned to Ngelehun only
pub const INPATIENT: &str = "eBAyeGv0exc";
pub const INPATIENT_STAGE: &str = "Zj7UnCAulEk";

/// Resolves to nothing
pub const UNKNOWN: &str = "xxxxxxxxxxx";

pub const USER: &str = "M5zQapPyTZI";

pub fn basic_metadata() -> MetadataSnapshot {
    MetadataSnapshot::builder()
        .org_unit(OrganisationUnit::new(NGELEHUN, "Ngelehun CHC"))
        .org_unit(OrganisationUnit::new(NJANDAMA, "Njandama MCHP").with_parent(NGELEHUN))
        .program(
            Program::new(CHILD_PROGRAMME, "Child Programme", ProgramType::WithRegistration)
                .with_stage(ProgramStage::new(BIRTH, "Birth"))
                .with_stage(ProgramStage::new(POSTNATAL, "Baby Postnatal"))
                .with_org_unit(NGELEHUN)
                .with_org_unit(NJANDAMA),
        )
        .program(
            Program::new(INPATIENT, "Inpatient morbidity", ProgramType::WithoutRegistration)
                .with_stage(ProgramStage::new(INPATIENT_STAGE, "Inpatient morbidity"))
                .with_org_unit(NGELEHUN),
        )
        .build()
        .expect("fixture metadata is consistent")
}

pub fn tracked_entity(uid: &str, org_unit: &str) -> TrackedEntity {
    TrackedEntity {
        uid: uid.to_string(),
        org_unit: Some(org_unit.to_string()),
        tracked_entity_type: Some("nEenWmSyUEp".to_string()),
        ..Default::default()
    }
}

pub fn enrollment(uid: &str, tracked_entity: &str, program: &str, org_unit: &str) -> Enrollment {
    Enrollment {
        uid: uid.to_string(),
        tracked_entity: Some(tracked_entity.to_string()),
        program: Some(program.to_string()),
        org_unit: Some(org_unit.to_string()),
        ..Default::default()
    }
}

/// Event with a single data value
pub fn event(
    uid: &str,
    org_unit: Option<&str>,
    program: Option<&str>,
    program_stage: Option<&str>,
) -> Event {
    Event {
        uid: uid.to_string(),
        org_unit: org_unit.map(str::to_string),
        program: program.map(str::to_string),
        program_stage: program_stage.map(str::to_string),
        data_values: vec![DataValue::new("qrur9Dvnyt5", "22")],
        ..Default::default()
    }
}

pub fn enrolled_event(uid: &str, enrollment: &str, program_stage: &str) -> Event {
    Event {
        enrollment: Some(enrollment.to_string()),
        ..event(uid, Some(NGELEHUN), Some(CHILD_PROGRAMME), Some(program_stage))
    }
}

pub fn single_event_bundle(event: Event) -> TrackerBundle {
    let mut bundle = TrackerBundle::new(USER, ImportStrategy::Create);
    bundle.events.push(event);
    bundle
}

/// 2 tracked entities, 2 enrollments, 8 events; valid against basic_metadata()
pub fn basic_bundle() -> TrackerBundle {
    let mut bundle = TrackerBundle::new(USER, ImportStrategy::Create);

    bundle.tracked_entities = vec![
        tracked_entity("PQfMcpmXeFE", NGELEHUN),
        tracked_entity("dNpxRu1mWG5", NJANDAMA),
    ];
    bundle.enrollments = vec![
        enrollment("MNWZ6hnuhSw", "PQfMcpmXeFE", CHILD_PROGRAMME, NGELEHUN),
        enrollment("KpknKHptul0", "dNpxRu1mWG5", CHILD_PROGRAMME, NJANDAMA),
    ];
    bundle.events = vec![
        enrolled_event("ZwwuwNp6gVd", "MNWZ6hnuhSw", BIRTH),
        enrolled_event("D9PbzJY8bJO", "MNWZ6hnuhSw", POSTNATAL),
        enrolled_event("lumVtWwwy0O", "KpknKHptul0", BIRTH),
        enrolled_event("cadc5eGj0j7", "KpknKHptul0", POSTNATAL),
        event("QRYjLTiJTrA", Some(NGELEHUN), Some(INPATIENT), Some(INPATIENT_STAGE)),
        event("kWjSezkXHVp", Some(NGELEHUN), Some(INPATIENT), Some(INPATIENT_STAGE)),
        event("OTmjvJDn0Fu", Some(NGELEHUN), Some(INPATIENT), None),
        event("jxgFyJEMUPf", Some(NGELEHUN), None, Some(INPATIENT_STAGE)),
    ];

    bundle
}
