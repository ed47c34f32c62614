// 🗂️ Metadata Snapshot - read-only lookups for org units, programs, stages
//
// Built once per request (or once per server process) and passed by reference
// to every validation unit. Nothing in the tracker pipeline mutates it, so it
// can be shared across concurrent imports without locking.

use crate::entities::{OrganisationUnit, Program, ProgramStage};
use crate::error::{Result, TrackerError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

// ============================================================================
// PROVIDER CONTRACT
// ============================================================================

/// Lookup capability consumed by the rule chain
pub trait MetadataProvider {
    fn resolve_org_unit(&self, uid: &str) -> Option<&OrganisationUnit>;

    fn resolve_program(&self, uid: &str) -> Option<&Program>;

    fn resolve_program_stage(&self, uid: &str) -> Option<&ProgramStage>;
}

// ============================================================================
// SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MetadataSnapshot {
    org_units: HashMap<String, OrganisationUnit>,
    programs: HashMap<String, Program>,
    program_stages: HashMap<String, ProgramStage>,
}

impl MetadataSnapshot {
    pub fn builder() -> MetadataSnapshotBuilder {
        MetadataSnapshotBuilder::default()
    }

    /// Load a metadata document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: MetadataDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    pub fn from_document(document: MetadataDocument) -> Result<Self> {
        let mut builder = Self::builder();
        for org_unit in document.organisation_units {
            builder = builder.org_unit(org_unit);
        }
        for program in document.programs {
            builder = builder.program(program);
        }
        builder.build()
    }

    pub fn org_unit_count(&self) -> usize {
        self.org_units.len()
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn program_stage_count(&self) -> usize {
        self.program_stages.len()
    }
}

impl MetadataProvider for MetadataSnapshot {
    fn resolve_org_unit(&self, uid: &str) -> Option<&OrganisationUnit> {
        self.org_units.get(uid)
    }

    fn resolve_program(&self, uid: &str) -> Option<&Program> {
        self.programs.get(uid)
    }

    fn resolve_program_stage(&self, uid: &str) -> Option<&ProgramStage> {
        self.program_stages.get(uid)
    }
}

// ============================================================================
// DOCUMENT
// ============================================================================

/// On-disk metadata export: org units plus programs with nested stages
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDocument {
    #[serde(default)]
    pub organisation_units: Vec<OrganisationUnit>,

    #[serde(default)]
    pub programs: Vec<Program>,
}

// ============================================================================
// BUILDER
// ============================================================================

#[derive(Debug, Default)]
pub struct MetadataSnapshotBuilder {
    org_units: Vec<OrganisationUnit>,
    programs: Vec<Program>,
}

impl MetadataSnapshotBuilder {
    pub fn org_unit(mut self, org_unit: OrganisationUnit) -> Self {
        self.org_units.push(org_unit);
        self
    }

    pub fn program(mut self, program: Program) -> Self {
        self.programs.push(program);
        self
    }

    /// Index everything by uid. Duplicate uids, and stages claimed by more
    /// than one program, are rejected.
    pub fn build(self) -> Result<MetadataSnapshot> {
        let mut snapshot = MetadataSnapshot::default();

        for org_unit in self.org_units {
            if snapshot.org_units.contains_key(&org_unit.uid) {
                return Err(TrackerError::Metadata(format!(
                    "duplicate organisation unit `{}`",
                    org_unit.uid
                )));
            }
            snapshot.org_units.insert(org_unit.uid.clone(), org_unit);
        }

        for mut program in self.programs {
            if snapshot.programs.contains_key(&program.uid) {
                return Err(TrackerError::Metadata(format!(
                    "duplicate program `{}`",
                    program.uid
                )));
            }

            for stage in program.program_stages.iter_mut() {
                stage.program = program.uid.clone();

                if let Some(existing) = snapshot.program_stages.get(&stage.uid) {
                    return Err(TrackerError::Metadata(format!(
                        "program stage `{}` belongs to both `{}` and `{}`",
                        stage.uid, existing.program, program.uid
                    )));
                }
                snapshot
                    .program_stages
                    .insert(stage.uid.clone(), stage.clone());
            }

            snapshot.programs.insert(program.uid.clone(), program);
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ProgramType;

    #[test]
    fn test_resolves_nested_stages_with_owner() {
        let snapshot = MetadataSnapshot::builder()
            .org_unit(OrganisationUnit::new("DiszpKrYNg8", "Ngelehun CHC"))
            .program(
                Program::new("IpHINAT79UW", "Child Programme", ProgramType::WithRegistration)
                    .with_stage(ProgramStage::new("A03MvHHogjR", "Birth")),
            )
            .build()
            .unwrap();

        assert!(snapshot.resolve_org_unit("DiszpKrYNg8").is_some());
        assert!(snapshot.resolve_org_unit("missing0000").is_none());

        let stage = snapshot.resolve_program_stage("A03MvHHogjR").unwrap();
        assert_eq!(stage.program, "IpHINAT79UW");
        assert_eq!(snapshot.program_stage_count(), 1);
    }

    #[test]
    fn test_stage_shared_between_programs_is_rejected() {
        let result = MetadataSnapshot::builder()
            .program(
                Program::new("IpHINAT79UW", "Child Programme", ProgramType::WithRegistration)
                    .with_stage(ProgramStage::new("A03MvHHogjR", "Birth")),
            )
            .program(
                Program::new("eBAyeGv0exc", "Inpatient morbidity", ProgramType::WithoutRegistration)
                    .with_stage(ProgramStage::new("A03MvHHogjR", "Birth")),
            )
            .build();

        assert!(matches!(result, Err(TrackerError::Metadata(_))));
    }

    #[test]
    fn test_from_json_document() {
        let json = r#"{
            "organisationUnits": [
                { "id": "DiszpKrYNg8", "name": "Ngelehun CHC" },
                { "id": "g8upMTyEZGZ", "name": "Njandama MCHP", "parent": "DiszpKrYNg8" }
            ],
            "programs": [
                {
                    "id": "eBAyeGv0exc",
                    "name": "Inpatient morbidity",
                    "programType": "WITHOUT_REGISTRATION",
                    "programStages": [{ "id": "Zj7UnCAulEk", "name": "Single-Event" }],
                    "organisationUnits": ["DiszpKrYNg8"]
                }
            ]
        }"#;

        let snapshot = MetadataSnapshot::from_json(json).unwrap();

        assert_eq!(snapshot.org_unit_count(), 2);
        assert_eq!(snapshot.program_count(), 1);
        assert_eq!(
            snapshot.resolve_program_stage("Zj7UnCAulEk").map(|s| s.program.as_str()),
            Some("eBAyeGv0exc")
        );
        assert_eq!(
            snapshot
                .resolve_org_unit("g8upMTyEZGZ")
                .and_then(|ou| ou.parent.as_deref()),
            Some("DiszpKrYNg8")
        );
    }
}
