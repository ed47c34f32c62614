// 📋 Program + Program Stage
//
// A program is either WITH_REGISTRATION (subjects are enrolled and followed
// over time) or WITHOUT_REGISTRATION (anonymous single events). It owns an
// ordered set of stages; every stage belongs to exactly one program.

use serde::{Deserialize, Serialize};

// ============================================================================
// PROGRAM TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramType {
    /// Tracker program: enrollments + events tied to a tracked entity
    WithRegistration,

    /// Event program: anonymous events, single implicit stage
    WithoutRegistration,
}

impl ProgramType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramType::WithRegistration => "WITH_REGISTRATION",
            ProgramType::WithoutRegistration => "WITHOUT_REGISTRATION",
        }
    }
}

// ============================================================================
// PROGRAM STAGE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStage {
    #[serde(rename = "id")]
    pub uid: String,

    pub name: String,

    /// Owning program uid. Filled in by the snapshot builder from the
    /// program the stage is nested under.
    #[serde(default)]
    pub program: String,
}

impl ProgramStage {
    pub fn new(uid: &str, name: &str) -> Self {
        ProgramStage {
            uid: uid.to_string(),
            name: name.to_string(),
            program: String::new(),
        }
    }
}

// ============================================================================
// PROGRAM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    #[serde(rename = "id")]
    pub uid: String,

    pub name: String,

    pub program_type: ProgramType,

    #[serde(default)]
    pub program_stages: Vec<ProgramStage>,

    /// Org units the program is assigned to. Empty means unrestricted.
    #[serde(default)]
    pub organisation_units: Vec<String>,
}

impl Program {
    pub fn new(uid: &str, name: &str, program_type: ProgramType) -> Self {
        Program {
            uid: uid.to_string(),
            name: name.to_string(),
            program_type,
            program_stages: Vec::new(),
            organisation_units: Vec::new(),
        }
    }

    /// Append a stage, taking ownership of it
    pub fn with_stage(mut self, mut stage: ProgramStage) -> Self {
        stage.program = self.uid.clone();
        self.program_stages.push(stage);
        self
    }

    pub fn with_org_unit(mut self, org_unit: &str) -> Self {
        self.organisation_units.push(org_unit.to_string());
        self
    }

    pub fn is_registration(&self) -> bool {
        self.program_type == ProgramType::WithRegistration
    }

    /// The implicit stage of an event program. Only defined when the program
    /// has exactly one stage.
    pub fn single_stage(&self) -> Option<&ProgramStage> {
        match self.program_stages.as_slice() {
            [stage] => Some(stage),
            _ => None,
        }
    }

    pub fn is_assigned_to(&self, org_unit: &str) -> bool {
        self.organisation_units.is_empty()
            || self.organisation_units.iter().any(|uid| uid == org_unit)
    }
}
