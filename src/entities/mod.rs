// Metadata entities consumed by the tracker pipeline
//
// These are already-validated metadata objects. The pipeline only reads them
// through the snapshot in metadata.rs.

pub mod org_unit;
pub mod program;

pub use org_unit::OrganisationUnit;
pub use program::{Program, ProgramStage, ProgramType};
