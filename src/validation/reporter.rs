// Per-unit collector for report entries

use crate::model::TrackerType;
use crate::report::{
    EntityRef, TrackerErrorCode, TrackerErrorReport, TrackerWarningReport, UnitReport,
};

#[derive(Debug)]
pub struct ValidationErrorReporter {
    unit: &'static str,
    errors: Vec<TrackerErrorReport>,
    warnings: Vec<TrackerWarningReport>,
}

impl ValidationErrorReporter {
    pub fn new(unit: &'static str) -> Self {
        ValidationErrorReporter {
            unit,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(
        &mut self,
        tracker_type: TrackerType,
        uid: &str,
        code: TrackerErrorCode,
        args: &[&str],
    ) {
        self.errors
            .push(TrackerErrorReport::new(EntityRef::new(tracker_type, uid), code, args));
    }

    pub fn add_warning(
        &mut self,
        tracker_type: TrackerType,
        uid: &str,
        code: TrackerErrorCode,
        args: &[&str],
    ) {
        self.warnings
            .push(TrackerWarningReport::new(EntityRef::new(tracker_type, uid), code, args));
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn finish(self) -> UnitReport {
        UnitReport {
            unit: self.unit,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}
