// 🔥 Preheat - which bundle uids already exist in storage
//
// Read once from the store before validation so that strategy rules
// (create vs update/delete) and cross-entity references can be checked
// without touching the database inside the rule chain.

use crate::model::TrackerType;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerPreheat {
    tracked_entities: HashSet<String>,
    enrollments: HashSet<String>,
    events: HashSet<String>,
    /// Stored children of bundle parents, loaded for DELETE bundles.
    /// Tracked entity -> enrollments, enrollment -> events.
    children: HashMap<(TrackerType, String), Vec<String>>,
}

impl TrackerPreheat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stored uid
    pub fn insert(&mut self, kind: TrackerType, uid: &str) {
        self.set_mut(kind).insert(uid.to_string());
    }

    pub fn with_existing(mut self, kind: TrackerType, uid: &str) -> Self {
        self.insert(kind, uid);
        self
    }

    /// Record a stored child row referencing `parent`
    pub fn insert_child(&mut self, parent_kind: TrackerType, parent: &str, child: &str) {
        self.children
            .entry((parent_kind, parent.to_string()))
            .or_default()
            .push(child.to_string());
    }

    pub fn with_child(mut self, parent_kind: TrackerType, parent: &str, child: &str) -> Self {
        self.insert_child(parent_kind, parent, child);
        self
    }

    pub fn exists(&self, kind: TrackerType, uid: &str) -> bool {
        self.set(kind).contains(uid)
    }

    /// Stored children of a parent, in storage order
    pub fn children(&self, parent_kind: TrackerType, parent: &str) -> &[String] {
        self.children
            .get(&(parent_kind, parent.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tracked_entities.len() + self.enrollments.len() + self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set(&self, kind: TrackerType) -> &HashSet<String> {
        match kind {
            TrackerType::TrackedEntity => &self.tracked_entities,
            TrackerType::Enrollment => &self.enrollments,
            TrackerType::Event => &self.events,
        }
    }

    fn set_mut(&mut self, kind: TrackerType) -> &mut HashSet<String> {
        match kind {
            TrackerType::TrackedEntity => &mut self.tracked_entities,
            TrackerType::Enrollment => &mut self.enrollments,
            TrackerType::Event => &mut self.events,
        }
    }
}
