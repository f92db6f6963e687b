use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Assigned,
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
        }
    }

    /// Unknown stored values read as `assigned`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "in_progress" => AssignmentStatus::InProgress,
            "completed" => AssignmentStatus::Completed,
            _ => AssignmentStatus::Assigned,
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted assignment row owned by the assignment subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitAssignment {
    pub assignment_id: Uuid,
    pub document_id: Uuid,
    pub assigned_to: String,
    pub reviewer_role: Option<String>,
    pub assignment_status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assignment inferred from a version's lock. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualAssignment {
    pub document_id: Uuid,
    pub assigned_to: String,
    pub assigned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assignment {
    Explicit(ExplicitAssignment),
    Virtual(VirtualAssignment),
}

impl Assignment {
    pub fn document_id(&self) -> Uuid {
        match self {
            Assignment::Explicit(explicit) => explicit.document_id,
            Assignment::Virtual(virtual_) => virtual_.document_id,
        }
    }

    pub fn assigned_to(&self) -> &str {
        match self {
            Assignment::Explicit(explicit) => &explicit.assigned_to,
            Assignment::Virtual(virtual_) => &virtual_.assigned_to,
        }
    }

    /// Virtual assignments carry no role; it is derived from the assignee's role set.
    pub fn reviewer_role(&self) -> Option<&str> {
        match self {
            Assignment::Explicit(explicit) => explicit.reviewer_role.as_deref(),
            Assignment::Virtual(_) => None,
        }
    }

    pub fn status(&self) -> AssignmentStatus {
        match self {
            Assignment::Explicit(explicit) => explicit.assignment_status,
            Assignment::Virtual(_) => AssignmentStatus::InProgress,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Assignment::Virtual(_))
    }

    pub fn as_explicit(&self) -> Option<&ExplicitAssignment> {
        match self {
            Assignment::Explicit(explicit) => Some(explicit),
            Assignment::Virtual(_) => None,
        }
    }
}

/// The row that speaks for a group of explicit assignments: the most recently
/// updated one, with the assignment id breaking ties. Resolver and reconciler
/// both select through here so they never disagree on a winner.
pub fn prevailing<'a, I>(rows: I) -> Option<&'a ExplicitAssignment>
where
    I: IntoIterator<Item = &'a ExplicitAssignment>,
{
    rows.into_iter()
        .max_by_key(|assignment| (assignment.updated_at, assignment.assignment_id))
}

impl From<ExplicitAssignment> for Assignment {
    fn from(value: ExplicitAssignment) -> Self {
        Assignment::Explicit(value)
    }
}
