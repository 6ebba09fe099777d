//! Policy document model and line-oriented text format
//!
//! The shared policy is a newline-delimited list of Casbin-style tuples:
//! `p,role,resource,action,object` grants a role access to an object
//! pattern, `g,user,role` binds a user to a role. Order is preserved
//! through parse/serialize round trips.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single line of the policy text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyLine {
    /// `p,role,resource,action,object` — a role may perform an action on
    /// a resource matching an object pattern
    Grant {
        role: String,
        resource: String,
        action: String,
        object: String,
    },

    /// `g,user,role` — a user is bound to a role
    Assignment { user: String, role: String },
}

impl PolicyLine {
    /// Parse one line of policy text.
    ///
    /// Returns `None` for lines that match neither the `p` nor the `g`
    /// shape; callers skip those (manually edited or legacy entries must
    /// not abort a read).
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        match fields.as_slice() {
            ["p", role, resource, action, object] => Some(Self::Grant {
                role: (*role).to_string(),
                resource: (*resource).to_string(),
                action: (*action).to_string(),
                object: (*object).to_string(),
            }),
            ["g", user, role] => Some(Self::Assignment {
                user: (*user).to_string(),
                role: (*role).to_string(),
            }),
            _ => None,
        }
    }

    /// Serialize back to the comma-joined tuple form
    pub fn to_line(&self) -> String {
        match self {
            Self::Grant {
                role,
                resource,
                action,
                object,
            } => format!("p,{},{},{},{}", role, resource, action, object),
            Self::Assignment { user, role } => format!("g,{},{}", user, role),
        }
    }

    /// Whether this line is a permission grant for the given role
    pub fn is_grant_for(&self, target: &str) -> bool {
        matches!(self, Self::Grant { role, .. } if role == target)
    }

    /// Whether this line is a role assignment for the given user
    pub fn is_assignment_for(&self, target: &str) -> bool {
        matches!(self, Self::Assignment { user, .. } if user == target)
    }
}

/// The full ordered policy: grant and assignment lines plus the
/// enforcement flag carried alongside them in the store object.
///
/// A document is fetched fresh from the store at the start of every
/// locked operation and discarded after the write completes; it is never
/// cached across operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Ordered policy lines
    pub lines: Vec<PolicyLine>,

    /// Whether downstream consumers enforce this policy
    pub enabled: bool,
}

impl PolicyDocument {
    /// An empty, disabled document (the state of an absent store object)
    pub fn empty() -> Self {
        Self {
            lines: Vec::new(),
            enabled: false,
        }
    }

    /// Parse newline-delimited policy text, skipping unrecognized lines
    pub fn parse(text: &str, enabled: bool) -> Self {
        let mut lines = Vec::new();
        let mut skipped = 0usize;

        for raw in text.lines() {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            match PolicyLine::parse(raw) {
                Some(line) => lines.push(line),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Skipped {} unrecognized policy line(s) on read", skipped);
        }

        Self { lines, enabled }
    }

    /// Serialize to the line-oriented text form, order-preserving
    pub fn to_text(&self) -> String {
        self.lines
            .iter()
            .map(PolicyLine::to_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All grant lines belonging to a role
    pub fn grants_for(&self, role: &str) -> Vec<&PolicyLine> {
        self.lines.iter().filter(|l| l.is_grant_for(role)).collect()
    }

    /// All assignment lines belonging to a user
    pub fn assignments_for(&self, user: &str) -> Vec<&PolicyLine> {
        self.lines
            .iter()
            .filter(|l| l.is_assignment_for(user))
            .collect()
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::empty()
    }
}
