//! Contact groups.

use chrono::{DateTime, Utc};
use rim_core::{GroupId, ValidationErrors};
use serde::{Deserialize, Serialize};

const GROUP_NAME_MAX_CHARS: usize = 100;

/// A named group of contacts. Names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Creates a group with a fresh ID.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: GroupId::new(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Renames the group.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.updated_at = Utc::now();
    }
}

/// Request to create or rename a group.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupName {
    pub name: String,
}

impl GroupName {
    /// Checks the name and reports problems as field errors.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let len = self.name.trim().chars().count();
        if len == 0 {
            errors.push("name", "is required");
        } else if len > GROUP_NAME_MAX_CHARS {
            errors.push(
                "name",
                format!("must be at most {GROUP_NAME_MAX_CHARS} characters"),
            );
        }
        errors.into_result()
    }

    /// Returns the trimmed name.
    #[must_use]
    pub fn trimmed(&self) -> &str {
        self.name.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_is_rejected() {
        let request = GroupName {
            name: "   ".to_string(),
        };
        assert!(request.validate().expect_err("blank").has_field("name"));
    }

    #[test]
    fn long_name_is_rejected() {
        let request = GroupName {
            name: "г".repeat(101),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn name_is_trimmed() {
        let request = GroupName {
            name: "  Администраторы ".to_string(),
        };
        assert!(request.validate().is_ok());
        assert_eq!(request.trimmed(), "Администраторы");
    }

    #[test]
    fn rename_touches_updated_at() {
        let mut group = Group::new("Волонтёры");
        let before = group.updated_at;
        group.rename("Координаторы");
        assert_eq!(group.name, "Координаторы");
        assert!(group.updated_at >= before);
    }
}
