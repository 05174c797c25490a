//! Command structs for engine operations.
//!
//! These types group parameters for write operations (create project,
//! update project, create donation), keeping call sites readable and
//! avoiding long argument lists.

use uuid::Uuid;

/// Create a fundraising project.
#[derive(Clone, Debug)]
pub struct ProjectNewCmd {
    pub name: String,
    pub description: String,
    pub target_minor: i64,
}

impl ProjectNewCmd {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        target_minor: i64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            target_minor,
        }
    }
}

/// Update an existing open project.
///
/// `None` fields are left untouched.
#[derive(Clone, Debug)]
pub struct ProjectUpdateCmd {
    pub project_id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_minor: Option<i64>,
}

impl ProjectUpdateCmd {
    #[must_use]
    pub fn new(project_id: Uuid) -> Self {
        Self {
            project_id,
            name: None,
            description: None,
            target_minor: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn target_minor(mut self, target_minor: i64) -> Self {
        self.target_minor = Some(target_minor);
        self
    }
}

/// Create a donation.
#[derive(Clone, Debug)]
pub struct DonationNewCmd {
    pub user_id: String,
    pub amount_minor: i64,
    pub comment: Option<String>,
}

impl DonationNewCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, amount_minor: i64) -> Self {
        Self {
            user_id: user_id.into(),
            amount_minor,
            comment: None,
        }
    }

    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}
