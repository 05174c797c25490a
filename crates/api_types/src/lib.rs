use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod project {
    use super::*;

    /// Request body for creating a project.
    ///
    /// Amounts are integer minor units (cents).
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProjectNew {
        pub name: String,
        pub description: String,
        pub target_minor: i64,
    }

    /// Request body for updating an open project; absent fields are left
    /// untouched.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProjectUpdate {
        pub name: Option<String>,
        pub description: Option<String>,
        pub target_minor: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProjectView {
        pub id: Uuid,
        pub name: String,
        pub description: String,
        pub target_minor: i64,
        pub invested_minor: i64,
        pub fully_invested: bool,
        pub created_at: DateTime<Utc>,
        pub closed_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProjectList {
        pub limit: Option<u64>,
        /// Opaque pagination cursor (base64), from `next_cursor`.
        ///
        /// Oldest → newer pagination (the FIFO order).
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProjectListResponse {
        pub projects: Vec<ProjectView>,
        /// Opaque cursor for fetching the next page (newer items).
        pub next_cursor: Option<String>,
    }
}

pub mod donation {
    use super::*;

    /// Request body for creating a donation.
    ///
    /// Amounts are integer minor units (cents).
    #[derive(Debug, Serialize, Deserialize)]
    pub struct DonationNew {
        pub amount_minor: i64,
        pub comment: Option<String>,
    }

    /// Full donation view, including the allocation bookkeeping.
    ///
    /// Superuser-only listings use this shape.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct DonationView {
        pub id: Uuid,
        pub user_id: String,
        pub amount_minor: i64,
        pub invested_minor: i64,
        pub fully_invested: bool,
        pub comment: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    /// What a donor sees of their own donation: no allocation bookkeeping,
    /// which is internal to the fund.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct DonationOwnView {
        pub id: Uuid,
        pub amount_minor: i64,
        pub comment: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DonationList {
        pub limit: Option<u64>,
        /// Opaque pagination cursor (base64), from `next_cursor`.
        ///
        /// Oldest → newer pagination.
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DonationListResponse {
        pub donations: Vec<DonationView>,
        pub next_cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DonationOwnListResponse {
        pub donations: Vec<DonationOwnView>,
        pub next_cursor: Option<String>,
    }
}
