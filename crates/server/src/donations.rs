//! Donation API endpoints

use api_types::donation::{
    DonationList, DonationListResponse, DonationNew, DonationOwnListResponse, DonationOwnView,
    DonationView,
};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::{DonationNewCmd, users};

use crate::{ServerError, require_superuser, server::ServerState};

fn donation_view(donation: engine::Donation) -> DonationView {
    let fully_invested = donation.fully_invested();
    DonationView {
        id: donation.id,
        user_id: donation.user_id,
        amount_minor: donation.amount.cents(),
        invested_minor: donation.invested.cents(),
        fully_invested,
        comment: donation.comment,
        created_at: donation.created_at,
    }
}

/// The donor-facing view: allocation bookkeeping stays internal to the fund.
fn donation_own_view(donation: engine::Donation) -> DonationOwnView {
    DonationOwnView {
        id: donation.id,
        amount_minor: donation.amount.cents(),
        comment: donation.comment,
        created_at: donation.created_at,
    }
}

pub async fn create(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<DonationNew>,
) -> Result<(StatusCode, Json<DonationOwnView>), ServerError> {
    let mut cmd = DonationNewCmd::new(user.username, payload.amount_minor);
    if let Some(comment) = payload.comment {
        cmd = cmd.comment(comment);
    }

    let donation = state.engine.create_donation(cmd).await?;
    Ok((StatusCode::CREATED, Json(donation_own_view(donation))))
}

pub async fn list_all(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<DonationList>,
) -> Result<Json<DonationListResponse>, ServerError> {
    require_superuser(&user)?;

    let limit = payload.limit.unwrap_or(50);
    let (donations, next_cursor) = state
        .engine
        .list_donations(limit, payload.cursor.as_deref())
        .await?;

    Ok(Json(DonationListResponse {
        donations: donations.into_iter().map(donation_view).collect(),
        next_cursor,
    }))
}

pub async fn list_my(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<DonationList>,
) -> Result<Json<DonationOwnListResponse>, ServerError> {
    let limit = payload.limit.unwrap_or(50);
    let (donations, next_cursor) = state
        .engine
        .user_donations(&user.username, limit, payload.cursor.as_deref())
        .await?;

    Ok(Json(DonationOwnListResponse {
        donations: donations.into_iter().map(donation_own_view).collect(),
        next_cursor,
    }))
}
