//! Project API endpoints

use api_types::project::{
    ProjectList, ProjectListResponse, ProjectNew, ProjectUpdate, ProjectView,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{ProjectNewCmd, ProjectUpdateCmd, users};
use uuid::Uuid;

use crate::{ServerError, require_superuser, server::ServerState};

fn project_view(project: engine::Project) -> ProjectView {
    let fully_invested = project.fully_invested();
    ProjectView {
        id: project.id,
        name: project.name,
        description: project.description,
        target_minor: project.target.cents(),
        invested_minor: project.invested.cents(),
        fully_invested,
        created_at: project.created_at,
        closed_at: project.closed_at,
    }
}

pub async fn create(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<ProjectNew>,
) -> Result<(StatusCode, Json<ProjectView>), ServerError> {
    require_superuser(&user)?;

    let project = state
        .engine
        .create_project(ProjectNewCmd::new(
            payload.name,
            payload.description,
            payload.target_minor,
        ))
        .await?;

    Ok((StatusCode::CREATED, Json(project_view(project))))
}

pub async fn list(
    Extension(_user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<ProjectList>,
) -> Result<Json<ProjectListResponse>, ServerError> {
    let limit = payload.limit.unwrap_or(50);
    let (projects, next_cursor) = state
        .engine
        .list_projects(limit, payload.cursor.as_deref())
        .await?;

    Ok(Json(ProjectListResponse {
        projects: projects.into_iter().map(project_view).collect(),
        next_cursor,
    }))
}

pub async fn update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectUpdate>,
) -> Result<Json<ProjectView>, ServerError> {
    require_superuser(&user)?;

    let mut cmd = ProjectUpdateCmd::new(id);
    if let Some(name) = payload.name {
        cmd = cmd.name(name);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if let Some(target_minor) = payload.target_minor {
        cmd = cmd.target_minor(target_minor);
    }

    let project = state.engine.update_project(cmd).await?;
    Ok(Json(project_view(project)))
}

pub async fn delete(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectView>, ServerError> {
    require_superuser(&user)?;

    let project = state.engine.delete_project(id).await?;
    Ok(Json(project_view(project)))
}
