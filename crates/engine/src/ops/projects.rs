use chrono::Utc;
use uuid::Uuid;

use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*, sea_query::Expr,
};

use crate::{
    EngineError, MoneyCents, Project, ProjectNewCmd, ProjectUpdateCmd, ResultEngine, projects,
};

use super::{
    Engine, PageCursor, allocation::ensure_uninvested, normalize_required_name, with_sweep_tx,
    with_tx,
};

impl Engine {
    /// Creates a project and immediately fills it from the donation backlog.
    ///
    /// The insert and the sweep commit as one unit; the returned project is
    /// in its final post-sweep state and may already be closed if enough
    /// uninvested donations existed.
    pub async fn create_project(&self, cmd: ProjectNewCmd) -> ResultEngine<Project> {
        let now = Utc::now();
        let name = normalize_required_name(&cmd.name, "project")?;
        let description = cmd.description.trim().to_string();
        if description.is_empty() {
            return Err(EngineError::InvalidAmount(
                "project description must not be empty".to_string(),
            ));
        }

        let prototype = Project::new(name, description, MoneyCents::new(cmd.target_minor), now)?;
        ensure_uninvested(prototype.invested, "project")?;

        with_sweep_tx!(self, |db_tx| {
            self.require_unique_name(&db_tx, &prototype.name, None)
                .await?;

            let mut project = prototype.clone();
            projects::ActiveModel::from(&project).insert(&db_tx).await?;
            self.sweep_project(&db_tx, &mut project, now).await?;
            Ok(project)
        })
    }

    /// Updates an open project's name, description or target.
    ///
    /// Closed projects are immutable. Raising the target reopens capacity,
    /// so the backlog sweep runs again; lowering it below the invested
    /// amount is rejected, and matching it exactly closes the project.
    pub async fn update_project(&self, cmd: ProjectUpdateCmd) -> ResultEngine<Project> {
        let now = Utc::now();
        let new_name = cmd
            .name
            .as_deref()
            .map(|name| normalize_required_name(name, "project"))
            .transpose()?;
        let new_description = match cmd.description.as_deref().map(str::trim) {
            Some("") => {
                return Err(EngineError::InvalidAmount(
                    "project description must not be empty".to_string(),
                ));
            }
            other => other.map(ToString::to_string),
        };

        with_sweep_tx!(self, |db_tx| {
            let model = projects::Entity::find_by_id(cmd.project_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("project not exists".to_string()))?;
            let mut project = Project::try_from(model)?;

            if project.fully_invested() {
                return Err(EngineError::InvalidEntityState(format!(
                    "project '{}' is closed",
                    project.name
                )));
            }

            if let Some(name) = &new_name {
                self.require_unique_name(&db_tx, name, Some(project.id))
                    .await?;
                project.name = name.clone();
            }
            if let Some(description) = &new_description {
                project.description = description.clone();
            }
            if let Some(target_minor) = cmd.target_minor {
                project.set_target(MoneyCents::new(target_minor), now)?;
            }

            projects::ActiveModel::from(&project).update(&db_tx).await?;

            if cmd.target_minor.is_some() && !project.fully_invested() {
                self.sweep_project(&db_tx, &mut project, now).await?;
            }
            Ok(project)
        })
    }

    /// Deletes a project that never received money.
    ///
    /// Returns the deleted snapshot. Projects with investments can only be
    /// closed by the sweep, never removed.
    pub async fn delete_project(&self, project_id: Uuid) -> ResultEngine<Project> {
        with_tx!(self, |db_tx| {
            let model = projects::Entity::find_by_id(project_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("project not exists".to_string()))?;
            let project = Project::try_from(model)?;

            if project.fully_invested() {
                return Err(EngineError::InvalidEntityState(format!(
                    "project '{}' is closed",
                    project.name
                )));
            }
            if project.invested.is_positive() {
                return Err(EngineError::InvalidEntityState(format!(
                    "project '{}' already has investments",
                    project.name
                )));
            }

            projects::Entity::delete_by_id(project_id).exec(&db_tx).await?;
            Ok(project)
        })
    }

    /// Return a [`Project`] (snapshot from DB).
    pub async fn project(&self, project_id: Uuid) -> ResultEngine<Project> {
        with_tx!(self, |db_tx| {
            let model = projects::Entity::find_by_id(project_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("project not exists".to_string()))?;
            Ok(Project::try_from(model)?)
        })
    }

    /// Lists projects oldest-first (the FIFO order), with cursor-based
    /// pagination.
    pub async fn list_projects(
        &self,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<Project>, Option<String>)> {
        with_tx!(self, |db_tx| {
            let limit_plus_one = limit.saturating_add(1);
            let mut query = projects::Entity::find()
                .order_by_asc(projects::Column::CreatedAt)
                .order_by_asc(projects::Column::Id)
                .limit(limit_plus_one);

            if let Some(cursor) = cursor {
                let cursor = PageCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(projects::Column::CreatedAt.gt(cursor.created_at))
                        .add(
                            Condition::all()
                                .add(projects::Column::CreatedAt.eq(cursor.created_at))
                                .add(projects::Column::Id.gt(cursor.id)),
                        ),
                );
            }

            let rows: Vec<projects::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut out: Vec<Project> = Vec::with_capacity(rows.len().min(limit as usize));
            for model in rows.into_iter().take(limit as usize) {
                out.push(Project::try_from(model)?);
            }

            let next_cursor = out.last().map(|project| PageCursor {
                created_at: project.created_at,
                id: project.id,
            });
            let next_cursor = if has_more {
                next_cursor.map(|c| c.encode()).transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }

    async fn require_unique_name(
        &self,
        db_tx: &DatabaseTransaction,
        name: &str,
        exclude: Option<Uuid>,
    ) -> ResultEngine<()> {
        let mut query = projects::Entity::find()
            .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()));
        if let Some(id) = exclude {
            query = query.filter(projects::Column::Id.ne(id));
        }
        if query.one(db_tx).await?.is_some() {
            return Err(EngineError::ExistingKey(name.to_string()));
        }
        Ok(())
    }
}
