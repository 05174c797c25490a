//! The FIFO allocation sweep.
//!
//! Money is matched oldest-target-first: a new donation drains into open
//! projects ordered by `(created_at, id)`, a new project fills from
//! uninvested donations in the same order. Each transfer moves
//! `min(need, available)` so neither side ever exceeds its cap, and the
//! invested totals on both sides move in lockstep — that is the whole
//! conservation argument.
//!
//! Ordering is never cached: every sweep re-derives it with an ordered
//! query filtered on `fully_invested`, inside the caller's transaction.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};

use crate::{Donation, EngineError, MoneyCents, Project, ResultEngine, donations, projects};

use super::Engine;

/// Moves `min(need, available)` between one donation and one project.
fn transfer(
    project: &mut Project,
    donation: &mut Donation,
    now: DateTime<Utc>,
) -> ResultEngine<MoneyCents> {
    let amount = project.need().min(donation.available());
    if amount.is_positive() {
        project.invest(amount, now)?;
        donation.invest(amount)?;
    }
    Ok(amount)
}

/// Guard for creation sweeps: the entity entering the system must be fresh.
pub(super) fn ensure_uninvested(invested: MoneyCents, label: &str) -> ResultEngine<()> {
    if !invested.is_zero() {
        return Err(EngineError::InvalidEntityState(format!(
            "{label} already has investments"
        )));
    }
    Ok(())
}

impl Engine {
    /// Drains a donation into open projects, oldest first.
    ///
    /// Touched projects and the donation itself are persisted inside
    /// `db_tx`; the caller owns the commit.
    pub(super) async fn sweep_donation(
        &self,
        db_tx: &DatabaseTransaction,
        donation: &mut Donation,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let open = projects::Entity::find()
            .filter(projects::Column::FullyInvested.eq(false))
            .order_by_asc(projects::Column::CreatedAt)
            .order_by_asc(projects::Column::Id)
            .all(db_tx)
            .await?;

        for model in open {
            if donation.fully_invested() {
                break;
            }
            let mut project = Project::try_from(model)?;
            let moved = transfer(&mut project, donation, now)?;
            if moved.is_positive() {
                persist_project_investment(db_tx, &project).await?;
            }
        }

        persist_donation_investment(db_tx, donation).await?;
        Ok(())
    }

    /// Fills a project from uninvested donations, oldest first.
    pub(super) async fn sweep_project(
        &self,
        db_tx: &DatabaseTransaction,
        project: &mut Project,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let backlog = donations::Entity::find()
            .filter(donations::Column::FullyInvested.eq(false))
            .order_by_asc(donations::Column::CreatedAt)
            .order_by_asc(donations::Column::Id)
            .all(db_tx)
            .await?;

        for model in backlog {
            if project.fully_invested() {
                break;
            }
            let mut donation = Donation::try_from(model)?;
            let moved = transfer(project, &mut donation, now)?;
            if moved.is_positive() {
                persist_donation_investment(db_tx, &donation).await?;
            }
        }

        persist_project_investment(db_tx, project).await?;
        Ok(())
    }
}

/// Persists the investment fields of a project. Other columns are untouched.
pub(super) async fn persist_project_investment(
    db_tx: &DatabaseTransaction,
    project: &Project,
) -> ResultEngine<()> {
    let model = projects::ActiveModel {
        id: ActiveValue::Set(project.id),
        invested_minor: ActiveValue::Set(project.invested.cents()),
        fully_invested: ActiveValue::Set(project.fully_invested()),
        closed_at: ActiveValue::Set(project.closed_at),
        ..Default::default()
    };
    model.update(db_tx).await?;
    Ok(())
}

/// Persists the investment fields of a donation.
pub(super) async fn persist_donation_investment(
    db_tx: &DatabaseTransaction,
    donation: &Donation,
) -> ResultEngine<()> {
    let model = donations::ActiveModel {
        id: ActiveValue::Set(donation.id),
        invested_minor: ActiveValue::Set(donation.invested.cents()),
        fully_invested: ActiveValue::Set(donation.fully_invested()),
        ..Default::default()
    };
    model.update(db_tx).await?;
    Ok(())
}
