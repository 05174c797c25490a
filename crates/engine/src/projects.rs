//! The module contains the representation of a fundraising project.
//!
//! A project is a funding target with a fixed goal. It starts open, receives
//! money from the allocation sweep and closes exactly once, when the
//! invested total reaches the goal. A closed project never reopens and is
//! never touched by a sweep again.
//!
//! Amounts are stored as integer cents (`i64` in the table, [`MoneyCents`]
//! in the domain type).

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ResultEngine};

/// A fundraising project.
///
/// The lifecycle is one-directional: open (`closed_at == None`) until
/// `invested == target`, then closed forever. Only the engine mutates
/// `invested`/`closed_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub target: MoneyCents,
    pub invested: MoneyCents,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(
        name: String,
        description: String,
        target: MoneyCents,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !target.is_positive() {
            return Err(EngineError::InvalidAmount(
                "project target must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            description,
            target,
            invested: MoneyCents::ZERO,
            created_at,
            closed_at: None,
        })
    }

    /// Remaining capacity before the project is fully funded.
    #[must_use]
    pub fn need(&self) -> MoneyCents {
        self.target - self.invested
    }

    #[must_use]
    pub fn fully_invested(&self) -> bool {
        self.closed_at.is_some()
    }

    /// Applies a sweep transfer to the project.
    ///
    /// `transfer` must not exceed the remaining need; the project closes
    /// when the transfer fills it exactly.
    pub(crate) fn invest(
        &mut self,
        transfer: MoneyCents,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        if self.fully_invested() {
            return Err(EngineError::InvalidEntityState(format!(
                "project '{}' is closed",
                self.name
            )));
        }
        if transfer > self.need() {
            return Err(EngineError::InvalidAmount(format!(
                "transfer exceeds need for project '{}'",
                self.name
            )));
        }
        self.invested += transfer;
        if self.invested == self.target {
            self.closed_at = Some(now);
        }
        Ok(())
    }

    /// Replaces the funding target.
    ///
    /// The new target must cover what is already invested; matching it
    /// exactly closes the project.
    pub(crate) fn set_target(
        &mut self,
        target: MoneyCents,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        if self.fully_invested() {
            return Err(EngineError::InvalidEntityState(format!(
                "project '{}' is closed",
                self.name
            )));
        }
        if !target.is_positive() {
            return Err(EngineError::InvalidAmount(
                "project target must be > 0".to_string(),
            ));
        }
        if target < self.invested {
            return Err(EngineError::InvalidAmount(format!(
                "target below invested amount for project '{}'",
                self.name
            )));
        }
        self.target = target;
        if self.invested == self.target {
            self.closed_at = Some(now);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub target_minor: i64,
    pub invested_minor: i64,
    pub fully_invested: bool,
    pub created_at: DateTimeUtc,
    pub closed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Project> for ActiveModel {
    fn from(project: &Project) -> Self {
        Self {
            id: ActiveValue::Set(project.id),
            name: ActiveValue::Set(project.name.clone()),
            description: ActiveValue::Set(project.description.clone()),
            target_minor: ActiveValue::Set(project.target.cents()),
            invested_minor: ActiveValue::Set(project.invested.cents()),
            fully_invested: ActiveValue::Set(project.fully_invested()),
            created_at: ActiveValue::Set(project.created_at),
            closed_at: ActiveValue::Set(project.closed_at),
        }
    }
}

impl TryFrom<Model> for Project {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        if model.fully_invested != model.closed_at.is_some()
            || model.invested_minor > model.target_minor
            || model.invested_minor < 0
        {
            return Err(EngineError::InvalidEntityState(format!(
                "inconsistent stored state for project '{}'",
                model.name
            )));
        }
        Ok(Self {
            id: model.id,
            name: model.name,
            description: model.description,
            target: MoneyCents::new(model.target_minor),
            invested: MoneyCents::new(model.invested_minor),
            created_at: model.created_at,
            closed_at: model.closed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(target: i64) -> Project {
        Project::new(
            "Shelter".to_string(),
            "A roof for the cats".to_string(),
            MoneyCents::new(target),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_non_positive_target() {
        let err = Project::new(
            "Shelter".to_string(),
            String::new(),
            MoneyCents::ZERO,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidAmount("project target must be > 0".to_string())
        );
    }

    #[test]
    fn invest_closes_exactly_on_target() {
        let mut p = project(100);
        p.invest(MoneyCents::new(60), Utc::now()).unwrap();
        assert!(!p.fully_invested());
        assert_eq!(p.need(), MoneyCents::new(40));

        p.invest(MoneyCents::new(40), Utc::now()).unwrap();
        assert!(p.fully_invested());
        assert_eq!(p.need(), MoneyCents::ZERO);
    }

    #[test]
    fn invest_rejects_overfill_and_closed() {
        let mut p = project(100);
        let err = p.invest(MoneyCents::new(101), Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));

        p.invest(MoneyCents::new(100), Utc::now()).unwrap();
        let err = p.invest(MoneyCents::new(1), Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidEntityState(_)));
    }

    #[test]
    fn set_target_to_invested_closes() {
        let mut p = project(100);
        p.invest(MoneyCents::new(30), Utc::now()).unwrap();

        let err = p.set_target(MoneyCents::new(20), Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));

        p.set_target(MoneyCents::new(30), Utc::now()).unwrap();
        assert!(p.fully_invested());
    }
}
