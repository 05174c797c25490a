//! The module contains the representation of a donation.
//!
//! A donation is money given to the fund as a whole, never earmarked to a
//! specific project. The sweep drains it oldest-first into open projects;
//! whatever is not consumed stays on the donation and is picked up when new
//! projects appear.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub user_id: String,
    pub amount: MoneyCents,
    pub invested: MoneyCents,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Donation {
    pub fn new(
        user_id: String,
        amount: MoneyCents,
        comment: Option<String>,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "donation amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            invested: MoneyCents::ZERO,
            comment,
            created_at,
        })
    }

    /// Capacity not yet allocated to any project.
    #[must_use]
    pub fn available(&self) -> MoneyCents {
        self.amount - self.invested
    }

    #[must_use]
    pub fn fully_invested(&self) -> bool {
        self.invested == self.amount
    }

    /// Applies a sweep transfer to the donation.
    ///
    /// `transfer` must not exceed the available capacity.
    pub(crate) fn invest(&mut self, transfer: MoneyCents) -> ResultEngine<()> {
        if self.fully_invested() {
            return Err(EngineError::InvalidEntityState(
                "donation is fully invested".to_string(),
            ));
        }
        if transfer > self.available() {
            return Err(EngineError::InvalidAmount(
                "transfer exceeds donation capacity".to_string(),
            ));
        }
        self.invested += transfer;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "donations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub amount_minor: i64,
    pub invested_minor: i64,
    pub fully_invested: bool,
    pub comment: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Username",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Donation> for ActiveModel {
    fn from(donation: &Donation) -> Self {
        Self {
            id: ActiveValue::Set(donation.id),
            user_id: ActiveValue::Set(donation.user_id.clone()),
            amount_minor: ActiveValue::Set(donation.amount.cents()),
            invested_minor: ActiveValue::Set(donation.invested.cents()),
            fully_invested: ActiveValue::Set(donation.fully_invested()),
            comment: ActiveValue::Set(donation.comment.clone()),
            created_at: ActiveValue::Set(donation.created_at),
        }
    }
}

impl TryFrom<Model> for Donation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        if model.invested_minor > model.amount_minor
            || model.invested_minor < 0
            || model.fully_invested != (model.invested_minor == model.amount_minor)
        {
            return Err(EngineError::InvalidEntityState(
                "inconsistent stored state for donation".to_string(),
            ));
        }
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            amount: MoneyCents::new(model.amount_minor),
            invested: MoneyCents::new(model.invested_minor),
            comment: model.comment,
            created_at: model.created_at,
        })
    }
}
