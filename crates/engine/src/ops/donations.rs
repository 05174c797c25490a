use chrono::Utc;

use sea_orm::{Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};

use crate::{Donation, DonationNewCmd, EngineError, MoneyCents, ResultEngine, donations, users};

use super::{
    Engine, PageCursor, allocation::ensure_uninvested, normalize_optional_text, with_sweep_tx,
    with_tx,
};

impl Engine {
    /// Creates a donation and immediately drains it into open projects,
    /// oldest first.
    ///
    /// The insert and the sweep commit as one unit; the returned donation is
    /// in its final post-sweep state. Whatever the open projects could not
    /// absorb stays on the donation and is matched by future project
    /// creation.
    pub async fn create_donation(&self, cmd: DonationNewCmd) -> ResultEngine<Donation> {
        let now = Utc::now();
        let comment = normalize_optional_text(cmd.comment.as_deref());

        let prototype = Donation::new(
            cmd.user_id.clone(),
            MoneyCents::new(cmd.amount_minor),
            comment,
            now,
        )?;
        ensure_uninvested(prototype.invested, "donation")?;

        with_sweep_tx!(self, |db_tx| {
            users::Entity::find_by_id(cmd.user_id.as_str())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;

            let mut donation = prototype.clone();
            donations::ActiveModel::from(&donation).insert(&db_tx).await?;
            self.sweep_donation(&db_tx, &mut donation, now).await?;
            Ok(donation)
        })
    }

    /// Lists every donation oldest-first, with cursor-based pagination.
    ///
    /// Administrative view; the server restricts it to superusers.
    pub async fn list_donations(
        &self,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<Donation>, Option<String>)> {
        self.list_donations_filtered(None, limit, cursor).await
    }

    /// Lists one user's donations oldest-first, with cursor-based
    /// pagination.
    pub async fn user_donations(
        &self,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<Donation>, Option<String>)> {
        self.list_donations_filtered(Some(user_id), limit, cursor)
            .await
    }

    async fn list_donations_filtered(
        &self,
        user_id: Option<&str>,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<Donation>, Option<String>)> {
        with_tx!(self, |db_tx| {
            let limit_plus_one = limit.saturating_add(1);
            let mut query = donations::Entity::find()
                .order_by_asc(donations::Column::CreatedAt)
                .order_by_asc(donations::Column::Id)
                .limit(limit_plus_one);

            if let Some(user_id) = user_id {
                query = query.filter(donations::Column::UserId.eq(user_id));
            }
            if let Some(cursor) = cursor {
                let cursor = PageCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(donations::Column::CreatedAt.gt(cursor.created_at))
                        .add(
                            Condition::all()
                                .add(donations::Column::CreatedAt.eq(cursor.created_at))
                                .add(donations::Column::Id.gt(cursor.id)),
                        ),
                );
            }

            let rows: Vec<donations::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut out: Vec<Donation> = Vec::with_capacity(rows.len().min(limit as usize));
            for model in rows.into_iter().take(limit as usize) {
                out.push(Donation::try_from(model)?);
            }

            let next_cursor = out.last().map(|donation| PageCursor {
                created_at: donation.created_at,
                id: donation.id,
            });
            let next_cursor = if has_more {
                next_cursor.map(|c| c.encode()).transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }
}
