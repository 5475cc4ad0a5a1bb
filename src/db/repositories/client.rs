use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::entities::clients;
use crate::models::{Client, ContactStatus};

impl From<clients::Model> for Client {
    fn from(model: clients::Model) -> Self {
        Self {
            id: model.id,
            external_id: model.external_id,
            first_name: model.first_name,
            last_name: model.last_name,
            phone: model.phone,
            address: model.address,
            city: model.city,
            contact_status: model.contact_status.and_then(|s| s.parse().ok()),
            notes: model.notes,
            updated_at: model.updated_at,
            last_contacted_by_user_id: model.last_contacted_by_user_id,
        }
    }
}

/// Identity fields owned by the upstream subscriber listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    pub search: Option<String>,
    pub status: Option<ContactStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
}

pub struct ClientRepository {
    conn: DatabaseConnection,
}

impl ClientRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn filter_condition(filter: &ClientFilter) -> Condition {
        let mut condition = Condition::all();

        if let Some(search) = filter.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
            let like = LikeExpr::new(pattern).escape('\\');

            let any = [
                clients::Column::ExternalId,
                clients::Column::FirstName,
                clients::Column::LastName,
                clients::Column::Phone,
                clients::Column::Address,
            ]
            .into_iter()
            .fold(Condition::any(), |cond, column| {
                cond.add(Expr::expr(Func::lower(Expr::col(column))).like(like.clone()))
            });

            condition = condition.add(any);
        }

        if let Some(status) = filter.status {
            condition = condition.add(clients::Column::ContactStatus.eq(status.as_str()));
        }

        condition
    }

    /// One page of clients ordered by external identifier, plus the total
    /// number of matching rows. `page` is 1-based.
    pub async fn list(
        &self,
        filter: &ClientFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(u64, Vec<Client>)> {
        let paginator = clients::Entity::find()
            .filter(Self::filter_condition(filter))
            .order_by_asc(clients::Column::ExternalId)
            .order_by_asc(clients::Column::Id)
            .paginate(&self.conn, page_size);

        let total = paginator
            .num_items()
            .await
            .context("Failed to count clients")?;

        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .context("Failed to fetch client page")?;

        Ok((total, rows.into_iter().map(Client::from).collect()))
    }

    pub async fn get(&self, id: i32) -> Result<Option<Client>> {
        let row = clients::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query client by ID")?;

        Ok(row.map(Client::from))
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Client>> {
        let row = clients::Entity::find()
            .filter(clients::Column::ExternalId.eq(external_id))
            .one(&self.conn)
            .await
            .context("Failed to query client by external ID")?;

        Ok(row.map(Client::from))
    }

    /// Returns false if the client does not exist.
    pub async fn update_status(
        &self,
        id: i32,
        status: ContactStatus,
        notes: Option<&str>,
        contacted_by: Option<i32>,
        now: &str,
    ) -> Result<bool> {
        let Some(model) = clients::Entity::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        let mut active: clients::ActiveModel = model.into();
        active.contact_status = Set(Some(status.to_string()));
        if let Some(notes) = notes {
            active.notes = Set(notes.to_string());
        }
        if contacted_by.is_some() {
            active.last_contacted_by_user_id = Set(contacted_by);
        }
        active.updated_at = Set(now.to_string());
        active.update(&self.conn).await?;

        Ok(true)
    }

    pub async fn update_phone(&self, id: i32, phone: &str, now: &str) -> Result<bool> {
        let result = clients::Entity::update_many()
            .col_expr(clients::Column::Phone, Expr::value(phone))
            .col_expr(clients::Column::UpdatedAt, Expr::value(now))
            .filter(clients::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update client phone")?;

        Ok(result.rows_affected > 0)
    }

    /// Inserts or updates every row by external identifier inside a single
    /// transaction. Repeated identifiers in one batch update the earlier row.
    pub async fn upsert_identities(
        &self,
        rows: &[ClientIdentity],
        now: &str,
    ) -> Result<UpsertCounts> {
        let txn = self.conn.begin().await?;
        let mut counts = UpsertCounts::default();

        for row in rows {
            let existing = clients::Entity::find()
                .filter(clients::Column::ExternalId.eq(&row.external_id))
                .one(&txn)
                .await?;

            if let Some(model) = existing {
                let mut active: clients::ActiveModel = model.into();
                active.first_name = Set(row.first_name.clone());
                active.last_name = Set(row.last_name.clone());
                active.address = Set(row.address.clone());
                active.city = Set(row.city.clone());
                active.updated_at = Set(now.to_string());
                active.update(&txn).await?;
                counts.updated += 1;
            } else {
                clients::ActiveModel {
                    external_id: Set(row.external_id.clone()),
                    first_name: Set(row.first_name.clone()),
                    last_name: Set(row.last_name.clone()),
                    phone: Set(String::new()),
                    address: Set(row.address.clone()),
                    city: Set(row.city.clone()),
                    contact_status: Set(None),
                    notes: Set(String::new()),
                    updated_at: Set(now.to_string()),
                    last_contacted_by_user_id: Set(None),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                counts.inserted += 1;
            }
        }

        txn.commit().await.context("Failed to commit client upsert")?;

        info!(
            inserted = counts.inserted,
            updated = counts.updated,
            "Upserted clients"
        );
        Ok(counts)
    }
}

fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
