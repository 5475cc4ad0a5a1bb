use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::entities::{clients, sales};
use crate::models::{ContactStatus, Sale};

impl From<sales::Model> for Sale {
    fn from(model: sales::Model) -> Self {
        Self {
            id: model.id,
            client_id: model.client_id,
            amount: model.amount,
            receipt_path: model.receipt_path,
            sold_at: model.sold_at,
            created_by_user_id: model.created_by_user_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSale<'a> {
    pub client_id: i32,
    pub amount: f64,
    pub receipt_path: &'a str,
    pub created_by_user_id: Option<i32>,
    pub sold_at: &'a str,
}

pub struct SaleRepository {
    conn: DatabaseConnection,
}

impl SaleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Most recent sale for a client; ties on timestamp go to the newest row.
    pub async fn latest_for_client(&self, client_id: i32) -> Result<Option<Sale>> {
        let row = sales::Entity::find()
            .filter(sales::Column::ClientId.eq(client_id))
            .order_by_desc(sales::Column::SoldAt)
            .order_by_desc(sales::Column::Id)
            .one(&self.conn)
            .await
            .context("Failed to query latest sale")?;

        Ok(row.map(Sale::from))
    }

    /// Records a sale and marks the client as `SaleClosed` in one transaction.
    /// Returns `None` when the client does not exist; nothing is written then.
    pub async fn record_closing_sale(&self, sale: NewSale<'_>) -> Result<Option<i32>> {
        let txn = self.conn.begin().await?;

        let Some(client) = clients::Entity::find_by_id(sale.client_id)
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Ok(None);
        };

        let inserted = sales::ActiveModel {
            client_id: Set(sale.client_id),
            amount: Set(sale.amount),
            receipt_path: Set(sale.receipt_path.to_string()),
            sold_at: Set(sale.sold_at.to_string()),
            created_by_user_id: Set(sale.created_by_user_id),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert sale")?;

        let mut active: clients::ActiveModel = client.into();
        active.contact_status = Set(Some(ContactStatus::SaleClosed.to_string()));
        active.updated_at = Set(sale.sold_at.to_string());
        if sale.created_by_user_id.is_some() {
            active.last_contacted_by_user_id = Set(sale.created_by_user_id);
        }
        active.update(&txn).await?;

        txn.commit().await.context("Failed to commit sale")?;

        Ok(Some(inserted.id))
    }
}
