//! `SeaORM` implementation of the `ClientService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::SubscriberDirectory;
use crate::clock::Clock;
use crate::db::{ClientFilter, NewSale, Store, format_timestamp};
use crate::models::{Client, ContactStatus};
use crate::services::client_service::{
    ClientDetails, ClientError, ClientListQuery, ClientPage, ClientService, ReceiptFile,
    ReceiptUpload, normalize_paging,
};
use crate::services::receipts::{ReceiptStorage, has_pdf_extension, receipt_file_name};

pub struct SeaOrmClientService {
    store: Store,
    receipts: ReceiptStorage,
    directory: Arc<dyn SubscriberDirectory>,
    clock: Arc<dyn Clock>,
    max_receipt_bytes: usize,
}

impl SeaOrmClientService {
    #[must_use]
    pub fn new(
        store: Store,
        receipts: ReceiptStorage,
        directory: Arc<dyn SubscriberDirectory>,
        clock: Arc<dyn Clock>,
        max_receipt_bytes: usize,
    ) -> Self {
        Self {
            store,
            receipts,
            directory,
            clock,
            max_receipt_bytes,
        }
    }

    async fn require_client(&self, id: i32) -> Result<Client, ClientError> {
        self.store
            .client_repo()
            .get(id)
            .await?
            .ok_or(ClientError::NotFound(id))
    }

    fn validate_receipt(&self, receipt: &ReceiptUpload) -> Result<(), ClientError> {
        if receipt.bytes.is_empty() {
            return Err(ClientError::Validation("A receipt PDF is required".to_string()));
        }

        if !has_pdf_extension(&receipt.file_name) {
            return Err(ClientError::Validation(
                "Receipt must be a .pdf file".to_string(),
            ));
        }

        if receipt.bytes.len() > self.max_receipt_bytes {
            return Err(ClientError::Validation(format!(
                "Receipt exceeds the {} byte limit",
                self.max_receipt_bytes
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl ClientService for SeaOrmClientService {
    async fn list(&self, query: ClientListQuery) -> Result<ClientPage, ClientError> {
        let (page, page_size) = normalize_paging(query.page, query.page_size);
        let filter = ClientFilter {
            search: query.search,
            status: query.status,
        };

        let (total, items) = self
            .store
            .client_repo()
            .list(&filter, page, page_size)
            .await?;

        Ok(ClientPage {
            total,
            page,
            page_size,
            items,
        })
    }

    async fn get(&self, id: i32) -> Result<ClientDetails, ClientError> {
        let client = self.require_client(id).await?;
        let latest_sale = self.store.sale_repo().latest_for_client(id).await?;

        Ok(ClientDetails {
            client,
            latest_sale,
        })
    }

    async fn update_status(
        &self,
        id: i32,
        status: ContactStatus,
        notes: Option<&str>,
        actor_id: i32,
    ) -> Result<(), ClientError> {
        let now = format_timestamp(self.clock.now());

        let updated = self
            .store
            .client_repo()
            .update_status(id, status, notes, Some(actor_id), &now)
            .await?;

        if !updated {
            return Err(ClientError::NotFound(id));
        }

        info!(client_id = id, status = %status, user_id = actor_id, "Contact status updated");
        Ok(())
    }

    async fn create_sale(
        &self,
        id: i32,
        amount: f64,
        receipt: ReceiptUpload,
        actor_id: i32,
    ) -> Result<i32, ClientError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ClientError::Validation(
                "Amount must be greater than zero".to_string(),
            ));
        }
        self.validate_receipt(&receipt)?;

        let client = self.require_client(id).await?;

        let now = self.clock.now();
        let file_name = receipt_file_name(&client.external_id, now);

        self.receipts
            .write(&file_name, &receipt.bytes)
            .await
            .map_err(|e| ClientError::Storage(e.to_string()))?;

        let sold_at = format_timestamp(now);
        let result = self
            .store
            .sale_repo()
            .record_closing_sale(NewSale {
                client_id: id,
                amount,
                receipt_path: &file_name,
                created_by_user_id: Some(actor_id),
                sold_at: &sold_at,
            })
            .await;

        match result {
            Ok(Some(sale_id)) => {
                info!(
                    client_id = id,
                    sale_id,
                    amount,
                    receipt = %file_name,
                    user_id = actor_id,
                    "Sale recorded"
                );
                Ok(sale_id)
            }
            Ok(None) => {
                self.receipts.remove(&file_name).await;
                Err(ClientError::NotFound(id))
            }
            Err(e) => {
                warn!(client_id = id, "Sale insert failed, removing receipt: {e}");
                self.receipts.remove(&file_name).await;
                Err(ClientError::from(e))
            }
        }
    }

    async fn receipt(&self, id: i32) -> Result<ReceiptFile, ClientError> {
        self.require_client(id).await?;

        let sale = self
            .store
            .sale_repo()
            .latest_for_client(id)
            .await?
            .ok_or(ClientError::NoSale(id))?;

        let bytes = self
            .receipts
            .read(&sale.receipt_path)
            .await
            .map_err(|e| ClientError::Storage(e.to_string()))?
            .ok_or(ClientError::ReceiptMissing(id))?;

        Ok(ReceiptFile {
            file_name: sale.receipt_path,
            bytes,
        })
    }

    async fn refresh_phone(&self, id: i32) -> Result<Option<String>, ClientError> {
        let client = self.require_client(id).await?;

        let Some(phone) = self
            .directory
            .lookup_mobile_by_external_id(&client.external_id)
            .await?
        else {
            info!(client_id = id, external_id = %client.external_id, "No mobile number upstream");
            return Ok(None);
        };

        let now = format_timestamp(self.clock.now());
        self.store
            .client_repo()
            .update_phone(id, &phone, &now)
            .await?;

        info!(client_id = id, "Phone refreshed from upstream");
        Ok(Some(phone))
    }
}
