//! Domain service for the client pipeline: listing, contact status, sales
//! with receipts, and phone refresh from the upstream directory.

use thiserror::Error;

use crate::clients::PhantomError;
use crate::constants::pagination::{
    DEFAULT_PAGE_SIZE, MAX_PAGE, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
};
use crate::models::{Client, ContactStatus, Sale};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Client {0} not found")]
    NotFound(i32),

    #[error("Client {0} has no sales")]
    NoSale(i32),

    #[error("Receipt for client {0} is missing from storage")]
    ReceiptMissing(i32),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Upstream(#[from] PhantomError),

    #[error("Receipt storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for ClientError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ClientError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientListQuery {
    pub search: Option<String>,
    pub status: Option<ContactStatus>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ClientPage {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub items: Vec<Client>,
}

#[derive(Debug, Clone)]
pub struct ClientDetails {
    pub client: Client,
    pub latest_sale: Option<Sale>,
}

/// Uploaded receipt as received from the client.
#[derive(Debug, Clone)]
pub struct ReceiptUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ReceiptFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Resolves the requested page and page size: page is clamped to
/// `[1, MAX_PAGE]`, the size defaults to 50 and is clamped to `[10, 200]`.
#[must_use]
pub fn normalize_paging(page: Option<i64>, page_size: Option<i64>) -> (u64, u64) {
    let page = page
        .filter(|p| *p >= 1)
        .map_or(1, |p| p.unsigned_abs().min(MAX_PAGE));

    let page_size = page_size.map_or(DEFAULT_PAGE_SIZE, |size| {
        u64::try_from(size)
            .unwrap_or(0)
            .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    });

    (page, page_size)
}

/// Parses a sale amount. Must be a finite number greater than zero.
pub fn parse_amount(raw: &str) -> Result<f64, ClientError> {
    let amount: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ClientError::Validation(format!("Invalid amount '{}'", raw.trim())))?;

    if !amount.is_finite() || amount <= 0.0 {
        return Err(ClientError::Validation(
            "Amount must be greater than zero".to_string(),
        ));
    }

    Ok(amount)
}

#[async_trait::async_trait]
pub trait ClientService: Send + Sync {
    async fn list(&self, query: ClientListQuery) -> Result<ClientPage, ClientError>;

    /// Client plus its most recent sale.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if the client does not exist.
    async fn get(&self, id: i32) -> Result<ClientDetails, ClientError>;

    /// Sets contact status and notes, attributing the change to `actor_id`.
    /// `notes: None` keeps the stored notes.
    async fn update_status(
        &self,
        id: i32,
        status: ContactStatus,
        notes: Option<&str>,
        actor_id: i32,
    ) -> Result<(), ClientError>;

    /// Stores the receipt, records the sale and marks the client `SaleClosed`.
    /// The stored file is removed again if the database write fails.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Validation`] for a non-positive amount, a missing or
    ///   non-PDF file, or a file over the size limit
    /// - [`ClientError::NotFound`] if the client does not exist
    async fn create_sale(
        &self,
        id: i32,
        amount: f64,
        receipt: ReceiptUpload,
        actor_id: i32,
    ) -> Result<i32, ClientError>;

    /// Receipt of the client's most recent sale.
    async fn receipt(&self, id: i32) -> Result<ReceiptFile, ClientError>;

    /// Looks up the client's mobile number upstream and stores it when found.
    /// Returns `None` without touching the stored phone if upstream has none.
    async fn refresh_phone(&self, id: i32) -> Result<Option<String>, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_paging() {
        assert_eq!(normalize_paging(None, None), (1, 50));
        assert_eq!(normalize_paging(Some(0), Some(5)), (1, 10));
        assert_eq!(normalize_paging(Some(-3), Some(-1)), (1, 10));
        assert_eq!(normalize_paging(Some(4), Some(1000)), (4, 200));
        assert_eq!(normalize_paging(Some(2), Some(25)), (2, 25));
        assert_eq!(normalize_paging(Some(i64::MAX), Some(200)), (MAX_PAGE, 200));
    }

    #[test]
    fn test_parse_amount() {
        assert!((parse_amount(" 1500.75 ").unwrap() - 1500.75).abs() < f64::EPSILON);
        assert!(matches!(parse_amount("0"), Err(ClientError::Validation(_))));
        assert!(matches!(parse_amount("-10"), Err(ClientError::Validation(_))));
        assert!(matches!(parse_amount("abc"), Err(ClientError::Validation(_))));
        assert!(matches!(parse_amount("NaN"), Err(ClientError::Validation(_))));
        assert!(matches!(parse_amount(""), Err(ClientError::Validation(_))));
    }
}
