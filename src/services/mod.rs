pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult, require_role};
pub use auth_service_impl::SeaOrmAuthService;

pub mod client_service;
pub mod client_service_impl;
pub use client_service::{
    ClientDetails, ClientError, ClientListQuery, ClientPage, ClientService, ReceiptFile,
    ReceiptUpload,
};
pub use client_service_impl::SeaOrmClientService;

pub mod receipts;
pub use receipts::ReceiptStorage;

pub mod sync_service;
pub use sync_service::{SyncError, SyncReport, SyncService};
