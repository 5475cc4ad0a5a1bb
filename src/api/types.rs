use serde::{Deserialize, Serialize};

use crate::models::{Client, ContactStatus, Sale, User, UserRole};
use crate::services::{ClientDetails, ClientPage};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub role: UserRole,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientListResponse {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub items: Vec<Client>,
}

impl From<ClientPage> for ClientListResponse {
    fn from(page: ClientPage) -> Self {
        Self {
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            items: page.items,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetailResponse {
    #[serde(flatten)]
    pub client: Client,
    pub latest_sale: Option<Sale>,
}

impl From<ClientDetails> for ClientDetailResponse {
    fn from(details: ClientDetails) -> Self {
        Self {
            client: details.client,
            latest_sale: details.latest_sale,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ContactStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OkResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<i32>,
}

impl OkResponse {
    pub const fn ok() -> Self {
        Self {
            ok: true,
            sale_id: None,
        }
    }

    pub const fn sale(sale_id: i32) -> Self {
        Self {
            ok: true,
            sale_id: Some(sale_id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhoneResponse {
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub password: Option<String>,
}
