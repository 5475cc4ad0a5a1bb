use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sales-pipeline stage recorded against a client.
///
/// Stored and serialized by variant name. Older front-ends send the numeric
/// codes (1-4), which are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContactStatus {
    AwaitingResponse,
    SaleClosed,
    NotInterested,
    ContactLater,
}

impl ContactStatus {
    pub const ALL: [Self; 4] = [
        Self::AwaitingResponse,
        Self::SaleClosed,
        Self::NotInterested,
        Self::ContactLater,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingResponse => "AwaitingResponse",
            Self::SaleClosed => "SaleClosed",
            Self::NotInterested => "NotInterested",
            Self::ContactLater => "ContactLater",
        }
    }

    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::AwaitingResponse => 1,
            Self::SaleClosed => 2,
            Self::NotInterested => 3,
            Self::ContactLater => 4,
        }
    }

    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| i64::from(s.code()) == code)
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownContactStatus(pub String);

impl fmt::Display for UnknownContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown contact status '{}'", self.0)
    }
}

impl std::error::Error for UnknownContactStatus {}

impl FromStr for ContactStatus {
    type Err = UnknownContactStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| UnknownContactStatus(s.to_string()));
        }

        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownContactStatus(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for ContactStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(i64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Self::from_code(code)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown contact status {code}"))),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: i32,
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub contact_status: Option<ContactStatus>,
    pub notes: String,
    pub updated_at: String,
    pub last_contacted_by_user_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: i32,
    pub client_id: i32,
    pub amount: f64,
    pub receipt_path: String,
    pub sold_at: String,
    pub created_by_user_id: Option<i32>,
}
