use super::ApiError;
use crate::models::ContactStatus;

pub fn validate_client_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid client ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_user_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid user ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

/// Blank means no filter.
pub fn validate_status_filter(raw: Option<&str>) -> Result<Option<ContactStatus>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ApiError::validation(format!("Invalid status filter: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ids() {
        assert!(validate_client_id(1).is_ok());
        assert!(validate_client_id(0).is_err());
        assert!(validate_user_id(-4).is_err());
        assert!(validate_user_id(12).is_ok());
    }

    #[test]
    fn test_validate_status_filter() {
        assert_eq!(validate_status_filter(None).unwrap(), None);
        assert_eq!(validate_status_filter(Some("  ")).unwrap(), None);
        assert_eq!(
            validate_status_filter(Some("saleclosed")).unwrap(),
            Some(ContactStatus::SaleClosed)
        );
        assert_eq!(
            validate_status_filter(Some("4")).unwrap(),
            Some(ContactStatus::ContactLater)
        );
        assert!(validate_status_filter(Some("Maybe")).is_err());
    }
}
