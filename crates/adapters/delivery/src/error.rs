//! Delivery adapter error types.

use formflow_domain::error::ActionExecutionError;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The HTTP client could not be built or the request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// An email address in the template or subject is not valid.
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The email could not be assembled.
    #[error("failed to build email: {0}")]
    Message(#[from] lettre::error::Error),

    /// The SMTP relay refused the message or could not be reached.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

impl From<DeliveryError> for ActionExecutionError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Address(_) => Self::Missing(err.to_string()),
            other => Self::Delivery(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_bad_address_to_missing_dependency() {
        let address_err = "not-an-address"
            .parse::<lettre::Address>()
            .unwrap_err();
        let err: ActionExecutionError = DeliveryError::from(address_err).into();
        assert!(matches!(err, ActionExecutionError::Missing(_)));
    }
}
