use crate::domain::errors::FetchError;
use reqwest::StatusCode;

/// Rate limits and server errors are worth retrying; other client errors are not.
pub fn classify_status(status: StatusCode, reason: String) -> FetchError {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        FetchError::transient(reason)
    } else {
        FetchError::terminal(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, String::new()).is_transient());
        assert!(!classify_status(StatusCode::NOT_FOUND, String::new()).is_transient());
    }
}
