use http::header::AUTHORIZATION;

use crate::error::GatewayError;

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the session token from `Authorization: Bearer <token>`.
///
/// The token is opaque: it is forwarded to the upstream as the session cookie
/// and never checked locally. An empty token after the prefix is accepted.
///
/// # Errors
///
/// Returns [`GatewayError::Auth`] when the header is missing, not valid
/// visible ASCII, or does not use the `Bearer ` scheme.
pub fn extract_bearer_token(headers: &http::HeaderMap) -> Result<&str, GatewayError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .ok_or(GatewayError::Auth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        let headers = headers_with("Bearer ds-token-123");
        assert_eq!(extract_bearer_token(&headers).unwrap(), "ds-token-123");
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            extract_bearer_token(&HeaderMap::new()),
            Err(GatewayError::Auth)
        ));
    }

    #[test]
    fn test_wrong_scheme() {
        for value in ["Basic abc", "bearer abc", "Bearerabc", "Token x"] {
            assert!(
                extract_bearer_token(&headers_with(value)).is_err(),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_token_passes_through() {
        assert_eq!(extract_bearer_token(&headers_with("Bearer ")).unwrap(), "");
    }
}
