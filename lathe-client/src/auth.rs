//! Credentials sent to the platform and its published endpoints

use reqwest::RequestBuilder;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::{ClientError, Result};

/// Bearer token credential
///
/// The token never appears in `Debug` output.
#[derive(Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read the token from an environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(Self::bearer(token)),
            _ => Err(ClientError::Authentication(format!(
                "no credential found in ${var}"
            ))),
        }
    }

    /// `Authorization` header carrying this credential
    pub fn header(&self) -> Result<HeaderMap> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ClientError::Authentication("token is not a valid header value".to_string()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    pub(crate) fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").field("token", &"***").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::bearer("secret-token");
        assert!(!format!("{:?}", credential).contains("secret-token"));
    }

    #[test]
    fn test_header_value() {
        let headers = Credential::bearer("abc").header().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn test_invalid_header_value_rejected() {
        let result = Credential::bearer("line\nbreak").header();
        assert!(matches!(result, Err(ClientError::Authentication(_))));
    }
}
