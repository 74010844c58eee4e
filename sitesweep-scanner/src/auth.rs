use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP Basic credentials forwarded to page navigation and image size checks.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials are only applied when both halves are present.
    pub fn is_usable(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn header_value(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", token)
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Returns the credentials only when they can actually be applied.
pub fn usable(auth: Option<&BasicAuth>) -> Option<&BasicAuth> {
    auth.filter(|a| a.is_usable())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_value() {
        let auth = BasicAuth::new("Aladdin", "open sesame");
        assert_eq!(auth.header_value(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn test_debug_redacts_password() {
        let auth = BasicAuth::new("admin", "hunter2");
        let rendered = format!("{:?}", auth);
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_usable_requires_both_fields() {
        let empty_password = BasicAuth::new("admin", "");
        assert!(usable(Some(&empty_password)).is_none());
        let empty_user = BasicAuth::new("", "secret");
        assert!(usable(Some(&empty_user)).is_none());
        let full = BasicAuth::new("admin", "secret");
        assert!(usable(Some(&full)).is_some());
        assert!(usable(None).is_none());
    }
}
