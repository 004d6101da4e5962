use std::fmt;

use serde::{Deserialize, Serialize};

/// Name the host uses to look up this credential type.
pub const CREDENTIAL_NAME: &str = "iposApi";

/// Login pair for the IPos API.
///
/// Supplied by the host on every invocation and only ever forwarded to the
/// login call; nothing in this crate persists it. The serialized field names
/// match the credential form (`email`, `password`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "email")]
    pub identity: String,
    #[serde(rename = "password")]
    pub secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    /// Input fields of the credential form, in display order.
    pub fn fields() -> &'static [CredentialField] {
        &[
            CredentialField {
                name: "email",
                display_name: "Email",
                masked: false,
            },
            CredentialField {
                name: "password",
                display_name: "Password",
                masked: true,
            },
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// One input of the credential form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialField {
    pub name: &'static str,
    pub display_name: &'static str,
    /// Rendered as a password input
    pub masked: bool,
}
