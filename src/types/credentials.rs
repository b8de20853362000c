// ABOUTME: Registry credentials attached to a single pull.
// ABOUTME: Immutable value with builder-style email; converts to engine auth formats.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use serde::Serialize;
use std::fmt;

/// Identity, secret, and registry address used to authenticate one pull.
///
/// Nothing is validated locally. Bad credentials are only detected by the
/// engine's response.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    username: String,
    password: String,
    server_address: String,
    email: Option<String>,
}

impl RegistryCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        server_address: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            server_address: server_address.into(),
            email: None,
        }
    }

    /// Same credentials with a contact email set.
    pub fn with_email(self, email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..self
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Credentials in the shape bollard sends as `X-Registry-Auth`.
    pub fn to_docker_credentials(&self) -> bollard::auth::DockerCredentials {
        bollard::auth::DockerCredentials {
            username: Some(self.username.clone()),
            password: Some(self.password.clone()),
            email: self.email.clone(),
            serveraddress: Some(self.server_address.clone()),
            ..Default::default()
        }
    }

    /// Base64url-encoded JSON for a hand-built `X-Registry-Auth` header.
    pub fn to_registry_auth_header(&self) -> String {
        let payload = AuthPayload {
            username: &self.username,
            password: &self.password,
            email: self.email.as_deref(),
            serveraddress: &self.server_address,
        };
        // Serializing a struct of strings cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        URL_SAFE.encode(json)
    }
}

#[derive(Serialize)]
struct AuthPayload<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    serveraddress: &'a str,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server_address", &self.server_address)
            .field("email", &self.email)
            .finish()
    }
}
