use std::fmt;

use container_image_name::DEFAULT_DOMAIN;

use crate::error::ValidationError;

/// The unauthenticated view of the target registry, used to resolve references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    pub server_address: String,
    pub namespace: String,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_DOMAIN.to_owned(),
            namespace: String::new(),
        }
    }
}

impl From<&RegistryCredentials> for Registry {
    fn from(value: &RegistryCredentials) -> Self {
        Self {
            server_address: value.server_address.clone(),
            namespace: value.namespace.clone(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    server_address: String,
    namespace: String,
    username: String,
    password: String,
}

impl RegistryCredentials {
    pub fn new(
        server_address: impl Into<String>,
        namespace: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let credentials = Self {
            server_address: server_address.into(),
            namespace: namespace.into(),
            username: username.into(),
            password: password.into(),
        };
        for (field, value) in [
            ("server address", &credentials.server_address),
            ("namespace", &credentials.namespace),
            ("username", &credentials.username),
            ("password", &credentials.password),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyCredentialField(field));
            }
        }
        Ok(credentials)
    }

    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("server_address", &self.server_address)
            .field("namespace", &self.namespace)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
