//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use hago::Client;
//!
//! # fn example() -> hago::Result<()> {
//! let client = Client::builder()
//!     .url("ws://homeassistant.local:8123/api/websocket")
//!     .token("long-lived-token")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use url::Url;

use crate::error::{Error, Result};

use super::Client;

// ============================================================================
// ClientConfig
// ============================================================================

/// Validated connection settings.
#[derive(Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint (`ws` or `wss`).
    pub url: Url,
    /// Long-lived access token.
    pub access_token: String,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url.as_str())
            .field("access_token", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ClientBuilder {
    /// WebSocket endpoint.
    url: Option<String>,
    /// Access token.
    access_token: Option<String>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("url", &self.url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new client builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WebSocket endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - Endpoint URL (e.g., "ws://localhost:8123/api/websocket")
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the long-lived access token sent during authentication.
    #[inline]
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Builds the client with validation.
    ///
    /// No connection is made until [`Client::connect`].
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the URL or token is missing
    /// - [`Error::Config`] if the URL is malformed or not `ws`/`wss`
    /// - [`Error::Config`] if the token is empty
    pub fn build(self) -> Result<Client> {
        let config = self.build_config()?;
        Ok(Client::new(config))
    }

    /// Validates the settings without creating a client.
    ///
    /// # Errors
    ///
    /// Same as [`ClientBuilder::build`].
    pub fn build_config(self) -> Result<ClientConfig> {
        let url = self.validate_url()?;
        let access_token = self.validate_access_token()?;

        Ok(ClientConfig { url, access_token })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the endpoint configuration.
    fn validate_url(&self) -> Result<Url> {
        let raw = self.url.as_deref().ok_or_else(|| {
            Error::config(
                "WebSocket URL is required. Use .url() to set it.\n\
                 Example: Client::builder().url(\"ws://localhost:8123/api/websocket\")",
            )
        })?;

        let url = Url::parse(raw).map_err(|e| Error::config(format!("Invalid URL {raw:?}: {e}")))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(Error::config(format!(
                "Unsupported URL scheme {scheme:?}; expected \"ws\" or \"wss\""
            ))),
        }
    }

    /// Validates the access token configuration.
    fn validate_access_token(&self) -> Result<String> {
        let token = self.access_token.clone().ok_or_else(|| {
            Error::config("Access token is required. Use .token() to set it.")
        })?;

        if token.trim().is_empty() {
            return Err(Error::config("Access token must not be empty"));
        }

        Ok(token)
    }
}

// ============================================================================
// Tests
// ============================================================================
