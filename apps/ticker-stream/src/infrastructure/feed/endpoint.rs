//! Feed Endpoint
//!
//! Resolves the URL the connection manager dials. When an access token is
//! configured it is attached as a `token` query parameter, form-encoded and
//! appended with `?` or `&` as the base URL requires.

use reqwest::Url;

/// Query parameter carrying the access token.
pub const TOKEN_PARAM: &str = "token";

/// Opaque feed access token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token value.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// Treat an absent or empty value as no credential.
    #[must_use]
    pub fn from_optional(token: Option<String>) -> Option<Self> {
        token.filter(|t| !t.is_empty()).map(Self)
    }

    /// Raw token value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Endpoint validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    /// The URL could not be parsed.
    #[error("invalid feed URL {url}: {reason}")]
    InvalidUrl {
        /// URL as given.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The URL is not a WebSocket URL.
    #[error("unsupported feed URL scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),
}

/// Validated feed URL plus optional credential.
#[derive(Clone)]
pub struct FeedEndpoint {
    base: Url,
    credential: Option<Credential>,
}

impl FeedEndpoint {
    /// Validate `base_url` and pair it with `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] if the URL does not parse or is not `ws`/`wss`.
    pub fn new(base_url: &str, credential: Option<Credential>) -> Result<Self, EndpointError> {
        let base = Url::parse(base_url.trim()).map_err(|e| EndpointError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(base.scheme(), "ws" | "wss") {
            return Err(EndpointError::UnsupportedScheme(base.scheme().to_string()));
        }

        Ok(Self { base, credential })
    }

    /// URL to dial, with the token attached when present.
    #[must_use]
    pub fn connect_url(&self) -> Url {
        let mut url = self.base.clone();
        if let Some(credential) = &self.credential {
            url.query_pairs_mut()
                .append_pair(TOKEN_PARAM, credential.expose());
        }
        url
    }

    /// Base URL without the token. Safe to log.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Whether a credential is attached.
    #[must_use]
    pub const fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

impl std::fmt::Debug for FeedEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedEndpoint")
            .field("base", &self.base.as_str())
            .field("credential", &self.credential)
            .finish()
    }
}

impl std::fmt::Display for FeedEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.base.as_str())
    }
}
