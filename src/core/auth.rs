//! Credential collection and verification with a fixed retry budget.

use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use super::error::HarvestError;
use super::remote::RemoteMetadataClient;

/// Host and login for the remote API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Remote host name.
    pub host: String,
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where credentials come from: a terminal prompt, the environment, a test.
pub trait CredentialSource {
    /// Ask for the host once per authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    fn host(&mut self, default: &str) -> Result<String, HarvestError>;

    /// Ask for a username and password. `attempt` starts at 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    fn login(&mut self, attempt: u32) -> Result<(String, String), HarvestError>;
}

impl<S: CredentialSource + ?Sized> CredentialSource for Box<S> {
    fn host(&mut self, default: &str) -> Result<String, HarvestError> {
        (**self).host(default)
    }

    fn login(&mut self, attempt: u32) -> Result<(String, String), HarvestError> {
        (**self).login(attempt)
    }
}

/// Builds a client from credentials.
pub trait Connector {
    /// The client type produced.
    type Client: RemoteMetadataClient;

    /// Build a client. Does not contact the remote API.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    fn connect(&self, credentials: &Credentials) -> Result<Self::Client, HarvestError>;
}

/// Fixed credentials, e.g. from environment variables.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    host: Option<String>,
    username: String,
    password: String,
}

impl StaticCredentials {
    /// Use `username`/`password` and the default host.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { host: None, username: username.into(), password: password.into() }
    }

    /// Override the host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn host(&mut self, default: &str) -> Result<String, HarvestError> {
        Ok(self.host.clone().unwrap_or_else(|| default.to_string()))
    }

    fn login(&mut self, _attempt: u32) -> Result<(String, String), HarvestError> {
        Ok((self.username.clone(), self.password.clone()))
    }
}

/// Collect credentials and verify them against the remote API, up to
/// `attempts` times.
///
/// Each verification call is bounded by `deadline`.
///
/// # Errors
///
/// - `HarvestError::AuthenticationFailed` once the budget is exhausted
/// - errors from the credential source or connector, unchanged
pub async fn authenticate<S, K>(
    source: &mut S,
    connector: &K,
    default_host: &str,
    attempts: u32,
    deadline: Duration,
) -> Result<K::Client, HarvestError>
where
    S: CredentialSource + ?Sized,
    K: Connector,
{
    let host = source.host(default_host)?;

    for attempt in 1..=attempts {
        let (username, password) = source.login(attempt)?;
        let credentials = Credentials { host: host.clone(), username, password };
        let client = connector.connect(&credentials)?;

        let verified = match tokio::time::timeout(deadline, client.verify_credentials()).await {
            Ok(result) => result,
            Err(_) => Err(HarvestError::DeadlineExceeded { budget: deadline }),
        };

        match verified {
            Ok(()) => {
                info!(host = %host, username = %credentials.username, "Authenticated");
                return Ok(client);
            }
            Err(e) => warn!(attempt = attempt, error = %e, "Authentication failed"),
        }
    }

    Err(HarvestError::AuthenticationFailed { attempts })
}
