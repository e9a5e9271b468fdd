//! Credential lookup for endpoint connections.
//!
//! The pool never stores credentials; it only hands the endpoint id to a
//! resolver when a caller asks for connection details.

use std::fmt;
use std::fmt::Debug;

/// Opaque authorization lookup by endpoint id.
pub trait CredentialResolver: Send + Sync + Debug {
    fn resolve(&self, endpoint_id: &str) -> Option<String>;
}

/// Resolver for endpoints that need no authorization.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialResolver for NoCredentials {
    fn resolve(&self, _endpoint_id: &str) -> Option<String> {
        None
    }
}

/// Reads `<PREFIX><ENDPOINT_ID>` from the environment.
///
/// The id is upper-cased and every non-alphanumeric character becomes `_`,
/// so `eu-west.1` with prefix `POOL_CRED_` reads `POOL_CRED_EU_WEST_1`.
#[derive(Debug, Clone)]
pub struct EnvCredentialResolver {
    prefix: String,
}

impl EnvCredentialResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn var_name(&self, endpoint_id: &str) -> String {
        let suffix: String = endpoint_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{}", self.prefix, suffix)
    }
}

impl CredentialResolver for EnvCredentialResolver {
    fn resolve(&self, endpoint_id: &str) -> Option<String> {
        std::env::var(self.var_name(endpoint_id)).ok()
    }
}

/// Everything a transport needs to reach a leased endpoint.
#[derive(Clone)]
pub struct ConnectionDetails {
    pub endpoint_id: String,
    pub address: String,
    pub authorization: Option<String>,
}

impl Debug for ConnectionDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDetails")
            .field("endpoint_id", &self.endpoint_id)
            .field("address", &self.address)
            .field("authorization", &self.authorization.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_name() {
        let resolver = EnvCredentialResolver::new("POOL_CRED_");
        assert_eq!(resolver.var_name("eu-west.1"), "POOL_CRED_EU_WEST_1");
    }

    #[test]
    fn test_env_resolver_reads_variable() {
        let resolver = EnvCredentialResolver::new("ENDPOINT_POOL_TEST_CRED_");
        std::env::set_var("ENDPOINT_POOL_TEST_CRED_EDGE_7", "Bearer abc");
        assert_eq!(resolver.resolve("edge-7").as_deref(), Some("Bearer abc"));
        assert_eq!(resolver.resolve("edge-8"), None);
    }

    #[test]
    fn test_debug_redacts_authorization() {
        let details = ConnectionDetails {
            endpoint_id: "e1".into(),
            address: "a:1".into(),
            authorization: Some("Bearer secret".into()),
        };
        let printed = format!("{details:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("<redacted>"));
    }
}
