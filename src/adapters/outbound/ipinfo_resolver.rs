//! ipinfo Geolocation Resolver
//!
//! Implements Resolver for IP addresses using the ipinfo.io JSON API.
//! One outbound request per call, bounded by the configured timeout.

use crate::config::Config;
use crate::domain::entities::{IpDetails, LookupData, LookupResult};
use crate::domain::ports::Resolver;
use crate::domain::value_objects::{Identifier, Namespace};
use async_trait::async_trait;
use std::time::Duration;

/// Remote IP geolocation resolver.
///
/// Every error path (connect failure, timeout, non-2xx status, undecodable
/// body) becomes `LookupResult::Failure` with the underlying error text.
pub struct IpinfoResolver {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl IpinfoResolver {
    /// Build a resolver from the process configuration.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("netlookup/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    fn lookup_url(&self, ip: &str) -> String {
        format!("{}/{}/json", self.base_url, ip)
    }

    async fn fetch(&self, ip: &str) -> Result<IpDetails, reqwest::Error> {
        let mut request = self.client.get(self.lookup_url(ip));
        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }

        request
            .send()
            .await?
            .error_for_status()?
            .json::<IpDetails>()
            .await
    }
}

#[async_trait]
impl Resolver for IpinfoResolver {
    fn namespace(&self) -> Namespace {
        Namespace::Ip
    }

    async fn resolve(&self, identifier: &Identifier) -> LookupResult {
        match self.fetch(identifier.as_str()).await {
            Ok(details) => LookupResult::success(LookupData::Ip(details)),
            Err(e) => {
                // The token is a query parameter; keep it out of logs and results.
                let e = e.without_url();
                tracing::debug!("ipinfo lookup for {} failed: {}", identifier, e);
                LookupResult::failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_url_strips_trailing_slash() {
        let config = Config {
            api_base_url: "http://localhost:9999/".to_string(),
            ..Config::default()
        };
        let resolver = IpinfoResolver::new(&config).unwrap();
        assert_eq!(
            resolver.lookup_url("8.8.8.8"),
            "http://localhost:9999/8.8.8.8/json"
        );
    }

    #[test]
    fn test_namespace_is_ip() {
        let resolver = IpinfoResolver::new(&Config::default()).unwrap();
        assert_eq!(resolver.namespace(), Namespace::Ip);
    }

    #[test]
    fn test_resolver_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IpinfoResolver>();
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_failure() {
        // Port 9 (discard) on loopback is closed in test environments.
        let config = Config {
            api_base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 2,
            ..Config::default()
        };
        let resolver = IpinfoResolver::new(&config).unwrap();
        let id = Identifier::parse(Namespace::Ip, "8.8.8.8").unwrap();

        let result = resolver.resolve(&id).await;
        assert!(!result.is_success());
        assert!(result.failure_reason().is_some());
    }
}
