// # Consensus IP Source
//
// This crate answers "what is my public IP" by asking several independent
// HTTP authorities at once and trusting an address only when a quorum of
// them report it.
//
// ## Resolution
//
// - One worker task per configured authority, each with its own request
//   timeout and a child cancellation token
// - Answers flow through a channel sized to the authority count, so no
//   worker ever blocks on send
// - A single collector tallies identical addresses; the first address to
//   reach the quorum wins and every outstanding worker is cancelled
// - If every authority has answered without a winner, or the overall
//   deadline passes, resolution fails with `NoConsensus`
//
// Authority bodies are untrusted text: they are trimmed, must parse as an IP
// of the requested family, and only count when the HTTP status is 2xx.

use ddns_core::config::ResolverConfig;
use ddns_core::traits::{IpFamily, IpSource};
use ddns_core::{Error, Result};

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// User-Agent sent to every authority
pub const USER_AGENT: &str = concat!("ddns-ip-consensus/", env!("CARGO_PKG_VERSION"));

const SOURCE_NAME: &str = "consensus";

/// One "what is my IP" endpoint
#[derive(Debug, Clone)]
struct Authority {
    url: String,
    client: reqwest::Client,
}

impl Authority {
    fn new(url: String, client: reqwest::Client) -> Self {
        Self { url, client }
    }

    /// Ask this authority for our address
    async fn request_external_ip(&self, family: IpFamily) -> Result<IpAddr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::provider(SOURCE_NAME, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::provider(
                SOURCE_NAME,
                format!("Unexpected status {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::provider(SOURCE_NAME, format!("Failed to read response: {}", e)))?;
        let body = body.trim();

        let ip: IpAddr = body
            .parse()
            .map_err(|_| Error::provider(SOURCE_NAME, format!("Invalid IP address: {:?}", body)))?;

        if !family.matches(&ip) {
            return Err(Error::provider(
                SOURCE_NAME,
                format!("Expected IP{} address, got: {}", family, ip),
            ));
        }

        Ok(ip)
    }
}

/// One authority's answer
struct Observation {
    authority: String,
    result: Result<IpAddr>,
}

/// Public IP resolver requiring agreement between authorities
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::config::ResolverConfig;
/// use ddns_core::IpFamily;
/// use ddns_ip_consensus::ConsensusResolver;
///
/// #[tokio::main]
/// async fn main() -> ddns_core::Result<()> {
///     let resolver = ConsensusResolver::new(ResolverConfig::default())?;
///     let ip = resolver.resolve(IpFamily::V4).await?;
///     println!("{}", ip);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConsensusResolver {
    config: ResolverConfig,
    client: reqwest::Client,
}

impl ConsensusResolver {
    /// Create a resolver from configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Resolve within the configured overall deadline
    pub async fn resolve(&self, family: IpFamily) -> Result<IpAddr> {
        self.resolve_within(family, Duration::from_millis(self.config.deadline_ms))
            .await
    }

    /// Resolve within `deadline`
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The first address reported by `quorum` authorities
    /// - `Err(Error::NoConsensus)`: No address reached the quorum in time
    pub async fn resolve_within(&self, family: IpFamily, deadline: Duration) -> Result<IpAddr> {
        let urls = self.config.authorities(family);
        let quorum = self.config.quorum;

        if urls.len() < quorum {
            return Err(Error::no_consensus(format!(
                "{} IP{} authorities configured, quorum is {}",
                urls.len(),
                family,
                quorum
            )));
        }

        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(urls.len());
        let mut workers = JoinSet::new();

        for url in urls {
            let authority = Authority::new(url.clone(), self.client.clone());
            let token = cancel.child_token();
            let tx = tx.clone();

            workers.spawn(async move {
                let result = tokio::select! {
                    _ = token.cancelled() => return,
                    result = authority.request_external_ip(family) => result,
                };
                let _ = tx
                    .send(Observation {
                        authority: authority.url,
                        result,
                    })
                    .await;
            });
        }
        drop(tx);

        let outcome = tokio::select! {
            outcome = tally(&mut rx, quorum) => outcome,
            _ = tokio::time::sleep(deadline) => Err(Error::no_consensus(format!(
                "deadline of {:?} expired before {} authorities agreed",
                deadline, quorum
            ))),
        };

        cancel.cancel();
        workers.abort_all();

        match &outcome {
            Ok(ip) => info!(family = %family, ip = %ip, "Public IP agreed"),
            Err(e) => warn!(family = %family, "Public IP resolution failed: {}", e),
        }
        outcome
    }
}

/// Count answers until one address reaches `quorum` or the channel closes
async fn tally(rx: &mut mpsc::Receiver<Observation>, quorum: usize) -> Result<IpAddr> {
    let mut votes: HashMap<IpAddr, usize> = HashMap::new();
    let mut failures = 0usize;

    while let Some(observation) = rx.recv().await {
        match observation.result {
            Ok(ip) => {
                let count = votes.entry(ip).or_insert(0);
                *count += 1;
                debug!(authority = %observation.authority, ip = %ip, votes = *count, "Authority answered");
                if *count >= quorum {
                    return Ok(ip);
                }
            }
            Err(e) => {
                failures += 1;
                warn!(authority = %observation.authority, "Authority query failed: {}", e);
            }
        }
    }

    Err(Error::no_consensus(format!(
        "{} distinct answers and {} failures, none reached quorum {}",
        votes.len(),
        failures,
        quorum
    )))
}

#[async_trait::async_trait]
impl IpSource for ConsensusResolver {
    async fn current(&self, family: IpFamily) -> Result<IpAddr> {
        self.resolve(family).await
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn authority(server: &MockServer, route: &str, response: ResponseTemplate) -> String {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
        format!("{}{}", server.uri(), route)
    }

    fn answer(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(body)
    }

    fn resolver(v4: Vec<String>, v6: Vec<String>) -> ConsensusResolver {
        ConsensusResolver::new(ResolverConfig {
            v4_authorities: v4,
            v6_authorities: v6,
            quorum: 2,
            request_timeout_ms: 1_000,
            deadline_ms: 3_000,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_quorum_despite_failing_authority() {
        let server = MockServer::start().await;
        let urls = vec![
            authority(&server, "/a", answer("203.0.113.42\n")).await,
            authority(&server, "/b", ResponseTemplate::new(500)).await,
            authority(&server, "/c", answer(" \t203.0.113.42 ")).await,
        ];

        let ip = resolver(urls, vec![]).resolve(IpFamily::V4).await.unwrap();
        assert_eq!(ip, "203.0.113.42".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_split_vote_returns_one_of_the_agreed_values() {
        let server = MockServer::start().await;
        let urls = vec![
            authority(&server, "/a1", answer("203.0.113.1")).await,
            authority(&server, "/b1", answer("203.0.113.2")).await,
            authority(&server, "/a2", answer("203.0.113.1")).await,
            authority(&server, "/b2", answer("203.0.113.2")).await,
        ];

        let ip = resolver(urls, vec![]).resolve(IpFamily::V4).await.unwrap();
        let a: IpAddr = "203.0.113.1".parse().unwrap();
        let b: IpAddr = "203.0.113.2".parse().unwrap();
        assert!(ip == a || ip == b, "unexpected value {}", ip);
    }

    #[tokio::test]
    async fn test_disagreement_is_no_consensus() {
        let server = MockServer::start().await;
        let urls = vec![
            authority(&server, "/a", answer("203.0.113.1")).await,
            authority(&server, "/b", answer("203.0.113.2")).await,
            authority(&server, "/c", answer("not an ip")).await,
        ];

        let err = resolver(urls, vec![]).resolve(IpFamily::V4).await.unwrap_err();
        assert!(matches!(err, Error::NoConsensus(_)), "got {:?}", err);
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn test_non_success_body_is_not_a_vote() {
        let server = MockServer::start().await;
        let urls = vec![
            authority(&server, "/a", answer("203.0.113.42")).await,
            authority(
                &server,
                "/b",
                ResponseTemplate::new(503).set_body_string("203.0.113.42"),
            )
            .await,
        ];

        let err = resolver(urls, vec![]).resolve(IpFamily::V4).await.unwrap_err();
        assert!(matches!(err, Error::NoConsensus(_)));
    }

    #[tokio::test]
    async fn test_wrong_family_is_rejected() {
        let server = MockServer::start().await;
        let urls = vec![
            authority(&server, "/a", answer("203.0.113.42")).await,
            authority(&server, "/b", answer("203.0.113.42")).await,
        ];

        let err = resolver(vec![], urls).resolve(IpFamily::V6).await.unwrap_err();
        assert!(matches!(err, Error::NoConsensus(_)));
    }

    #[tokio::test]
    async fn test_returns_without_waiting_for_slow_authority() {
        let server = MockServer::start().await;
        let urls = vec![
            authority(&server, "/a", answer("2001:db8::1")).await,
            authority(
                &server,
                "/slow",
                answer("2001:db8::1").set_delay(Duration::from_secs(10)),
            )
            .await,
            authority(&server, "/b", answer("2001:db8::1")).await,
        ];

        let started = Instant::now();
        let ip = resolver(vec![], urls).resolve(IpFamily::V6).await.unwrap();
        assert_eq!(ip, "2001:db8::1".parse::<IpAddr>().unwrap());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let server = MockServer::start().await;
        let slow = answer("203.0.113.42").set_delay(Duration::from_secs(10));
        let urls = vec![
            authority(&server, "/a", slow.clone()).await,
            authority(&server, "/b", slow).await,
        ];

        let started = Instant::now();
        let err = resolver(urls, vec![])
            .resolve_within(IpFamily::V4, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoConsensus(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_too_few_authorities() {
        let err = resolver(vec!["http://127.0.0.1:9/".to_string()], vec![])
            .resolve(IpFamily::V4)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoConsensus(_)));
    }

    #[tokio::test]
    async fn test_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(answer("203.0.113.42"))
            .expect(2)
            .mount(&server)
            .await;

        let urls = vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())];
        let ip = resolver(urls, vec![]).resolve(IpFamily::V4).await.unwrap();
        assert_eq!(ip.to_string(), "203.0.113.42");
    }
}
