//! Periodic HTTP reachability probe

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tracing::{debug, info};

use crate::{NetResult, NetworkMonitor};

/// Configuration for the connectivity probe
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// URL whose 2xx answer means "online"
    pub check_url: String,
    /// How often to perform periodic checks
    pub check_interval: Duration,
    /// Timeout for a single check
    pub check_timeout: Duration,
}

/// Feeds the network monitor from periodic HTTP checks.
///
/// Anything holding the `recheck` handle (e.g. the netlink watcher) can ask
/// for an immediate check between ticks.
pub struct ConnectivityProbe {
    client: Client,
    config: ProbeConfig,
    monitor: Arc<NetworkMonitor>,
    recheck: Arc<Notify>,
}

impl ConnectivityProbe {
    pub fn new(config: ProbeConfig, monitor: Arc<NetworkMonitor>) -> NetResult<Self> {
        let client = Client::builder()
            .timeout(config.check_timeout)
            .connect_timeout(config.check_timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            monitor,
            recheck: Arc::new(Notify::new()),
        })
    }

    /// Handle used to request an out-of-band check
    pub fn recheck_handle(&self) -> Arc<Notify> {
        self.recheck.clone()
    }

    /// Check once and report the result to the monitor
    pub async fn check_once(&self) -> bool {
        let connected =
            check_url_reachable(&self.client, &self.config.check_url, self.config.check_timeout)
                .await;
        self.monitor.set_online(connected);
        connected
    }

    /// Run until shutdown: check immediately, then on every tick or recheck
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(url = %self.config.check_url, "Connectivity probe started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.check_once().await;
                }
                _ = self.recheck.notified() => {
                    debug!("Recheck requested");
                    self.check_once().await;
                    interval.reset();
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Connectivity probe stopped");
    }
}

/// Check if a URL is reachable
async fn check_url_reachable(client: &Client, url: &str, timeout: Duration) -> bool {
    debug!(url = %url, "Checking connectivity");

    match client.get(url).timeout(timeout).send().await {
        Ok(response) => {
            let status = response.status();
            let connected = status.is_success();
            debug!(url = %url, status = %status, connected = connected, "Connectivity check complete");
            connected
        }
        Err(e) => {
            debug!(url = %url, error = %e, "Connectivity check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NetworkState;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Health endpoint answering every check with `status`
    async fn health_server(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    fn config(url: String) -> ProbeConfig {
        ProbeConfig {
            check_url: url,
            check_interval: Duration::from_secs(60),
            check_timeout: Duration::from_secs(2),
        }
    }

    fn health_url(server: &MockServer) -> String {
        format!("{}/health", server.uri())
    }

    #[tokio::test]
    async fn no_content_means_online() {
        let server = health_server(204).await;
        let monitor = Arc::new(NetworkMonitor::new());
        let checker = ConnectivityProbe::new(config(health_url(&server)), monitor.clone()).unwrap();

        assert!(checker.check_once().await);
        assert_eq!(monitor.state(), NetworkState::Online);
    }

    #[tokio::test]
    async fn server_error_means_offline() {
        let server = health_server(503).await;
        let monitor = Arc::new(NetworkMonitor::new());
        let checker = ConnectivityProbe::new(config(health_url(&server)), monitor.clone()).unwrap();

        assert!(!checker.check_once().await);
        assert_eq!(monitor.state(), NetworkState::Offline);
    }

    #[tokio::test]
    async fn captive_portal_redirect_target_decides() {
        // A portal answering the check with a login page still counts by status
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let monitor = Arc::new(NetworkMonitor::with_state(NetworkState::Online));
        let checker = ConnectivityProbe::new(config(health_url(&server)), monitor.clone()).unwrap();

        assert!(!checker.check_once().await);
        assert_eq!(monitor.state(), NetworkState::Offline);
    }

    #[tokio::test]
    async fn refused_connection_means_offline() {
        // Nothing listens on a port we bound and released
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();

        let monitor = Arc::new(NetworkMonitor::with_state(NetworkState::Online));
        let checker =
            ConnectivityProbe::new(config(format!("http://{}/health", addr)), monitor.clone())
                .unwrap();

        assert!(!checker.check_once().await);
        assert_eq!(monitor.state(), NetworkState::Offline);
    }

    #[tokio::test]
    async fn run_checks_immediately_and_stops_on_shutdown() {
        let server = health_server(200).await;
        let monitor = Arc::new(NetworkMonitor::new());
        let mut rx = monitor.handle().subscribe();
        let checker = ConnectivityProbe::new(config(health_url(&server)), monitor.clone()).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(checker.run(shutdown_rx));

        rx.wait_for(|state| state.is_online()).await.unwrap();

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn recheck_checks_again() {
        let server = health_server(200).await;
        let monitor = Arc::new(NetworkMonitor::new());
        let checker = ConnectivityProbe::new(config(health_url(&server)), monitor.clone()).unwrap();
        let recheck = checker.recheck_handle();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(checker.run(shutdown_rx));

        let mut rx = monitor.handle().subscribe();
        rx.wait_for(|state| state.is_online()).await.unwrap();

        recheck.notify_one();
        tokio::time::timeout(Duration::from_secs(2), async {
            while server.received_requests().await.unwrap().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_shutdown_sender_is_dropped() {
        let server = health_server(200).await;
        let monitor = Arc::new(NetworkMonitor::new());
        let checker = ConnectivityProbe::new(config(health_url(&server)), monitor).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(checker.run(shutdown_rx));

        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("connectivity check kept running after its shutdown sender was dropped")
            .unwrap();
    }
}
