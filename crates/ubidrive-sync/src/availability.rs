//! Remote availability monitoring
//!
//! The [`AvailabilityMonitor`] tracks whether the backing account is
//! reachable and which identity token it carries. Every remote operation
//! re-checks availability through it before touching the store; a token
//! change means the backing account was switched and all session state
//! derived from the old account is stale.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use ubidrive_core::{
    domain::IdentityToken,
    events::{EventBus, SyncEvent},
    ports::IMetadataSource,
};

/// Outcome of one availability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityCheck {
    /// Whether the remote store can be used right now
    pub available: bool,
    /// Whether the identity token differs from the last observed one
    ///
    /// Signing out and signing in again both count as a change; session
    /// state must be rebuilt either way.
    pub token_changed: bool,
}

#[derive(Debug, Default)]
struct MonitorState {
    available: bool,
    token: Option<IdentityToken>,
    observed_once: bool,
}

/// Tracks account availability and identity across checks
pub struct AvailabilityMonitor {
    source: Arc<dyn IMetadataSource>,
    events: EventBus,
    state: Mutex<MonitorState>,
}

impl AvailabilityMonitor {
    pub fn new(source: Arc<dyn IMetadataSource>, events: EventBus) -> Self {
        Self {
            source,
            events,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Queries the source and updates the observed availability
    ///
    /// A query failure counts as unavailable rather than an error; the
    /// caller only needs to know whether to proceed. Availability flips
    /// are published as [`SyncEvent::AvailabilityChanged`].
    pub async fn check(&self) -> AvailabilityCheck {
        let token = match self.source.identity_token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "Identity query failed, treating store as unavailable");
                None
            }
        };
        let available = token.is_some();

        let mut state = self.state.lock().await;
        let token_changed = state.observed_once && state.token != token;
        let flipped = state.observed_once && state.available != available;

        if token_changed {
            info!(
                was_available = state.available,
                now_available = available,
                "Identity token changed, session state is stale"
            );
        }

        state.available = available;
        state.token = token.clone();
        state.observed_once = true;
        drop(state);

        if flipped {
            let container = if available {
                self.source.container_url().await.unwrap_or_default()
            } else {
                None
            };
            debug!(available, container = ?container, "Availability changed");
            self.events.publish(SyncEvent::AvailabilityChanged {
                available,
                token,
                container,
            });
        }

        AvailabilityCheck {
            available,
            token_changed,
        }
    }

    /// Returns the availability observed by the most recent check
    pub async fn is_available(&self) -> bool {
        self.state.lock().await.available
    }

    /// Returns the identity token observed by the most recent check
    pub async fn current_identity_token(&self) -> Option<IdentityToken> {
        self.state.lock().await.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;
    use ubidrive_core::domain::{FileName, RemoteUrl};
    use ubidrive_core::ports::{MetadataFilter, RemoteItem};

    /// Metadata source stub with a switchable identity token
    struct FakeSource {
        token: StdMutex<Option<IdentityToken>>,
    }

    impl FakeSource {
        fn new(token: Option<&str>) -> Self {
            Self {
                token: StdMutex::new(token.map(|t| IdentityToken::new(t).unwrap())),
            }
        }

        fn set_token(&self, token: Option<&str>) {
            *self.token.lock().unwrap() = token.map(|t| IdentityToken::new(t).unwrap());
        }
    }

    #[async_trait::async_trait]
    impl IMetadataSource for FakeSource {
        async fn query(&self, _: &MetadataFilter) -> anyhow::Result<Vec<RemoteItem>> {
            Ok(Vec::new())
        }
        fn change_ticks(&self) -> Option<mpsc::Receiver<()>> {
            None
        }
        async fn identity_token(&self) -> anyhow::Result<Option<IdentityToken>> {
            Ok(self.token.lock().unwrap().clone())
        }
        async fn container_url(&self) -> anyhow::Result<Option<RemoteUrl>> {
            Ok(None)
        }
        async fn start_download(&self, _: &FileName) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_signed_in_account_is_available() {
        let source = Arc::new(FakeSource::new(Some("token-a")));
        let monitor = AvailabilityMonitor::new(source, EventBus::new());

        let check = monitor.check().await;
        assert!(check.available);
        assert!(!check.token_changed);
        assert!(monitor.is_available().await);
    }

    #[tokio::test]
    async fn test_signed_out_account_is_unavailable() {
        let source = Arc::new(FakeSource::new(None));
        let monitor = AvailabilityMonitor::new(source, EventBus::new());

        let check = monitor.check().await;
        assert!(!check.available);
        assert!(monitor.current_identity_token().await.is_none());
    }

    #[tokio::test]
    async fn test_token_switch_is_reported_once() {
        let source = Arc::new(FakeSource::new(Some("token-a")));
        let monitor = AvailabilityMonitor::new(source.clone(), EventBus::new());

        monitor.check().await;
        source.set_token(Some("token-b"));

        let check = monitor.check().await;
        assert!(check.available);
        assert!(check.token_changed);

        // Stable token afterwards, no further change.
        let check = monitor.check().await;
        assert!(!check.token_changed);
    }

    #[tokio::test]
    async fn test_availability_flip_publishes_event() {
        let source = Arc::new(FakeSource::new(Some("token-a")));
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let monitor = AvailabilityMonitor::new(source.clone(), events);

        monitor.check().await;
        source.set_token(None);
        monitor.check().await;

        match rx.recv().await.unwrap() {
            SyncEvent::AvailabilityChanged { available, .. } => assert!(!available),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sign_out_counts_as_token_change() {
        let source = Arc::new(FakeSource::new(Some("token-a")));
        let monitor = AvailabilityMonitor::new(source.clone(), EventBus::new());

        monitor.check().await;
        source.set_token(None);

        let check = monitor.check().await;
        assert!(!check.available);
        assert!(check.token_changed);
    }
}
