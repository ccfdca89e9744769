use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::popup::{self, PollOutcome};
use crate::{
    ApprovalSurface, ConnectConfig, ConnectError, ConnectionState, Credentials,
    IntegrationBackend, IntegrationParams, ItemTreeLoader,
};

/// Observable state of a connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub error: Option<String>,
    /// Handed to the owning context once connected.
    pub params: Option<IntegrationParams>,
}

/// Drives the popup OAuth handshake for one integration and, once connected,
/// loads its item tree.
pub struct ConnectionController<B: IntegrationBackend, S: ApprovalSurface> {
    backend: Arc<B>,
    surface: S,
    config: ConnectConfig,
    state: watch::Sender<ConnectionSnapshot>,
    generation: AtomicU64,
    tree: ItemTreeLoader<B>,
}

impl<B: IntegrationBackend, S: ApprovalSurface> ConnectionController<B, S> {
    pub fn new(backend: B, surface: S, config: ConnectConfig) -> Self {
        let backend = Arc::new(backend);
        let (state, _) = watch::channel(ConnectionSnapshot::default());
        Self {
            tree: ItemTreeLoader::new(backend.clone()),
            backend,
            surface,
            config,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.state.borrow().clone()
    }

    pub fn params(&self) -> Option<IntegrationParams> {
        self.state.borrow().params.clone()
    }

    pub fn tree(&self) -> &ItemTreeLoader<B> {
        &self.tree
    }

    /// Runs the full handshake for `user_id`/`org_id`.
    ///
    /// Does nothing when already connected. Failures are returned and also
    /// published to the snapshot's error slot; a call overtaken by a newer one
    /// publishes nothing when it finishes.
    pub async fn connect(&self, user_id: &str, org_id: &str) -> Result<(), ConnectError> {
        if self.state.borrow().state == ConnectionState::Connected {
            tracing::debug!(
                integration = self.integration_id(),
                "already connected, ignoring connect"
            );
            return Ok(());
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|snapshot| {
            snapshot.state = ConnectionState::Connecting;
            snapshot.error = None;
        });
        tracing::info!(
            integration = self.integration_id(),
            user_id,
            org_id,
            "connecting"
        );

        let credentials = match self.handshake(user_id, org_id).await {
            Ok(credentials) => credentials,
            Err(err) => {
                let message = self.error_message(&err);
                tracing::warn!(
                    integration = self.integration_id(),
                    error = %err,
                    "connection failed"
                );
                self.apply(generation, |snapshot| {
                    snapshot.state = ConnectionState::Disconnected;
                    snapshot.error = Some(message);
                });
                return Err(err);
            }
        };

        let params = IntegrationParams {
            credentials,
            integration_type: self.backend.integration().type_tag().to_string(),
        };
        let applied = self.apply(generation, |snapshot| {
            snapshot.state = ConnectionState::Connected;
            snapshot.error = None;
            snapshot.params = Some(params.clone());
        });
        if !applied {
            return Ok(());
        }
        tracing::info!(integration = self.integration_id(), "connected");

        self.tree
            .fetch_and_build_tree(&params.credentials)
            .await
            .map(|_| ())
    }

    /// Adopts credentials obtained earlier, marks the connection established
    /// and loads the item tree.
    pub async fn resume(&self, params: IntegrationParams) -> Result<(), ConnectError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let credentials = params.credentials.clone();
        self.state.send_modify(|snapshot| {
            snapshot.state = ConnectionState::Connected;
            snapshot.error = None;
            snapshot.params = Some(params);
        });
        tracing::info!(integration = self.integration_id(), "resumed connection");

        self.tree.fetch_and_build_tree(&credentials).await.map(|_| ())
    }

    async fn handshake(&self, user_id: &str, org_id: &str) -> Result<Credentials, ConnectError> {
        let url = self.backend.authorize(user_id, org_id).await?;

        let title = self.backend.integration().window_title();
        let handle = self.surface.open(&url, &title, self.config.popup_size);
        if handle.is_none() {
            tracing::warn!(
                integration = self.integration_id(),
                "authorization window did not open"
            );
        }
        let outcome = popup::wait_for_close(
            handle.as_deref(),
            self.config.poll_interval,
            self.config.poll_timeout,
        )
        .await?;
        drop(handle);

        match (self.backend.credentials(user_id, org_id).await, outcome) {
            (Ok(Some(credentials)), _) => Ok(credentials),
            (_, PollOutcome::NeverOpened) => Err(ConnectError::PopupBlocked { url }),
            (Ok(None), PollOutcome::Closed) => Err(ConnectError::CredentialsEmpty),
            (Err(err), PollOutcome::Closed) => Err(err),
        }
    }

    fn integration_id(&self) -> &'static str {
        self.backend.integration().id()
    }

    fn error_message(&self, err: &ConnectError) -> String {
        err.detail().map(str::to_string).unwrap_or_else(|| {
            self.backend
                .integration()
                .default_error_message(err.kind())
        })
    }

    fn apply<F>(&self, generation: u64, update: F) -> bool
    where
        F: FnOnce(&mut ConnectionSnapshot),
    {
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "dropping stale connect result");
            return false;
        }
        self.state.send_modify(update);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::{
        AirtableIntegration, Integration, PopupHandle, PopupSize, RemoteItem, TreeSnapshot,
    };

    type CredentialReply = Result<Option<Credentials>, ConnectError>;

    struct ScriptedBackend {
        authorize: Mutex<VecDeque<Result<String, ConnectError>>>,
        credentials: Mutex<VecDeque<CredentialReply>>,
        /// Checked before `credentials`; each call waits on the next gate.
        credential_gates: Mutex<VecDeque<oneshot::Receiver<CredentialReply>>>,
        items: Vec<RemoteItem>,
        credential_calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                authorize: Mutex::new(VecDeque::new()),
                credentials: Mutex::new(VecDeque::new()),
                credential_gates: Mutex::new(VecDeque::new()),
                items: vec![
                    RemoteItem::new("b1", "Sales", "Base"),
                    RemoteItem::new("t1", "Leads", "Table")
                        .with_parent("b1")
                        .with_parent_path_or_name("Sales"),
                ],
                credential_calls: AtomicUsize::new(0),
            }
        }

        fn authorize_with(self, result: Result<String, ConnectError>) -> Self {
            self.authorize.lock().unwrap().push_back(result);
            self
        }

        fn credentials_with(self, result: CredentialReply) -> Self {
            self.credentials.lock().unwrap().push_back(result);
            self
        }

        fn gated_credentials(self) -> (Self, oneshot::Sender<CredentialReply>) {
            let (tx, rx) = oneshot::channel();
            self.credential_gates.lock().unwrap().push_back(rx);
            (self, tx)
        }
    }

    #[async_trait]
    impl IntegrationBackend for ScriptedBackend {
        fn integration(&self) -> &dyn Integration {
            &AirtableIntegration
        }

        async fn authorize(&self, _: &str, _: &str) -> Result<String, ConnectError> {
            self.authorize.lock().unwrap().pop_front().unwrap()
        }

        async fn credentials(&self, _: &str, _: &str) -> CredentialReply {
            self.credential_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.credential_gates.lock().unwrap().pop_front();
            if let Some(gate) = gate {
                return gate.await.unwrap();
            }
            self.credentials.lock().unwrap().pop_front().unwrap()
        }

        async fn fetch_items(&self, _: &Credentials) -> Result<Vec<RemoteItem>, ConnectError> {
            Ok(self.items.clone())
        }
    }

    /// Opens a window that closes after `close_after` checks, or refuses to open.
    struct FakeSurface {
        blocked: bool,
        close_after: usize,
        opened: AtomicBool,
    }

    impl FakeSurface {
        fn closing_after(close_after: usize) -> Self {
            Self {
                blocked: false,
                close_after,
                opened: AtomicBool::new(false),
            }
        }

        fn blocked() -> Self {
            Self {
                blocked: true,
                close_after: 0,
                opened: AtomicBool::new(false),
            }
        }
    }

    struct FakeWindow {
        checks: AtomicUsize,
        close_after: usize,
    }

    impl PopupHandle for FakeWindow {
        fn is_closed(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst) + 1 >= self.close_after
        }
    }

    impl ApprovalSurface for FakeSurface {
        fn open(&self, url: &str, title: &str, size: PopupSize) -> Option<Box<dyn PopupHandle>> {
            assert!(url.starts_with("https://"));
            assert_eq!(title, "Airtable Authorization");
            assert_eq!(size, PopupSize::new(600, 600));
            if self.blocked {
                return None;
            }
            self.opened.store(true, Ordering::SeqCst);
            Some(Box::new(FakeWindow {
                checks: AtomicUsize::new(0),
                close_after: self.close_after,
            }))
        }
    }

    const AUTH_URL: &str = "https://airtable.com/oauth2/v1/authorize?state=abc";

    fn token() -> Credentials {
        Credentials::from_value(json!({"access_token": "tok"})).unwrap()
    }

    fn config() -> ConnectConfig {
        ConnectConfig::default().with_poll_interval(Duration::from_millis(200))
    }

    #[tokio::test(start_paused = true)]
    async fn connect_emits_params_and_loads_tree() {
        let backend = ScriptedBackend::new()
            .authorize_with(Ok(AUTH_URL.to_string()))
            .credentials_with(Ok(Some(token())));
        let controller =
            ConnectionController::new(backend, FakeSurface::closing_after(2), config());
        let updates = controller.subscribe();

        controller.connect("user", "org").await.unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Connected);
        assert_eq!(snapshot.error, None);
        let params = snapshot.params.unwrap();
        assert_eq!(params.integration_type, "Airtable");
        assert_eq!(params.credentials, token());
        assert!(updates.has_changed().unwrap());

        let TreeSnapshot { nodes, loaded, .. } = controller.tree().snapshot();
        assert!(loaded);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children[0].id, "t1");
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_a_no_op_once_connected() {
        let backend = ScriptedBackend::new()
            .authorize_with(Ok(AUTH_URL.to_string()))
            .credentials_with(Ok(Some(token())));
        let controller =
            ConnectionController::new(backend, FakeSurface::closing_after(1), config());

        controller.connect("user", "org").await.unwrap();
        // The scripted backend has nothing left to hand out, so a second
        // handshake would panic.
        controller.connect("user", "org").await.unwrap();
        assert_eq!(controller.snapshot().state, ConnectionState::Connected);
        assert_eq!(controller.backend.credential_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_credentials_set_an_explicit_error() {
        let backend = ScriptedBackend::new()
            .authorize_with(Ok(AUTH_URL.to_string()))
            .credentials_with(Ok(None));
        let controller =
            ConnectionController::new(backend, FakeSurface::closing_after(1), config());

        let result = controller.connect("user", "org").await;
        assert!(matches!(result, Err(ConnectError::CredentialsEmpty)));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Disconnected);
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Airtable did not return any credentials")
        );
        assert_eq!(snapshot.params, None);
    }

    #[tokio::test(start_paused = true)]
    async fn authorize_failure_uses_detail_and_allows_retry() {
        let backend = ScriptedBackend::new()
            .authorize_with(Err(ConnectError::AuthorizeRequestFailed {
                status: Some(400),
                detail: Some("Missing client id".to_string()),
            }))
            .authorize_with(Ok(AUTH_URL.to_string()))
            .credentials_with(Ok(Some(token())));
        let controller =
            ConnectionController::new(backend, FakeSurface::closing_after(1), config());

        assert!(controller.connect("user", "org").await.is_err());
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Disconnected);
        assert_eq!(snapshot.error.as_deref(), Some("Missing client id"));
        assert_eq!(controller.backend.credential_calls.load(Ordering::SeqCst), 0);

        controller.connect("user", "org").await.unwrap();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Connected);
        assert_eq!(snapshot.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn authorize_failure_without_detail_uses_default_message() {
        let backend = ScriptedBackend::new().authorize_with(Err(
            ConnectError::AuthorizeRequestFailed {
                status: None,
                detail: None,
            },
        ));
        let controller =
            ConnectionController::new(backend, FakeSurface::closing_after(1), config());

        let _ = controller.connect("user", "org").await;
        assert_eq!(
            controller.snapshot().error.as_deref(),
            Some("Failed to connect to Airtable")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_popup_still_checks_for_credentials() {
        let backend = ScriptedBackend::new()
            .authorize_with(Ok(AUTH_URL.to_string()))
            .credentials_with(Ok(Some(token())));
        let surface = FakeSurface::blocked();
        let controller = ConnectionController::new(backend, surface, config());

        controller.connect("user", "org").await.unwrap();
        assert_eq!(controller.snapshot().state, ConnectionState::Connected);
        assert!(!controller.surface.opened.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_popup_without_credentials_reports_blocked() {
        let backend = ScriptedBackend::new()
            .authorize_with(Ok(AUTH_URL.to_string()))
            .credentials_with(Err(ConnectError::CredentialExchangeFailed {
                status: Some(400),
                detail: Some("No credentials found".to_string()),
            }));
        let controller = ConnectionController::new(backend, FakeSurface::blocked(), config());

        let result = controller.connect("user", "org").await;
        assert!(matches!(result, Err(ConnectError::PopupBlocked { .. })));
        assert_eq!(
            controller.snapshot().error.as_deref(),
            Some("Could not open the Airtable authorization window")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn credential_exchange_failure_surfaces_detail() {
        let backend = ScriptedBackend::new()
            .authorize_with(Ok(AUTH_URL.to_string()))
            .credentials_with(Err(ConnectError::CredentialExchangeFailed {
                status: Some(400),
                detail: Some("No credentials found".to_string()),
            }));
        let controller =
            ConnectionController::new(backend, FakeSurface::closing_after(3), config());

        let result = controller.connect("user", "org").await;
        assert!(matches!(
            result,
            Err(ConnectError::CredentialExchangeFailed { .. })
        ));
        assert_eq!(
            controller.snapshot().error.as_deref(),
            Some("No credentials found")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn poll_timeout_marks_connection_failed() {
        let backend = ScriptedBackend::new().authorize_with(Ok(AUTH_URL.to_string()));
        let controller = ConnectionController::new(
            backend,
            FakeSurface::closing_after(usize::MAX),
            config().with_poll_timeout(Duration::from_secs(30)),
        );

        let result = controller.connect("user", "org").await;
        assert!(matches!(result, Err(ConnectError::PollTimeout { .. })));
        assert_eq!(controller.snapshot().state, ConnectionState::Disconnected);
        assert_eq!(controller.backend.credential_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_connect_failure_does_not_clobber_newer_connection() {
        let backend = ScriptedBackend::new()
            .authorize_with(Ok(AUTH_URL.to_string()))
            .authorize_with(Ok(AUTH_URL.to_string()));
        let (backend, first_gate) = backend.gated_credentials();
        let (backend, second_gate) = backend.gated_credentials();
        let controller =
            ConnectionController::new(backend, FakeSurface::closing_after(1), config());

        let second = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            controller.connect("user", "org").await
        };
        let release = async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            second_gate.send(Ok(Some(token()))).unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            first_gate
                .send(Err(ConnectError::CredentialExchangeFailed {
                    status: Some(400),
                    detail: Some("No credentials found".to_string()),
                }))
                .unwrap();
        };

        let (first, second, ()) =
            tokio::join!(controller.connect("user", "org"), second, release);
        assert!(matches!(
            first,
            Err(ConnectError::CredentialExchangeFailed { .. })
        ));
        second.unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Connected);
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.params.unwrap().credentials, token());
        assert_eq!(controller.backend.credential_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_adopts_existing_credentials() {
        let controller = ConnectionController::new(
            ScriptedBackend::new(),
            FakeSurface::closing_after(1),
            config(),
        );
        controller
            .resume(IntegrationParams {
                credentials: token(),
                integration_type: "Airtable".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(controller.snapshot().state, ConnectionState::Connected);
        assert_eq!(controller.tree().snapshot().nodes[0].id, "b1");
    }
}
