//! Session state machine
//!
//! One task per session. It provisions a PTY, retries with a credential when
//! the host rejects authentication, streams bytes once a handle is known, and
//! ends in `Closed` or `Errored`. Every external event (controller command,
//! surface notification, provisioning reply, channel event, timer) is handled
//! on that one task, so transitions never overlap.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::stream::StreamEvent;
use super::teardown::{self, Teardown};
use super::{
    initial_command, Geometry, ProvisionOutcome, ProvisioningClient, SessionHandle,
    SessionRequest, SessionStatus, StatusUpdate, StreamAdapter,
};
use crate::hooks::{
    CredentialPrompt, CredentialStore, CredentialUpdate, SessionHooks, SessionPatch,
};
use crate::surface::{LocalSurface, SurfaceEvent};
use crate::transport::{ChannelEvent, Transport};

/// Why a session ended in error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("Channel {handle} failed: {reason}")]
    Transport {
        handle: SessionHandle,
        reason: String,
    },

    #[error("Host closed channel {0}")]
    RemoteClosed(SessionHandle),
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Closed locally
    Closed,
    /// Failed; a new session is needed to reconnect
    Errored(SessionError),
}

/// State kept while waiting for a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    pub last_error: String,
    pub supplied_credential: Option<String>,
    pub remember_credential: bool,
}

impl RetryContext {
    fn new(last_error: String) -> Self {
        Self {
            last_error,
            supplied_credential: None,
            remember_credential: false,
        }
    }

    /// Record what the user typed at the prompt
    fn supply(&mut self, password: String, remember: bool) {
        self.supplied_credential = Some(password);
        self.remember_credential = remember;
    }

    /// The request to reissue, with the supplied credential merged in
    fn retry_request(&self, request: &SessionRequest) -> SessionRequest {
        match &self.supplied_credential {
            Some(password) => request.with_credential(password.as_str()),
            None => request.clone(),
        }
    }
}

/// Lifecycle phase. `Closed` and `Errored` are terminal: nothing leaves them.
pub(crate) enum Phase {
    Idle {
        request: SessionRequest,
    },
    Provisioning {
        request: SessionRequest,
        pending: BoxFuture<'static, ProvisionOutcome>,
    },
    Authenticating {
        request: SessionRequest,
        retry: RetryContext,
    },
    Streaming(StreamAdapter),
    Closed,
    Errored(SessionError),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle { .. } => "idle",
            Phase::Provisioning { .. } => "provisioning",
            Phase::Authenticating { .. } => "authenticating",
            Phase::Streaming(_) => "streaming",
            Phase::Closed => "closed",
            Phase::Errored(_) => "errored",
        }
    }
}

/// Commands accepted from the owner of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    SubmitCredential { password: String, remember: bool },
    CancelCredential,
    /// Re-fit the surface after a layout change
    Fit,
    Close,
}

/// Cloneable handle for driving a running session.
///
/// Dropping every controller tears the session down.
#[derive(Debug, Clone)]
pub struct SessionController {
    session_id: Arc<str>,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionController {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Retry provisioning with a password. Ignored unless a prompt is open.
    pub fn submit_credential(&self, password: impl Into<String>, remember: bool) -> bool {
        self.send(SessionCommand::SubmitCredential {
            password: password.into(),
            remember,
        })
    }

    /// Dismiss the credential prompt; this closes the session
    pub fn cancel_credential(&self) -> bool {
        self.send(SessionCommand::CancelCredential)
    }

    pub fn fit(&self) -> bool {
        self.send(SessionCommand::Fit)
    }

    pub fn close(&self) -> bool {
        self.send(SessionCommand::Close)
    }

    /// Returns `false` once the session has ended
    fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}

enum Event {
    Command(Option<SessionCommand>),
    Surface(Option<SurfaceEvent>),
    Provisioned(ProvisionOutcome),
    Channel(ChannelEvent),
    InitDue,
}

/// A single remote shell session
pub struct Session {
    session_id: String,
    phase: Phase,
    status: Option<SessionStatus>,
    geometry: Geometry,
    provisioning: ProvisioningClient,
    transport: Arc<dyn Transport>,
    hooks: SessionHooks,
    surface: Box<dyn LocalSurface>,
    surface_events: Option<mpsc::UnboundedReceiver<SurfaceEvent>>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    teardown: Teardown,
}

impl Session {
    /// Create a session in the idle phase
    pub fn new(
        request: SessionRequest,
        transport: Arc<dyn Transport>,
        hooks: SessionHooks,
        surface: Box<dyn LocalSurface>,
        surface_events: mpsc::UnboundedReceiver<SurfaceEvent>,
    ) -> (Self, SessionController) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let session_id = request.session_id().to_string();
        let controller = SessionController {
            session_id: Arc::from(session_id.as_str()),
            commands: commands_tx,
        };

        let session = Self {
            session_id,
            geometry: request.geometry,
            phase: Phase::Idle { request },
            status: None,
            provisioning: ProvisioningClient::new(Arc::clone(&transport)),
            transport,
            hooks,
            surface,
            surface_events: Some(surface_events),
            commands: commands_rx,
            teardown: Teardown::new(),
        };
        (session, controller)
    }

    /// Create a session and run it on its own task
    pub fn spawn(
        request: SessionRequest,
        transport: Arc<dyn Transport>,
        hooks: SessionHooks,
        surface: Box<dyn LocalSurface>,
        surface_events: mpsc::UnboundedReceiver<SurfaceEvent>,
    ) -> (SessionController, JoinHandle<SessionOutcome>) {
        let (session, controller) = Self::new(request, transport, hooks, surface, surface_events);
        (controller, tokio::spawn(session.run()))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn status(&self) -> Option<SessionStatus> {
        self.status
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Provision and process events until the session ends
    pub async fn run(mut self) -> SessionOutcome {
        self.start();
        loop {
            if let Some(outcome) = self.step().await {
                return outcome;
            }
        }
    }

    /// Leave `idle` and start the first provisioning attempt
    pub(crate) fn start(&mut self) {
        let request = match &self.phase {
            Phase::Idle { request } => request.clone(),
            other => {
                warn!("Session {}: start ignored in {}", self.session_id, other.name());
                return;
            }
        };
        self.begin_provisioning(request);
    }

    /// Handle one event. Returns the outcome once the session has ended.
    pub(crate) async fn step(&mut self) -> Option<SessionOutcome> {
        if let Some(outcome) = self.outcome() {
            return Some(outcome);
        }
        let event = self.next_event().await;
        self.handle(event);
        self.outcome()
    }

    fn outcome(&self) -> Option<SessionOutcome> {
        match &self.phase {
            Phase::Closed => Some(SessionOutcome::Closed),
            Phase::Errored(e) => Some(SessionOutcome::Errored(e.clone())),
            _ => None,
        }
    }

    async fn next_event(&mut self) -> Event {
        let Session {
            commands,
            surface_events,
            phase,
            ..
        } = self;

        let phase_event = async move {
            match phase {
                Phase::Provisioning { pending, .. } => Event::Provisioned(pending.await),
                Phase::Streaming(adapter) => match adapter.next().await {
                    StreamEvent::Channel(event) => Event::Channel(event),
                    StreamEvent::InitDue => Event::InitDue,
                },
                _ => std::future::pending().await,
            }
        };
        let surface_event = async move {
            match surface_events {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            // Local commands first so a close is never starved by output
            biased;
            command = commands.recv() => Event::Command(command),
            event = phase_event => event,
            event = surface_event => Event::Surface(event),
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Command(Some(command)) => self.on_command(command),
            Event::Command(None) => {
                debug!("Session {}: all controllers dropped", self.session_id);
                self.close();
            }
            Event::Surface(Some(event)) => self.on_surface_event(event),
            Event::Surface(None) => {
                debug!("Session {}: surface events ended", self.session_id);
                self.surface_events = None;
            }
            Event::Provisioned(outcome) => self.on_provisioned(outcome),
            Event::Channel(event) => self.on_channel_event(event),
            Event::InitDue => {
                if let Phase::Streaming(adapter) = &mut self.phase {
                    adapter.fire_init_command();
                }
            }
        }
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SubmitCredential { password, remember } => {
                self.submit_credential(password, remember);
            }
            SessionCommand::CancelCredential => {
                if matches!(self.phase, Phase::Authenticating { .. }) {
                    info!("Session {}: credential prompt dismissed", self.session_id);
                    self.close();
                }
            }
            SessionCommand::Fit => self.fit(),
            SessionCommand::Close => self.close(),
        }
    }

    // ------------------------------------------------------------------
    // Provisioning
    // ------------------------------------------------------------------

    /// Only reachable from `idle` and `authenticating`, so at most one
    /// provisioning future exists per session.
    fn begin_provisioning(&mut self, request: SessionRequest) {
        let request = request.with_geometry(self.geometry);
        info!(
            "Session {}: provisioning {:?} terminal {}",
            self.session_id,
            request.target_type(),
            request.geometry
        );
        self.set_status(SessionStatus::Pending, true);
        let pending = self.provisioning.provision(&request);
        self.phase = Phase::Provisioning { request, pending };
    }

    pub(crate) fn on_provisioned(&mut self, outcome: ProvisionOutcome) {
        let request = match &self.phase {
            Phase::Provisioning { request, .. } => request.clone(),
            other => {
                debug!(
                    "Session {}: late provisioning result ignored in {}",
                    self.session_id,
                    other.name()
                );
                return;
            }
        };

        match outcome {
            ProvisionOutcome::Ready(handle) => self.start_streaming(request, handle),
            ProvisionOutcome::AuthFailure(text) => {
                info!("Session {}: authentication rejected", self.session_id);
                let prompt = CredentialPrompt {
                    last_error: text.clone(),
                    can_remember: request.profile.src_id.is_some()
                        && !request.profile.is_config_sourced(),
                };
                self.phase = Phase::Authenticating {
                    request,
                    retry: RetryContext::new(text),
                };
                self.hooks.ui.credential_required(&self.session_id, &prompt);
            }
            ProvisionOutcome::Fatal(text) => {
                error!("Session {}: provisioning failed: {}", self.session_id, text);
                self.fail(SessionError::Provisioning(text));
            }
        }
    }

    fn submit_credential(&mut self, password: String, remember: bool) {
        let (request, retry) = match &mut self.phase {
            Phase::Authenticating { request, retry } => {
                retry.supply(password, remember);
                (request.clone(), retry.clone())
            }
            other => {
                warn!(
                    "Session {}: credential ignored in {}",
                    self.session_id,
                    other.name()
                );
                return;
            }
        };
        debug!(
            "Session {}: retrying after \"{}\"",
            self.session_id, retry.last_error
        );

        if retry.remember_credential {
            self.remember_credential(&request, &retry);
        }
        self.begin_provisioning(retry.retry_request(&request));
    }

    /// Persist the credential on its own task; the retry never waits for it
    fn remember_credential(&self, request: &SessionRequest, retry: &RetryContext) {
        let profile = &request.profile;
        let (src_id, password) = match (&profile.src_id, &retry.supplied_credential) {
            (Some(src_id), Some(password)) if !profile.is_config_sourced() => {
                (src_id.clone(), password.clone())
            }
            _ => {
                debug!("Session {}: nothing to remember credential on", self.session_id);
                return;
            }
        };

        let credentials = Arc::clone(&self.hooks.credentials);
        let session_id = self.session_id.clone();
        let origin = profile.from.clone();
        tokio::spawn(async move {
            let update = CredentialUpdate { password };
            if let Err(e) = credentials.save(&src_id, &update, &origin).await {
                warn!("Session {}: {}", session_id, e);
            }
        });
    }

    // ------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------

    fn start_streaming(&mut self, request: SessionRequest, handle: SessionHandle) {
        info!("Session {}: streaming from {}", self.session_id, handle);
        self.set_status(SessionStatus::Success, false);

        let channel = self.transport.open_channel(&handle);
        let mut adapter = StreamAdapter::new(channel);
        if let Some(line) = initial_command(&request.profile) {
            adapter = adapter.with_init_command(line, request.init_command_delay);
        }
        self.phase = Phase::Streaming(adapter);

        if request.focus_on_ready {
            self.surface.focus();
            self.fit();
        }
    }

    pub(crate) fn on_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Input(data) => match &self.phase {
                Phase::Streaming(adapter) => adapter.send_input(data),
                _ => debug!("Session {}: input dropped before streaming", self.session_id),
            },
            SurfaceEvent::Focus => self.hooks.ui.activated(&self.session_id),
            SurfaceEvent::Selection => self.hooks.ui.selection_changed(&self.session_id),
            SurfaceEvent::Refresh { line } => {
                if let Phase::Streaming(adapter) = &mut self.phase {
                    if let Some(path) = adapter.detect_path(&line) {
                        info!("Session {}: working directory {}", self.session_id, path);
                        self.hooks
                            .metadata
                            .update(&self.session_id, SessionPatch::StartPath(path));
                    }
                }
            }
            SurfaceEvent::Resize(geometry) => self.apply_geometry(geometry),
        }
    }

    pub(crate) fn on_channel_event(&mut self, event: ChannelEvent) {
        let adapter = match &mut self.phase {
            Phase::Streaming(adapter) => adapter,
            other => {
                debug!(
                    "Session {}: channel event ignored in {}",
                    self.session_id,
                    other.name()
                );
                return;
            }
        };

        match event {
            ChannelEvent::Data(data) => adapter.deliver_output(self.surface.as_mut(), &data),
            ChannelEvent::Closed => {
                let handle = adapter.handle().clone();
                adapter.mark_remote_closed();
                warn!("Session {}: socket closed, pid: {}", self.session_id, handle);
                self.fail(SessionError::RemoteClosed(handle));
            }
            ChannelEvent::Error(reason) => {
                let handle = adapter.handle().clone();
                error!("Session {}: socket error: {}", self.session_id, reason);
                self.fail(SessionError::Transport { handle, reason });
            }
        }
    }

    /// Fit the surface to its container and propagate the new size
    fn fit(&mut self) {
        if !matches!(self.phase, Phase::Streaming(_)) {
            return;
        }
        match self.surface.propose_geometry() {
            Ok(geometry) => {
                self.surface.resize(geometry);
                self.apply_geometry(geometry);
            }
            Err(e) => warn!("Session {}: resize failed: {}", self.session_id, e),
        }
    }

    /// Record a geometry change; only a streaming session tells the host
    fn apply_geometry(&mut self, geometry: Geometry) {
        if geometry == self.geometry {
            return;
        }
        self.geometry = geometry;

        match &self.phase {
            Phase::Streaming(adapter) if self.status == Some(SessionStatus::Success) => {
                adapter.notify_resize(&self.transport, geometry);
            }
            _ => debug!(
                "Session {}: geometry {} kept locally",
                self.session_id, geometry
            ),
        }
    }

    // ------------------------------------------------------------------
    // Status and teardown
    // ------------------------------------------------------------------

    fn set_status(&mut self, status: SessionStatus, loading: bool) {
        if self.teardown.is_started() {
            debug!(
                "Session {}: status {} suppressed after teardown",
                self.session_id, status
            );
            return;
        }
        if let Some(current) = self.status {
            if !current.can_advance_to(status) {
                warn!(
                    "Session {}: refusing status {} after {}",
                    self.session_id, status, current
                );
                return;
            }
        }

        self.status = Some(status);
        self.hooks
            .metadata
            .update(&self.session_id, SessionPatch::Status(status));
        self.hooks
            .ui
            .status_changed(&self.session_id, StatusUpdate { status, loading });
    }

    fn fail(&mut self, error: SessionError) {
        self.set_status(SessionStatus::Error, false);
        self.finish(Phase::Errored(error));
    }

    /// Tear the session down locally. Safe to call any number of times.
    pub(crate) fn close(&mut self) {
        if self.finish(Phase::Closed) {
            info!("Session {}: closed", self.session_id);
        }
    }

    /// Move to a terminal phase and release resources, once
    fn finish(&mut self, end: Phase) -> bool {
        if !self.teardown.begin() {
            return false;
        }
        let previous = std::mem::replace(&mut self.phase, end);
        teardown::release(&self.session_id, previous, self.surface.as_mut());
        self.surface_events = None;
        true
    }
}
