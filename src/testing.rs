//! In-process fakes for the session collaborators

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::hooks::{
    CredentialPrompt, CredentialStore, CredentialUpdate, HookError, HookResult, SessionHooks,
    SessionMetadata, SessionPatch, SessionUi,
};
use crate::session::{Geometry, SessionHandle, StatusUpdate};
use crate::surface::{LocalSurface, SurfaceError, SurfaceResult};
use crate::transport::{
    ProvisionReply, RemoteEnd, StreamingChannel, Transport, TransportError, TransportResult,
};

enum Scripted {
    Reply(ProvisionReply),
    Unreachable,
}

/// Transport answering provisioning from a queue.
///
/// With the queue empty a provisioning request never completes.
pub struct FakeTransport {
    replies: Mutex<VecDeque<Scripted>>,
    bodies: Mutex<Vec<Value>>,
    opened: Mutex<Vec<SessionHandle>>,
    remotes_tx: mpsc::UnboundedSender<RemoteEnd>,
    remotes_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<RemoteEnd>>,
    resizes: Mutex<Vec<(SessionHandle, Geometry)>>,
    resizes_tx: mpsc::UnboundedSender<(SessionHandle, Geometry)>,
    resizes_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(SessionHandle, Geometry)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let (remotes_tx, remotes_rx) = mpsc::unbounded_channel();
        let (resizes_tx, resizes_rx) = mpsc::unbounded_channel();
        Self {
            replies: Mutex::new(VecDeque::new()),
            bodies: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
            remotes_tx,
            remotes_rx: tokio::sync::Mutex::new(remotes_rx),
            resizes: Mutex::new(Vec::new()),
            resizes_tx,
            resizes_rx: tokio::sync::Mutex::new(resizes_rx),
        }
    }

    pub fn push_reply(&self, reply: ProvisionReply) {
        self.replies.lock().unwrap().push_back(Scripted::Reply(reply));
    }

    /// Next provisioning request fails before reaching the host
    pub fn push_unreachable(&self) {
        self.replies.lock().unwrap().push_back(Scripted::Unreachable);
    }

    pub fn provision_bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn opened_channels(&self) -> Vec<SessionHandle> {
        self.opened.lock().unwrap().clone()
    }

    /// Carrier end of the oldest channel not yet taken
    pub fn take_remote(&self) -> RemoteEnd {
        self.remotes_rx
            .try_lock()
            .unwrap()
            .try_recv()
            .expect("no channel opened")
    }

    pub async fn wait_for_remote(&self) -> RemoteEnd {
        self.remotes_rx
            .lock()
            .await
            .recv()
            .await
            .expect("transport dropped")
    }

    pub fn resize_calls(&self) -> Vec<(SessionHandle, Geometry)> {
        self.resizes.lock().unwrap().clone()
    }

    pub async fn next_resize(&self) -> (SessionHandle, Geometry) {
        self.resizes_rx
            .lock()
            .await
            .recv()
            .await
            .expect("transport dropped")
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn provision(&self, body: &Value) -> TransportResult<ProvisionReply> {
        self.bodies.lock().unwrap().push(body.clone());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Unreachable) => Err(TransportError::ChannelClosed),
            None => std::future::pending().await,
        }
    }

    async fn resize(&self, handle: &SessionHandle, geometry: Geometry) -> TransportResult<()> {
        self.resizes.lock().unwrap().push((handle.clone(), geometry));
        let _ = self.resizes_tx.send((handle.clone(), geometry));
        Ok(())
    }

    fn open_channel(&self, handle: &SessionHandle) -> StreamingChannel {
        let (channel, remote) = StreamingChannel::pair(handle.clone());
        self.opened.lock().unwrap().push(handle.clone());
        let _ = self.remotes_tx.send(remote);
        channel
    }
}

/// Everything a `FakeSurface` was asked to do
#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub written: Vec<u8>,
    pub resized: Vec<Geometry>,
    pub focused: usize,
    pub disposed: usize,
    /// Geometry offered by `propose_geometry`; `None` reads as not visible
    pub proposed: Option<Geometry>,
}

pub struct FakeSurface {
    log: Arc<Mutex<SurfaceLog>>,
}

impl FakeSurface {
    pub fn new(proposed: Option<Geometry>) -> (Self, Arc<Mutex<SurfaceLog>>) {
        let log = Arc::new(Mutex::new(SurfaceLog {
            proposed,
            ..SurfaceLog::default()
        }));
        (Self { log: log.clone() }, log)
    }
}

impl LocalSurface for FakeSurface {
    fn write(&mut self, data: &[u8]) -> SurfaceResult<()> {
        self.log.lock().unwrap().written.extend_from_slice(data);
        Ok(())
    }

    fn propose_geometry(&self) -> SurfaceResult<Geometry> {
        self.log.lock().unwrap().proposed.ok_or(SurfaceError::NotVisible)
    }

    fn resize(&mut self, geometry: Geometry) {
        self.log.lock().unwrap().resized.push(geometry);
    }

    fn focus(&mut self) {
        self.log.lock().unwrap().focused += 1;
    }

    fn dispose(&mut self) {
        self.log.lock().unwrap().disposed += 1;
    }
}

/// Collaborator recording every call
#[derive(Default)]
pub struct RecordingHooks {
    statuses: Mutex<Vec<StatusUpdate>>,
    patches: Mutex<Vec<SessionPatch>>,
    prompts: Mutex<Vec<CredentialPrompt>>,
    saved: Mutex<Vec<(String, CredentialUpdate, String)>>,
    activations: AtomicUsize,
    selections: AtomicUsize,
    fail_save: AtomicBool,
    hang_save: AtomicBool,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn session_hooks(self: &Arc<Self>) -> SessionHooks {
        SessionHooks::new(self.clone(), self.clone(), self.clone())
    }

    /// Make every credential save fail
    pub fn fail_saves(&self) {
        self.fail_save.store(true, Ordering::SeqCst);
    }

    /// Make every credential save wait forever
    pub fn hang_saves(&self) {
        self.hang_save.store(true, Ordering::SeqCst);
    }

    /// Let spawned saves run until `count` have been recorded
    pub async fn wait_for_saves(&self, count: usize) -> Vec<(String, CredentialUpdate, String)> {
        loop {
            let saved = self.saved();
            if saved.len() >= count {
                return saved;
            }
            tokio::task::yield_now().await;
        }
    }

    pub fn statuses(&self) -> Vec<StatusUpdate> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn patches(&self) -> Vec<SessionPatch> {
        self.patches.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<CredentialPrompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<(String, CredentialUpdate, String)> {
        self.saved.lock().unwrap().clone()
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn selections(&self) -> usize {
        self.selections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for RecordingHooks {
    async fn save(&self, src_id: &str, credential: &CredentialUpdate, origin: &str) -> HookResult<()> {
        if self.hang_save.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(HookError::Persist("store offline".to_string()));
        }
        self.saved
            .lock()
            .unwrap()
            .push((src_id.to_string(), credential.clone(), origin.to_string()));
        Ok(())
    }
}

impl SessionMetadata for RecordingHooks {
    fn update(&self, _session_id: &str, patch: SessionPatch) {
        self.patches.lock().unwrap().push(patch);
    }
}

impl SessionUi for RecordingHooks {
    fn status_changed(&self, _session_id: &str, update: StatusUpdate) {
        self.statuses.lock().unwrap().push(update);
    }

    fn credential_required(&self, _session_id: &str, prompt: &CredentialPrompt) {
        self.prompts.lock().unwrap().push(prompt.clone());
    }

    fn activated(&self, _session_id: &str) {
        self.activations.fetch_add(1, Ordering::SeqCst);
    }

    fn selection_changed(&self, _session_id: &str) {
        self.selections.fetch_add(1, Ordering::SeqCst);
    }
}
