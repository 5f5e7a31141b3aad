//! Host control loop.
//!
//! A single task owns the [`LifecycleController`] and is the only place render
//! state is mutated. Host input, renderer signals and compile completions all
//! funnel into it; compilation itself runs on the blocking pool and is only
//! dispatched once queued host input has been drained.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::compiler::{CompileError, DocumentCompiler};
use crate::application::lifecycle::{AppState, LifecycleController};
use crate::application::session::{CompileJob, Renderer, RendererEvent};
use crate::domain::document::{CompiledDocument, DocumentRequest};
use crate::domain::state::{RenderPhase, RenderState, RequestGeneration};

const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Inputs accepted by the control loop.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Request(DocumentRequest),
    AppState(AppState),
    Reload,
    Renderer(RendererEvent),
    Shutdown,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("session runtime is no longer running")]
    Closed,
}

struct Completion {
    generation: RequestGeneration,
    result: Result<CompiledDocument, CompileError>,
}

/// Cloneable sender side of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<HostEvent>,
    state: watch::Receiver<RenderState>,
}

impl SessionHandle {
    pub async fn send(&self, event: HostEvent) -> Result<(), RuntimeError> {
        self.events
            .send(event)
            .await
            .map_err(|_| RuntimeError::Closed)
    }

    pub async fn request(&self, request: DocumentRequest) -> Result<(), RuntimeError> {
        self.send(HostEvent::Request(request)).await
    }

    pub async fn set_app_state(&self, state: AppState) -> Result<(), RuntimeError> {
        self.send(HostEvent::AppState(state)).await
    }

    pub async fn reload(&self) -> Result<(), RuntimeError> {
        self.send(HostEvent::Reload).await
    }

    pub async fn renderer_event(&self, event: RendererEvent) -> Result<(), RuntimeError> {
        self.send(HostEvent::Renderer(event)).await
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.send(HostEvent::Shutdown).await
    }

    /// Latest published snapshot.
    pub fn state(&self) -> RenderState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RenderState> {
        self.state.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&RenderState) -> bool,
    ) -> Result<RenderState, RuntimeError> {
        let mut receiver = self.state.clone();
        let state = receiver
            .wait_for(|state| predicate(state))
            .await
            .map_err(|_| RuntimeError::Closed)?;
        Ok(state.clone())
    }

    /// Wait for the current renderer instance to report its height.
    pub async fn measured(&self) -> Result<RenderState, RuntimeError> {
        self.wait_for(|state| state.phase == RenderPhase::Measured)
            .await
    }
}

pub struct SessionRuntime<R> {
    controller: LifecycleController<R>,
    compiler: Arc<dyn DocumentCompiler>,
    events: mpsc::Receiver<HostEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    deferred: Vec<CompileJob>,
    state: watch::Sender<RenderState>,
}

impl<R: Renderer + 'static> SessionRuntime<R> {
    pub fn new(
        controller: LifecycleController<R>,
        compiler: Arc<dyn DocumentCompiler>,
    ) -> (Self, SessionHandle) {
        Self::with_capacity(controller, compiler, DEFAULT_MAILBOX_CAPACITY)
    }

    pub fn with_capacity(
        controller: LifecycleController<R>,
        compiler: Arc<dyn DocumentCompiler>,
        capacity: usize,
    ) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(controller.state().clone());

        let runtime = Self {
            controller,
            compiler,
            events: events_rx,
            completions_tx,
            completions_rx,
            deferred: Vec::new(),
            state: state_tx,
        };
        let handle = SessionHandle {
            events: events_tx,
            state: state_rx,
        };
        (runtime, handle)
    }

    /// Spawn the loop on the current tokio runtime. The join handle yields the
    /// controller back once the loop stops.
    pub fn spawn(self) -> JoinHandle<LifecycleController<R>> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> LifecycleController<R> {
        loop {
            tokio::select! {
                biased;
                Some(completion) = self.completions_rx.recv() => {
                    self.controller
                        .apply_compiled(completion.generation, completion.result);
                }
                event = self.events.recv() => match event {
                    Some(HostEvent::Shutdown) | None => break,
                    Some(event) => self.handle(event),
                },
            }

            if self.events.is_empty() {
                self.dispatch_deferred();
            }
            self.publish();
        }

        debug!(target = "application::runtime", "session runtime stopped");
        self.controller
    }

    fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::Request(request) => {
                if let Some(job) = self.controller.submit(request) {
                    self.deferred.push(job);
                }
            }
            HostEvent::AppState(state) => {
                self.controller.app_state_changed(state);
            }
            HostEvent::Reload => {
                self.controller.reload();
            }
            HostEvent::Renderer(event) => {
                self.controller.renderer_event(event);
            }
            HostEvent::Shutdown => {}
        }
    }

    fn dispatch_deferred(&mut self) {
        let latest = self.controller.session().latest_generation();
        for job in self.deferred.drain(..) {
            if job.generation != latest {
                debug!(
                    target = "application::runtime",
                    generation = %job.generation,
                    %latest,
                    "skipping superseded compile"
                );
                continue;
            }
            let compiler = Arc::clone(&self.compiler);
            let completions = self.completions_tx.clone();
            tokio::spawn(async move {
                let generation = job.generation;
                let result = tokio::task::spawn_blocking(move || job.run(compiler.as_ref()))
                    .await
                    .unwrap_or_else(|err| {
                        warn!(
                            target = "application::runtime",
                            %generation,
                            error = %err,
                            "compile task did not complete"
                        );
                        Err(CompileError::aborted(err.to_string()))
                    });
                let _ = completions.send(Completion { generation, result });
            });
        }
    }

    fn publish(&self) {
        let current = self.controller.state();
        self.state.send_if_modified(|published| {
            if published == current {
                false
            } else {
                *published = current.clone();
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::application::codec::Message;
    use crate::application::lifecycle::RendererCapabilities;
    use crate::application::session::testing::{RecordingBridge, RecordingRenderer};
    use crate::application::session::RenderSession;
    use crate::domain::state::RendererKey;

    /// Compiler that sleeps longer for markup starting with `slow`.
    struct PacedCompiler {
        seen: Mutex<Vec<String>>,
    }

    impl DocumentCompiler for PacedCompiler {
        fn compile(
            &self,
            markup: &str,
            _style_override: Option<&str>,
        ) -> Result<CompiledDocument, CompileError> {
            self.seen.lock().unwrap().push(markup.to_string());
            if markup.starts_with("slow") {
                std::thread::sleep(Duration::from_millis(150));
            }
            if markup == "fail" {
                return Err(CompileError::aborted("rejected"));
            }
            Ok(CompiledDocument::new(format!("<p>{markup}</p>")))
        }
    }

    fn start(
        retains_stale_frames: bool,
    ) -> (
        SessionHandle,
        JoinHandle<LifecycleController<RecordingRenderer>>,
        Arc<PacedCompiler>,
        Arc<RecordingBridge>,
    ) {
        let bridge = Arc::new(RecordingBridge::default());
        let session = RenderSession::new(RecordingRenderer::default(), bridge.clone());
        let controller = LifecycleController::new(
            session,
            RendererCapabilities {
                retains_stale_frames,
            },
        );
        let compiler = Arc::new(PacedCompiler {
            seen: Mutex::new(Vec::new()),
        });
        let (runtime, handle) = SessionRuntime::new(controller, compiler.clone());
        (handle, runtime.spawn(), compiler, bridge)
    }

    async fn loaded(handle: &SessionHandle) -> RenderState {
        tokio::time::timeout(
            Duration::from_secs(5),
            handle.wait_for(|state| state.phase == RenderPhase::Loaded),
        )
        .await
        .expect("document loads in time")
        .expect("runtime running")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn newer_request_wins_over_slower_older_one() {
        let (handle, join, _compiler, _) = start(false);

        handle.request(DocumentRequest::new("slow first")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.request(DocumentRequest::new("second")).await.unwrap();

        let state = loaded(&handle).await;
        assert_eq!(
            state.document.map(CompiledDocument::into_html).as_deref(),
            Some("<p>second</p>")
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(
            handle.state().document.map(CompiledDocument::into_html).as_deref(),
            Some("<p>second</p>"),
            "late result of the first request is discarded"
        );

        handle.shutdown().await.unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn queued_burst_compiles_only_the_last_request() {
        let bridge = Arc::new(RecordingBridge::default());
        let session = RenderSession::new(RecordingRenderer::default(), bridge);
        let controller = LifecycleController::new(session, RendererCapabilities::default());
        let compiler = Arc::new(PacedCompiler {
            seen: Mutex::new(Vec::new()),
        });
        let (runtime, handle) = SessionRuntime::new(controller, compiler.clone());

        for markup in ["one", "two", "three"] {
            handle.request(DocumentRequest::new(markup)).await.unwrap();
        }
        let join = runtime.spawn();

        let state = loaded(&handle).await;
        assert_eq!(
            state.document.map(CompiledDocument::into_html).as_deref(),
            Some("<p>three</p>")
        );
        handle.shutdown().await.unwrap();
        join.await.unwrap();

        assert_eq!(compiler.seen.lock().unwrap().as_slice(), &["three".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_requests_compile_once() {
        let (handle, join, compiler, _) = start(false);

        handle.request(DocumentRequest::new("same")).await.unwrap();
        loaded(&handle).await;
        handle.request(DocumentRequest::new("same")).await.unwrap();
        handle.shutdown().await.unwrap();
        join.await.unwrap();

        assert_eq!(compiler.seen.lock().unwrap().as_slice(), &["same".to_string()]);
    }

    #[tokio::test]
    async fn measurement_and_resume_flow() {
        let (handle, join, _, _) = start(true);

        handle.request(DocumentRequest::new("body")).await.unwrap();
        let state = loaded(&handle).await;
        handle
            .renderer_event(RendererEvent::Message {
                key: state.renderer_key,
                raw: Message::resize(200.0).to_wire(),
            })
            .await
            .unwrap();
        let measured = handle.measured().await.unwrap();
        assert_eq!(measured.content_height, 200.0);

        handle.set_app_state(AppState::Background).await.unwrap();
        handle.set_app_state(AppState::Active).await.unwrap();
        let resumed = handle
            .wait_for(|state| state.renderer_key == RendererKey::new(1))
            .await
            .unwrap();
        assert_eq!(resumed.content_height, 0.0);
        assert!(resumed.is_loading());

        handle.shutdown().await.unwrap();
        let controller = join.await.unwrap();
        assert_eq!(controller.state().renderer_key, RendererKey::new(1));
    }

    #[tokio::test]
    async fn compile_failure_reaches_the_host() {
        let (handle, join, _, bridge) = start(false);

        handle.request(DocumentRequest::new("fail")).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while bridge.failures.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("failure reported");

        handle.shutdown().await.unwrap();
        let controller = join.await.unwrap();
        assert_eq!(controller.state().phase, RenderPhase::Unloaded);
        assert!(controller.state().document.is_none());
    }

    #[tokio::test]
    async fn handle_reports_closed_runtime() {
        let (handle, join, _, _) = start(false);
        handle.shutdown().await.unwrap();
        join.await.unwrap();

        assert_eq!(handle.reload().await, Err(RuntimeError::Closed));
    }
}
