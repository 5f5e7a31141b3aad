//! Render session: one renderer instance, its loading/measurement state and
//! the injected-script exchange with it.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::application::codec::{self, DecodeError, Message};
use crate::application::compiler::{CompileError, DocumentCompiler};
use crate::application::scripts::InjectedScript;
use crate::domain::document::{CompiledDocument, DocumentRequest};
use crate::domain::state::{RenderPhase, RenderState, RendererKey, RequestGeneration};
use crate::infra::telemetry::{
    METRIC_MESSAGE_DROPPED_TOTAL, METRIC_RENDERER_REMOUNT_TOTAL, METRIC_STALE_RESULT_TOTAL,
};

/// Host-side handle of a sandboxed renderer.
///
/// Every call carries the key of the instance it addresses; an instance is
/// never reused once discarded.
pub trait Renderer: Send {
    fn mount(&mut self, key: RendererKey, document: &CompiledDocument);
    fn inject(&mut self, key: RendererKey, script: InjectedScript);
    fn discard(&mut self, key: RendererKey);
}

/// Callbacks into the host application.
pub trait HostBridge: Send + Sync {
    /// Navigate to a link the user activated inside the renderer.
    fn open_link(&self, href: &str);

    fn compile_failed(&self, _error: &CompileError) {}

    fn layout_changed(&self, _change: LayoutChange) {}
}

/// Bridge that ignores every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHostBridge;

impl HostBridge for NoopHostBridge {
    fn open_link(&self, _href: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutTransition {
    Immediate,
    EaseInEaseOut,
}

/// Height the host container should reflow to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutChange {
    pub height: f64,
    pub transition: LayoutTransition,
}

/// Signals a renderer sends back across the sandbox boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererEvent {
    /// The mounted document finished loading.
    ContentPainted { key: RendererKey },
    /// A raw message posted from inside the sandbox.
    Message { key: RendererKey, raw: String },
}

impl RendererEvent {
    pub fn key(&self) -> RendererKey {
        match self {
            RendererEvent::ContentPainted { key } | RendererEvent::Message { key, .. } => *key,
        }
    }
}

/// Work order for compiling one request off the control thread.
#[derive(Debug, Clone)]
pub struct CompileJob {
    pub generation: RequestGeneration,
    pub markup: String,
    pub style_override: Option<String>,
}

impl CompileJob {
    pub fn run(&self, compiler: &dyn DocumentCompiler) -> Result<CompiledDocument, CompileError> {
        compiler.compile(&self.markup, self.style_override.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The document was stored and mounted.
    Mounted,
    /// The compile failed; the session is back to `Unloaded`.
    Failed,
    /// A newer request was issued meanwhile; the result was discarded.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Malformed,
    StaleRenderer,
    NoDocument,
}

impl DropReason {
    fn as_str(self) -> &'static str {
        match self {
            DropReason::Malformed => "malformed",
            DropReason::StaleRenderer => "stale_renderer",
            DropReason::NoDocument => "no_document",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Resized { height: f64 },
    LinkForwarded,
    Dropped(DropReason),
}

pub struct RenderSession<R> {
    state: RenderState,
    latest: RequestGeneration,
    animated: bool,
    renderer: R,
    host: Arc<dyn HostBridge>,
}

impl<R: Renderer> RenderSession<R> {
    pub fn new(renderer: R, host: Arc<dyn HostBridge>) -> Self {
        Self {
            state: RenderState::default(),
            latest: RequestGeneration::default(),
            animated: false,
            renderer,
            host,
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn latest_generation(&self) -> RequestGeneration {
        self.latest
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Register `request` as the latest one and hand back the compile job for it.
    ///
    /// The previously stored document stays in place until a result for this
    /// generation is applied.
    pub fn begin(&mut self, request: DocumentRequest) -> CompileJob {
        self.latest = self.latest.next();
        self.animated = request.animated;
        self.state.phase = RenderPhase::Compiling;

        debug!(
            target = "application::session",
            generation = %self.latest,
            bytes = request.markup.len(),
            "compile requested"
        );

        CompileJob {
            generation: self.latest,
            markup: request.markup,
            style_override: request.style_override,
        }
    }

    pub fn apply_compiled(
        &mut self,
        generation: RequestGeneration,
        result: Result<CompiledDocument, CompileError>,
    ) -> ApplyOutcome {
        if generation != self.latest {
            counter!(METRIC_STALE_RESULT_TOTAL).increment(1);
            debug!(
                target = "application::session",
                %generation,
                latest = %self.latest,
                "discarding superseded compile result"
            );
            return ApplyOutcome::Superseded;
        }

        self.reset_height();

        match result {
            Ok(document) => {
                self.renderer.mount(self.state.renderer_key, &document);
                self.state.document = Some(document);
                self.state.phase = RenderPhase::Loaded;
                debug!(
                    target = "application::session",
                    %generation,
                    key = %self.state.renderer_key,
                    "document mounted"
                );
                ApplyOutcome::Mounted
            }
            Err(error) => {
                self.state.document = None;
                self.state.phase = RenderPhase::Unloaded;
                warn!(
                    target = "application::session",
                    %generation,
                    error = %error,
                    "document compile failed"
                );
                self.host.compile_failed(&error);
                ApplyOutcome::Failed
            }
        }
    }

    /// Handle the renderer's load-completion signal by injecting the link
    /// interceptor and the height probe. Returns whether anything was injected.
    pub fn content_painted(&mut self, key: RendererKey) -> bool {
        if key != self.state.renderer_key || self.state.document.is_none() {
            debug!(
                target = "application::session",
                %key,
                current = %self.state.renderer_key,
                "ignoring paint signal"
            );
            return false;
        }

        for script in InjectedScript::ON_CONTENT_PAINTED {
            self.renderer.inject(key, script);
        }
        true
    }

    /// Decode and apply a raw message posted by the renderer identified by `key`.
    pub fn receive(&mut self, key: RendererKey, raw: &str) -> MessageOutcome {
        let message = match codec::decode(raw) {
            Ok(message) => message,
            Err(err) => return self.drop_message(DropReason::Malformed, Some(&err)),
        };

        if key != self.state.renderer_key {
            return self.drop_message(DropReason::StaleRenderer, None);
        }

        match message {
            Message::Link(link) => {
                debug!(target = "application::session", href = %link.href, "forwarding link");
                self.host.open_link(&link.href);
                MessageOutcome::LinkForwarded
            }
            Message::Resize(resize) => {
                if self.state.document.is_none() {
                    return self.drop_message(DropReason::NoDocument, None);
                }
                let transition = if self.animated {
                    LayoutTransition::EaseInEaseOut
                } else {
                    LayoutTransition::Immediate
                };
                self.set_height(resize.height, transition);
                // A newer document is still compiling; the loading state belongs to it.
                if self.state.phase != RenderPhase::Compiling {
                    self.state.phase = RenderPhase::Measured;
                }
                MessageOutcome::Resized {
                    height: resize.height,
                }
            }
        }
    }

    /// Discard the current renderer and remount the stored document, if any,
    /// under a fresh key.
    pub(crate) fn recreate_renderer(&mut self) -> RendererKey {
        let previous = self.state.renderer_key;
        self.renderer.discard(previous);
        self.state.renderer_key = previous.next();
        self.reset_height();
        counter!(METRIC_RENDERER_REMOUNT_TOTAL).increment(1);

        let key = self.state.renderer_key;
        if self.state.phase != RenderPhase::Compiling {
            self.state.phase = RenderPhase::Unloaded;
        }
        if let Some(document) = self.state.document.as_ref() {
            self.renderer.mount(key, document);
            if self.state.phase != RenderPhase::Compiling {
                self.state.phase = RenderPhase::Loaded;
            }
        }

        debug!(target = "application::session", %previous, %key, "renderer recreated");
        key
    }

    fn reset_height(&mut self) {
        self.set_height(0.0, LayoutTransition::Immediate);
    }

    fn set_height(&mut self, height: f64, transition: LayoutTransition) {
        if self.state.content_height == height {
            return;
        }
        self.state.content_height = height;
        self.host.layout_changed(LayoutChange { height, transition });
    }

    fn drop_message(&self, reason: DropReason, error: Option<&DecodeError>) -> MessageOutcome {
        counter!(METRIC_MESSAGE_DROPPED_TOTAL, "reason" => reason.as_str()).increment(1);
        match error {
            Some(error) => debug!(
                target = "application::session",
                reason = reason.as_str(),
                %error,
                "dropping renderer message"
            ),
            None => debug!(
                target = "application::session",
                reason = reason.as_str(),
                "dropping renderer message"
            ),
        }
        MessageOutcome::Dropped(reason)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum RendererCall {
        Mount(RendererKey, String),
        Inject(RendererKey, InjectedScript),
        Discard(RendererKey),
    }

    #[derive(Debug, Default)]
    pub struct RecordingRenderer {
        pub calls: Vec<RendererCall>,
    }

    impl Renderer for RecordingRenderer {
        fn mount(&mut self, key: RendererKey, document: &CompiledDocument) {
            self.calls
                .push(RendererCall::Mount(key, document.html().to_string()));
        }

        fn inject(&mut self, key: RendererKey, script: InjectedScript) {
            self.calls.push(RendererCall::Inject(key, script));
        }

        fn discard(&mut self, key: RendererKey) {
            self.calls.push(RendererCall::Discard(key));
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingBridge {
        pub links: Mutex<Vec<String>>,
        pub failures: Mutex<Vec<CompileError>>,
        pub layouts: Mutex<Vec<LayoutChange>>,
    }

    impl HostBridge for RecordingBridge {
        fn open_link(&self, href: &str) {
            self.links.lock().unwrap().push(href.to_string());
        }

        fn compile_failed(&self, error: &CompileError) {
            self.failures.lock().unwrap().push(error.clone());
        }

        fn layout_changed(&self, change: LayoutChange) {
            self.layouts.lock().unwrap().push(change);
        }
    }

    pub fn session() -> (RenderSession<RecordingRenderer>, Arc<RecordingBridge>) {
        let bridge = Arc::new(RecordingBridge::default());
        let session = RenderSession::new(RecordingRenderer::default(), bridge.clone());
        (session, bridge)
    }
}
