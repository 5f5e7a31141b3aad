//! Lifecycle controller: foreground/background transitions, request
//! de-duplication and explicit reloads on top of a [`RenderSession`].

use std::{fmt, str::FromStr};

use thiserror::Error;
use tracing::debug;

use crate::application::compiler::CompileError;
use crate::application::session::{
    ApplyOutcome, CompileJob, MessageOutcome, RenderSession, Renderer, RendererEvent,
};
use crate::config::RendererSettings;
use crate::domain::document::{CompiledDocument, DocumentRequest};
use crate::domain::state::{RenderState, RendererKey, RequestGeneration};

/// Host application activity as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Active,
    Inactive,
    Background,
}

#[derive(Debug, Error)]
#[error("unknown app state `{0}` (expected active|inactive|background)")]
pub struct UnknownAppState(String);

impl FromStr for AppState {
    type Err = UnknownAppState;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AppState::Active),
            "inactive" => Ok(AppState::Inactive),
            "background" => Ok(AppState::Background),
            other => Err(UnknownAppState(other.to_string())),
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppState::Active => f.write_str("active"),
            AppState::Inactive => f.write_str("inactive"),
            AppState::Background => f.write_str("background"),
        }
    }
}

/// What the embedded renderer is known to do across suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RendererCapabilities {
    pub retains_stale_frames: bool,
}

impl From<&RendererSettings> for RendererCapabilities {
    fn from(settings: &RendererSettings) -> Self {
        Self {
            retains_stale_frames: settings.retains_stale_frames,
        }
    }
}

/// Action taken when the host application returns to the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStrategy {
    /// Discard the renderer and mount a fresh instance with the same document.
    Remount,
    /// Leave the renderer untouched.
    Keep,
}

impl ResumeStrategy {
    pub fn from_capabilities(capabilities: RendererCapabilities) -> Self {
        if capabilities.retains_stale_frames {
            ResumeStrategy::Remount
        } else {
            ResumeStrategy::Keep
        }
    }
}

pub struct LifecycleController<R> {
    session: RenderSession<R>,
    app_state: AppState,
    resume: ResumeStrategy,
    last_markup: Option<String>,
}

impl<R: Renderer> LifecycleController<R> {
    pub fn new(session: RenderSession<R>, capabilities: RendererCapabilities) -> Self {
        Self {
            session,
            app_state: AppState::Active,
            resume: ResumeStrategy::from_capabilities(capabilities),
            last_markup: None,
        }
    }

    pub fn session(&self) -> &RenderSession<R> {
        &self.session
    }

    pub fn state(&self) -> &RenderState {
        self.session.state()
    }

    pub fn app_state(&self) -> AppState {
        self.app_state
    }

    pub fn resume_strategy(&self) -> ResumeStrategy {
        self.resume
    }

    /// Accept a host request. Returns the compile job to run, or `None` when the
    /// markup matches the previously requested markup.
    pub fn submit(&mut self, request: DocumentRequest) -> Option<CompileJob> {
        if self.last_markup.as_deref() == Some(request.markup.as_str()) {
            debug!(
                target = "application::lifecycle",
                "markup unchanged; skipping recompilation"
            );
            return None;
        }

        self.last_markup = Some(request.markup.clone());
        Some(self.session.begin(request))
    }

    /// Record an app-state transition. Returns the new renderer key when the
    /// transition caused a remount.
    pub fn app_state_changed(&mut self, next: AppState) -> Option<RendererKey> {
        let previous = std::mem::replace(&mut self.app_state, next);
        let resumed = previous != AppState::Active && next == AppState::Active;

        debug!(
            target = "application::lifecycle",
            %previous,
            %next,
            resumed,
            "app state changed"
        );

        match (resumed, self.resume) {
            (true, ResumeStrategy::Remount) => Some(self.session.recreate_renderer()),
            _ => None,
        }
    }

    /// Host-driven remount of the current document.
    pub fn reload(&mut self) -> RendererKey {
        self.session.recreate_renderer()
    }

    pub fn apply_compiled(
        &mut self,
        generation: RequestGeneration,
        result: Result<CompiledDocument, CompileError>,
    ) -> ApplyOutcome {
        self.session.apply_compiled(generation, result)
    }

    /// Route a renderer signal to the session. Returns `None` for paint signals.
    pub fn renderer_event(&mut self, event: RendererEvent) -> Option<MessageOutcome> {
        match event {
            RendererEvent::ContentPainted { key } => {
                self.session.content_painted(key);
                None
            }
            RendererEvent::Message { key, raw } => Some(self.session.receive(key, &raw)),
        }
    }
}
