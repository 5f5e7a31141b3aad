//! Observable render state shared between the session and its host.

use std::fmt;

use serde::Serialize;

use super::document::CompiledDocument;

/// Identity of a mounted renderer instance.
///
/// The key changes exactly when the renderer is discarded and recreated, which
/// forces the host to mount a fresh sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct RendererKey(u64);

impl RendererKey {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for RendererKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "renderer#{}", self.0)
    }
}

/// Monotonic identity of a document request, compared when a compile resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct RequestGeneration(u64);

impl RequestGeneration {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for RequestGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    /// No compiled document; the host shows a loading indicator.
    #[default]
    Unloaded,
    /// A compile for the latest request is in flight.
    Compiling,
    /// A document is mounted but its height has not been reported yet.
    Loaded,
    /// The renderer reported its content height for the current key.
    Measured,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderState {
    pub phase: RenderPhase,
    pub document: Option<CompiledDocument>,
    /// Zero until a resize message arrives for the current renderer key.
    pub content_height: f64,
    pub renderer_key: RendererKey,
}

impl RenderState {
    /// Whether the host should display its loading indicator.
    pub fn is_loading(&self) -> bool {
        match (&self.phase, &self.document) {
            (RenderPhase::Compiling, _) | (_, None) => true,
            (_, Some(document)) => !document.is_empty() && self.content_height == 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_advance_by_one() {
        let key = RendererKey::default();
        assert_eq!(key.next().get(), 1);
        assert_eq!(key.next().next(), RendererKey::new(2));
        assert_eq!(RendererKey::new(7).to_string(), "renderer#7");
    }

    #[test]
    fn loading_until_measured() {
        let mut state = RenderState::default();
        assert!(state.is_loading());

        state.phase = RenderPhase::Loaded;
        state.document = Some(CompiledDocument::new("<p>hi</p>"));
        assert!(state.is_loading(), "document without height is still loading");

        state.phase = RenderPhase::Measured;
        state.content_height = 120.0;
        assert!(!state.is_loading());
    }

    #[test]
    fn empty_document_is_not_loading() {
        let state = RenderState {
            phase: RenderPhase::Loaded,
            document: Some(CompiledDocument::new("")),
            content_height: 0.0,
            renderer_key: RendererKey::default(),
        };
        assert!(!state.is_loading());
    }
}
