use serde::{Deserialize, Serialize};

/// A host request to display a piece of markup.
///
/// Requests are immutable; a later request supersedes an earlier one instead of
/// mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequest {
    /// Raw user-authored markup.
    pub markup: String,
    /// Whether height changes should be presented with a smooth transition.
    #[serde(default)]
    pub animated: bool,
    /// Extra CSS appended verbatim after the global style block.
    #[serde(default)]
    pub style_override: Option<String>,
}

impl DocumentRequest {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            animated: false,
            style_override: None,
        }
    }

    pub fn animated(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    pub fn with_style_override(mut self, style: impl Into<String>) -> Self {
        let style = style.into();
        self.style_override = (!style.is_empty()).then_some(style);
        self
    }
}

/// Self-contained HTML document ready to be loaded by a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledDocument {
    html: String,
}

impl CompiledDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    pub fn into_html(self) -> String {
        self.html
    }
}
