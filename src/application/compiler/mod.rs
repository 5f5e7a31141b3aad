//! Document compiler: markup in, self-contained HTML document out.
//!
//! The pipeline is pure: legacy tag rewrite, markdown rendering through a
//! [`MarkupEngine`], then the fixed document template. Scheduling the work off
//! the interactive path is the caller's concern (see the session runtime).

mod blocks;
mod engine;
mod legacy;
mod template;
mod types;

use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::domain::document::CompiledDocument;
use crate::infra::telemetry::{METRIC_COMPILE_MS, METRIC_COMPILE_TOTAL};

pub use blocks::BlockRegistry;
pub use engine::ComrakMarkupEngine;
pub use legacy::rewrite_legacy_demo;
pub use template::{DocumentTemplate, DocumentTheme, FontAssets};
pub use types::{CompileError, DocumentCompiler, MarkupEngine};

/// Construction-time inputs of the compiler; nothing is read from ambient state.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    pub theme: DocumentTheme,
    pub fonts: FontAssets,
    pub blocks: BlockRegistry,
}

impl From<&Settings> for CompilerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            theme: DocumentTheme::from(&settings.theme),
            fonts: FontAssets::from(&settings.fonts),
            blocks: BlockRegistry::from(&settings.blocks),
        }
    }
}

/// Default compiler: legacy rewrite, markup engine, document template.
pub struct MarkupCompiler<E = ComrakMarkupEngine> {
    engine: E,
    template: DocumentTemplate,
}

impl MarkupCompiler<ComrakMarkupEngine> {
    pub fn new(config: &CompilerConfig) -> Self {
        Self::with_engine(ComrakMarkupEngine::new(config.blocks.clone()), config)
    }
}

impl<E: MarkupEngine> MarkupCompiler<E> {
    pub fn with_engine(engine: E, config: &CompilerConfig) -> Self {
        let template = DocumentTemplate::new(&config.theme, &config.fonts, &config.blocks);
        Self { engine, template }
    }

    pub fn template(&self) -> &DocumentTemplate {
        &self.template
    }
}

impl<E: MarkupEngine> DocumentCompiler for MarkupCompiler<E> {
    fn compile(
        &self,
        markup: &str,
        style_override: Option<&str>,
    ) -> Result<CompiledDocument, CompileError> {
        let started_at = Instant::now();
        let rewritten = rewrite_legacy_demo(markup);

        let result = self
            .engine
            .process(&rewritten)
            .map(|body| CompiledDocument::new(self.template.render(&body, style_override)));

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_COMPILE_MS).record(elapsed_ms);

        match &result {
            Ok(document) => {
                counter!(METRIC_COMPILE_TOTAL, "outcome" => "ok").increment(1);
                debug!(
                    target = "application::compiler",
                    markup_len = markup.len(),
                    html_len = document.html().len(),
                    elapsed_ms,
                    "document compiled"
                );
            }
            Err(error) => {
                counter!(METRIC_COMPILE_TOTAL, "outcome" => "error").increment(1);
                warn!(
                    target = "application::compiler",
                    error = %error,
                    elapsed_ms,
                    "document compilation failed"
                );
            }
        }

        result
    }
}
