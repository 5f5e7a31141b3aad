use comrak::{Arena, format_html, options::Options, parse_document};

use super::blocks::{BlockRegistry, extract_blocks, restore_blocks};
use super::types::{CompileError, MarkupEngine};

/// Comrak-backed markup engine with the custom-block extension enabled.
pub struct ComrakMarkupEngine {
    options: Options<'static>,
    blocks: BlockRegistry,
}

impl ComrakMarkupEngine {
    pub fn new(blocks: BlockRegistry) -> Self {
        Self {
            options: default_options(),
            blocks,
        }
    }

    pub fn blocks(&self) -> &BlockRegistry {
        &self.blocks
    }
}

impl Default for ComrakMarkupEngine {
    fn default() -> Self {
        Self::new(BlockRegistry::default())
    }
}

impl MarkupEngine for ComrakMarkupEngine {
    fn process(&self, markup: &str) -> Result<String, CompileError> {
        let extracted = extract_blocks(markup, &self.blocks)?;

        let rendered = extracted
            .fragments
            .into_iter()
            .map(|fragment| {
                let html = render_html_stage(&fragment.body, &self.options)?;
                Ok((fragment, html))
            })
            .collect::<Result<Vec<_>, CompileError>>()?;

        let html = render_html_stage(&extracted.markdown, &self.options)?;
        Ok(restore_blocks(html, &rendered))
    }
}

fn render_html_stage(markdown: &str, options: &Options<'static>) -> Result<String, CompileError> {
    let arena = Arena::new();
    let root = parse_document(&arena, markdown, options);

    let mut html = String::new();
    format_html(root, options, &mut html).map_err(|err| CompileError::Markdown {
        message: err.to_string(),
    })?;
    Ok(html)
}

pub(crate) fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.description_lists = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.r#unsafe = true;

    options
}
