//! Custom-block extension: `[[NAME]]` + `| body` and `::: name` fences.
//!
//! Blocks are lifted out of the markdown before parsing and replaced by
//! placeholder HTML blocks; the rendered block markup is restored after the
//! main document has been formatted.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{BlockSettings, DEFAULT_DEMO_BLOCK};

use super::types::CompileError;

static PIPE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\[([^\[\]\s]+)\]\]$").expect("pipe header pattern is valid"));
static FENCE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^:::[ \t]*([A-Za-z0-9_-]+)$").expect("fence header pattern is valid")
});

const FENCE_CLOSE: &str = ":::";
const PLACEHOLDER_PREFIX: &str = "markview-custom-block-";

/// Custom-block names mapped to the CSS class applied to the rendered block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRegistry {
    classes: BTreeMap<String, String>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            classes: BTreeMap::new(),
        }
    }

    pub fn with_block(mut self, name: &str, class: impl Into<String>) -> Self {
        self.classes.insert(name.to_ascii_uppercase(), class.into());
        self
    }

    /// Block names are matched case-insensitively.
    pub fn class_for(&self, name: &str) -> Option<&str> {
        self.classes
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.values().map(String::as_str)
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        let (name, class) = DEFAULT_DEMO_BLOCK;
        Self::new().with_block(name, class)
    }
}

impl From<&BlockSettings> for BlockRegistry {
    fn from(settings: &BlockSettings) -> Self {
        settings
            .classes
            .iter()
            .fold(Self::new(), |registry, (name, class)| {
                registry.with_block(name, class.clone())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockFragment {
    pub(crate) placeholder: String,
    pub(crate) class: String,
    pub(crate) body: String,
}

impl BlockFragment {
    pub(crate) fn placeholder_html(&self) -> String {
        format!("<div>{}</div>", self.placeholder)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ExtractedBlocks {
    pub(crate) markdown: String,
    pub(crate) fragments: Vec<BlockFragment>,
}

/// Lift every recognised custom block out of `markup`.
pub(crate) fn extract_blocks(
    markup: &str,
    registry: &BlockRegistry,
) -> Result<ExtractedBlocks, CompileError> {
    let lines: Vec<&str> = markup.split_inclusive('\n').collect();
    let mut extracted = ExtractedBlocks {
        markdown: String::with_capacity(markup.len()),
        fragments: Vec::new(),
    };
    let mut code_fence: Option<CodeFence> = None;
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        let trimmed = line.trim_end_matches(['\n', '\r']);

        if let Some(fence) = code_fence.as_ref() {
            if fence.closes(trimmed) {
                code_fence = None;
            }
            extracted.markdown.push_str(line);
            index += 1;
            continue;
        }
        if let Some(fence) = CodeFence::opening(trimmed) {
            code_fence = Some(fence);
            extracted.markdown.push_str(line);
            index += 1;
            continue;
        }

        if let Some(caps) = PIPE_HEADER.captures(trimmed) {
            let name = &caps[1];
            let body_lines = lines[index + 1..]
                .iter()
                .take_while(|candidate| candidate.starts_with('|'))
                .count();

            if body_lines > 0 {
                let class = registry
                    .class_for(name)
                    .ok_or_else(|| CompileError::unknown_block(name, index + 1))?;
                let body = lines[index + 1..index + 1 + body_lines]
                    .iter()
                    .map(|body_line| strip_pipe(body_line))
                    .collect::<String>();
                push_fragment(&mut extracted, class, body);
                index += 1 + body_lines;
                continue;
            }

            if registry.class_for(name).is_some() {
                return Err(CompileError::empty_block(name, index + 1));
            }
        } else if let Some(caps) = FENCE_HEADER.captures(trimmed.trim()) {
            let name = &caps[1];
            let class = registry
                .class_for(name)
                .ok_or_else(|| CompileError::unknown_block(name, index + 1))?;
            let close = lines[index + 1..]
                .iter()
                .position(|candidate| candidate.trim() == FENCE_CLOSE)
                .ok_or_else(|| CompileError::unterminated_block(name, index + 1))?;
            if close == 0 {
                return Err(CompileError::empty_block(name, index + 1));
            }
            let body = lines[index + 1..index + 1 + close].concat();
            push_fragment(&mut extracted, class, body);
            index += close + 2;
            continue;
        }

        extracted.markdown.push_str(line);
        index += 1;
    }

    Ok(extracted)
}

/// Swap placeholder blocks for the rendered custom-block markup.
pub(crate) fn restore_blocks(html: String, rendered: &[(BlockFragment, String)]) -> String {
    rendered.iter().fold(html, |acc, (fragment, body_html)| {
        let block = format!(
            "<div class=\"custom-block {}\"><div class=\"custom-block-body\">{}</div></div>",
            fragment.class,
            body_html.trim_end()
        );
        acc.replace(&fragment.placeholder_html(), &block)
    })
}

fn push_fragment(extracted: &mut ExtractedBlocks, class: &str, body: String) {
    let fragment = BlockFragment {
        placeholder: format!("{PLACEHOLDER_PREFIX}{}", extracted.fragments.len()),
        class: class.to_string(),
        body,
    };
    if !extracted.markdown.is_empty() && !extracted.markdown.ends_with('\n') {
        extracted.markdown.push('\n');
    }
    extracted.markdown.push_str(&fragment.placeholder_html());
    extracted.markdown.push_str("\n\n");
    extracted.fragments.push(fragment);
}

fn strip_pipe(line: &str) -> &str {
    let rest = &line[1..];
    rest.strip_prefix(' ').unwrap_or(rest)
}

struct CodeFence {
    marker: char,
    len: usize,
}

impl CodeFence {
    fn opening(line: &str) -> Option<Self> {
        let stripped = line.trim_start_matches(' ');
        if line.len() - stripped.len() > 3 {
            return None;
        }
        let marker = stripped.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = stripped.chars().take_while(|c| *c == marker).count();
        (len >= 3).then_some(Self { marker, len })
    }

    fn closes(&self, line: &str) -> bool {
        let stripped = line.trim();
        let len = stripped.chars().take_while(|c| *c == self.marker).count();
        len >= self.len && stripped.chars().skip(len).all(char::is_whitespace)
    }
}
