//! Headless renderer actor.
//!
//! Stands in for the embedded web view: it owns the mounted page, answers the
//! injected scripts and posts messages back to the session exactly as a real
//! renderer would, but lays out nothing. Heights are estimated from the
//! document's block structure.

use std::{cell::RefCell, rc::Rc};

use lol_html::{RewriteStrSettings, element, rewrite_str, text};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::codec::Message;
use crate::application::runtime::SessionHandle;
use crate::application::scripts::InjectedScript;
use crate::application::session::{Renderer, RendererEvent};
use crate::domain::document::CompiledDocument;
use crate::domain::state::RendererKey;

use super::error::InfraError;

const BLOCK_SELECTOR: &str =
    "p, h1, h2, h3, h4, h5, h6, li, pre, blockquote, tr, dt, dd, hr, img, .custom-block";

/// Commands crossing from the host into the sandbox.
#[derive(Debug, Clone, PartialEq)]
pub enum RendererCommand {
    Mount {
        key: RendererKey,
        document: CompiledDocument,
    },
    Inject {
        key: RendererKey,
        script: InjectedScript,
    },
    Discard {
        key: RendererKey,
    },
}

/// [`Renderer`] that forwards every call to a sandbox over a channel.
#[derive(Debug, Clone)]
pub struct ChannelRenderer {
    commands: mpsc::UnboundedSender<RendererCommand>,
}

impl ChannelRenderer {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RendererCommand>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        (Self { commands }, receiver)
    }

    fn send(&self, command: RendererCommand) {
        if self.commands.send(command).is_err() {
            debug!(target = "infra::sandbox", "sandbox has shut down; command dropped");
        }
    }
}

impl Renderer for ChannelRenderer {
    fn mount(&mut self, key: RendererKey, document: &CompiledDocument) {
        self.send(RendererCommand::Mount {
            key,
            document: document.clone(),
        });
    }

    fn inject(&mut self, key: RendererKey, script: InjectedScript) {
        self.send(RendererCommand::Inject { key, script });
    }

    fn discard(&mut self, key: RendererKey) {
        self.send(RendererCommand::Discard { key });
    }
}

/// Fixed metrics used to turn block structure into a pixel height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SandboxLayout {
    pub viewport_width: f64,
    pub char_width: f64,
    pub line_height: f64,
    pub block_spacing: f64,
    pub body_margin: f64,
}

impl Default for SandboxLayout {
    fn default() -> Self {
        Self {
            viewport_width: 360.0,
            char_width: 8.0,
            line_height: 20.0,
            block_spacing: 12.0,
            body_margin: 8.0,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageMetrics {
    pub blocks: usize,
    pub characters: usize,
    pub links: Vec<String>,
}

impl PageMetrics {
    pub fn height(&self, layout: &SandboxLayout) -> f64 {
        let per_line = (layout.viewport_width / layout.char_width).floor().max(1.0);
        let text_lines = (self.characters as f64 / per_line).ceil();
        let lines = text_lines.max(self.blocks as f64);

        layout.body_margin * 2.0
            + lines * layout.line_height
            + self.blocks as f64 * layout.block_spacing
    }
}

/// Walk a compiled document and count what contributes to its height.
pub fn inspect_page(html: &str) -> Result<PageMetrics, InfraError> {
    let metrics = Rc::new(RefCell::new(PageMetrics::default()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(BLOCK_SELECTOR, {
                    let metrics = Rc::clone(&metrics);
                    move |_el| {
                        let mut metrics = metrics.borrow_mut();
                        metrics.blocks = metrics.blocks.saturating_add(1);
                        Ok(())
                    }
                }),
                element!("a[href]", {
                    let metrics = Rc::clone(&metrics);
                    move |el| {
                        if let Some(href) = el.get_attribute("href") {
                            metrics.borrow_mut().links.push(href);
                        }
                        Ok(())
                    }
                }),
                text!("body", {
                    let metrics = Rc::clone(&metrics);
                    move |chunk| {
                        let visible = chunk.as_str().chars().filter(|c| !c.is_whitespace()).count();
                        if visible > 0 {
                            let mut metrics = metrics.borrow_mut();
                            metrics.characters = metrics.characters.saturating_add(visible);
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| InfraError::sandbox(format!("failed to inspect document: {err}")))?;

    let metrics = Rc::try_unwrap(metrics)
        .map(RefCell::into_inner)
        .unwrap_or_else(|rc| rc.borrow().clone());
    Ok(metrics)
}

#[derive(Debug)]
struct MountedPage {
    key: RendererKey,
    height: f64,
    links: Vec<String>,
    intercepting: bool,
}

/// Control surface for a running sandbox.
pub struct SandboxHandle {
    clicks: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl SandboxHandle {
    /// Simulate the user activating the anchor pointing at `href`.
    pub fn click(&self, href: impl Into<String>) -> Result<(), InfraError> {
        self.clicks
            .send(href.into())
            .map_err(|_| InfraError::sandbox("sandbox is not running"))
    }

    pub async fn join(self) -> Result<(), InfraError> {
        self.task
            .await
            .map_err(|err| InfraError::sandbox(format!("sandbox task failed: {err}")))
    }
}

pub struct HeadlessSandbox {
    commands: mpsc::UnboundedReceiver<RendererCommand>,
    clicks: mpsc::UnboundedReceiver<String>,
    host: SessionHandle,
    layout: SandboxLayout,
    page: Option<MountedPage>,
}

impl HeadlessSandbox {
    /// Start the sandbox on the current tokio runtime. It stops once the
    /// renderer side is dropped or the session stops accepting events.
    pub fn spawn(
        commands: mpsc::UnboundedReceiver<RendererCommand>,
        host: SessionHandle,
        layout: SandboxLayout,
    ) -> SandboxHandle {
        let (clicks_tx, clicks_rx) = mpsc::unbounded_channel();
        let sandbox = Self {
            commands,
            clicks: clicks_rx,
            host,
            layout,
            page: None,
        };
        SandboxHandle {
            clicks: clicks_tx,
            task: tokio::spawn(sandbox.run()),
        }
    }

    async fn run(mut self) {
        loop {
            let delivered = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.execute(command).await,
                    None => break,
                },
                Some(href) = self.clicks.recv() => self.click(href).await,
            };
            if !delivered {
                break;
            }
        }
        debug!(target = "infra::sandbox", "sandbox stopped");
    }

    /// Returns `false` once the host no longer accepts events.
    async fn execute(&mut self, command: RendererCommand) -> bool {
        match command {
            RendererCommand::Mount { key, document } => {
                let metrics = inspect_page(document.html()).unwrap_or_else(|err| {
                    warn!(target = "infra::sandbox", %key, error = %err, "rendering blank page");
                    PageMetrics::default()
                });
                let height = metrics.height(&self.layout);
                debug!(target = "infra::sandbox", %key, height, blocks = metrics.blocks, "page mounted");
                self.page = Some(MountedPage {
                    key,
                    height,
                    links: metrics.links,
                    intercepting: false,
                });
                self.emit(RendererEvent::ContentPainted { key }).await
            }
            RendererCommand::Inject { key, script } => {
                let Some(page) = self.page.as_mut().filter(|page| page.key == key) else {
                    debug!(target = "infra::sandbox", %key, ?script, "no such renderer instance");
                    return true;
                };
                match script {
                    InjectedScript::InterceptLinks => {
                        page.intercepting = true;
                        true
                    }
                    InjectedScript::MeasureHeight => {
                        let raw = Message::resize(page.height).to_wire();
                        self.emit(RendererEvent::Message { key, raw }).await
                    }
                }
            }
            RendererCommand::Discard { key } => {
                if self.page.as_ref().is_some_and(|page| page.key == key) {
                    self.page = None;
                }
                true
            }
        }
    }

    async fn click(&mut self, href: String) -> bool {
        let Some(page) = self.page.as_ref() else {
            debug!(target = "infra::sandbox", %href, "click without a mounted page");
            return true;
        };
        if !page.links.iter().any(|link| *link == href) {
            debug!(target = "infra::sandbox", %href, "click on a missing anchor");
            return true;
        }
        if !page.intercepting {
            debug!(target = "infra::sandbox", %href, "navigating inside the sandbox");
            return true;
        }

        let key = page.key;
        let raw = Message::link(href).to_wire();
        self.emit(RendererEvent::Message { key, raw }).await
    }

    async fn emit(&self, event: RendererEvent) -> bool {
        self.host.renderer_event(event).await.is_ok()
    }
}
