use std::{path::Path, process, sync::Arc, time::Duration};

use markview::{
    application::{
        codec,
        compiler::{CompileError, CompilerConfig, DocumentCompiler, MarkupCompiler},
        error::AppError,
        lifecycle::{AppState, LifecycleController, RendererCapabilities, ResumeStrategy},
        runtime::{SessionHandle, SessionRuntime},
        session::{HostBridge, LayoutChange, RenderSession},
    },
    config::{self, CompileArgs, DecodeArgs, LoginArgs, PreviewArgs},
    domain::{
        document::DocumentRequest,
        login::extract_login_result,
        state::{RenderPhase, RenderState, RendererKey},
    },
    infra::{
        sandbox::{ChannelRenderer, HeadlessSandbox, SandboxLayout},
        telemetry,
    },
};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const PREVIEW_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    let causes = report.messages.join(": ");

    if dispatcher::has_been_set() {
        error!(source = report.source, error = %causes, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(source = report.source, error = %causes, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        config::Command::Compile(args) => run_compile(&settings, args).await,
        config::Command::Decode(args) => run_decode(args),
        config::Command::Login(args) => run_login(args),
        config::Command::Preview(args) => run_preview(&settings, args).await,
    }
}

async fn read_request(file: &Path, style: Option<&Path>) -> Result<DocumentRequest, AppError> {
    let markup = tokio::fs::read_to_string(file).await?;
    let mut request = DocumentRequest::new(markup);
    if let Some(style) = style {
        request = request.with_style_override(tokio::fs::read_to_string(style).await?);
    }
    Ok(request)
}

async fn run_compile(settings: &config::Settings, args: CompileArgs) -> Result<(), AppError> {
    let request = read_request(&args.file, args.style.as_deref()).await?;
    let compiler = MarkupCompiler::new(&CompilerConfig::from(settings));

    let document = compiler.compile(&request.markup, request.style_override.as_deref())?;
    print!("{}", document.html());
    Ok(())
}

fn run_decode(args: DecodeArgs) -> Result<(), AppError> {
    let message = codec::decode(&args.raw)
        .map_err(|err| AppError::validation(format!("message would be dropped: {err}")))?;
    println!("{}", message.to_wire());
    Ok(())
}

fn run_login(args: LoginArgs) -> Result<(), AppError> {
    let result = extract_login_result(&args.url);
    let json = serde_json::to_string(&result)
        .map_err(|err| AppError::unexpected(format!("failed to serialise login result: {err}")))?;
    println!("{json}");
    Ok(())
}

/// Host bridge for the preview command; everything is logged.
struct LoggingHostBridge {
    failed: Arc<Notify>,
}

impl HostBridge for LoggingHostBridge {
    fn open_link(&self, href: &str) {
        info!(href, "link activated");
    }

    fn compile_failed(&self, error: &CompileError) {
        warn!(error = %error, "document failed to compile");
        self.failed.notify_one();
    }

    fn layout_changed(&self, change: LayoutChange) {
        info!(
            height = change.height,
            transition = ?change.transition,
            "layout changed"
        );
    }
}

#[derive(Debug, Serialize)]
struct PreviewReport {
    phase: RenderPhase,
    renderer_key: RendererKey,
    content_height: f64,
    loading: bool,
    html_bytes: usize,
}

impl From<&RenderState> for PreviewReport {
    fn from(state: &RenderState) -> Self {
        Self {
            phase: state.phase,
            renderer_key: state.renderer_key,
            content_height: state.content_height,
            loading: state.is_loading(),
            html_bytes: state
                .document
                .as_ref()
                .map(|document| document.html().len())
                .unwrap_or(0),
        }
    }
}

async fn run_preview(settings: &config::Settings, args: PreviewArgs) -> Result<(), AppError> {
    let request = read_request(&args.file, args.style.as_deref())
        .await?
        .animated(args.animated);

    let failed = Arc::new(Notify::new());
    let compiler: Arc<dyn DocumentCompiler> =
        Arc::new(MarkupCompiler::new(&CompilerConfig::from(settings)));
    let (renderer, commands) = ChannelRenderer::channel();
    let session = RenderSession::new(
        renderer,
        Arc::new(LoggingHostBridge {
            failed: Arc::clone(&failed),
        }),
    );
    let controller =
        LifecycleController::new(session, RendererCapabilities::from(&settings.renderer));
    let strategy = controller.resume_strategy();
    info!(?strategy, "starting preview session");

    let (runtime, handle) = SessionRuntime::new(controller, compiler);
    let runtime = runtime.spawn();
    let sandbox = HeadlessSandbox::spawn(commands, handle.clone(), SandboxLayout::default());

    let outcome = drive_preview(&handle, &failed, request, args.resume, strategy).await;

    handle.shutdown().await?;
    runtime
        .await
        .map_err(|err| AppError::unexpected(format!("session runtime failed: {err}")))?;
    sandbox.join().await?;

    let state = outcome?;
    let report = serde_json::to_string_pretty(&PreviewReport::from(&state))
        .map_err(|err| AppError::unexpected(format!("failed to serialise preview: {err}")))?;
    println!("{report}");
    Ok(())
}

async fn drive_preview(
    handle: &SessionHandle,
    failed: &Notify,
    request: DocumentRequest,
    resume: bool,
    strategy: ResumeStrategy,
) -> Result<RenderState, AppError> {
    handle.request(request).await?;
    let state = settle(handle, failed, RendererKey::default()).await?;
    if !resume {
        return Ok(state);
    }

    let expected = match strategy {
        ResumeStrategy::Remount => state.renderer_key.next(),
        ResumeStrategy::Keep => state.renderer_key,
    };
    handle.set_app_state(AppState::Background).await?;
    handle.set_app_state(AppState::Active).await?;
    settle(handle, failed, expected).await
}

/// Wait until renderer instance `key` reports its height.
async fn settle(
    handle: &SessionHandle,
    failed: &Notify,
    key: RendererKey,
) -> Result<RenderState, AppError> {
    let measured =
        handle.wait_for(|state| state.phase == RenderPhase::Measured && state.renderer_key == key);

    tokio::time::timeout(PREVIEW_TIMEOUT, async {
        tokio::select! {
            state = measured => state.map_err(AppError::from),
            _ = failed.notified() => Err(AppError::validation("document failed to compile")),
        }
    })
    .await
    .map_err(|_| AppError::unexpected("renderer did not report a height in time"))?
}
