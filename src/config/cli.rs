use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the markview binary.
#[derive(Debug, Parser)]
#[command(
    name = "markview",
    version,
    about = "Compile markdown for sandboxed renderers and inspect renderer traffic"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MARKVIEW_CONFIG_FILE", value_name = "PATH", global = true)]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: SettingsOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Compile a markdown file into a self-contained HTML document.
    Compile(CompileArgs),
    /// Decode a raw renderer message and print its classification.
    Decode(DecodeArgs),
    /// Classify a URL visited during the login flow.
    Login(LoginArgs),
    /// Drive a full render session against the headless sandbox.
    Preview(PreviewArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CompileArgs {
    /// Markdown file to compile.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,

    /// CSS file appended after the global style block.
    #[arg(long = "style", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub style: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct DecodeArgs {
    /// Raw message string as posted by the renderer.
    #[arg(value_name = "RAW")]
    pub raw: String,
}

#[derive(Debug, Args, Clone)]
pub struct LoginArgs {
    /// URL visited by the login page.
    #[arg(value_name = "URL")]
    pub url: String,
}

#[derive(Debug, Args, Clone)]
pub struct PreviewArgs {
    /// Markdown file to render.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,

    /// CSS file appended after the global style block.
    #[arg(long = "style", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub style: Option<PathBuf>,

    /// Present height changes with a smooth transition.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub animated: bool,

    /// Simulate a background/foreground cycle after the first measurement.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub resume: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SettingsOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the host platform (android|ios).
    #[arg(long = "platform", value_name = "PLATFORM", global = true)]
    pub platform: Option<String>,

    /// Override the directory holding bundled font files.
    #[arg(long = "bundle-path", value_name = "PATH", global = true)]
    pub bundle_path: Option<PathBuf>,

    /// Override whether the renderer keeps stale frames across backgrounding.
    #[arg(
        long = "retains-stale-frames",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub retains_stale_frames: Option<bool>,
}
