//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CliArgs, Command, CompileArgs, DecodeArgs, LoginArgs, PreviewArgs, SettingsOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "markview";
const ENV_PREFIX: &str = "MARKVIEW";
pub(crate) const DEFAULT_TEXT_COLOR: &str = "#17324D";
pub(crate) const DEFAULT_LINK_COLOR: &str = "#0073E6";
pub(crate) const DEFAULT_LINK_WEIGHT: &str = "600";
pub(crate) const DEFAULT_ICON_SIZE: u32 = 48;
pub(crate) const DEFAULT_DEMO_BACKGROUND: &str = "#c1f4f2";
pub(crate) const ANDROID_FONT_ROOT: &str = "file:///android_asset/fonts";
pub(crate) const DEFAULT_DEMO_BLOCK: (&str, &str) = ("IO-DEMO", "io-demo-block");

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub theme: ThemeSettings,
    pub fonts: FontSettings,
    pub renderer: RendererSettings,
    pub blocks: BlockSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Host theme constants consumed by the document template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSettings {
    pub text_color: String,
    pub link_color: String,
    pub link_weight: String,
    pub icon_size: u32,
    pub demo_background: String,
}

/// Host platform; decides where bundled font files live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    /// Whether the platform's embedded renderer keeps painting a stale frame
    /// after the application returns from background.
    pub fn retains_stale_frames(self) -> bool {
        matches!(self, Platform::Ios)
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(format!("unknown platform `{other}` (expected android|ios)")),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => f.write_str("android"),
            Platform::Ios => f.write_str("ios"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSettings {
    pub platform: Platform,
    /// Directory holding the font files; a URL prefix on android, the main
    /// bundle path on ios.
    pub font_root: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererSettings {
    pub retains_stale_frames: bool,
}

/// Custom-block names recognised by the markup engine, mapped to CSS classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSettings {
    pub classes: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    theme: RawThemeSettings,
    fonts: RawFontSettings,
    renderer: RawRendererSettings,
    blocks: BTreeMap<String, String>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &SettingsOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(platform) = overrides.platform.as_ref() {
            self.fonts.platform = Some(platform.clone());
        }
        if let Some(path) = overrides.bundle_path.as_ref() {
            self.fonts.bundle_path = Some(path.clone());
        }
        if let Some(retains) = overrides.retains_stale_frames {
            self.renderer.retains_stale_frames = Some(retains);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            theme,
            fonts,
            renderer,
            blocks,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let theme = build_theme_settings(theme)?;
        let fonts = build_font_settings(fonts)?;
        let renderer = build_renderer_settings(renderer, fonts.platform);
        let blocks = build_block_settings(blocks)?;

        Ok(Self {
            logging,
            theme,
            fonts,
            renderer,
            blocks,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_theme_settings(theme: RawThemeSettings) -> Result<ThemeSettings, LoadError> {
    let text_color = css_value(theme.text_color, DEFAULT_TEXT_COLOR, "theme.text_color")?;
    let link_color = css_value(theme.link_color, DEFAULT_LINK_COLOR, "theme.link_color")?;
    let link_weight = css_value(theme.link_weight, DEFAULT_LINK_WEIGHT, "theme.link_weight")?;
    let demo_background = css_value(
        theme.demo_background,
        DEFAULT_DEMO_BACKGROUND,
        "theme.demo_background",
    )?;

    let icon_size = theme.icon_size.unwrap_or(DEFAULT_ICON_SIZE);
    if icon_size == 0 {
        return Err(LoadError::invalid(
            "theme.icon_size",
            "must be greater than zero",
        ));
    }

    Ok(ThemeSettings {
        text_color,
        link_color,
        link_weight,
        icon_size,
        demo_background,
    })
}

fn build_font_settings(fonts: RawFontSettings) -> Result<FontSettings, LoadError> {
    let platform = match fonts.platform {
        Some(value) => {
            Platform::from_str(&value).map_err(|reason| LoadError::invalid("fonts.platform", reason))?
        }
        None => Platform::Android,
    };

    let bundle_path = fonts
        .bundle_path
        .map(|path| path.to_string_lossy().trim().trim_end_matches('/').to_string())
        .filter(|path| !path.is_empty());

    let font_root = match (platform, bundle_path) {
        (Platform::Android, Some(path)) => path,
        (Platform::Android, None) => ANDROID_FONT_ROOT.to_string(),
        (Platform::Ios, Some(path)) => path,
        (Platform::Ios, None) => {
            return Err(LoadError::invalid(
                "fonts.bundle_path",
                "the main bundle path is required on ios",
            ));
        }
    };

    Ok(FontSettings {
        platform,
        font_root,
    })
}

fn build_renderer_settings(renderer: RawRendererSettings, platform: Platform) -> RendererSettings {
    RendererSettings {
        retains_stale_frames: renderer
            .retains_stale_frames
            .unwrap_or_else(|| platform.retains_stale_frames()),
    }
}

fn build_block_settings(blocks: BTreeMap<String, String>) -> Result<BlockSettings, LoadError> {
    if blocks.is_empty() {
        let (name, class) = DEFAULT_DEMO_BLOCK;
        return Ok(BlockSettings {
            classes: BTreeMap::from([(name.to_string(), class.to_string())]),
        });
    }

    let mut classes = BTreeMap::new();
    for (name, class) in blocks {
        let name = name.trim().to_ascii_uppercase();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(LoadError::invalid(
                "blocks",
                format!("block name `{name}` must be a single non-empty word"),
            ));
        }
        let class = class.trim().to_string();
        if class.is_empty()
            || !class
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(LoadError::invalid(
                "blocks",
                format!("class `{class}` for block `{name}` is not a valid CSS class name"),
            ));
        }
        classes.insert(name, class);
    }

    Ok(BlockSettings { classes })
}

fn css_value(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    let value = value
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| default.to_string());

    if value.is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    if value.contains(['<', '>', ';', '{', '}']) {
        return Err(LoadError::invalid(
            key,
            format!("`{value}` is not a plain CSS value"),
        ));
    }

    Ok(value)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawThemeSettings {
    text_color: Option<String>,
    link_color: Option<String>,
    link_weight: Option<String>,
    icon_size: Option<u32>,
    demo_background: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFontSettings {
    platform: Option<String>,
    bundle_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRendererSettings {
    retains_stale_frames: Option<bool>,
}
