//! Fixed HTML document skeleton wrapped around the rendered body.

use std::fmt::Write as _;

use crate::config::{
    ANDROID_FONT_ROOT, DEFAULT_DEMO_BACKGROUND, DEFAULT_ICON_SIZE, DEFAULT_LINK_COLOR,
    DEFAULT_LINK_WEIGHT, DEFAULT_TEXT_COLOR, FontSettings, ThemeSettings,
};

use super::blocks::BlockRegistry;

const VIEWPORT_META: &str =
    r#"<meta name="viewport" content="initial-scale=1.0, width=device-width" />"#;
const REGULAR_FONT_FILE: &str = "TitilliumWeb-Regular.ttf";
const BOLD_FONT_FILE: &str = "TitilliumWeb-Bold.ttf";
const ICON_FONT_FILE: &str = "io-icon-font.ttf";

/// Host theme constants embedded in the global style block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTheme {
    pub text_color: String,
    pub link_color: String,
    pub link_weight: String,
    pub icon_size: u32,
    pub demo_background: String,
}

impl Default for DocumentTheme {
    fn default() -> Self {
        Self {
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            link_color: DEFAULT_LINK_COLOR.to_string(),
            link_weight: DEFAULT_LINK_WEIGHT.to_string(),
            icon_size: DEFAULT_ICON_SIZE,
            demo_background: DEFAULT_DEMO_BACKGROUND.to_string(),
        }
    }
}

impl From<&ThemeSettings> for DocumentTheme {
    fn from(settings: &ThemeSettings) -> Self {
        Self {
            text_color: settings.text_color.clone(),
            link_color: settings.link_color.clone(),
            link_weight: settings.link_weight.clone(),
            icon_size: settings.icon_size,
            demo_background: settings.demo_background.clone(),
        }
    }
}

/// Font file URLs referenced by `@font-face` rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontAssets {
    pub regular: String,
    pub bold: String,
    pub icon: String,
}

impl FontAssets {
    /// Resolve the bundled font files under `root` (a directory or URL prefix).
    pub fn under(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            regular: format!("{root}/{REGULAR_FONT_FILE}"),
            bold: format!("{root}/{BOLD_FONT_FILE}"),
            icon: format!("{root}/{ICON_FONT_FILE}"),
        }
    }
}

impl Default for FontAssets {
    fn default() -> Self {
        Self::under(ANDROID_FONT_ROOT)
    }
}

impl From<&FontSettings> for FontAssets {
    fn from(settings: &FontSettings) -> Self {
        Self::under(&settings.font_root)
    }
}

/// Pre-built document shell; only the body and the style override vary per
/// compile.
#[derive(Debug, Clone)]
pub struct DocumentTemplate {
    global_css: String,
}

impl DocumentTemplate {
    pub fn new(theme: &DocumentTheme, fonts: &FontAssets, blocks: &BlockRegistry) -> Self {
        Self {
            global_css: global_css(theme, fonts, blocks),
        }
    }

    pub fn global_css(&self) -> &str {
        &self.global_css
    }

    pub fn render(&self, body_html: &str, style_override: Option<&str>) -> String {
        let mut document = String::with_capacity(
            self.global_css.len() + body_html.len() + style_override.map_or(0, str::len) + 256,
        );
        document.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        document.push_str(VIEWPORT_META);
        document.push_str("\n<style>\n");
        document.push_str(&self.global_css);
        document.push_str("</style>\n");
        if let Some(style) = style_override.filter(|style| !style.is_empty()) {
            document.push_str("<style>\n");
            document.push_str(style);
            document.push_str("\n</style>\n");
        }
        document.push_str("</head>\n<body>\n");
        document.push_str(body_html);
        document.push_str("</body>\n</html>\n");
        document
    }
}

fn global_css(theme: &DocumentTheme, fonts: &FontAssets, blocks: &BlockRegistry) -> String {
    let mut css = format!(
        r#"@font-face {{
  font-family: 'Titillium Web';
  font-style: normal;
  font-weight: normal;
  src: url('{regular}');
}}
@font-face {{
  font-family: 'Titillium Web';
  font-style: normal;
  font-weight: bold;
  src: url('{bold}');
}}
@font-face {{
  font-family: 'io-icon-font';
  font-weight: normal;
  font-style: normal;
  src: url('{icon}');
}}
body {{
  margin: 0;
  padding: 0;
  color: {text_color};
  font-size: 16px;
  font-family: 'Titillium Web';
}}
h1, h2, h3, h4, h5, h6 {{
  line-height: 1.3333em;
}}
p {{
  margin-block-start: 0;
}}
ul, ol {{
  padding-left: 32px;
}}
a {{
  font-weight: {link_weight};
  color: {link_color};
}}
"#,
        regular = fonts.regular,
        bold = fonts.bold,
        icon = fonts.icon,
        text_color = theme.text_color,
        link_weight = theme.link_weight,
        link_color = theme.link_color,
    );

    for class in blocks.classes() {
        // Writing into a String cannot fail.
        let _ = write!(
            css,
            r#"div.custom-block.{class} {{
  background-color: {background};
  border-radius: 4px;
  margin-bottom: 32px;
  padding: 4px 8px;
}}
div.custom-block.{class} .custom-block-body {{
  position: relative;
  padding-right: 48px;
  display: flex;
  flex-direction: column;
  justify-content: center;
  font-weight: bold;
}}
div.custom-block.{class} .custom-block-body::after {{
  position: absolute;
  right: 0;
  font-family: 'io-icon-font';
  font-size: {icon_size}px;
  font-weight: normal;
  content: "\50";
}}
"#,
            background = theme.demo_background,
            icon_size = theme.icon_size,
        );
    }

    css
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> DocumentTemplate {
        DocumentTemplate::new(
            &DocumentTheme::default(),
            &FontAssets::under("/bundle/"),
            &BlockRegistry::default(),
        )
    }

    #[test]
    fn wraps_body_in_document_skeleton() {
        let html = template().render("<p>Hi</p>\n", None);

        assert!(html.starts_with("<!DOCTYPE html>\n<html>\n<head>\n"));
        assert!(html.contains(VIEWPORT_META));
        assert!(html.ends_with("<body>\n<p>Hi</p>\n</body>\n</html>\n"));
        assert_eq!(html.matches("<style>").count(), 1);
    }

    #[test]
    fn appends_style_override_after_global_css() {
        let html = template().render("", Some("p { color: red; }"));

        let global = html.find("@font-face").expect("global css present");
        let custom = html.find("p { color: red; }").expect("override present");
        assert!(global < custom);
        assert_eq!(html.matches("<style>").count(), 2);
    }

    #[test]
    fn empty_override_adds_no_style_block() {
        let html = template().render("", Some(""));
        assert_eq!(html.matches("<style>").count(), 1);
    }

    #[test]
    fn theme_and_fonts_are_embedded() {
        let css = template().global_css().to_string();

        assert!(css.contains("src: url('/bundle/TitilliumWeb-Regular.ttf');"));
        assert!(css.contains("src: url('/bundle/io-icon-font.ttf');"));
        assert!(css.contains("color: #0073E6;"));
        assert!(css.contains("font-weight: 600;"));
        assert!(css.contains("div.custom-block.io-demo-block {"));
        assert!(css.contains("font-size: 48px;"));
        assert!(css.contains(r#"content: "\50";"#));
    }

    #[test]
    fn fonts_default_to_android_asset_urls() {
        let fonts = FontAssets::default();
        assert_eq!(
            fonts.bold,
            "file:///android_asset/fonts/TitilliumWeb-Bold.ttf"
        );
    }
}
