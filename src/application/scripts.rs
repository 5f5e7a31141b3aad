//! Host → renderer injected commands.

use once_cell::sync::Lazy;

use super::codec::{LINK_MESSAGE, RESIZE_MESSAGE};

/// Bridge function exposed inside the sandbox for posting messages to the host.
pub const POST_MESSAGE_FN: &str = "window.ReactNativeWebView.postMessage";

static MEASURE_HEIGHT_SCRIPT: Lazy<String> = Lazy::new(|| {
    format!(
        r#"(function () {{
  var height = document.body.getBoundingClientRect().height;
  {POST_MESSAGE_FN}(JSON.stringify({{
    type: "{RESIZE_MESSAGE}",
    payload: {{ height: height }}
  }}));
}})();
true;
"#
    )
});

static INTERCEPT_LINKS_SCRIPT: Lazy<String> = Lazy::new(|| {
    format!(
        r#"(function () {{
  document.addEventListener("click", function (event) {{
    var target = event.target;
    while (target && target.tagName !== "A") {{
      target = target.parentElement;
    }}
    if (!target || !target.href) {{
      return;
    }}
    event.preventDefault();
    {POST_MESSAGE_FN}(JSON.stringify({{
      type: "{LINK_MESSAGE}",
      payload: {{ href: target.href }}
    }}));
  }}, true);
}})();
true;
"#
    )
});

/// The two fixed snippets the host may inject into a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectedScript {
    /// Measure `document.body` and post a resize message.
    MeasureHeight,
    /// Forward anchor clicks to the host instead of navigating the sandbox.
    InterceptLinks,
}

impl InjectedScript {
    /// Scripts injected once the renderer reports that its content painted.
    pub const ON_CONTENT_PAINTED: [InjectedScript; 2] =
        [InjectedScript::InterceptLinks, InjectedScript::MeasureHeight];

    pub fn source(self) -> &'static str {
        match self {
            InjectedScript::MeasureHeight => MEASURE_HEIGHT_SCRIPT.as_str(),
            InjectedScript::InterceptLinks => INTERCEPT_LINKS_SCRIPT.as_str(),
        }
    }

    /// Message type the script posts back to the host.
    pub fn posts(self) -> &'static str {
        match self {
            InjectedScript::MeasureHeight => RESIZE_MESSAGE,
            InjectedScript::InterceptLinks => LINK_MESSAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_post_their_message_type() {
        for script in InjectedScript::ON_CONTENT_PAINTED {
            let source = script.source();
            assert!(source.contains(POST_MESSAGE_FN));
            assert!(source.contains(&format!("type: \"{}\"", script.posts())));
            assert!(source.trim_end().ends_with("true;"));
        }
    }

    #[test]
    fn measure_script_reads_body_height() {
        let source = InjectedScript::MeasureHeight.source();
        assert!(source.contains("document.body.getBoundingClientRect().height"));
        assert!(source.contains("payload: { height: height }"));
    }

    #[test]
    fn link_script_prevents_navigation() {
        let source = InjectedScript::InterceptLinks.source();
        assert!(source.contains("event.preventDefault();"));
        assert!(source.contains("payload: { href: target.href }"));
    }
}
