//! Rewrite of the retired `[demo]` tag into the custom-block syntax.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static LEGACY_DEMO_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[demo\]([\s\S]+?)\[/demo\]\s*\n{2,}").expect("legacy demo pattern is valid")
});

pub(crate) const DEMO_BLOCK_HEADER: &str = "[[IO-DEMO]]";

/// Convert a leading `[demo]...[/demo]` run into an `[[IO-DEMO]]` block.
///
/// Only a match anchored at the very start of the input is rewritten, and at
/// most once; already converted markup starts with the block header and is
/// returned untouched.
pub fn rewrite_legacy_demo(markup: &str) -> Cow<'_, str> {
    LEGACY_DEMO_TAG.replacen(markup, 1, |caps: &Captures<'_>| {
        let mut block = String::with_capacity(caps[1].len() + DEMO_BLOCK_HEADER.len() + 8);
        block.push_str(DEMO_BLOCK_HEADER);
        block.push('\n');
        for line in caps[1].split('\n') {
            block.push_str("| ");
            block.push_str(line);
            block.push('\n');
        }
        block
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_single_line_demo() {
        assert_eq!(
            rewrite_legacy_demo("[demo]Hello[/demo]\n\n"),
            "[[IO-DEMO]]\n| Hello\n"
        );
    }

    #[test]
    fn keeps_following_markup() {
        assert_eq!(
            rewrite_legacy_demo("[demo]Hi[/demo]  \n\n\n# Title\n"),
            "[[IO-DEMO]]\n| Hi\n# Title\n"
        );
    }

    #[test]
    fn quotes_every_content_line() {
        assert_eq!(
            rewrite_legacy_demo("[demo]first\nsecond[/demo]\n\nrest"),
            "[[IO-DEMO]]\n| first\n| second\nrest"
        );
    }

    #[test]
    fn requires_two_newlines_after_closing_tag() {
        let markup = "[demo]Hello[/demo]\nrest";
        assert!(matches!(rewrite_legacy_demo(markup), Cow::Borrowed(_)));
    }

    #[test]
    fn only_matches_at_start() {
        let markup = "intro\n[demo]Hello[/demo]\n\n";
        assert_eq!(rewrite_legacy_demo(markup), markup);
    }

    #[test]
    fn rewrites_at_most_once() {
        let markup = "[demo]a[/demo]\n\n[demo]b[/demo]\n\n";
        assert_eq!(
            rewrite_legacy_demo(markup),
            "[[IO-DEMO]]\n| a\n[demo]b[/demo]\n\n"
        );
    }

    #[test]
    fn converted_markup_is_stable() {
        let once = rewrite_legacy_demo("[demo]Hello[/demo]\n\nbody").into_owned();
        assert_eq!(rewrite_legacy_demo(&once), once);
    }

    #[test]
    fn empty_demo_is_not_rewritten() {
        let markup = "[demo][/demo]\n\n";
        assert_eq!(rewrite_legacy_demo(markup), markup);
    }
}
