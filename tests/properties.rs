use std::sync::Arc;

use markview::application::codec::{self, Message};
use markview::application::compiler::rewrite_legacy_demo;
use markview::application::lifecycle::{LifecycleController, RendererCapabilities};
use markview::application::session::{
    ApplyOutcome, MessageOutcome, NoopHostBridge, RenderSession, RendererEvent,
};
use markview::domain::document::{CompiledDocument, DocumentRequest};
use markview::domain::state::RendererKey;
use markview::infra::sandbox::ChannelRenderer;
use proptest::prelude::*;
use serde_json::json;

fn controller() -> LifecycleController<ChannelRenderer> {
    let (renderer, _commands) = ChannelRenderer::channel();
    LifecycleController::new(
        RenderSession::new(renderer, Arc::new(NoopHostBridge)),
        RendererCapabilities::default(),
    )
}

fn completion_orders() -> impl Strategy<Value = Vec<usize>> {
    (1usize..8).prop_flat_map(|len| Just((0..len).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #[test]
    fn legacy_demo_is_rewritten_once(
        content in "[A-Za-z0-9 .,!]{1,12}(\n[A-Za-z0-9 .,!]{1,12}){0,3}",
        rest in "[A-Za-z#][A-Za-z ]{0,12}",
    ) {
        let tail = format!("{rest}\n\n[demo]again[/demo]\n\n");
        let input = format!("[demo]{content}[/demo]\n\n{tail}");

        let mut expected = String::from("[[IO-DEMO]]\n");
        for line in content.split('\n') {
            expected.push_str("| ");
            expected.push_str(line);
            expected.push('\n');
        }
        expected.push_str(&tail);

        prop_assert_eq!(rewrite_legacy_demo(&input), expected);
    }

    #[test]
    fn only_the_last_request_is_applied(order in completion_orders()) {
        let mut controller = controller();
        let jobs: Vec<_> = (0..order.len())
            .map(|index| {
                controller
                    .submit(DocumentRequest::new(format!("doc {index}")))
                    .expect("distinct markup compiles")
            })
            .collect();

        let mut mounted = 0;
        for index in order.iter().copied() {
            let job = &jobs[index];
            let outcome = controller.apply_compiled(
                job.generation,
                Ok(CompiledDocument::new(job.markup.clone())),
            );
            if outcome == ApplyOutcome::Mounted {
                mounted += 1;
                prop_assert_eq!(index, order.len() - 1);
            }
        }

        prop_assert_eq!(mounted, 1);
        let last = format!("doc {}", order.len() - 1);
        prop_assert_eq!(
            controller.state().document.as_ref().map(CompiledDocument::html),
            Some(last.as_str())
        );
    }

    #[test]
    fn repeated_markup_is_not_recompiled(markup in ".{0,40}", repeats in 1usize..5) {
        let mut controller = controller();
        prop_assert!(controller.submit(DocumentRequest::new(markup.clone())).is_some());
        for _ in 0..repeats {
            prop_assert!(controller.submit(DocumentRequest::new(markup.clone())).is_none());
        }
        prop_assert_eq!(controller.state().renderer_key, RendererKey::default());
    }

    #[test]
    fn stale_resize_never_changes_height(height in 0.0f64..10_000.0, reloads in 1u64..4) {
        let mut controller = controller();
        let job = controller.submit(DocumentRequest::new("body")).expect("compiles");
        controller.apply_compiled(job.generation, Ok(CompiledDocument::new("<p>body</p>")));
        for _ in 0..reloads {
            controller.reload();
        }
        let current = controller.state().renderer_key;

        for stale in 0..current.get() {
            let outcome = controller.renderer_event(RendererEvent::Message {
                key: RendererKey::new(stale),
                raw: Message::resize(height).to_wire(),
            });
            prop_assert!(matches!(outcome, Some(MessageOutcome::Dropped(_))));
            prop_assert_eq!(controller.state().content_height, 0.0);
        }
    }

    #[test]
    fn script_shaped_messages_are_classified(href in "[ -~]{0,40}", height in 0.0f64..1e6) {
        let link = json!({ "type": "LINK_MESSAGE", "payload": { "href": href } }).to_string();
        let resize = json!({ "type": "RESIZE_MESSAGE", "payload": { "height": height } }).to_string();

        prop_assert_eq!(codec::decode(&link).ok(), Some(Message::link(href.clone())));
        prop_assert_eq!(codec::decode(&resize).ok(), Some(Message::resize(height)));
    }

    #[test]
    fn non_objects_never_decode(value in prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        ".{0,20}".prop_map(|s| json!(s)),
        prop::collection::vec(any::<bool>(), 0..4).prop_map(|v| json!(v)),
        Just(json!(null)),
    ]) {
        prop_assert!(codec::decode(&value.to_string()).is_err());
    }
}
