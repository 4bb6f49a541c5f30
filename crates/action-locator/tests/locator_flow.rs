use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use action_locator::{
    ElementKind, ElementLocator, ElementRole, LocateOptions, LocatorError, ScriptLocator,
    SelectorChain,
};
use async_trait::async_trait;
use cdp_adapter::{AdapterError, Cdp, KeyPress, PageId};
use serde_json::{json, Value};

/// Replays queued `evaluate` results and records the expressions it saw.
#[derive(Default)]
struct ReplayCdp {
    replies: Mutex<VecDeque<Value>>,
    seen: Mutex<Vec<String>>,
}

impl ReplayCdp {
    fn with(replies: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Cdp for ReplayCdp {
    async fn open_page(&self, _url: &str) -> Result<PageId, AdapterError> {
        Ok(PageId::new())
    }

    async fn active_page(&self) -> Result<PageId, AdapterError> {
        Ok(PageId::new())
    }

    async fn evaluate(&self, _page: PageId, expression: &str) -> Result<Value, AdapterError> {
        self.seen.lock().unwrap().push(expression.to_string());
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| json!({ "status": "ok", "matches": [] })))
    }

    async fn insert_text(&self, _page: PageId, _text: &str) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn press_key(&self, _page: PageId, _key: KeyPress) -> Result<(), AdapterError> {
        Ok(())
    }
}

fn element(candidate: usize, handle: &str, kind: &str, visible: bool, text: &str) -> Value {
    json!({
        "candidate": candidate,
        "selector": format!("sel-{}", candidate),
        "handle": handle,
        "tag": "div",
        "kind": kind,
        "visible": visible,
        "enabled": true,
        "shadowDepth": 1,
        "text": text,
        "testid": null
    })
}

fn input_chain() -> SelectorChain {
    SelectorChain::new(
        ElementRole::MessageInput,
        ["#prompt-textarea", "div[contenteditable=\"true\"]", "textarea"],
    )
}

#[tokio::test]
async fn locate_prefers_ready_match_from_earliest_candidate() {
    let cdp = ReplayCdp::with(vec![json!({
        "status": "ok",
        "invalid": [],
        "matches": [
            element(0, "h-0-0", "contenteditable", false, ""),
            element(1, "h-1-0", "contenteditable", true, ""),
            element(2, "h-2-0", "textarea", true, ""),
        ]
    })]);
    let locator = ScriptLocator::new(cdp.clone());

    let found = locator
        .locate(PageId::new(), &input_chain())
        .await
        .unwrap()
        .expect("an element");
    assert_eq!(found.handle, "h-1-0");
    assert_eq!(found.kind, ElementKind::ContentEditable);
    assert_eq!(found.shadow_depth, 1);
    assert_eq!(found.role, ElementRole::MessageInput);

    let script = &cdp.seen()[0];
    assert!(script.contains("#prompt-textarea"));
    assert!(script.contains("shadowRoot"));
}

#[tokio::test]
async fn locate_by_text_and_list_texts() {
    let page = PageId::new();
    let options = json!({
        "status": "ok",
        "matches": [
            element(0, "o-0", "other", true, "GPT-4o\nGreat for most tasks"),
            element(0, "o-1", "other", false, "o1"),
            element(0, "o-2", "other", true, "o3-mini"),
            element(0, "o-3", "other", true, "o3-mini"),
        ]
    });
    let cdp = ReplayCdp::with(vec![options.clone(), options]);
    let locator = ScriptLocator::new(cdp);
    let chain = SelectorChain::new(ElementRole::ModelOption, ["[role=\"menuitem\"]"]);

    let hit = locator
        .locate_by_text(page, &chain, "O3-MINI")
        .await
        .unwrap()
        .expect("option present");
    assert_eq!(hit.handle, "o-2");

    let labels = locator.list_texts(page, &chain).await.unwrap();
    assert_eq!(labels, vec!["GPT-4o".to_string(), "o3-mini".to_string()]);
}

#[tokio::test]
async fn click_and_read_report_stale_handles() {
    let cdp = ReplayCdp::with(vec![
        json!({ "status": "ok", "matches": [element(0, "b-0", "button", true, "")] }),
        json!({ "status": "ok" }),
        json!({ "status": "stale" }),
        json!({ "status": "ok", "text": "hello" }),
        json!({ "status": "stale" }),
    ]);
    let locator = ScriptLocator::new(cdp.clone());
    let chain = SelectorChain::new(ElementRole::SendButton, ["button"]);
    let button = locator
        .locate(PageId::new(), &chain)
        .await
        .unwrap()
        .unwrap();

    assert!(locator.click(&button).await.unwrap());
    assert!(!locator.click(&button).await.unwrap());
    assert_eq!(
        locator.read_text(&button).await.unwrap().as_deref(),
        Some("hello")
    );
    assert_eq!(locator.read_text(&button).await.unwrap(), None);
    assert!(cdp.seen()[1].contains("\"b-0\""));
}

#[tokio::test(start_paused = true)]
async fn wait_for_polls_until_element_appears() {
    let empty = json!({ "status": "ok", "matches": [] });
    let cdp = ReplayCdp::with(vec![
        empty.clone(),
        empty,
        json!({ "status": "ok", "matches": [element(2, "late", "textarea", true, "")] }),
    ]);
    let locator = ScriptLocator::new(cdp.clone());
    let found = locator
        .wait_for(PageId::new(), &input_chain(), LocateOptions::default())
        .await
        .unwrap();
    assert_eq!(found.handle, "late");
    assert_eq!(cdp.seen().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn wait_for_times_out() {
    let cdp = ReplayCdp::with(vec![]);
    let locator = ScriptLocator::new(cdp);
    let err = locator
        .wait_for(
            PageId::new(),
            &input_chain(),
            LocateOptions::default().with_timeout(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LocatorError::Timeout(_)));
}

#[tokio::test]
async fn empty_chain_is_rejected_before_touching_the_page() {
    let cdp = ReplayCdp::with(vec![]);
    let locator = ScriptLocator::new(cdp.clone());
    let chain = SelectorChain::new(ElementRole::SendButton, Vec::<String>::new());
    let err = locator.locate(PageId::new(), &chain).await.unwrap_err();
    assert!(matches!(err, LocatorError::InvalidChain(_)));
    assert!(cdp.seen().is_empty());
}
