//! Locator scripts evaluated in a real browser.
//!
//! These tests launch a headless Chromium and are skipped unless
//!
//! ```bash
//! export CHATRELAY_USE_REAL_CHROME=1
//! ```
//!
//! is set. `CHATRELAY_CHROME` may point at the browser binary.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use action_locator::{ElementLocator, ElementRole, ScriptLocator, SelectorChain};
use cdp_adapter::{Cdp, CdpConfig, ChromiumCdpAdapter, PageId};
use serde_json::Value;
use tempfile::TempDir;

const FIXTURE: &str = r#"(() => {
    document.body.innerHTML = `
        <div id="outer-host"></div>
        <textarea class="light"></textarea>
        <div id="prompt-textarea" class="ProseMirror" contenteditable="true">hello</div>
        <button id="send" disabled>Send</button>
    `;
    const outer = document.getElementById('outer-host').attachShadow({ mode: 'open' });
    outer.innerHTML = '<section><div id="inner-host"></div></section>';
    const inner = outer.getElementById('inner-host').attachShadow({ mode: 'open' });
    inner.innerHTML = '<textarea class="deep"></textarea>';
    inner.querySelector('textarea').value = 'deep text';
    return true;
})()"#;

fn real_chrome_enabled() -> bool {
    matches!(
        env::var("CHATRELAY_USE_REAL_CHROME")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

struct Fixture {
    _profile: TempDir,
    adapter: Arc<ChromiumCdpAdapter>,
    locator: ScriptLocator,
    page: PageId,
}

impl Fixture {
    async fn start() -> Self {
        let profile = TempDir::new().expect("profile dir");
        let mut cfg = CdpConfig {
            headless: true,
            user_data_dir: profile.path().to_path_buf(),
            websocket_url: None,
            ..CdpConfig::default()
        };
        if let Ok(path) = env::var("CHATRELAY_CHROME") {
            cfg.executable = PathBuf::from(path);
        }
        let adapter = ChromiumCdpAdapter::start(cfg).await.expect("launch chromium");
        let page = adapter.open_page("about:blank").await.expect("open page");
        let built = adapter.evaluate(page, FIXTURE).await.expect("build fixture");
        assert_eq!(built, Value::Bool(true));

        let cdp: Arc<dyn Cdp> = adapter.clone();
        Self {
            _profile: profile,
            adapter,
            locator: ScriptLocator::new(cdp),
            page,
        }
    }

    async fn stop(self) {
        self.adapter.shutdown().await;
    }
}

#[tokio::test]
async fn element_matched_by_two_candidates_keeps_a_live_handle() {
    if !real_chrome_enabled() {
        println!("Skipping real browser test (CHATRELAY_USE_REAL_CHROME not set)");
        return;
    }
    let fx = Fixture::start().await;
    let chain = SelectorChain::new(
        ElementRole::MessageInput,
        [
            r#"#prompt-textarea[contenteditable="true"]"#,
            r#"div.ProseMirror[contenteditable="true"]"#,
        ],
    );

    let matches = fx.locator.locate_all(fx.page, &chain).await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].handle, matches[1].handle);

    let found = fx.locator.locate(fx.page, &chain).await.unwrap().unwrap();
    assert_eq!(found.candidate, 0);
    assert_eq!(
        fx.locator.read_text(&found).await.unwrap().as_deref(),
        Some("hello")
    );
    fx.stop().await;
}

#[tokio::test]
async fn nested_shadow_match_comes_first_and_resolves_by_handle() {
    if !real_chrome_enabled() {
        println!("Skipping real browser test (CHATRELAY_USE_REAL_CHROME not set)");
        return;
    }
    let fx = Fixture::start().await;
    let chain = SelectorChain::new(ElementRole::MessageInput, ["textarea"]);

    let matches = fx.locator.locate_all(fx.page, &chain).await.unwrap();
    let depths: Vec<u32> = matches.iter().map(|m| m.shadow_depth).collect();
    assert_eq!(depths, vec![2, 0]);

    let found = fx.locator.locate(fx.page, &chain).await.unwrap().unwrap();
    assert_eq!(found.shadow_depth, 2);
    assert_eq!(
        fx.locator.read_text(&found).await.unwrap().as_deref(),
        Some("deep text")
    );
    fx.stop().await;
}

#[tokio::test]
async fn rejected_selector_is_skipped() {
    if !real_chrome_enabled() {
        println!("Skipping real browser test (CHATRELAY_USE_REAL_CHROME not set)");
        return;
    }
    let fx = Fixture::start().await;
    let chain = SelectorChain::new(ElementRole::MessageInput, ["#bad[", "textarea.light"]);

    let found = fx.locator.locate(fx.page, &chain).await.unwrap().unwrap();
    assert_eq!(found.candidate, 1);
    assert_eq!(found.selector, "textarea.light");
    assert_eq!(found.shadow_depth, 0);
    fx.stop().await;
}

#[tokio::test]
async fn disabled_and_removed_elements_are_reported() {
    if !real_chrome_enabled() {
        println!("Skipping real browser test (CHATRELAY_USE_REAL_CHROME not set)");
        return;
    }
    let fx = Fixture::start().await;

    let send = SelectorChain::new(ElementRole::SendButton, ["#send"]);
    let button = fx.locator.locate(fx.page, &send).await.unwrap().unwrap();
    assert!(!button.enabled);
    assert!(!fx.locator.click(&button).await.unwrap());

    let input = SelectorChain::new(ElementRole::MessageInput, ["textarea.light"]);
    let light = fx.locator.locate(fx.page, &input).await.unwrap().unwrap();
    fx.adapter
        .evaluate(fx.page, "document.querySelector('textarea.light').remove()")
        .await
        .unwrap();
    assert_eq!(fx.locator.read_text(&light).await.unwrap(), None);
    assert!(!fx.locator.click(&light).await.unwrap());
    fx.stop().await;
}
