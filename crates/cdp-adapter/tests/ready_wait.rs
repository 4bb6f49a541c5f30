use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{
    wait_document_ready, AdapterError, AdapterErrorKind, Cdp, KeyPress, PageId,
    DEFAULT_READY_POLL,
};
use serde_json::{json, Value};

/// Answers `evaluate` from a queue; repeats the last answer once drained.
struct ScriptedStates {
    answers: Mutex<VecDeque<Result<Value, AdapterError>>>,
    last: Mutex<Option<Result<Value, AdapterError>>>,
    calls: Mutex<u32>,
}

impl ScriptedStates {
    fn new(answers: Vec<Result<Value, AdapterError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            last: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Cdp for ScriptedStates {
    async fn open_page(&self, _url: &str) -> Result<PageId, AdapterError> {
        Ok(PageId::new())
    }

    async fn active_page(&self) -> Result<PageId, AdapterError> {
        Ok(PageId::new())
    }

    async fn evaluate(&self, _page: PageId, expression: &str) -> Result<Value, AdapterError> {
        assert_eq!(expression, "document.readyState");
        *self.calls.lock().unwrap() += 1;
        let next = self.answers.lock().unwrap().pop_front();
        match next {
            Some(answer) => {
                *self.last.lock().unwrap() = Some(answer.clone());
                answer
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(Ok(Value::Null)),
        }
    }

    async fn insert_text(&self, _page: PageId, _text: &str) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn press_key(&self, _page: PageId, _key: KeyPress) -> Result<(), AdapterError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn waits_through_loading_and_interactive() {
    let cdp = ScriptedStates::new(vec![
        Ok(json!("loading")),
        Err(AdapterError::io("context destroyed")),
        Ok(json!("interactive")),
        Ok(json!("complete")),
    ]);
    wait_document_ready(&cdp, PageId::new(), Duration::from_secs(5), DEFAULT_READY_POLL)
        .await
        .expect("page becomes ready");
    assert_eq!(cdp.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn times_out_when_never_complete() {
    let cdp = ScriptedStates::new(vec![Ok(json!("loading"))]);
    let err = wait_document_ready(
        &cdp,
        PageId::new(),
        Duration::from_millis(1000),
        DEFAULT_READY_POLL,
    )
    .await
    .expect_err("never completes");
    assert_eq!(err.kind, AdapterErrorKind::NavTimeout);
    // Probes at 0, 300, 600 and 900ms; the next poll would overshoot the deadline.
    assert_eq!(cdp.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn vanished_page_counts_as_ready() {
    let cdp = ScriptedStates::new(vec![Err(AdapterError::page_not_found(PageId::new()))]);
    wait_document_ready(&cdp, PageId::new(), Duration::from_secs(1), DEFAULT_READY_POLL)
        .await
        .expect("gone tab resolves");
    assert_eq!(cdp.calls(), 1);
}
