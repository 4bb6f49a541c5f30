use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use action_locator::{ElementKind, ElementRole, LocatedElement, LocatorError};
use async_trait::async_trait;
use cdp_adapter::PageId;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tool_fill_input::{
    fill_verified, ApplyAck, AttemptResult, FillError, FillOutcome, FillPolicy, FillPort,
    FillStrategy, Verification,
};

type Reaction = Box<dyn Fn(FillStrategy, &str) -> (ApplyAck, Option<String>) + Send + Sync>;

/// An input that reacts to each strategy the way a particular editor would.
struct SimulatedField {
    /// Kind seen by each locate; `None` means absent. The last entry repeats.
    appearances: Mutex<VecDeque<Option<ElementKind>>>,
    react: Reaction,
    content: Mutex<String>,
    stale_reads: Mutex<u32>,
    locates: Mutex<u32>,
}

impl SimulatedField {
    fn new(appearances: Vec<Option<ElementKind>>, react: Reaction) -> Self {
        Self {
            appearances: Mutex::new(appearances.into()),
            react,
            content: Mutex::new(String::new()),
            stale_reads: Mutex::new(0),
            locates: Mutex::new(0),
        }
    }

    fn stale_for(self, reads: u32) -> Self {
        *self.stale_reads.lock().unwrap() = reads;
        self
    }

    fn locates(&self) -> u32 {
        *self.locates.lock().unwrap()
    }
}

#[async_trait]
impl FillPort for SimulatedField {
    async fn locate(&self) -> Result<Option<LocatedElement>, LocatorError> {
        *self.locates.lock().unwrap() += 1;
        let mut queue = self.appearances.lock().unwrap();
        let kind = if queue.len() > 1 {
            queue.pop_front().flatten()
        } else {
            queue.front().copied().flatten()
        };
        Ok(kind.map(|kind| LocatedElement {
            page: PageId::new(),
            role: ElementRole::MessageInput,
            handle: "sim-0-0".into(),
            selector: "#prompt-textarea".into(),
            candidate: 0,
            kind,
            shadow_depth: 0,
            visible: true,
            enabled: true,
            text: String::new(),
        }))
    }

    async fn apply(
        &self,
        _element: &LocatedElement,
        strategy: FillStrategy,
        text: &str,
    ) -> Result<ApplyAck, LocatorError> {
        let (ack, content) = (self.react)(strategy, text);
        if let Some(content) = content {
            *self.content.lock().unwrap() = content;
        }
        Ok(ack)
    }

    async fn read_back(&self, _element: &LocatedElement) -> Result<Option<String>, LocatorError> {
        let mut stale = self.stale_reads.lock().unwrap();
        if *stale > 0 {
            *stale -= 1;
            return Ok(None);
        }
        Ok(Some(self.content.lock().unwrap().clone()))
    }
}

fn quick_policy(attempts: u32) -> FillPolicy {
    FillPolicy {
        attempts,
        retry_delay_ms: 800,
        settle_ms: 0,
        max_text_len: 10_000,
    }
}

const MESSAGE: &str = "Please summarize the main points from Example (https://example.com).\nhttps://example.com";

#[tokio::test]
async fn controlled_textarea_takes_native_setter() {
    let field = SimulatedField::new(
        vec![Some(ElementKind::TextArea)],
        Box::new(|strategy, text| match strategy {
            FillStrategy::NativeSetter => (ApplyAck::Applied, Some(text.to_string())),
            _ => (ApplyAck::Applied, None),
        }),
    );
    let report = fill_verified(&field, MESSAGE, &quick_policy(3), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report.outcome,
        FillOutcome::Verified {
            strategy: FillStrategy::NativeSetter,
            attempt: 1
        }
    );
    assert_eq!(report.attempts_used, 1);
    assert_eq!(report.trail.len(), 1);
}

#[tokio::test]
async fn rich_editor_ignoring_exec_command_accepts_paste() {
    // Paste lands as paragraphs with NBSP, as ProseMirror renders it.
    let field = SimulatedField::new(
        vec![Some(ElementKind::ContentEditable)],
        Box::new(|strategy, text| match strategy {
            FillStrategy::ClipboardPaste => (
                ApplyAck::Applied,
                Some(text.replace('\n', "\n\n").replacen(' ', "\u{00A0}", 2)),
            ),
            _ => (ApplyAck::Applied, None),
        }),
    );
    let report = fill_verified(&field, MESSAGE, &quick_policy(3), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.strategy(), Some(FillStrategy::ClipboardPaste));
    assert_eq!(report.trail.len(), 2);
    assert_eq!(report.trail[0].strategy, Some(FillStrategy::ExecCommand));
    assert_eq!(
        report.trail[0].result,
        AttemptResult::Observed {
            verification: Verification::Empty
        }
    );
}

#[tokio::test]
async fn declined_strategies_fall_through_to_trusted_input() {
    let field = SimulatedField::new(
        vec![Some(ElementKind::TextInput)],
        Box::new(|strategy, text| match strategy {
            FillStrategy::CdpInsertText => (ApplyAck::Applied, Some(text.to_string())),
            _ => (ApplyAck::Declined("refused".into()), None),
        }),
    );
    let report = fill_verified(&field, "hello", &quick_policy(1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.strategy(), Some(FillStrategy::CdpInsertText));
    assert!(matches!(
        report.trail[0].result,
        AttemptResult::Declined { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn missing_input_retries_with_fixed_delay() {
    let field = SimulatedField::new(vec![None], Box::new(|_, _| (ApplyAck::Applied, None)));
    let started = Instant::now();
    let report = fill_verified(&field, MESSAGE, &quick_policy(3), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.outcome, FillOutcome::TargetMissing);
    assert_eq!(report.attempts_used, 3);
    assert_eq!(field.locates(), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(1600));
    assert!(report
        .trail
        .iter()
        .all(|line| line.result == AttemptResult::TargetMissing));
}

#[tokio::test(start_paused = true)]
async fn late_rendered_input_is_found_on_retry() {
    let field = SimulatedField::new(
        vec![None, Some(ElementKind::ContentEditable)],
        Box::new(|strategy, text| match strategy {
            FillStrategy::ExecCommand => (ApplyAck::Applied, Some(text.to_string())),
            _ => (ApplyAck::Applied, None),
        }),
    );
    let report = fill_verified(&field, MESSAGE, &quick_policy(3), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report.outcome,
        FillOutcome::Verified {
            strategy: FillStrategy::ExecCommand,
            attempt: 2
        }
    );
    assert_eq!(field.locates(), 2);
}

#[tokio::test(start_paused = true)]
async fn truncating_editor_ends_unverified() {
    let field = SimulatedField::new(
        vec![Some(ElementKind::TextArea)],
        Box::new(|_, text| (ApplyAck::Applied, Some(text.chars().take(5).collect()))),
    );
    let report = fill_verified(&field, "hello world", &quick_policy(2), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report.outcome,
        FillOutcome::Unverified {
            last: Some(Verification::Mismatch {
                expected_len: 11,
                observed_len: 5
            })
        }
    );
    // Three value-element strategies on each of two attempts.
    assert_eq!(report.trail.len(), 6);
    assert_eq!(report.trail[5].attempt, 2);
}

#[tokio::test(start_paused = true)]
async fn stale_handle_ends_attempt_and_relocates() {
    let field = SimulatedField::new(
        vec![Some(ElementKind::ContentEditable)],
        Box::new(|strategy, text| match strategy {
            FillStrategy::ExecCommand => (ApplyAck::Applied, Some(text.to_string())),
            _ => (ApplyAck::Applied, None),
        }),
    )
    .stale_for(1);
    let report = fill_verified(&field, MESSAGE, &quick_policy(3), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.trail[0].result, AttemptResult::Stale);
    assert_eq!(
        report.outcome,
        FillOutcome::Verified {
            strategy: FillStrategy::ExecCommand,
            attempt: 2
        }
    );
    assert_eq!(field.locates(), 2);
}

#[tokio::test(start_paused = true)]
async fn button_match_is_skipped_until_a_real_input_appears() {
    let field = SimulatedField::new(
        vec![Some(ElementKind::Button), Some(ElementKind::TextArea)],
        Box::new(|_, text| (ApplyAck::Applied, Some(text.to_string()))),
    );
    let report = fill_verified(&field, "hi", &quick_policy(2), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report.trail[0].result,
        AttemptResult::NotFillable {
            kind: ElementKind::Button
        }
    );
    assert!(report.is_verified());
}

#[tokio::test]
async fn oversized_text_fails_before_touching_the_page() {
    let field = SimulatedField::new(
        vec![Some(ElementKind::TextArea)],
        Box::new(|_, _| (ApplyAck::Applied, None)),
    );
    let policy = FillPolicy {
        max_text_len: 4,
        ..quick_policy(1)
    };
    let err = fill_verified(&field, "hello", &policy, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FillError::TextTooLong(4)));
    assert_eq!(field.locates(), 0);
}

#[tokio::test]
async fn cancelled_fill_stops_immediately() {
    let field = SimulatedField::new(
        vec![Some(ElementKind::TextArea)],
        Box::new(|_, _| (ApplyAck::Applied, None)),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = fill_verified(&field, "hello", &quick_policy(3), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, FillError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_retry_delay() {
    let field = SimulatedField::new(vec![None], Box::new(|_, _| (ApplyAck::Applied, None)));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let err = fill_verified(&field, "hello", &quick_policy(3), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, FillError::Cancelled));
    assert_eq!(field.locates(), 1);
}
