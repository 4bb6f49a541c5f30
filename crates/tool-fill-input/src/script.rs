//! Page scripts for the fill strategies.
//!
//! Each script resolves the element by handle and answers
//! `{ status: 'ok' | 'stale' | 'declined', reason? }`.

use action_locator::script::{js_literal, with_prelude};

use crate::model::FillStrategy;

const FILL_HELPERS: &str = r#"
const isValueElement = (el) => el.tagName === 'TEXTAREA' || el.tagName === 'INPUT';
const focusEl = (el) => {
    try { el.scrollIntoView({ block: 'center' }); } catch (err) {}
    el.focus();
};
const selectAll = (el) => {
    if (isValueElement(el)) {
        el.select();
        return;
    }
    const range = document.createRange();
    range.selectNodeContents(el);
    const sel = window.getSelection();
    sel.removeAllRanges();
    sel.addRange(range);
};
const announce = (el, text) => {
    el.dispatchEvent(new InputEvent('input', { bubbles: true, inputType: 'insertText', data: text }));
};
"#;

fn wrap(handle: &str, text: &str, body: &str) -> String {
    with_prelude(&format!(
        r#"{helpers}
const el = findHandle({handle});
if (!el) return {{ status: 'stale' }};
const text = {text};
{body}"#,
        helpers = FILL_HELPERS,
        handle = js_literal(handle),
        text = js_literal(text),
        body = body,
    ))
}

const NATIVE_SETTER: &str = r#"
if (!isValueElement(el)) return { status: 'declined', reason: 'not a value element' };
const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
const descriptor = Object.getOwnPropertyDescriptor(proto, 'value');
if (!descriptor || !descriptor.set) return { status: 'declined', reason: 'no native setter' };
focusEl(el);
descriptor.set.call(el, text);
announce(el, text);
el.dispatchEvent(new Event('change', { bubbles: true }));
return { status: 'ok' };"#;

const EXEC_COMMAND: &str = r#"
focusEl(el);
selectAll(el);
const done = document.execCommand('insertText', false, text);
if (!done) return { status: 'declined', reason: 'execCommand refused' };
return { status: 'ok' };"#;

const CLIPBOARD_PASTE: &str = r#"
focusEl(el);
selectAll(el);
const data = new DataTransfer();
data.setData('text/plain', text);
const evt = new ClipboardEvent('paste', { clipboardData: data, bubbles: true, cancelable: true });
el.dispatchEvent(evt);
return { status: 'ok' };"#;

const DIRECT_DOM: &str = r#"
if (!el.isContentEditable) return { status: 'declined', reason: 'not contenteditable' };
focusEl(el);
while (el.firstChild) el.removeChild(el.firstChild);
for (const line of text.split('\n')) {
    const p = document.createElement('p');
    if (line) {
        p.textContent = line;
    } else {
        p.appendChild(document.createElement('br'));
    }
    el.appendChild(p);
}
announce(el, text);
return { status: 'ok' };"#;

// Leaves the current content selected so trusted input replaces it.
const PREPARE_INSERT: &str = r#"
focusEl(el);
selectAll(el);
return { status: 'ok' };"#;

/// Script performing `strategy`. For [`FillStrategy::CdpInsertText`] this is
/// only the focus/select step; the text itself goes through `Input.insertText`.
pub fn fill_script(strategy: FillStrategy, handle: &str, text: &str) -> String {
    match strategy {
        FillStrategy::NativeSetter => wrap(handle, text, NATIVE_SETTER),
        FillStrategy::ExecCommand => wrap(handle, text, EXEC_COMMAND),
        FillStrategy::ClipboardPaste => wrap(handle, text, CLIPBOARD_PASTE),
        FillStrategy::DirectDom => wrap(handle, text, DIRECT_DOM),
        FillStrategy::CdpInsertText => wrap(handle, "", PREPARE_INSERT),
    }
}
