//! Page-side scripts.
//!
//! Every script is a self-contained expression evaluated with
//! `Runtime.evaluate`. They share [`PRELUDE`], which provides a shadow-root
//! aware `deepQueryAll` and the handle helpers. Arguments are embedded as JSON
//! literals, never by string concatenation.

use serde::Serialize;

/// Attribute used to tag located elements.
pub const HANDLE_ATTR: &str = "data-chatrelay-handle";

/// Matches kept per candidate; broad fallbacks like `button, div` would
/// otherwise tag half the page.
pub const MAX_MATCHES_PER_CANDIDATE: usize = 50;

pub const PRELUDE: &str = r#"
const HANDLE_ATTR = 'data-chatrelay-handle';
const deepQueryAll = (selector) => {
    try {
        document.createDocumentFragment().querySelector(selector);
    } catch (err) {
        return { valid: false, matches: [] };
    }
    const out = [];
    const walk = (parent, depth) => {
        for (const el of parent.children) {
            if (el.matches(selector)) {
                out.push({ el, depth });
            }
            if (el.shadowRoot) {
                walk(el.shadowRoot, depth + 1);
            }
            walk(el, depth);
        }
    };
    walk(document, 0);
    return { valid: true, matches: out };
};
const findHandle = (handle) => {
    const hit = deepQueryAll('[' + HANDLE_ATTR + '="' + handle + '"]').matches[0];
    return hit ? hit.el : null;
};
const kindOf = (el) => {
    const tag = (el.tagName || '').toLowerCase();
    if (tag === 'textarea') return 'textarea';
    if (tag === 'input') {
        const type = (el.getAttribute('type') || 'text').toLowerCase();
        if (['button', 'submit', 'reset', 'image'].includes(type)) return 'button';
        if (['text', 'search', 'url', 'email', 'tel', ''].includes(type)) return 'text-input';
        return 'other';
    }
    if (el.isContentEditable) return 'contenteditable';
    if (tag === 'button' || (el.getAttribute('role') || '') === 'button') return 'button';
    return 'other';
};
const isVisible = (el) => {
    if (!(el instanceof Element)) return false;
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 || rect.height > 0 || el.getClientRects().length > 0;
};
const isEnabled = (el) => {
    if (el.disabled) return false;
    if ((el.getAttribute('aria-disabled') || '') === 'true') return false;
    if (el.readOnly) return false;
    return true;
};
const readText = (el) => {
    if ('value' in el && (el.tagName === 'TEXTAREA' || el.tagName === 'INPUT')) {
        return String(el.value || '');
    }
    return String(el.innerText || el.textContent || '');
};
"#;

/// Wrap `body` (statements ending in `return ...;`) in an async IIFE with the
/// prelude in scope.
pub fn with_prelude(body: &str) -> String {
    format!("(async () => {{\n{}\n{}\n}})()", PRELUDE, body)
}

/// Encode a value as a JavaScript literal.
pub fn js_literal<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Query every candidate, tag each match with `<token>-<candidate>-<n>` and
/// describe it. An element matched by several candidates keeps the handle of
/// the first one.
pub fn locate_script(candidates: &[String], token: &str) -> String {
    let body = format!(
        r#"
const candidates = {candidates};
const token = {token};
const limit = {limit};
const matches = [];
const invalid = [];
const tagged = new Map();
candidates.forEach((selector, ci) => {{
    const result = deepQueryAll(selector);
    if (!result.valid) {{
        invalid.push(ci);
        return;
    }}
    result.matches.slice(0, limit).forEach((hit, n) => {{
        const el = hit.el;
        let handle = tagged.get(el);
        if (!handle) {{
            handle = token + '-' + ci + '-' + n;
            el.setAttribute(HANDLE_ATTR, handle);
            tagged.set(el, handle);
        }}
        matches.push({{
            candidate: ci,
            selector,
            handle,
            tag: (el.tagName || '').toLowerCase(),
            kind: kindOf(el),
            visible: isVisible(el),
            enabled: isEnabled(el),
            shadowDepth: hit.depth,
            text: readText(el).trim().slice(0, 200),
            testid: el.getAttribute('data-testid')
        }});
    }});
}});
return {{ status: 'ok', matches, invalid }};"#,
        candidates = js_literal(candidates),
        token = js_literal(token),
        limit = MAX_MATCHES_PER_CANDIDATE,
    );
    with_prelude(&body)
}

/// Scroll a handle into view and click it.
pub fn click_script(handle: &str) -> String {
    let body = format!(
        r#"
const el = findHandle({handle});
if (!el) return {{ status: 'stale' }};
if (el.disabled || (el.getAttribute('aria-disabled') || '') === 'true') {{
    return {{ status: 'disabled' }};
}}
try {{ el.scrollIntoView({{ block: 'center', inline: 'center' }}); }} catch (err) {{}}
el.click();
return {{ status: 'ok' }};"#,
        handle = js_literal(handle),
    );
    with_prelude(&body)
}

/// Read the current text of a handle (`value` or `innerText`).
pub fn read_script(handle: &str) -> String {
    let body = format!(
        r#"
const el = findHandle({handle});
if (!el) return {{ status: 'stale' }};
return {{ status: 'ok', text: readText(el) }};"#,
        handle = js_literal(handle),
    );
    with_prelude(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_and_attr_agree() {
        assert!(PRELUDE.contains(&format!("const HANDLE_ATTR = '{}'", HANDLE_ATTR)));
    }

    #[test]
    fn candidates_are_embedded_as_json() {
        let script = locate_script(
            &[r#"button[aria-label="Send"]"#.to_string(), "textarea".to_string()],
            "tok",
        );
        assert!(script.contains(r#"["button[aria-label=\"Send\"]","textarea"]"#));
        assert!(script.contains(r#"const token = "tok";"#));
        assert!(script.starts_with("(async () => {"));
        assert!(script.trim_end().ends_with("})()"));
    }

    #[test]
    fn overlapping_candidates_share_one_tag() {
        let script = locate_script(&["#a".to_string(), "div".to_string()], "tok");
        let reuse = script.find("tagged.get(el)").unwrap();
        let tag = script.find("el.setAttribute(HANDLE_ATTR, handle)").unwrap();
        assert!(reuse < tag);
        assert_eq!(script.matches("setAttribute(").count(), 1);
    }

    #[test]
    fn shadow_roots_are_walked_where_their_host_sits() {
        let walk = PRELUDE.find("const walk").unwrap();
        let shadow = PRELUDE[walk..].find("walk(el.shadowRoot").unwrap();
        let children = PRELUDE[walk..].find("walk(el, depth)").unwrap();
        assert!(shadow < children);
        assert!(!PRELUDE.contains("querySelectorAll('*')"));
    }

    #[test]
    fn handles_are_escaped() {
        let script = read_script("a'b\"c");
        assert!(script.contains(r#"findHandle("a'b\"c")"#));
    }
}
