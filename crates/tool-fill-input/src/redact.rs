/// Short preview of message text for logs.
pub fn preview(raw: &str, max_chars: usize) -> String {
    let flat = raw.replace(['\n', '\r'], " ");
    if flat.chars().count() > max_chars {
        let mut truncated: String = flat.chars().take(max_chars).collect();
        truncated.push_str("...");
        truncated
    } else {
        flat
    }
}
