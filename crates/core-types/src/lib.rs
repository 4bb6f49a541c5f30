/// What was read from the page the user is looking at.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub selection: String,
    pub content: String,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = selection.into();
        self
    }

    /// Template variables exposed by a snapshot, keyed by placeholder name.
    pub fn template_vars(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("url", self.url.as_str()),
            ("title", self.title.as_str()),
            ("selection", self.selection.as_str()),
            ("content", self.content.as_str()),
        ]
    }

    /// Host part of the URL, lowercased. Empty when the URL has no authority.
    pub fn host(&self) -> String {
        host_of(&self.url)
    }
}

/// Extracts the host of an absolute URL without pulling a URL parser into
/// every crate.
pub fn host_of(raw: &str) -> String {
    let rest = match raw.split_once("://") {
        Some((_, rest)) => rest,
        None => return String::new(),
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host_port = authority.rsplit('@').next().unwrap_or("");
    let host = if host_port.starts_with('[') {
        host_port
            .split_once(']')
            .map(|(h, _)| format!("{}]", h))
            .unwrap_or_default()
    } else {
        host_port.split(':').next().unwrap_or("").to_string()
    };
    host.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_of_strips_port_and_credentials() {
        assert_eq!(host_of("https://User@Docs.Example.com:8443/a?b"), "docs.example.com");
        assert_eq!(host_of("http://[::1]:9222/json"), "[::1]");
        assert_eq!(host_of("about:blank"), "");
    }

    #[test]
    fn template_vars_cover_all_fields() {
        let page = PageSnapshot::new("https://a.test", "A")
            .with_content("body")
            .with_selection("sel");
        let vars = page.template_vars();
        assert!(vars.contains(&("content", "body")));
        assert!(vars.contains(&("selection", "sel")));
        assert_eq!(vars.len(), 4);
    }
}
