//! HTML page rendering
//!
//! The page is bundled at compile time; the result line is spliced into a
//! `{{RESULT}}` placeholder. Both the index route and the upload route render
//! the same page, with and without a result.

use axum::response::Html;

const INDEX_TEMPLATE: &str = include_str!("index.html");

/// Render the main page with the given result line (may be empty).
pub fn render_index(result: &str) -> Html<String> {
    Html(INDEX_TEMPLATE.replace("{{RESULT}}", &escape(result)))
}

/// Minimal HTML escaping for text spliced into the page.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_splices_result() {
        let page = render_index("Predicted Species: Fulica atra").0;
        assert!(page.contains("Predicted Species: Fulica atra"));
        assert!(!page.contains("{{RESULT}}"));
    }

    #[test]
    fn test_render_empty_result() {
        let page = render_index("").0;
        assert!(!page.contains("{{RESULT}}"));
        assert!(page.contains("<form action=\"/upload\""));
    }

    #[test]
    fn test_escape_markup() {
        assert_eq!(escape("<b>&\"'"), "&lt;b&gt;&amp;&quot;&#39;");
    }
}
