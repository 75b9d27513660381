use scraper::{Html, Node};

pub const MAX_LINES: usize = 2000;

const HIDDEN_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

/// Visible text of a rendered page, one text node per line.
///
/// Script, style and noscript content is dropped, every line is trimmed, blank lines are
/// removed and the result is capped at [`MAX_LINES`] lines.
pub fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut chunks = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        if node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| HIDDEN_ELEMENTS.contains(&element.name()))
        }) {
            continue;
        }
        chunks.push(&**text);
    }

    chunks
        .join("\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(MAX_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}
