//! Caption HTML reduced to plain text lines.

const BREAKING_TAGS: &[&str] = &[
    "p", "br", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Split caption HTML into display lines. Block tags and `<br>` end a line,
/// every other tag is dropped, whitespace collapses like rendered HTML.
pub fn caption_lines(html: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = html.chars();

    while let Some(c) = chars.next() {
        if c != '<' {
            current.push(if c.is_whitespace() { ' ' } else { c });
            continue;
        }
        let tag: String = chars.by_ref().take_while(|&c| c != '>').collect();
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if BREAKING_TAGS.contains(&name.as_str()) {
            lines.push(std::mem::take(&mut current));
        }
    }
    lines.push(current);

    lines
        .into_iter()
        .map(|l| decode_entities(&l.split_whitespace().collect::<Vec<_>>().join(" ")))
        .filter(|l| !l.is_empty())
        .collect()
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
