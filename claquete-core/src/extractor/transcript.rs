use regex::Regex;

/// Reduces a subtitle file (SRT or VTT) to plain running text.
///
/// Drops headers, sequence numbers, timing lines and inline markup;
/// identical consecutive cues (common in auto captions) are kept once.
pub fn normalize_subtitles(raw: &str) -> String {
    let inline_tags = Regex::new(r"<[^>]+>").unwrap();
    let style_blocks = Regex::new(r"\{[^}]*\}").unwrap();

    let mut lines: Vec<String> = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("WEBVTT")
            || line.starts_with("NOTE")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.contains("-->")
            || line.chars().all(|ch| ch.is_ascii_digit())
        {
            continue;
        }
        let line = inline_tags.replace_all(line, "");
        let line = style_blocks.replace_all(&line, "");
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if lines.last().map(String::as_str) == Some(line) {
            continue;
        }
        lines.push(line.to_string());
    }
    lines.join(" ")
}
