/// Clean authored text using the ammonia library.
///
/// Whitelist-based: safe formatting tags survive, `<script>`, `<iframe>`
/// and event-handler attributes are stripped. Applied to quiz, question and
/// option text before it is stored, so every client renders it safely.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Cleans and trims; `None` stays `None`.
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input.map(|s| clean_html(s.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_keeps_formatting() {
        let cleaned = clean_html("<b>2 + 2</b><script>alert(1)</script>");
        assert_eq!(cleaned, "<b>2 + 2</b>");
    }

    #[test]
    fn optional_passthrough() {
        assert_eq!(clean_optional(None), None);
        assert_eq!(clean_optional(Some("  hi ")).as_deref(), Some("hi"));
    }
}
