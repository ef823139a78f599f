//! Callback wrapping for script-tag consumers.

/// Keep only the characters a callback expression may contain.
pub fn sanitize_callback(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']'))
        .collect()
}

/// Wrap a JSON document in a guarded call to `callback`.
///
/// U+2028 and U+2029 are legal in JSON strings but terminate lines in older
/// JavaScript parsers, so they are escaped.
pub fn wrap(callback: &str, json: &str) -> String {
    let body = json.replace('\u{2028}', "\\u2028").replace('\u{2029}', "\\u2029");
    format!("/**/ typeof {callback} === 'function' && {callback}({body});")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_allowed_characters() {
        assert_eq!(sanitize_callback("jQuery_123$.cb[0]"), "jQuery_123$.cb[0]");
    }

    #[test]
    fn sanitize_strips_everything_else() {
        assert_eq!(sanitize_callback("alert(1);//"), "alert1");
        assert_eq!(sanitize_callback("a b\"c'<d>"), "abcd");
        assert_eq!(sanitize_callback("();"), "");
        assert_eq!(sanitize_callback("cb\u{e9}"), "cb");
    }

    #[test]
    fn wrap_matches_express_format() {
        assert_eq!(
            wrap("cb", r#"{"a":1}"#),
            r#"/**/ typeof cb === 'function' && cb({"a":1});"#
        );
    }

    #[test]
    fn wrap_escapes_line_separators() {
        let wrapped = wrap("cb", "{\"s\":\"x\u{2028}y\u{2029}z\"}");
        assert!(wrapped.contains(r"x\u2028y\u2029z"));
        assert!(!wrapped.contains('\u{2028}'));
        assert!(!wrapped.contains('\u{2029}'));
    }
}
