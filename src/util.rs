// Downcase the string and remove any '-' or '_' characters; thus we can be
// a little flexible in what we match for argument names.
pub fn normalize_arg(arg: &str) -> String {
    arg.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn is_quoted_string(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('\"') && s.ends_with('\"')
}

/// Strips the surrounding quotes, or returns `None` if `s` isn't quoted.
pub fn dequote_string(s: &str) -> Option<&str> {
    if is_quoted_string(s) {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}
