//! Shell quoting.
//!
//! Every token placed into generated shell text goes through
//! [`shell_escape`], so a POSIX shell reads it back as exactly one word.

use std::borrow::Cow;

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '=' | '/' | ':' | '.' | ',' | '%' | '_')
}

/// Quote `s` for a POSIX shell.
///
/// Strings made only of safe characters are returned unchanged; everything
/// else is single-quoted, with embedded `'` written as `'\''`.
pub fn shell_escape(s: &str) -> Cow<'_, str> {
    if !s.is_empty() && s.chars().all(is_safe) {
        return Cow::Borrowed(s);
    }
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for c in s.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    Cow::Owned(quoted)
}

/// Quote each token and join them with single spaces.
pub fn join_escaped<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|t| shell_escape(t.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
