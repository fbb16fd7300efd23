//! JSON Pointer (RFC 6901) helpers shared by the validator and the compiler.

/// Escape a single reference token (`~` → `~0`, `/` → `~1`).
#[must_use]
pub fn escape(token: &str) -> String {
    if token.contains(['~', '/']) {
        token.replace('~', "~0").replace('/', "~1")
    } else {
        token.to_string()
    }
}

/// Reverse of [`escape`].
#[must_use]
pub fn unescape(token: &str) -> String {
    if token.contains('~') {
        token.replace("~1", "/").replace("~0", "~")
    } else {
        token.to_string()
    }
}

/// Append one token to a pointer.
#[must_use]
pub fn join(base: &str, token: &str) -> String {
    let mut out = String::with_capacity(base.len() + token.len() + 1);
    out.push_str(base);
    out.push('/');
    out.push_str(&escape(token));
    out
}

/// Append an array index to a pointer.
#[must_use]
pub fn join_index(base: &str, index: usize) -> String {
    format!("{base}/{index}")
}
