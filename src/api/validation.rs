/// Accepts `next` only when it is a path on this site, so the login view
/// cannot be used as an open redirect.
#[must_use]
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();

    if !next.starts_with('/') || next.starts_with("//") || next.starts_with("/\\") {
        return None;
    }

    if next.chars().any(char::is_control) {
        return None;
    }

    Some(next)
}
