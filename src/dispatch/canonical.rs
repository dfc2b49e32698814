//! Lexical path canonicalization.

/// Cleans `path` into its canonical form and reports whether it already was.
///
/// The canonical form starts with `/`, contains no empty, `.` or `..`
/// segments, and ends with `/`. `..` removes the segment before it and never
/// climbs above the root. Paths that do not start with `/` are treated as
/// rooted.
///
/// The returned flag is `true` only when the canonical form is byte-identical
/// to the input.
///
/// ```
/// use pathmux::canonicalize;
///
/// assert_eq!(canonicalize("/blog/"), ("/blog/".to_owned(), true));
/// assert_eq!(canonicalize("/blog"), ("/blog/".to_owned(), false));
/// assert_eq!(canonicalize("/a/./b/../c//"), ("/a/c/".to_owned(), false));
/// assert_eq!(canonicalize(""), ("/".to_owned(), false));
/// ```
pub fn canonicalize(path: &str) -> (String, bool) {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }

    let mut canonical = String::with_capacity(path.len() + 2);
    canonical.push('/');
    for segment in segments {
        canonical.push_str(segment);
        canonical.push('/');
    }

    let unchanged = canonical == path;
    (canonical, unchanged)
}
