//! Line diffs between a stored snapshot and the remote configuration.
//!
//! Used for reporting only. Contents are compared as raw bytes split on
//! `\n`, so two contents produce an empty diff exactly when they are
//! byte-identical. Lines that are not UTF-8 are rendered lossily.

use similar::{ChangeTag, TextDiff};

/// Lines of unchanged context around each hunk.
pub const CONTEXT_RADIUS: usize = 3;

/// Produce a unified diff between `old` and `new` as a list of lines.
///
/// Returns an empty list when the contents are identical. Otherwise the
/// first two lines are the `---`/`+++` headers naming `name`, followed by
/// `@@` hunk headers and `-`, `+` or space prefixed lines.
pub fn unified_diff(name: &str, old: impl AsRef<[u8]>, new: impl AsRef<[u8]>) -> Vec<String> {
    let (old, new) = (old.as_ref(), new.as_ref());
    if old == new {
        return Vec::new();
    }

    let old_lines: Vec<&[u8]> = old.split(|b| *b == b'\n').collect();
    let new_lines: Vec<&[u8]> = new.split(|b| *b == b'\n').collect();
    let diff = TextDiff::configure().diff_slices(&old_lines, &new_lines);

    let mut lines = vec![
        format!("--- {name} (snapshot)"),
        format!("+++ {name} (remote)"),
    ];

    let mut unified = diff.unified_diff();
    unified.context_radius(CONTEXT_RADIUS);
    for hunk in unified.iter_hunks() {
        lines.push(hunk.header().to_string());
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => '-',
                ChangeTag::Insert => '+',
                ChangeTag::Equal => ' ',
            };
            lines.push(format!("{sign}{}", String::from_utf8_lossy(change.value())));
        }
    }

    lines
}
