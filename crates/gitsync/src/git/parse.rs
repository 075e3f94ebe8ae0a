//! Pure parsing of git plumbing output.

use crate::checkout::Commit;

/// Splits trimmed output into lines; empty output yields no entries.
pub(crate) fn split_list(output: &str) -> Vec<String> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.lines().map(str::to_string).collect()
}

/// Parses `log --oneline --no-abbrev-commit` output into commits.
pub(crate) fn split_log(output: &str) -> Vec<Commit> {
    split_list(output)
        .into_iter()
        .map(|line| match line.split_once(' ') {
            Some((revision, message)) => Commit {
                revision: revision.to_string(),
                message: message.to_string(),
            },
            None => Commit {
                revision: line,
                message: String::new(),
            },
        })
        .collect()
}

/// Extracts the annotated object id from one `notes list` line
/// (`<note blob> <object>`).
pub(crate) fn note_object(line: &str) -> Option<&str> {
    line.split_whitespace().nth(1)
}
