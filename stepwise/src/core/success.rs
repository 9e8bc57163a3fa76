//! Success classification for captured command output.
//!
//! The raw runner embeds an `exit code: N` marker in its output. When the
//! marker is present it decides; otherwise a case-insensitive scan for known
//! failure phrases does. Output with neither signal counts as success.

use std::sync::LazyLock;

use regex::Regex;

/// Phrases that mark output as failed when no exit code marker is present.
pub const FAILURE_PHRASES: &[&str] = &[
    "error:",
    "failed",
    "permission denied",
    "command not found",
    "no such file",
    "cannot",
];

static EXIT_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)exit code:\s*(\d+)").unwrap());

/// Extract the embedded exit code, if any. The last marker wins.
pub fn exit_code(output: &str) -> Option<i64> {
    EXIT_CODE_RE
        .captures_iter(output)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Return the first failure phrase found in `output`, if any.
pub fn failure_phrase(output: &str) -> Option<&'static str> {
    let lower = output.to_lowercase();
    FAILURE_PHRASES
        .iter()
        .copied()
        .find(|phrase| lower.contains(phrase))
}

/// Decide whether `output` represents a successful run.
pub fn output_indicates_success(output: &str) -> bool {
    if let Some(code) = exit_code(output) {
        return code == 0;
    }
    failure_phrase(output).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_is_success() {
        assert!(output_indicates_success("total 0\ndrwxr-xr-x 2 user user 40 ."));
        assert!(output_indicates_success(""));
    }

    #[test]
    fn failure_phrases_are_case_insensitive() {
        assert!(!output_indicates_success("ls: CANNOT access 'x'"));
        assert!(!output_indicates_success("bash: foo: command not found"));
        assert_eq!(failure_phrase("Permission Denied"), Some("permission denied"));
    }

    #[test]
    fn exit_code_marker_overrides_phrase_scan() {
        assert!(output_indicates_success("warning: cannot stat cache\nexit code: 0"));
        assert!(!output_indicates_success("all good\nexit code: 2"));
        assert_eq!(exit_code("Exit Code: 17"), Some(17));
    }

    /// Known limitation: legitimate output that happens to contain a failure
    /// phrase is misclassified when no exit code marker is present.
    #[test]
    fn legitimate_cannot_without_marker_is_misclassified() {
        assert!(!output_indicates_success("You cannot be serious, said the fortune"));
    }
}
