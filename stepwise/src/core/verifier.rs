//! Pattern-based safety classification of shell commands.

use std::sync::LazyLock;

use regex::Regex;

/// Dangerous command shapes, checked in order. The first match wins.
const DANGEROUS_PATTERNS: &[&str] = &[
    r"rm\s+-rf\s+/(?:[^\w.\-/]|$)",          // root deletion
    r"rm\s+-rf\s+/\*",                       // root wildcard deletion
    r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;", // fork bomb
    r"mkfs",                                 // filesystem format
    r"dd\s+if=",                             // raw block-device write
    r">\s*/dev/sd",                          // device clobber
    r"chmod\s+(?:-R\s+)?777\s+/",            // global permission grant
    r"mv\s+/\w+\s+/dev/null",                // system dir into the void
];

static DANGEROUS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    DANGEROUS_PATTERNS
        .iter()
        .map(|pattern| (*pattern, Regex::new(pattern).unwrap()))
        .collect()
});

pub const EMPTY_REASON: &str = "command is empty";
pub const SAFE_REASON: &str = "command appears safe";
pub const SUDO_RM_CAUTION: &str = "caution: command combines sudo with rm, proceed with care";

/// Result of classifying one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub is_safe: bool,
    pub reason: String,
    /// Set when the command is allowed but the operator must be warned.
    pub caution: bool,
}

impl Verdict {
    fn unsafe_because(reason: String) -> Self {
        Self {
            is_safe: false,
            reason,
            caution: false,
        }
    }

    /// Text the approval step must show, if any.
    pub fn notice(&self) -> Option<&str> {
        if !self.is_safe || self.caution {
            Some(&self.reason)
        } else {
            None
        }
    }
}

/// Classify `command` as safe, unsafe, or safe-with-caution.
///
/// Fails closed on empty input. Pure and deterministic.
pub fn verify(command: &str) -> Verdict {
    if command.trim().is_empty() {
        return Verdict::unsafe_because(EMPTY_REASON.to_string());
    }

    if let Some((pattern, _)) = DANGEROUS.iter().find(|(_, re)| re.is_match(command)) {
        return Verdict::unsafe_because(format!(
            "detected potentially dangerous pattern: {pattern}"
        ));
    }

    if command.contains("sudo") && command.contains("rm") {
        return Verdict {
            is_safe: true,
            reason: SUDO_RM_CAUTION.to_string(),
            caution: true,
        };
    }

    Verdict {
        is_safe: true,
        reason: SAFE_REASON.to_string(),
        caution: false,
    }
}
