//! Feedback text composed from execution outcomes for the conversation layer.
//!
//! Denials are reported as a distinct kind so the caller never feeds them back
//! to the model as something to work around.

use crate::core::types::CommandOutcome;

/// Output longer than this is cut before being fed back.
pub const FEEDBACK_OUTPUT_LIMIT: usize = 2000;

pub const DENIED_MESSAGE: &str = "Command execution was denied by user.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Denied,
    NotExecuted,
    ExecutedWithErrors,
    Executed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub text: String,
}

impl Feedback {
    /// Whether the caller should send this back to the model for another turn.
    pub fn should_follow_up(&self) -> bool {
        self.kind != FeedbackKind::Denied
    }
}

/// Compose feedback for a single command outcome.
pub fn compose_feedback(outcome: &CommandOutcome) -> Feedback {
    if outcome.denied {
        return Feedback {
            kind: FeedbackKind::Denied,
            text: DENIED_MESSAGE.to_string(),
        };
    }

    if !outcome.executed {
        let error = outcome.error.as_deref().unwrap_or("unknown error");
        return Feedback {
            kind: FeedbackKind::NotExecuted,
            text: format!("Command execution failed: {error}\n\nPlease try a different approach."),
        };
    }

    let output = truncate_output(outcome.output.as_deref().unwrap_or_default().trim());
    if outcome.success {
        Feedback {
            kind: FeedbackKind::Executed,
            text: format!("Command executed successfully.\n{output}"),
        }
    } else {
        Feedback {
            kind: FeedbackKind::ExecutedWithErrors,
            text: format!(
                "Command executed but encountered an error:\n{output}\n\nPlease analyze this error and suggest a solution."
            ),
        }
    }
}

/// Cut `output` at [`FEEDBACK_OUTPUT_LIMIT`] bytes on a char boundary.
pub fn truncate_output(output: &str) -> String {
    if output.len() <= FEEDBACK_OUTPUT_LIMIT {
        return output.to_string();
    }
    format!(
        "{}\n... [Output Truncated]",
        truncate_bytes(output, FEEDBACK_OUTPUT_LIMIT)
    )
}

/// Longest prefix of `text` not exceeding `limit` bytes.
pub fn truncate_bytes(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_is_distinct_from_failure() {
        let feedback = compose_feedback(&CommandOutcome::denied());
        assert_eq!(feedback.kind, FeedbackKind::Denied);
        assert_eq!(feedback.text, DENIED_MESSAGE);
        assert!(!feedback.should_follow_up());
    }

    #[test]
    fn permission_errors_are_not_denials() {
        let outcome = CommandOutcome::rejected("sh: /etc/hosts: Permission denied");
        let feedback = compose_feedback(&outcome);
        assert_eq!(feedback.kind, FeedbackKind::NotExecuted);
        assert!(feedback.should_follow_up());

        let started = CommandOutcome {
            approved: true,
            error: Some("start `cat`: permission denied".to_string()),
            ..CommandOutcome::default()
        };
        assert_eq!(compose_feedback(&started).kind, FeedbackKind::NotExecuted);
    }

    #[test]
    fn not_executed_reports_error() {
        let outcome = CommandOutcome {
            approved: true,
            error: Some("spawn failed".to_string()),
            ..CommandOutcome::default()
        };
        let feedback = compose_feedback(&outcome);
        assert_eq!(feedback.kind, FeedbackKind::NotExecuted);
        assert!(feedback.text.contains("spawn failed"));
        assert!(feedback.should_follow_up());
    }

    #[test]
    fn executed_failure_asks_for_analysis() {
        let outcome = CommandOutcome {
            approved: true,
            executed: true,
            success: false,
            output: Some("ls: cannot access 'x'".to_string()),
            attempts: 3,
            ..CommandOutcome::default()
        };
        let feedback = compose_feedback(&outcome);
        assert_eq!(feedback.kind, FeedbackKind::ExecutedWithErrors);
        assert!(feedback.text.contains("cannot access"));
    }

    #[test]
    fn long_output_is_truncated() {
        let long = "é".repeat(FEEDBACK_OUTPUT_LIMIT);
        let cut = truncate_output(&long);
        assert!(cut.ends_with("[Output Truncated]"));
        assert!(cut.len() < long.len());
    }
}
