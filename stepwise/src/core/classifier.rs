//! Deterministic classification of goal complexity and strategy routing.

use crate::core::types::{Complexity, Strategy};

/// Markers that make a goal `High` complexity.
pub const HIGH_MARKERS: &[&str] = &[
    "install and configure",
    "debug",
    "analyze and fix",
    "setup",
    "deploy",
    "multiple",
    "and then",
];

/// Markers that make a goal `Low` complexity (checked after high markers).
pub const LOW_MARKERS: &[&str] = &["what is", "when is", "show me", "list", "display"];

/// Which strategies are enabled for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyToggles {
    pub use_planning: bool,
    pub use_react: bool,
    pub use_cot: bool,
}

/// Classify a goal by keyword scan over its lower-cased text.
///
/// - `High` if any high marker is present.
/// - `Low` if any low marker is present.
/// - `Medium` otherwise.
pub fn classify_complexity(goal: &str) -> Complexity {
    let lower = goal.to_lowercase();
    if HIGH_MARKERS.iter().any(|marker| lower.contains(marker)) {
        Complexity::High
    } else if LOW_MARKERS.iter().any(|marker| lower.contains(marker)) {
        Complexity::Low
    } else {
        Complexity::Medium
    }
}

/// Pick a strategy. Precedence is fixed:
/// planning (high only) > reasoning loop > chain of thought > direct.
pub fn select_strategy(complexity: Complexity, toggles: StrategyToggles) -> Strategy {
    if complexity == Complexity::High && toggles.use_planning {
        Strategy::Planning
    } else if toggles.use_react {
        Strategy::Reasoning
    } else if toggles.use_cot {
        Strategy::ChainOfThought
    } else {
        Strategy::Direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: StrategyToggles = StrategyToggles {
        use_planning: true,
        use_react: true,
        use_cot: true,
    };

    #[test]
    fn high_markers_win_over_low_markers() {
        assert_eq!(
            classify_complexity("List files and then deploy the site"),
            Complexity::High
        );
    }

    #[test]
    fn low_and_medium_goals() {
        assert_eq!(classify_complexity("Show me disk usage"), Complexity::Low);
        assert_eq!(classify_complexity("rename notes.txt"), Complexity::Medium);
        assert_eq!(classify_complexity(""), Complexity::Medium);
    }

    #[test]
    fn classification_is_pure() {
        let goal = "Setup nginx";
        assert_eq!(classify_complexity(goal), classify_complexity(goal));
        assert_eq!(
            select_strategy(classify_complexity(goal), ALL),
            select_strategy(classify_complexity(goal), ALL)
        );
    }

    #[test]
    fn strategy_precedence_is_fixed() {
        assert_eq!(select_strategy(Complexity::High, ALL), Strategy::Planning);
        assert_eq!(select_strategy(Complexity::Low, ALL), Strategy::Reasoning);

        let no_plan = StrategyToggles {
            use_planning: false,
            ..ALL
        };
        assert_eq!(select_strategy(Complexity::High, no_plan), Strategy::Reasoning);

        let cot_only = StrategyToggles {
            use_planning: true,
            use_react: false,
            use_cot: true,
        };
        assert_eq!(
            select_strategy(Complexity::Medium, cot_only),
            Strategy::ChainOfThought
        );

        let none = StrategyToggles {
            use_planning: false,
            use_react: false,
            use_cot: false,
        };
        assert_eq!(select_strategy(Complexity::High, none), Strategy::Direct);
    }
}
