/// Source encoding declaration placed on the first line of every unit
pub const ENCODING_HEADER: &str = "# -*- coding: utf-8 -*-";

/// Source text of one run: learner code followed by the optional checker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionUnit {
    source: String,
    has_checker: bool,
}

impl ExecutionUnit {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the run is graded by a checker rather than by exit status alone
    pub fn has_checker(&self) -> bool {
        self.has_checker
    }
}

/// Builds the unit to execute from the learner's code and the task checker
///
/// The checker goes after the learner code so it can call whatever the learner
/// defined. A checker made only of whitespace counts as absent.
pub fn assemble(learner_code: &str, checker_code: Option<&str>) -> ExecutionUnit {
    let checker_code = checker_code.filter(|c| !c.trim().is_empty());

    let source = match checker_code {
        Some(checker) => format!("{ENCODING_HEADER}\n{learner_code}\n\n{checker}\n"),
        None => format!("{ENCODING_HEADER}\n{learner_code}\n"),
    };

    ExecutionUnit {
        source,
        has_checker: checker_code.is_some(),
    }
}
