/// Token a checker prints once all of its assertions have passed
pub const SENTINEL: &str = "OK";

/// Maps an execution result to pass/fail
///
/// Without a checker a clean exit is a pass. With a checker the run must also
/// print [`SENTINEL`] somewhere on stdout; the match is a case-sensitive
/// substring search, not a whole-line comparison.
pub fn classify(succeeded: bool, stdout: &str, checker_present: bool) -> bool {
    if checker_present {
        succeeded && stdout.contains(SENTINEL)
    } else {
        succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_run_follows_exit_status() {
        assert!(classify(true, "", false));
        assert!(!classify(false, "OK", false));
    }

    #[test]
    fn test_checker_requires_sentinel() {
        assert!(classify(true, "OK\n", true));
        assert!(!classify(true, "done\n", true));
        assert!(!classify(false, "OK\n", true));
    }

    #[test]
    fn test_sentinel_is_substring_match() {
        assert!(classify(true, "result: OKAY", true));
        assert!(classify(true, "line one\nall OK here\n", true));
    }

    #[test]
    fn test_sentinel_is_case_sensitive() {
        assert!(!classify(true, "ok\n", true));
        assert!(!classify(true, "Ok\n", true));
    }
}
