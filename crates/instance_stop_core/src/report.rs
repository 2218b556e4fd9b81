use std::fmt;

use serde::Serialize;

/// Outcome of one successful stop invocation.
///
/// `stopped_names` and `already_stopped_names` partition the listed
/// instances, so `target_instance_count` is always their combined length.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StopResult {
    target_instance_count: usize,
    stopped_names: Vec<String>,
    already_stopped_names: Vec<String>,
}

impl StopResult {
    pub fn from_partition(stopped_names: Vec<String>, already_stopped_names: Vec<String>) -> Self {
        Self {
            target_instance_count: stopped_names.len() + already_stopped_names.len(),
            stopped_names,
            already_stopped_names,
        }
    }

    pub fn target_instance_count(&self) -> usize {
        self.target_instance_count
    }

    pub fn stopped_names(&self) -> &[String] {
        &self.stopped_names
    }

    pub fn already_stopped_names(&self) -> &[String] {
        &self.already_stopped_names
    }
}

impl fmt::Display for StopResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_category(f, "Stopped", &self.stopped_names)?;
        f.write_str("\n")?;
        write_category(f, "Already stopped", &self.already_stopped_names)
    }
}

fn write_category(f: &mut fmt::Formatter<'_>, label: &str, names: &[String]) -> fmt::Result {
    writeln!(f, "{label}: {}({})", names.len(), names.join(", "))
}

/// Human-readable summary logged after a successful invocation.
pub fn render_summary(result: &StopResult) -> String {
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn renders_one_line_group_per_category() {
        let result = StopResult::from_partition(names(&["A"]), names(&["B"]));

        assert_eq!(render_summary(&result), "Stopped: 1(A)\n\nAlready stopped: 1(B)\n");
    }

    #[test]
    fn renders_empty_categories_with_zero_counts() {
        let result = StopResult::from_partition(Vec::new(), Vec::new());

        assert_eq!(result.target_instance_count(), 0);
        assert_eq!(render_summary(&result), "Stopped: 0()\n\nAlready stopped: 0()\n");
    }

    #[test]
    fn joins_names_in_result_order() {
        let result = StopResult::from_partition(names(&["web-2", "web-1", "db-0"]), Vec::new());

        assert_eq!(
            render_summary(&result),
            "Stopped: 3(web-2, web-1, db-0)\n\nAlready stopped: 0()\n"
        );
    }

    #[test]
    fn count_is_sum_of_both_partitions() {
        let result = StopResult::from_partition(names(&["a", "b"]), names(&["c", "d", "e"]));

        assert_eq!(result.target_instance_count(), 5);
        assert_eq!(
            result.target_instance_count(),
            result.stopped_names().len() + result.already_stopped_names().len()
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let result = StopResult::from_partition(names(&["x"]), names(&["y", "z"]));

        assert_eq!(render_summary(&result), render_summary(&result.clone()));
    }
}
