/// Parameters for one aggregated, label-filtered instance listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceListRequest {
    pub project: String,
    pub filter: String,
}

impl InstanceListRequest {
    pub fn for_label(project: impl Into<String>, label_key: &str, label_value: &str) -> Self {
        Self {
            project: project.into(),
            filter: label_filter(label_key, label_value),
        }
    }
}

/// Render the provider filter expression `labels.<key>=<value>`.
pub fn label_filter(label_key: &str, label_value: &str) -> String {
    format!("labels.{label_key}={label_value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_label_expression() {
        assert_eq!(label_filter("env", "ci"), "labels.env=ci");
    }

    #[test]
    fn empty_pair_still_renders_prefix() {
        assert_eq!(label_filter("", ""), "labels.=");
    }

    #[test]
    fn request_carries_project_and_filter() {
        let request = InstanceListRequest::for_label("my-project", "team", "data");

        assert_eq!(request.project, "my-project");
        assert_eq!(request.filter, "labels.team=data");
    }
}
