use super::domain::{IssueCategory, Priority};

/// Maps an issue category to the priority a new request starts with.
///
/// Applied once when the request is filed. Later edits to the priority are manual
/// overrides and never consult the classifier again.
pub struct PriorityClassifier;

impl PriorityClassifier {
    pub const fn classify(category: IssueCategory) -> Priority {
        match category {
            IssueCategory::Emergency => Priority::Emergency,
            IssueCategory::Electrical | IssueCategory::SafetySecurity => Priority::Urgent,
            IssueCategory::Plumbing | IssueCategory::Hvac => Priority::High,
            IssueCategory::Appliance => Priority::Medium,
            IssueCategory::Structural
            | IssueCategory::PestControl
            | IssueCategory::Cleaning
            | IssueCategory::Landscaping
            | IssueCategory::Other => Priority::Low,
        }
    }
}
