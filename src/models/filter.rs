use serde::Serialize;

/// A predefined dietary rule the analysis service knows how to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Filter {
    /// Stable identifier used by the presentation layer.
    pub id: &'static str,
    /// Name sent to the service and used as the key of its results.
    pub key: &'static str,
    pub display_name: &'static str,
    /// Icon asset reference (file name).
    pub icon: &'static str,
}

/// A filter that failed, with the ingredients the service blamed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFilter {
    #[serde(flatten)]
    pub filter: Filter,
    pub failed_ingredients: Vec<String>,
}

/// Selected filters split by verdict, each group in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterPartition {
    pub passed: Vec<Filter>,
    pub failed: Vec<FailedFilter>,
}

impl FilterPartition {
    pub fn len(&self) -> usize {
        self.passed.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
