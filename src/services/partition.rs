use crate::error::ClientError;
use crate::models::analysis::AnalysisOutcome;
use crate::models::filter::{FailedFilter, Filter, FilterPartition};

/// Split the selected filters into passed and failed groups.
///
/// Both groups keep the order of `selected`. A failed filter carries the
/// ingredients the service blamed for it, or none if it named none. A
/// selected filter without a verdict is a service contract violation and
/// fails the whole partition.
pub fn partition(
    outcome: &AnalysisOutcome,
    selected: &[Filter],
) -> Result<FilterPartition, ClientError> {
    let mut result = FilterPartition::default();

    for filter in selected {
        let passed = outcome
            .results
            .get(filter.key)
            .copied()
            .ok_or_else(|| ClientError::MissingResult(filter.key.to_string()))?;

        if passed {
            result.passed.push(*filter);
        } else {
            result.failed.push(FailedFilter {
                filter: *filter,
                failed_ingredients: outcome.failing.get(filter.key).cloned().unwrap_or_default(),
            });
        }
    }

    Ok(result)
}
