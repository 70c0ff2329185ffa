use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use strum::Display;

/// Response from POST /api/upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub job_id: String,
    /// Extracted ingredients in label order. Absent or null means none.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ingredients: Vec<String>,
}

/// Request body for POST /api/analyze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzeRequest {
    pub job_id: String,
    pub ingredients: Vec<String>,
    /// Filter keys, in registry order.
    pub filters: Vec<String>,
}

/// Progress reported by GET /api/status/{job_id}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    /// Interim state the service reports once a worker picked the job up.
    Analyzing,
    Complete,
    Error,
}

impl AnalysisStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, AnalysisStatus::Complete | AnalysisStatus::Error)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: AnalysisStatus,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response from GET /api/results/{job_id}.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsResponse {
    pub results: BTreeMap<String, Verdict>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub failing: BTreeMap<String, Vec<String>>,
}

/// Pass/fail verdict for one filter. The service sends either a JSON
/// boolean or the strings `"pass"` / `"fail"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawVerdict")]
pub struct Verdict {
    pub passed: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVerdict {
    Flag(bool),
    Word(String),
}

impl TryFrom<RawVerdict> for Verdict {
    type Error = String;

    fn try_from(raw: RawVerdict) -> Result<Self, Self::Error> {
        match raw {
            RawVerdict::Flag(passed) => Ok(Verdict { passed }),
            RawVerdict::Word(word) => match word.to_ascii_lowercase().as_str() {
                "pass" | "passed" => Ok(Verdict { passed: true }),
                "fail" | "failed" => Ok(Verdict { passed: false }),
                _ => Err(format!("unrecognized verdict '{}'", word)),
            },
        }
    }
}

/// Final analysis of a job: per-filter verdicts and the ingredients behind
/// each failure. Only ever stored on a job as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisOutcome {
    pub results: BTreeMap<String, bool>,
    pub failing: BTreeMap<String, Vec<String>>,
}

impl From<ResultsResponse> for AnalysisOutcome {
    fn from(response: ResultsResponse) -> Self {
        Self {
            results: response
                .results
                .into_iter()
                .map(|(key, verdict)| (key, verdict.passed))
                .collect(),
            failing: response.failing,
        }
    }
}

/// Response from GET /api/health.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub model_initialized: bool,
    #[serde(default)]
    pub database_ready: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_response_null_ingredients() {
        let body = r#"{"job_id": "abc_photo.jpg", "ingredients": null, "count": 0}"#;
        let response: UploadResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.job_id, "abc_photo.jpg");
        assert!(response.ingredients.is_empty());
    }

    #[test]
    fn test_status_values() {
        let status: StatusResponse = serde_json::from_str(r#"{"status": "analyzing"}"#).unwrap();
        assert_eq!(status.status, AnalysisStatus::Analyzing);
        assert!(!status.status.is_settled());

        let status: StatusResponse =
            serde_json::from_str(r#"{"job_id": "j1", "status": "error", "error": "model down"}"#)
                .unwrap();
        assert_eq!(status.status, AnalysisStatus::Error);
        assert_eq!(status.error.as_deref(), Some("model down"));

        assert!(serde_json::from_str::<StatusResponse>(r#"{"status": "done"}"#).is_err());
    }

    #[test]
    fn test_results_accept_booleans_and_words() {
        let body = r#"{
            "status": "complete",
            "results": {"vegan": "fail", "halal": true, "low-sugar": "pass"},
            "failing": {"vegan": ["milk"]}
        }"#;
        let outcome: AnalysisOutcome = serde_json::from_str::<ResultsResponse>(body)
            .unwrap()
            .into();
        assert_eq!(outcome.results.get("vegan"), Some(&false));
        assert_eq!(outcome.results.get("halal"), Some(&true));
        assert_eq!(outcome.results.get("low-sugar"), Some(&true));
        assert_eq!(outcome.failing["vegan"], vec!["milk".to_string()]);
    }

    #[test]
    fn test_results_reject_malformed_verdict() {
        let body = r#"{"results": {"vegan": "maybe"}, "failing": {}}"#;
        assert!(serde_json::from_str::<ResultsResponse>(body).is_err());
    }

    #[test]
    fn test_results_require_results_map() {
        assert!(serde_json::from_str::<ResultsResponse>(r#"{"failing": {}}"#).is_err());
    }

    #[test]
    fn test_analyze_request_shape() {
        let request = AnalyzeRequest {
            job_id: "j1".to_string(),
            ingredients: vec!["sugar".to_string()],
            filters: vec!["vegan".to_string()],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"job_id": "j1", "ingredients": ["sugar"], "filters": ["vegan"]})
        );
    }
}
