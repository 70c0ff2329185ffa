//! Scripted service behaviour and sample label images

use serde_json::{json, Value};

/// Smallest valid PNG: a 1x1 transparent pixel.
pub const LABEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// How the stand-in analysis service behaves for one test.
#[derive(Debug, Clone)]
pub struct ServiceScript {
    pub healthy: bool,
    pub fail_upload: bool,
    /// POST /api/analyze answers 500
    pub fail_analyze: bool,
    /// GET /api/status answers 404 as if the job id were unknown
    pub unknown_job_on_status: bool,
    pub ingredients: Vec<String>,
    /// Polls answered with an interim status before `final_status`.
    /// `None` keeps the job pending forever.
    pub pending_polls: Option<u32>,
    pub final_status: &'static str,
    /// HTTP status of GET /api/results/{job_id}
    pub results_status: u16,
    /// Body of GET /api/results/{job_id} when `results_status` is 200
    pub results: Value,
}

impl Default for ServiceScript {
    fn default() -> Self {
        Self {
            healthy: true,
            fail_upload: false,
            fail_analyze: false,
            unknown_job_on_status: false,
            ingredients: vec!["sugar".to_string(), "milk".to_string()],
            pending_polls: Some(2),
            final_status: "complete",
            results_status: 200,
            results: vegan_fails_on_milk(),
        }
    }
}

/// Results in the shape the deployed backend returns: string verdicts plus
/// the echoed ingredients and filters.
pub fn vegan_fails_on_milk() -> Value {
    json!({
        "status": "complete",
        "results": { "vegan": "fail" },
        "failing": { "vegan": ["milk"] },
        "ingredients": ["sugar", "milk"],
        "filters": ["vegan"],
    })
}

pub fn mixed_results() -> Value {
    json!({
        "status": "complete",
        "results": {
            "lactose-intolerant": false,
            "vegan": false,
            "halal": true,
            "gluten-free": true,
        },
        "failing": {
            "lactose-intolerant": ["milk"],
            "vegan": [],
        },
    })
}
