//! Sift analysis client
//!
//! This library drives the Sift food-label analysis protocol: upload a label
//! image, receive the extracted ingredients, request evaluation against
//! dietary filters, poll until the service settles, and split the selected
//! filters into passed and failed groups.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::{ClientConfig, PollPolicy};
pub use error::ClientError;
pub use models::job::{FailureReason, Job, Phase};
pub use services::analysis::{AnalysisService, HttpAnalysisService, ServiceError};
pub use services::filters::FilterSelection;
pub use services::job_client::AnalysisJobClient;
