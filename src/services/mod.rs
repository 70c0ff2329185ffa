pub mod analysis;
pub mod filters;
pub mod job_client;
pub mod partition;
