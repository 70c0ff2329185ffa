pub mod analysis;
pub mod filter;
pub mod image;
pub mod job;
