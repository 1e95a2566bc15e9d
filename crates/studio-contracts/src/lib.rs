//! Data contracts for studio campaigns: model and mode tables, the job
//! schema handed from compiler to runner, and the files a run leaves behind.

pub mod briefs;
pub mod config;
pub mod error;
pub mod events;
pub mod jobs;
pub mod models;
pub mod modes;
pub mod runs;

pub use error::StudioError;
