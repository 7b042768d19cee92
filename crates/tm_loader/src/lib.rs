//! Load-time rewriting for transmod modules.
//!
//! A [`Pipeline`] pairs a [`PipelineConfig`] with a transformer registry.
//! Installed into a runtime with [`Pipeline::setup`], it puts a
//! [`RewriteFinder`] at the front of the finder chain so every module found
//! on the search path is parsed, rewritten by the transformers it selects and
//! compiled before it runs. The returned [`PipelineHandle`] uninstalls it.

pub mod config;
pub mod hook;
pub mod pipeline;

pub use config::PipelineConfig;
pub use hook::{PipelineHandle, RewriteFinder, RewriteLoader};
pub use pipeline::Pipeline;
