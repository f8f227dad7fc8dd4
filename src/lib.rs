//! Project orchestration and CLI support over the stencil engine.
//!
//! The engine itself lives in `stencil-engine`; this crate adds the pieces a
//! code-generation run needs around it: a project file that renders several
//! templates against one data value (each with its own transformation rules
//! and description file), and the interactive description builder backing
//! the `--create-info` CLI flag.

pub mod describe;
pub mod project;

use thiserror::Error;

use stencil_engine::EngineError;
use stencil_transform::TransformError;

#[derive(Error, Debug)]
pub enum StencilError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}
