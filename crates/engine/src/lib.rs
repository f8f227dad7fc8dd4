//! A data-driven text template engine.
//!
//! Templates mix literal text, `{{ expression }}` interpolation,
//! `{% statement %}` / `## line-statement` control flow, `{# comments #}`
//! and `apply-template` sub-template invocation. Rendering walks the
//! compiled AST against a JSON data tree and produces either a string or a
//! tree of files under a configured output directory. Templates can carry a
//! description (the variables they reference, with types, defaults and
//! required flags) used for validation and tooling.
//!
//! The [`Environment`] facade is the main entry point:
//!
//! ```
//! use serde_json::json;
//! use stencil_engine::Environment;
//!
//! let mut env = Environment::new();
//! let data = json!({"name": "world"});
//! let output = env.render_source("Hello {{ name }}!", &data).unwrap();
//! assert_eq!(output, "Hello world!");
//! ```

pub mod ast;
pub mod config;
pub mod describe;
pub mod description;
pub mod environment;
pub mod error;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod renderer;
pub mod template;
pub mod token;
pub mod utils;
pub mod value;

// --- Public API ---

pub use config::{IncludeCallback, LexerConfig, ParserConfig, RenderConfig};
pub use describe::DescriptionVisitor;
pub use description::{Description, VarType, Variable, Variables};
pub use environment::Environment;
pub use error::{EngineError, SourceLocation};
pub use functions::{Callback, FunctionStorage, Operation, VARIADIC};
pub use lexer::Lexer;
pub use parser::Parser;
pub use renderer::Renderer;
pub use template::{Template, TemplateStorage};
pub use token::{Token, TokenKind};
