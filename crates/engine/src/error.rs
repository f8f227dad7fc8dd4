use thiserror::Error;

/// 1-based line/column position inside a template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

impl From<(usize, usize)> for SourceLocation {
    fn from((line, column): (usize, usize)) -> Self {
        SourceLocation { line, column }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Template syntax error: {msg} at {location}")]
    Parser { msg: String, location: SourceLocation },

    #[error("Template render error: {msg} at {location}")]
    Render { msg: String, location: SourceLocation },

    #[error("File error: {0}")]
    File(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("UTF-8 encoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn parser(msg: impl Into<String>, location: SourceLocation) -> Self {
        Self::Parser {
            msg: msg.into(),
            location,
        }
    }

    pub fn render(msg: impl Into<String>, location: SourceLocation) -> Self {
        Self::Render {
            msg: msg.into(),
            location,
        }
    }

    pub fn file(msg: impl Into<String>) -> Self {
        Self::File(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }
}
