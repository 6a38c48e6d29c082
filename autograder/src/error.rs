use std::{io, path::PathBuf};
use thiserror::Error;

/// Everything that can stop a project from being graded normally.
///
/// A failing test is never an `Error`: it is a negative verdict. Only
/// [`Error::Config`] aborts the whole grading run; the other variants make a
/// project fall back to discovery-only scoring.
#[derive(Debug, Error)]
pub enum Error {
    /// Broken assignment wiring or fixture layout.
    #[error("{0}")]
    Config(String),

    #[error("{message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: io::Error,
    },

    /// An auxiliary command (clean, build, unpack) exited with a non-zero code.
    #[error("error running {:?} (return code {code})", program_name(.cmd))]
    Command {
        cmd: Vec<String>,
        code: i32,
        output: String,
    },

    #[error("{0}")]
    Build(String),

    #[error("{0}")]
    Project(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn program_name(cmd: &[String]) -> &str {
    cmd.first().map(String::as_str).unwrap_or("")
}

impl Error {
    pub fn io(message: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
            source,
        }
    }

    /// Whether the error must abort the whole grading run instead of
    /// downgrading a single project.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Self::Io {
            message: source.to_string(),
            path: None,
            source,
        }
    }
}
