// Error types shared by every module. Each variant is fatal for the
// process: `main` prints its message on one line and exits with status 1.

use thiserror::Error;

/// Failure of a single call to the remote service.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP Error {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("{0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Error for a non-2xx response. The message uses the status reason
    /// phrase, or the body flattened to one line when the status has none.
    pub fn from_status(status: u16, body: &str) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .map(str::to_string)
            .unwrap_or_else(|| single_line(body));
        ApiError::Status { status, reason }
    }
}

/// Collapse all whitespace runs, including newlines, into single spaces.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Error, Debug)]
pub enum FreckError {
    #[error("Syntax error in {path} at line {line_number}: {line}")]
    ConfigSyntax {
        path: String,
        line_number: usize,
        line: String,
    },

    #[error("Unrecognised key '{key}' in {path} at line {line_number}")]
    ConfigUnknownKey {
        path: String,
        key: String,
        line_number: usize,
    },

    #[error("That's not an email address")]
    InvalidEmail,

    #[error("Failed to connect to {subdomain}.{host}; check your details and try again.")]
    CredentialExchange { subdomain: String, host: String },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("No project name specified, and no default")]
    NoProjectSpecified,

    #[error("Default project '{0}' does not exist. Edit ~/.freck to specify one that does.")]
    DefaultProjectNotFound(String),

    #[error(
        "Project '{0}' does not exist. You can create it by specifying --create, \
         or list the existing projects by specifying --list-projects."
    )]
    ProjectNotFound(String),

    #[error("Failed to create entry '{time}' for project {project}: {message}")]
    EntryCreation {
        time: String,
        project: String,
        message: String,
    },

    #[error("No user id configured; delete ~/.freck and run freck again to set it up")]
    NoUserId,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read input: {0}")]
    Prompt(anyhow::Error),
}

pub type FreckResult<T> = Result<T, FreckError>;
