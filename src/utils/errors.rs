#![forbid(unsafe_code)]

use poem_openapi::Object;
use thiserror::Error;

/// Error enumerates the errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("poems_server input parameters:\n{}", .0)]
    InputParms(String),

    /// A text submission that is empty once trimmed.
    #[error("Empty poem not allowed!")]
    EmptyInput,

    /// A file submission without a file payload.
    #[error("No file uploaded!")]
    MissingFile,

    /// A poem name that does not resolve to a direct child of the poems directory.
    #[error("Invalid poem name: {}", .0)]
    InvalidName(String),

    /// A valid poem name with no readable file behind it.
    #[error("Poem not found: {}", .0)]
    NotFound(String),

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    StorageIO(#[from] std::io::Error),

    /// Inaccessible logger configuration file.
    #[error("Unable to access the Log4rs configuration file: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),
}

// ***************************************************************************
//                              HTTP Message
// ***************************************************************************
/// The JSON body of upload responses and of JSON error responses.
#[derive(Object, Debug)]
pub struct HttpMessage {
    pub message: String,
}

impl HttpMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {message: message.into()}
    }
}
