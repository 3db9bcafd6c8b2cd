use ostreeup_core::store::StoreErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientErr {
    #[error(transparent)]
    Store(#[from] StoreErr),

    #[error(
        "branch {branch:?} does not extend the server's revision {server}; local history must be a descendant"
    )]
    NonDescendant { branch: String, server: String },

    #[error("request to {path} failed: {source}")]
    Transport {
        path: &'static str,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("server rejected the request to {path}: {status} {message}")]
    Server { path: &'static str, status: u16, message: String },

    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("io error reading object {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "finalize reported object {0} missing after every object was uploaded and verified"
    )]
    MissingObject(String),
}
