pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::{Error, ErrorKind, HttpError, InternalError};
pub use http::{HttpClient, Reply, RequestOptions};
