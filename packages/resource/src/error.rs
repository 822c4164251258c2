use docrest_datastore::Error as DatastoreError;

/// Errors surfaced to the REST framework.
///
/// `NotFound` and `ApiField` are the two domain errors the framework turns
/// into client responses. Datastore faults that are not lookups propagate
/// unchanged through `Datastore`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A key could not be parsed or does not resolve to a stored entity.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// A field has no usable value and its options do not allow that.
    #[error("api field error: {message}")]
    ApiField { message: String },

    /// Inbound data has the wrong shape.
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// Resource registration or lookup problem.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("datastore error: {0}")]
    Datastore(#[from] DatastoreError),
}

impl Error {
    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    pub(crate) fn api_field(message: impl Into<String>) -> Self {
        Error::ApiField {
            message: message.into(),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }
}
