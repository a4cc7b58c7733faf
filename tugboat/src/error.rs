use container_image_name::InvalidContainerImageName;

use crate::process;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("tags must be provided")]
    NoProvidedTags,

    #[error("there are no supported architectures defined")]
    NoSupportedArchitectures,

    #[error("registry credentials require a non-empty {0}")]
    EmptyCredentialField(&'static str),

    #[error(
        "registry credentials are required to publish a manifest list, \
         please provide a user and password"
    )]
    MissingCredentials,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid image reference {input:?}")]
pub struct ReferenceParseError {
    pub input: String,
    #[source]
    pub source: InvalidContainerImageName,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    ReferenceParse(#[from] ReferenceParseError),

    #[error(transparent)]
    CommandRejected(#[from] process::CommandRejected),

    #[error(transparent)]
    CommandExecutionFailed(#[from] process::Error),

    #[error("authentication with registry {server} failed: {source}")]
    Authentication {
        server: String,
        #[source]
        source: Box<Error>,
    },

    #[error("unsupported driver name {0:?}, expected one of `docker` or `auto`")]
    DriverUnsupported(String),

    #[error("the operation was cancelled")]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
