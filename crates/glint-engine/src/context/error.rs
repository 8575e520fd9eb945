use thiserror::Error;

use super::ContextAttributes;

/// Fatal context initialization failure.
///
/// The renderer cannot run without a context; callers treat this as
/// unrecoverable for the renderer instance being built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// Neither an existing context nor a surface to create one was supplied.
    #[error("no existing context was supplied and there is no surface to create one on")]
    MissingSurface,

    /// The surface could not create a context with the requested attributes.
    #[error("graphics context creation is unsupported on this surface (requested {attributes:?})")]
    Unsupported { attributes: ContextAttributes },
}
