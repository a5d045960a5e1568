//! Errors raised while building, reconciling or laying out a view tree.
//!
//! All of these are programmer or content errors: the update cycle that raised one is aborted
//! and nothing it computed is committed.

use crate::view_tree::ViewId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A tag name without a registration in the [`Registry`](crate::Registry).
    #[error("unknown element type `{0}`")]
    UnknownType(String),

    /// Two siblings resolved to the same key.
    #[error("duplicate key `{key}` among the children of {parent:?}")]
    DuplicateKey { parent: Option<ViewId>, key: String },

    /// A template location that the template service cannot resolve.
    #[error("no template at `{0}`")]
    MissingTemplate(String),

    /// An element's properties are not the type its component expects.
    #[error("component `{component}` expects properties of type `{expected}`, got `{found}`")]
    PropertiesMismatch {
        component: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A state update targeted a view that is not a component.
    #[error("{0:?} is not a component")]
    NotAComponent(ViewId),

    /// A view that should exist is missing from the tree.
    #[error("no such view {0:?}")]
    NoSuchView(ViewId),

    /// A component failed to render.
    #[error("render failed: {0}")]
    Render(String),

    #[error("layout failed: {0:?}")]
    Layout(taffy::TaffyError),
}

impl Error {
    /// Shorthand for render errors raised by components.
    pub fn render(message: impl Into<String>) -> Error {
        Error::Render(message.into())
    }
}

impl From<taffy::TaffyError> for Error {
    fn from(err: taffy::TaffyError) -> Self {
        Error::Layout(err)
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
