//! Core of the plume UI library.
//!
//! # Conceptual overview
//! Plume is a declarative UI framework for native views.
//!
//! ## Elements
//! An [`Element`] is an immutable description of a view: a type, a property bag and a list of
//! children. There are three kinds of element types: native views (boxes, text, images, ...),
//! pre-built external views, and components. Elements are created fresh on every render and
//! should hence be very cheap to create; they don't do anything on their own.
//!
//! ## Components
//! A [`Component`] is a view made up of other views. It has properties given by its parent,
//! state it owns itself, and renders an element tree derived from both. State is changed through
//! a [`StateUpdater`], which queues the change; queued changes are applied together in the next
//! update cycle, in the order they were made.
//!
//! ## Reconciliation
//! The [`ViewTree`] holds the live instances built from elements. When a component renders
//! again, the new element tree is diffed against the live one: children are matched up by key
//! (or position, if they have none) and updated in place, moved, replaced if their type changed,
//! built if they are new and removed if they are gone. Every change to native views is recorded
//! as a [`Patch`].
//!
//! ## Layout
//! Layout is flexbox, computed by `taffy` over the native views in the tree (components are
//! transparent). Properties that aren't set default to a column direction, stretch alignment and
//! no shrinking.
//!
//! ## NVTree and Backends
//! To get the views in a ViewTree to show up on screen, an NVTree (native-view tree) and a backend
//! is required. The NVTree only contains native views and is where patches, frames and gestures
//! are handled. It's also responsible for keeping the backend in sync with the view tree.
//!
//! Backends are platform-specific UI frameworks abstracted to a common interface;
//! [`HeadlessBackend`] keeps everything in memory.
//!
//! ## Coordinate System
//! The origin of the top-level coordinate system is at the top left corner of the root view. The
//! y-axis is oriented such that positive y points down. Frames are relative to the superview.

pub mod backend;
pub mod color;
mod component;
mod element;
mod error;
pub mod events;
pub mod layout;
mod nv_tree;
pub mod properties;
mod rect;
mod registry;
mod services;
pub mod template;
mod update_queue;
pub mod value;
mod view_tree;

pub use backend::{Backend, HeadlessBackend};
pub use component::{Component, Phase, RenderContext};
pub use element::{ComponentType, Element, ElementType, ExternalView, Key, NativeType};
pub use error::{Error, Result};
pub use layout::{LayoutResult, TextMeasurer};
pub use nv_tree::{NVTree, NativeKind, NativeView, Patch, PatchError};
pub use properties::{
    AnyProperties, CoreProperties, DefaultProperties, ImageProperties, Properties,
    RawPropertiesReceiver,
};
pub use rect::Rect;
pub use registry::Registry;
pub use services::Services;
pub use update_queue::{Completion, StateMutation, StateUpdater, UpdateQueue};
pub use value::{Model, RawProperties, Value};
pub use view_tree::{Commit, CycleReport, Edit, ViewId, ViewTree};
