//! Elements: immutable descriptions of what to render.
//!
//! Elements are the virtual representation of views à la virtual DOM. They should be cheap to
//! create and clone (properties are shared behind an `Arc`), as components create a fresh
//! element tree on every render, which is then diffed against the live tree and dropped.

use crate::component::{Component, ComponentHost, Mounted};
use crate::error::Result;
use crate::properties::{AnyProperties, DefaultProperties, ImageProperties, Properties};
use core::any::TypeId;
use core::fmt;
use std::sync::Arc;

/// Types of native views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    Box,
    Text,
    Image,
    TextField,
    Button,
}

impl NativeType {
    /// Whether views of this type have subviews.
    pub fn is_container(self) -> bool {
        matches!(self, NativeType::Box)
    }

    /// Whether views of this type size themselves from their text content.
    pub fn measures_text(self) -> bool {
        matches!(self, NativeType::Text | NativeType::Button)
    }
}

/// A pre-built native view, identified by a handle the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalView(pub u64);

type Construct = fn(&Arc<dyn AnyProperties>) -> Result<Box<dyn ComponentHost>>;

/// A reference to a component type.
#[derive(Clone, Copy)]
pub struct ComponentType {
    name: &'static str,
    type_id: TypeId,
    construct: Construct,
}

impl ComponentType {
    pub fn of<C: Component + Default>() -> ComponentType {
        ComponentType {
            name: core::any::type_name::<C>(),
            type_id: TypeId::of::<C>(),
            construct: Mounted::<C>::construct,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn construct(
        &self,
        properties: &Arc<dyn AnyProperties>,
    ) -> Result<Box<dyn ComponentHost>> {
        (self.construct)(properties)
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &ComponentType) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ComponentType({})", self.name)
    }
}

/// What an element renders to.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    Native(NativeType),
    Component(ComponentType),
    External(ExternalView),
}

impl ElementType {
    /// Whether a node built from `self` can be updated in place from an element of type
    /// `other`. If not, the node must be replaced.
    pub fn same_type(&self, other: &ElementType) -> bool {
        self == other
    }

    pub fn is_container(&self) -> bool {
        match self {
            ElementType::Native(ty) => ty.is_container(),
            _ => false,
        }
    }
}

/// An immutable description of a view and its subviews.
#[derive(Clone)]
pub struct Element {
    ty: ElementType,
    properties: Arc<dyn AnyProperties>,
    children: Vec<Element>,
}

impl Element {
    pub fn new<P: Properties>(ty: ElementType, properties: P, children: Vec<Element>) -> Element {
        Element {
            ty,
            properties: Arc::new(properties),
            children,
        }
    }

    /// Creates an element from an already type-erased property bag.
    pub fn from_parts(
        ty: ElementType,
        properties: Arc<dyn AnyProperties>,
        children: Vec<Element>,
    ) -> Element {
        Element {
            ty,
            properties,
            children,
        }
    }

    /// A flexbox container.
    pub fn boxed(properties: DefaultProperties, children: Vec<Element>) -> Element {
        Element::new(ElementType::Native(NativeType::Box), properties, children)
    }

    pub fn text(properties: DefaultProperties) -> Element {
        Element::new(ElementType::Native(NativeType::Text), properties, Vec::new())
    }

    pub fn image(properties: ImageProperties) -> Element {
        Element::new(ElementType::Native(NativeType::Image), properties, Vec::new())
    }

    pub fn text_field(properties: DefaultProperties) -> Element {
        Element::new(ElementType::Native(NativeType::TextField), properties, Vec::new())
    }

    pub fn button(properties: DefaultProperties) -> Element {
        Element::new(ElementType::Native(NativeType::Button), properties, Vec::new())
    }

    /// Wraps a pre-built native view.
    pub fn view(view: ExternalView, properties: DefaultProperties) -> Element {
        Element::new(ElementType::External(view), properties, Vec::new())
    }

    pub fn component<C: Component + Default>(properties: C::Properties) -> Element {
        Element::component_with_children::<C>(properties, Vec::new())
    }

    /// A component element with children, which the component can read while rendering.
    pub fn component_with_children<C: Component + Default>(
        properties: C::Properties,
        children: Vec<Element>,
    ) -> Element {
        Element::new(
            ElementType::Component(ComponentType::of::<C>()),
            properties,
            children,
        )
    }

    pub fn ty(&self) -> &ElementType {
        &self.ty
    }

    pub fn properties(&self) -> &Arc<dyn AnyProperties> {
        &self.properties
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// The explicit key, if any.
    pub fn key(&self) -> Option<&str> {
        self.properties.key()
    }

    /// Returns a copy of this element with its properties replaced.
    pub fn with_properties(&self, properties: Arc<dyn AnyProperties>) -> Element {
        Element {
            ty: self.ty.clone(),
            properties,
            children: self.children.clone(),
        }
    }

    /// Returns a copy of this element with its children replaced.
    pub fn with_children(&self, children: Vec<Element>) -> Element {
        Element {
            ty: self.ty.clone(),
            properties: Arc::clone(&self.properties),
            children,
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Element) -> bool {
        self.ty == other.ty
            && self.key() == other.key()
            && self.properties.eq_dyn(&*other.properties)
            && self.children == other.children
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Element")
            .field("ty", &self.ty)
            .field("properties", &self.properties)
            .field("children", &self.children)
            .finish()
    }
}

/// Identifies a child among its siblings.
///
/// Children without an explicit key are keyed by their position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Explicit(String),
    Index(usize),
}

impl Key {
    pub fn of(element: &Element, index: usize) -> Key {
        match element.key() {
            Some(key) => Key::Explicit(key.to_string()),
            None => Key::Index(index),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Key::Explicit(key) => write!(f, "{}", key),
            Key::Index(index) => write!(f, "#{}", index),
        }
    }
}
