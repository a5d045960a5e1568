//! Maps template tag names to element types.

use crate::component::Component;
use crate::element::{ComponentType, Element, ElementType, NativeType};
use crate::error::{Error, Result};
use crate::properties::{AnyProperties, DefaultProperties, ImageProperties, Properties};
use crate::value::RawProperties;
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

type Construct = fn(&RawProperties) -> Arc<dyn AnyProperties>;

fn construct<P: Properties>(raw: &RawProperties) -> Arc<dyn AnyProperties> {
    Arc::new(P::from_raw(raw))
}

#[derive(Clone)]
struct Registration {
    ty: ElementType,
    properties: Construct,
}

/// Resolves tag names to element types and their property bags.
///
/// `Registry::default()` knows the built-in native views: `box`, `text`, `image`, `textfield`
/// and `button`.
#[derive(Clone)]
pub struct Registry {
    types: HashMap<String, Registration>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Registry {
        Registry {
            types: HashMap::new(),
        }
    }

    /// Registers an element type under a tag name, replacing any previous registration.
    pub fn register<P: Properties>(&mut self, name: impl Into<String>, ty: ElementType) {
        let name = name.into();
        log::trace!("registering `{}` as {:?}", name, ty);
        self.types.insert(
            name,
            Registration {
                ty,
                properties: construct::<P>,
            },
        );
    }

    pub fn register_component<C: Component + Default>(&mut self, name: impl Into<String>) {
        self.register::<C::Properties>(name, ElementType::Component(ComponentType::of::<C>()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// The element type registered under `name`.
    pub fn element_type(&self, name: &str) -> Option<&ElementType> {
        self.types.get(name).map(|registration| &registration.ty)
    }

    /// Creates an element for a tag, constructing its properties from raw attributes.
    pub fn element(
        &self,
        name: &str,
        raw: &RawProperties,
        children: Vec<Element>,
    ) -> Result<Element> {
        let registration = self
            .types
            .get(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))?;
        Ok(Element::from_parts(
            registration.ty.clone(),
            (registration.properties)(raw),
            children,
        ))
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Registry::new();
        registry.register::<DefaultProperties>("box", ElementType::Native(NativeType::Box));
        registry.register::<DefaultProperties>("text", ElementType::Native(NativeType::Text));
        registry.register::<ImageProperties>("image", ElementType::Native(NativeType::Image));
        registry.register::<DefaultProperties>(
            "textfield",
            ElementType::Native(NativeType::TextField),
        );
        registry.register::<DefaultProperties>("button", ElementType::Native(NativeType::Button));
        registry
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names: Vec<_> = self.types.keys().collect();
        names.sort();
        f.debug_tuple("Registry").field(&names).finish()
    }
}
