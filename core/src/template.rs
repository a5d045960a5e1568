//! Templates: element trees loaded from somewhere else, bound to a data model and styled.
//!
//! Parsing template files and matching style sheet selectors are up to the implementations of
//! these traits; the view tree only sees the elements they produce.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::value::{Model, RawProperties};
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

/// Produces an element tree for a model.
pub trait ElementProvider: Send + Sync {
    fn build(&self, model: &dyn Model) -> Result<Element>;
}

impl<F> ElementProvider for F
where
    F: Fn(&dyn Model) -> Result<Element> + Send + Sync,
{
    fn build(&self, model: &dyn Model) -> Result<Element> {
        self(model)
    }
}

/// Computes style attributes for elements.
pub trait StyleSheet: Send + Sync {
    /// The attributes that apply to `element`. Empty if no rule matches.
    fn styles_for(&self, element: &Element) -> RawProperties;
}

impl<F> StyleSheet for F
where
    F: Fn(&Element) -> RawProperties + Send + Sync,
{
    fn styles_for(&self, element: &Element) -> RawProperties {
        self(element)
    }
}

/// An element provider and an optional style sheet.
#[derive(Clone)]
pub struct Template {
    pub provider: Arc<dyn ElementProvider>,
    pub style_sheet: Option<Arc<dyn StyleSheet>>,
}

impl Template {
    pub fn new<P: ElementProvider + 'static>(provider: P) -> Template {
        Template {
            provider: Arc::new(provider),
            style_sheet: None,
        }
    }

    pub fn with_style_sheet<S: StyleSheet + 'static>(mut self, style_sheet: S) -> Template {
        self.style_sheet = Some(Arc::new(style_sheet));
        self
    }

    /// Builds the element tree and applies the style sheet to it.
    ///
    /// Properties set by the provider take precedence over styles.
    pub fn build(&self, model: &dyn Model) -> Result<Element> {
        let element = self.provider.build(model)?;
        Ok(match &self.style_sheet {
            Some(style_sheet) => apply_styles(&element, &**style_sheet),
            None => element,
        })
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Template")
            .field("style_sheet", &self.style_sheet.is_some())
            .finish()
    }
}

fn apply_styles(element: &Element, style_sheet: &dyn StyleSheet) -> Element {
    let styles = style_sheet.styles_for(element);
    let properties = if styles.is_empty() {
        Arc::clone(element.properties())
    } else {
        element.properties().over_raw(&styles)
    };
    let children = element
        .children()
        .iter()
        .map(|child| apply_styles(child, style_sheet))
        .collect();
    Element::from_parts(element.ty().clone(), properties, children)
}

/// Loads templates by location.
pub trait TemplateService: Send + Sync {
    fn template(&self, location: &str) -> Result<Template>;
}

/// Templates held in memory.
#[derive(Clone, Debug, Default)]
pub struct StaticTemplateService {
    templates: HashMap<String, Template>,
}

impl StaticTemplateService {
    pub fn new() -> StaticTemplateService {
        StaticTemplateService::default()
    }

    pub fn insert(&mut self, location: impl Into<String>, template: Template) {
        self.templates.insert(location.into(), template);
    }

    pub fn with(mut self, location: impl Into<String>, template: Template) -> Self {
        self.insert(location, template);
        self
    }
}

impl TemplateService for StaticTemplateService {
    fn template(&self, location: &str) -> Result<Template> {
        self.templates
            .get(location)
            .cloned()
            .ok_or_else(|| Error::MissingTemplate(location.to_string()))
    }
}
