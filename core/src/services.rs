use crate::layout::{ApproximateTextMeasurer, TextMeasurer};
use crate::registry::Registry;
use crate::template::TemplateService;
use core::fmt;
use std::sync::Arc;

/// Collaborators a view tree hands to its components and layout pass.
#[derive(Clone)]
pub struct Services {
    pub registry: Arc<Registry>,
    pub templates: Option<Arc<dyn TemplateService>>,
    pub text_measurer: Arc<dyn TextMeasurer>,
}

impl Default for Services {
    fn default() -> Self {
        Services {
            registry: Arc::new(Registry::default()),
            templates: None,
            text_measurer: Arc::new(ApproximateTextMeasurer::default()),
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Services")
            .field("registry", &self.registry)
            .field("templates", &self.templates.is_some())
            .field("text_measurer", &self.text_measurer)
            .finish()
    }
}
