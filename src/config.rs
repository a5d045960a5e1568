use cgmath::Vector2;
use plume_core::template::TemplateService;
use plume_core::{Registry, Services, TextMeasurer};
use std::sync::Arc;

/// Host configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Size of the area the root view is laid out in.
    pub viewport: Vector2<f64>,

    /// Name of the thread update cycles run on.
    pub worker_name: String,

    /// Services handed to every component.
    pub services: Services,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            viewport: Vector2::new(800., 600.),
            worker_name: "plume-worker".into(),
            services: Services::default(),
        }
    }
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    pub fn viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport = Vector2::new(width, height);
        self
    }

    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Replaces the element type registry used by templates.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.services.registry = Arc::new(registry);
        self
    }

    pub fn templates<T: TemplateService + 'static>(mut self, templates: T) -> Self {
        self.services.templates = Some(Arc::new(templates));
        self
    }

    pub fn text_measurer<M: TextMeasurer + 'static>(mut self, measurer: M) -> Self {
        self.services.text_measurer = Arc::new(measurer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::template::StaticTemplateService;

    #[test]
    fn builder_overrides_defaults() {
        let config = Config::new()
            .viewport(320., 480.)
            .worker_name("ui")
            .templates(StaticTemplateService::new());
        assert_eq!(config.viewport, Vector2::new(320., 480.));
        assert_eq!(config.worker_name, "ui");
        assert!(config.services.templates.is_some());
        assert!(config.services.registry.contains("box"));
    }
}
