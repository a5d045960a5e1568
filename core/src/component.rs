//! Composite components.
//!
//! A component is a view made up of other views. It has properties (given by its parent), state
//! (owned by itself, changed through a [`StateUpdater`]) and renders an element tree derived from
//! both. Components never appear in the native view tree; only what they render does.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::properties::{AnyProperties, Properties};
use crate::registry::Registry;
use crate::services::Services;
use crate::update_queue::{StateMutation, StateUpdater, UpdateQueue};
use crate::value::Model;
use crate::view_tree::ViewId;
use core::any::Any;
use core::fmt;
use std::sync::{Arc, Weak};

/// Lifecycle phases of a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Constructed but not rendered yet.
    Unbuilt,
    /// Rendered and built for the first time.
    Built,
    /// Has pending state mutations or a forced update.
    Dirty,
    /// Currently rendering and reconciling.
    Rendering,
    /// The last render has been turned into patches.
    Committed,
}

/// A composite view.
///
/// Component values are created with `Default` when their element is first built and live as
/// long as their node. `render` must not have side effects; use the lifecycle hooks for those.
pub trait Component: Send + 'static {
    type Properties: Properties;
    type State: fmt::Debug + Clone + PartialEq + Default + Send + 'static;

    /// The state of a freshly built instance.
    fn initial_state(&self, properties: &Self::Properties) -> Self::State {
        let _ = properties;
        Self::State::default()
    }

    /// Renders the component body.
    fn render(&self, cx: &RenderContext<'_, Self>) -> Result<Element>
    where
        Self: Sized;

    /// Whether a change in properties or state requires a re-render.
    fn should_update(
        &self,
        properties: &Self::Properties,
        next_properties: &Self::Properties,
        state: &Self::State,
        next_state: &Self::State,
    ) -> bool {
        properties != next_properties || state != next_state
    }

    fn will_build(&mut self) {}
    fn did_build(&mut self) {}
    fn will_update(&mut self) {}
    fn did_update(&mut self) {}

    /// Called exactly once, when the component is removed from the tree.
    fn will_detach(&mut self) {}
}

/// Everything a component can see while rendering.
pub struct RenderContext<'a, C: Component> {
    id: ViewId,
    properties: &'a C::Properties,
    state: &'a C::State,
    children: &'a [Element],
    queue: &'a Weak<UpdateQueue>,
    services: &'a Services,
}

impl<'a, C: Component> RenderContext<'a, C> {
    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn properties(&self) -> &'a C::Properties {
        self.properties
    }

    pub fn state(&self) -> &'a C::State {
        self.state
    }

    /// The children of the element this component was built from.
    pub fn children(&self) -> &'a [Element] {
        self.children
    }

    /// Returns a handle that can update this component's state, e.g. from an event handler.
    pub fn updater(&self) -> StateUpdater<C::State> {
        StateUpdater::new(self.id, Weak::clone(self.queue))
    }

    pub fn registry(&self) -> &'a Registry {
        &self.services.registry
    }

    /// Loads the template at `location` and builds it against `model`.
    pub fn template(&self, location: &str, model: &dyn Model) -> Result<Element> {
        let templates = self
            .services
            .templates
            .as_ref()
            .ok_or_else(|| Error::MissingTemplate(location.to_string()))?;
        templates.template(location)?.build(model)
    }
}

/// Type-erased interface to a mounted component, as stored in the view tree.
pub(crate) trait ComponentHost: Send + fmt::Debug {
    fn name(&self) -> &'static str;

    fn phase(&self) -> Phase;

    fn set_phase(&mut self, phase: Phase);

    fn properties(&self) -> &Arc<dyn AnyProperties>;

    fn state(&self) -> &dyn Any;

    /// Commits new properties and state mutations and returns whether to re-render.
    fn update(
        &mut self,
        next: &Arc<dyn AnyProperties>,
        mutations: Vec<StateMutation>,
        force: bool,
    ) -> Result<bool>;

    fn render(
        &self,
        id: ViewId,
        children: &[Element],
        queue: &Weak<UpdateQueue>,
        services: &Services,
    ) -> Result<Element>;

    fn will_build(&mut self);
    fn did_build(&mut self);
    fn will_update(&mut self);
    fn did_update(&mut self);
    fn will_detach(&mut self);
}

/// A component value together with its properties, state and phase.
pub(crate) struct Mounted<C: Component> {
    component: C,
    properties: Arc<dyn AnyProperties>,
    state: C::State,
    phase: Phase,
}

impl<C: Component + Default> Mounted<C> {
    pub(crate) fn construct(properties: &Arc<dyn AnyProperties>) -> Result<Box<dyn ComponentHost>> {
        let typed = downcast::<C>(properties)?;
        let component = C::default();
        let state = component.initial_state(typed);
        Ok(Box::new(Mounted {
            component,
            properties: Arc::clone(properties),
            state,
            phase: Phase::Unbuilt,
        }))
    }
}

fn downcast<C: Component>(properties: &Arc<dyn AnyProperties>) -> Result<&C::Properties> {
    properties
        .downcast_ref::<C::Properties>()
        .ok_or_else(|| Error::PropertiesMismatch {
            component: core::any::type_name::<C>(),
            expected: core::any::type_name::<C::Properties>(),
            found: properties.type_name(),
        })
}

impl<C: Component> ComponentHost for Mounted<C> {
    fn name(&self) -> &'static str {
        core::any::type_name::<C>()
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    fn properties(&self) -> &Arc<dyn AnyProperties> {
        &self.properties
    }

    fn state(&self) -> &dyn Any {
        &self.state
    }

    fn update(
        &mut self,
        next: &Arc<dyn AnyProperties>,
        mutations: Vec<StateMutation>,
        force: bool,
    ) -> Result<bool> {
        let current = downcast::<C>(&self.properties)?;
        let next_typed = downcast::<C>(next)?;

        let mut next_state = self.state.clone();
        for mutation in mutations {
            mutation(&mut next_state);
        }

        let should_update =
            force || self.component.should_update(current, next_typed, &self.state, &next_state);

        self.properties = Arc::clone(next);
        self.state = next_state;
        Ok(should_update)
    }

    fn render(
        &self,
        id: ViewId,
        children: &[Element],
        queue: &Weak<UpdateQueue>,
        services: &Services,
    ) -> Result<Element> {
        let cx = RenderContext::<C> {
            id,
            properties: downcast::<C>(&self.properties)?,
            state: &self.state,
            children,
            queue,
            services,
        };
        self.component.render(&cx)
    }

    fn will_build(&mut self) {
        self.component.will_build();
    }

    fn did_build(&mut self) {
        self.component.did_build();
    }

    fn will_update(&mut self) {
        self.component.will_update();
    }

    fn did_update(&mut self) {
        self.component.did_update();
    }

    fn will_detach(&mut self) {
        self.component.will_detach();
    }
}

impl<C: Component> fmt::Debug for Mounted<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Mounted")
            .field("component", &core::any::type_name::<C>())
            .field("state", &self.state)
            .field("phase", &self.phase)
            .finish()
    }
}
