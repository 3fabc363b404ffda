//! Component Contract
//!
//! A [`Component`] is a descriptor shared by every vnode that renders it. The
//! per-mount state lives in a [`ComponentInstance`], created when the vnode
//! is first mounted and carried over to the matching vnode on every patch.
//!
//! # Props
//!
//! Vnode props are split on mount and on every patch:
//!
//! - handlers become event handlers reachable through [`RenderContext::emit`]
//! - declared names and `on*` names become component props
//! - everything else becomes an attribute
//!
//! Props are held in a shallow reactive record. A parent patch writes the
//! changed ones into it, and the component re-renders on the next flush if
//! it read them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use super::host::HostNode;
use super::vnode::{Handler, PropValue, Props, VNode};
use crate::error::Error;
use crate::reactive::{Container, Diagnostic, Effect, Reactive, Runtime, Value};

/// A reusable piece of UI with its own reactive state.
///
/// Every hook defaults to a no-op. Hooks run outside the render effect:
/// reads inside them do not subscribe the render, and state written from a
/// hook schedules a fresh render.
pub trait Component {
    fn name(&self) -> &str {
        "Anonymous"
    }

    /// Declared prop names.
    fn props(&self) -> &[&'static str] {
        &[]
    }

    /// Initial state. Called once per mount.
    fn data(&self) -> Container {
        Container::record(Vec::<(String, Value)>::new())
    }

    /// Produce the tree for the current state. Reads are tracked.
    fn render(&self, ctx: &RenderContext) -> VNode;

    fn before_create(&self) {}

    fn created(&self, _ctx: &RenderContext) {}

    fn before_mount(&self, _ctx: &RenderContext) {}

    fn mounted(&self, _ctx: &RenderContext) {}

    fn before_update(&self, _ctx: &RenderContext) {}

    fn updated(&self, _ctx: &RenderContext) {}

    fn unmounted(&self, _ctx: &RenderContext) {}
}

/// What a component sees while rendering or running a hook.
pub struct RenderContext {
    runtime: Runtime,
    name: String,
    declared: Vec<&'static str>,
    state: Reactive,
    props: Reactive,
    attrs: Reactive,
    handlers: RefCell<IndexMap<String, Handler>>,
}

impl RenderContext {
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Deep reactive component state.
    pub fn state(&self) -> &Reactive {
        &self.state
    }

    /// Read a prop. Tracked.
    pub fn prop(&self, name: &str) -> Value {
        self.props.get(name)
    }

    /// Read a non-prop attribute. Tracked.
    pub fn attr(&self, name: &str) -> Value {
        self.attrs.get(name)
    }

    /// Read state first, then props. Unknown names report a diagnostic and
    /// read as null.
    pub fn get(&self, name: &str) -> Value {
        if self.state.raw().has_raw(&name.into()) {
            return self.state.get(name);
        }
        if self.props.raw().has_raw(&name.into()) || self.is_declared(name) {
            return self.props.get(name);
        }

        self.runtime.report(Diagnostic::UndeclaredProperty {
            component: self.name.clone(),
            name: name.to_string(),
        });
        Value::Null
    }

    /// Call the `on<Event>` handler bound by the parent, if any.
    pub fn emit(&self, event: &str, args: &[Value]) {
        let prop = handler_name(event);
        let handler = self.handlers.borrow().get(&prop).cloned();
        match handler {
            Some(handler) => handler.call(args),
            None => self.runtime.report(Diagnostic::MissingHandler {
                component: self.name.clone(),
                event: event.to_string(),
            }),
        }
    }

    /// Split vnode props and write them into this context.
    ///
    /// Only changed values announce anything, and names missing from `props`
    /// are deleted.
    pub(crate) fn apply_props(&self, props: &Props) {
        let mut handlers = IndexMap::new();
        let mut seen_props = Vec::new();
        let mut seen_attrs = Vec::new();

        for (name, value) in props {
            match value {
                PropValue::Handler(handler) => {
                    handlers.insert(name.clone(), handler.clone());
                }
                PropValue::Value(value) if self.is_prop(name) => {
                    self.props.set(name.as_str(), value.clone());
                    seen_props.push(name.as_str());
                }
                PropValue::Value(value) => {
                    self.attrs.set(name.as_str(), value.clone());
                    seen_attrs.push(name.as_str());
                }
            }
        }

        for (target, seen) in [(&self.props, seen_props), (&self.attrs, seen_attrs)] {
            for key in target.raw().keys_raw() {
                let stale = key.as_name().is_some_and(|name| !seen.iter().any(|kept| *kept == name));
                if stale {
                    target.delete(key);
                }
            }
        }

        *self.handlers.borrow_mut() = handlers;
    }

    fn is_declared(&self, name: &str) -> bool {
        self.declared.iter().any(|declared| *declared == name)
    }

    fn is_prop(&self, name: &str) -> bool {
        self.is_declared(name) || name.starts_with("on")
    }
}

/// `click` -> `onClick`.
fn handler_name(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

/// Live state of one mounted component.
pub(crate) struct ComponentInstance {
    pub(crate) component: Rc<dyn Component>,
    pub(crate) ctx: RenderContext,
    pub(crate) sub_tree: RefCell<Option<VNode>>,
    pub(crate) mounted: Cell<bool>,
    pub(crate) effect: RefCell<Option<Effect>>,
    /// Host parent the sub tree is rendered into.
    pub(crate) container: HostNode,
    /// Where the first render is inserted.
    pub(crate) anchor: Option<HostNode>,
    /// Error raised by the latest render job.
    pub(crate) failure: RefCell<Option<Error>>,
}

impl ComponentInstance {
    pub(crate) fn new(
        runtime: &Runtime,
        component: Rc<dyn Component>,
        props: &Props,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Self {
        runtime.detached(|| component.before_create());

        let empty = || Container::record(Vec::<(String, Value)>::new());
        let state = runtime.untracked(|| runtime.reactive(&component.data()));
        let ctx = RenderContext {
            runtime: runtime.clone(),
            name: component.name().to_string(),
            declared: component.props().to_vec(),
            state,
            props: runtime.shallow_reactive(&empty()),
            attrs: runtime.shallow_reactive(&empty()),
            handlers: RefCell::new(IndexMap::new()),
        };
        ctx.apply_props(props);

        Self {
            component,
            ctx,
            sub_tree: RefCell::new(None),
            mounted: Cell::new(false),
            effect: RefCell::new(None),
            container,
            anchor,
            failure: RefCell::new(None),
        }
    }

    /// Run a lifecycle hook outside the render effect.
    pub(crate) fn hook(&self, hook: impl FnOnce(&dyn Component, &RenderContext)) {
        self.ctx
            .runtime
            .detached(|| hook(self.component.as_ref(), &self.ctx));
    }

    /// Stop the render effect. The instance never renders again.
    pub(crate) fn stop(&self) {
        if let Some(effect) = self.effect.borrow_mut().take() {
            effect.stop();
        }
    }
}
