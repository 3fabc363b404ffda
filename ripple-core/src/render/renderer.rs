//! Renderer
//!
//! The renderer turns a pair of tree snapshots into host operations. It is a
//! match over the node type of the new snapshot:
//!
//! - Elements are created, populated and inserted on mount. On patch their
//!   props are diffed entry by entry, then their children are reconciled.
//! - Text nodes are created on mount and only rewritten when the content
//!   differs.
//! - Fragments have no host node of their own; they mount and reconcile their
//!   children in place.
//! - Components get an instance with a render effect. Patching keeps the old
//!   instance and only writes the prop diff into it.
//!
//! If the old and new node have different types, the old one is unmounted and
//! the new one mounted in its slot.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::component::{Component, ComponentInstance};
use super::host::{HostNode, HostOps};
use super::vnode::{Children, NodeType, VNode};
use crate::error::{Error, Result};
use crate::reactive::{Effect, EffectOptions, Runtime};

/// Renders tree snapshots into a host backend.
pub struct Renderer<H: HostOps + 'static> {
    inner: Rc<RendererInner<H>>,
}

pub(crate) struct RendererInner<H: HostOps + 'static> {
    this: Weak<RendererInner<H>>,
    runtime: Runtime,
    host: RefCell<H>,
    /// Mounted tree per container.
    roots: RefCell<HashMap<HostNode, VNode>>,
}

impl<H: HostOps + 'static> Renderer<H> {
    pub fn new(runtime: &Runtime, host: H) -> Self {
        let inner = Rc::new_cyclic(|this| RendererInner {
            this: this.clone(),
            runtime: runtime.clone(),
            host: RefCell::new(host),
            roots: RefCell::new(HashMap::new()),
        });
        Self { inner }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn host(&self) -> Ref<'_, H> {
        self.inner.host.borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, H> {
        self.inner.host.borrow_mut()
    }

    /// Render `vnode` into `container`, patching whatever was rendered there
    /// before. `None` unmounts the current tree.
    pub fn render(&self, vnode: Option<VNode>, container: HostNode) -> Result<()> {
        let previous = self.inner.roots.borrow_mut().remove(&container);

        match (previous, vnode) {
            (mut previous, Some(mut vnode)) => {
                if let Err(err) = self.inner.patch(previous.as_mut(), &mut vnode, container, None) {
                    self.restore_root(container, previous);
                    return Err(err);
                }
                self.inner.roots.borrow_mut().insert(container, vnode);
            }
            (Some(previous), None) => {
                if let Err(err) = self.inner.unmount(&previous, container, true) {
                    self.restore_root(container, Some(previous));
                    return Err(err);
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Keep tracking a tree whose update failed so the host nodes it owns
    /// are still reached by the next render.
    fn restore_root(&self, container: HostNode, previous: Option<VNode>) {
        if let Some(previous) = previous {
            tracing::error!(%container, "render failed; keeping previous tree");
            self.inner.roots.borrow_mut().insert(container, previous);
        }
    }

    /// First host node of the tree mounted in `container`.
    pub fn root_el(&self, container: HostNode) -> Option<HostNode> {
        self.inner.roots.borrow().get(&container).and_then(VNode::el)
    }
}

impl<H: HostOps + 'static> RendererInner<H> {
    /// Reconcile `old` into `new`, inserting anything new before `anchor`.
    pub(crate) fn patch(
        &self,
        mut old: Option<&mut VNode>,
        new: &mut VNode,
        container: HostNode,
        mut anchor: Option<HostNode>,
    ) -> Result<()> {
        if let Some(previous) = old.as_deref() {
            if !previous.node_type.same(&new.node_type) {
                anchor = previous
                    .last_host_node()
                    .and_then(|last| self.host.borrow().next_sibling(last));
                self.unmount(previous, container, true)?;
                old = None;
            }
        }

        match &new.node_type {
            NodeType::Element(_) => match old {
                None => self.mount_element(new, container, anchor),
                Some(old) => self.patch_element(old, new),
            },
            NodeType::Text => match old {
                None => self.mount_text(new, container, anchor),
                Some(old) => self.patch_text(old, new),
            },
            NodeType::Fragment => match old {
                None => {
                    if let Children::Nodes(children) = &mut new.children {
                        for child in children {
                            self.patch(None, child, container, anchor)?;
                        }
                    }
                    Ok(())
                }
                Some(old) => self.patch_children(old, new, container, anchor),
            },
            NodeType::Component(component) => {
                let component = component.clone();
                match old {
                    None => self.mount_component(component, new, container, anchor),
                    Some(old) => self.patch_component(old, new),
                }
            }
        }
    }

    fn mount_element(&self, vnode: &mut VNode, container: HostNode, anchor: Option<HostNode>) -> Result<()> {
        let NodeType::Element(tag) = &vnode.node_type else {
            return Ok(());
        };
        let el = self.host.borrow_mut().create_element(tag);
        vnode.el = Some(el);
        tracing::debug!(%el, tag = %tag, "mount element");

        match &mut vnode.children {
            Children::Text(text) => self.host.borrow_mut().set_element_text(el, text),
            Children::Nodes(children) => {
                for child in children {
                    self.patch(None, child, el, None)?;
                }
            }
            Children::None => {}
        }

        for (key, value) in &vnode.props {
            self.host.borrow_mut().patch_prop(el, key, None, Some(value));
        }

        self.host.borrow_mut().insert(el, container, anchor);
        Ok(())
    }

    fn patch_element(&self, old: &mut VNode, new: &mut VNode) -> Result<()> {
        let el = old.el.ok_or(Error::MissingHostNode {
            context: "patching an element",
        })?;
        new.el = Some(el);

        for (key, next) in &new.props {
            let prev = old.props.get(key);
            if prev != Some(next) {
                self.host.borrow_mut().patch_prop(el, key, prev, Some(next));
            }
        }
        for (key, prev) in &old.props {
            if !new.props.contains_key(key) {
                self.host.borrow_mut().patch_prop(el, key, Some(prev), None);
            }
        }

        self.patch_children(old, new, el, None)
    }

    fn mount_text(&self, vnode: &mut VNode, container: HostNode, anchor: Option<HostNode>) -> Result<()> {
        let content = match &vnode.children {
            Children::Text(text) => text.as_str(),
            _ => "",
        };
        let mut host = self.host.borrow_mut();
        let el = host.create_text(content);
        host.insert(el, container, anchor);
        vnode.el = Some(el);
        Ok(())
    }

    fn patch_text(&self, old: &mut VNode, new: &mut VNode) -> Result<()> {
        let el = old.el.ok_or(Error::MissingHostNode {
            context: "patching a text node",
        })?;
        new.el = Some(el);

        if let Children::Text(next) = &new.children {
            let changed = !matches!(&old.children, Children::Text(prev) if prev == next);
            if changed {
                self.host.borrow_mut().set_text(el, next);
            }
        }
        Ok(())
    }

    /// Reconcile children of `old` into `new`. The three shapes (none, text,
    /// nodes) can replace each other in any direction.
    pub(crate) fn patch_children(
        &self,
        old: &mut VNode,
        new: &mut VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<()> {
        match (&mut old.children, &mut new.children) {
            (Children::Nodes(old_children), Children::Nodes(new_children)) => {
                self.patch_keyed_children(old_children, new_children, container, anchor)
            }
            (old_children, Children::Nodes(new_children)) => {
                if matches!(old_children, Children::Text(_)) {
                    self.host.borrow_mut().set_element_text(container, "");
                }
                for child in new_children {
                    self.patch(None, child, container, anchor)?;
                }
                Ok(())
            }
            (old_children, Children::Text(text)) => {
                match old_children {
                    Children::Nodes(nodes) => {
                        for node in nodes.iter() {
                            self.unmount(node, container, true)?;
                        }
                    }
                    Children::Text(prev) if prev == text => return Ok(()),
                    _ => {}
                }
                self.host.borrow_mut().set_element_text(container, text);
                Ok(())
            }
            (Children::Nodes(nodes), Children::None) => {
                for node in nodes.iter() {
                    self.unmount(node, container, true)?;
                }
                Ok(())
            }
            (Children::Text(_), Children::None) => {
                self.host.borrow_mut().set_element_text(container, "");
                Ok(())
            }
            (Children::None, Children::None) => Ok(()),
        }
    }

    /// Tear down `vnode`. With `remove`, its host nodes are also detached
    /// from `container`; without, only component teardown runs (used for
    /// descendants of an element that is removed as a whole).
    pub(crate) fn unmount(&self, vnode: &VNode, container: HostNode, remove: bool) -> Result<()> {
        match &vnode.node_type {
            NodeType::Element(_) => {
                let el = vnode.el.ok_or(Error::MissingHostNode {
                    context: "unmounting an element",
                })?;
                if let Children::Nodes(children) = &vnode.children {
                    for child in children {
                        self.unmount(child, el, false)?;
                    }
                }
                if remove {
                    self.host.borrow_mut().remove(container, el);
                }
                tracing::debug!(%el, "unmount element");
            }
            NodeType::Text => {
                let el = vnode.el.ok_or(Error::MissingHostNode {
                    context: "unmounting a text node",
                })?;
                if remove {
                    self.host.borrow_mut().remove(container, el);
                }
            }
            NodeType::Fragment => {
                if let Children::Nodes(children) = &vnode.children {
                    for child in children {
                        self.unmount(child, container, remove)?;
                    }
                }
            }
            NodeType::Component(_) => {
                let Some(instance) = &vnode.component else {
                    return Err(Error::MissingHostNode {
                        context: "unmounting a component",
                    });
                };
                instance.stop();
                let sub_tree = instance.sub_tree.borrow_mut().take();
                if let Some(sub_tree) = sub_tree {
                    self.unmount(&sub_tree, instance.container, remove)?;
                }
                instance.hook(|component, ctx| component.unmounted(ctx));
                tracing::debug!(component = instance.component.name(), "unmount component");
            }
        }
        Ok(())
    }

    /// Move every host node of `vnode` before `anchor`.
    pub(crate) fn move_node(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let mut nodes = Vec::new();
        vnode.host_nodes(&mut nodes);
        let mut host = self.host.borrow_mut();
        for node in nodes {
            host.insert(node, container, anchor);
        }
    }

    fn mount_component(
        &self,
        component: Rc<dyn Component>,
        vnode: &mut VNode,
        container: HostNode,
        anchor: Option<HostNode>,
    ) -> Result<()> {
        let instance = Rc::new(ComponentInstance::new(
            &self.runtime,
            component,
            &vnode.props,
            container,
            anchor,
        ));
        instance.hook(|component, ctx| component.created(ctx));

        let body = {
            let renderer = self.this.clone();
            let instance = Rc::downgrade(&instance);
            move || {
                let (Some(renderer), Some(instance)) = (renderer.upgrade(), instance.upgrade()) else {
                    return;
                };
                if let Err(err) = renderer.update_component(&instance) {
                    tracing::error!(component = instance.component.name(), %err, "render job failed");
                    *instance.failure.borrow_mut() = Some(err);
                }
            }
        };
        let scheduler = {
            let runtime = self.runtime.downgrade();
            move |effect: &Effect| {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.queue_effect(effect);
                }
            }
        };
        let effect = self
            .runtime
            .effect_with(body, EffectOptions::default().lazy().scheduler(scheduler));
        *instance.effect.borrow_mut() = Some(effect.clone());
        vnode.component = Some(instance.clone());

        tracing::debug!(component = instance.component.name(), "mount component");
        effect.run();

        let failure = instance.failure.borrow_mut().take();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Render the component and patch its previous sub tree.
    fn update_component(&self, instance: &ComponentInstance) -> Result<()> {
        let mut next = instance.component.render(&instance.ctx);

        if !instance.mounted.get() {
            instance.hook(|component, ctx| component.before_mount(ctx));
            self.patch(None, &mut next, instance.container, instance.anchor)?;
            *instance.sub_tree.borrow_mut() = Some(next);
            instance.mounted.set(true);
            instance.hook(|component, ctx| component.mounted(ctx));
            return Ok(());
        }

        instance.hook(|component, ctx| component.before_update(ctx));
        let mut previous = instance.sub_tree.borrow_mut().take();
        // New trailing nodes go before whatever follows the component.
        let anchor = previous
            .as_ref()
            .and_then(VNode::last_host_node)
            .and_then(|last| self.host.borrow().next_sibling(last));
        let result = self.patch(previous.as_mut(), &mut next, instance.container, anchor);
        if let Err(err) = result {
            *instance.sub_tree.borrow_mut() = previous;
            return Err(err);
        }
        *instance.sub_tree.borrow_mut() = Some(next);
        instance.hook(|component, ctx| component.updated(ctx));
        Ok(())
    }

    /// Keep the old instance and write the prop diff into it.
    fn patch_component(&self, old: &mut VNode, new: &mut VNode) -> Result<()> {
        let instance = old.component.take().ok_or(Error::MissingHostNode {
            context: "patching a component",
        })?;
        instance.ctx.apply_props(&new.props);
        new.component = Some(instance);
        Ok(())
    }
}
