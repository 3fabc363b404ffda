//! Reconciliation Tests
//!
//! These tests render trees into the in-memory host and check both the final
//! host tree and the operations it took to get there.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ripple_core::reactive::{Container, Diagnostic, Runtime, Value};
use ripple_core::render::{
    Component, HostNode, HostOp, MemoryHost, RenderContext, Renderer, VNode,
};

fn setup() -> (Runtime, Renderer<MemoryHost>, HostNode) {
    let rt = Runtime::new();
    let mut host = MemoryHost::new();
    let root = host.create_root();
    (rt.clone(), Renderer::new(&rt, host), root)
}

fn list(keys: &[usize]) -> VNode {
    VNode::element("ul").children(
        keys.iter()
            .map(|key| VNode::element("li").key(*key).text_content(key.to_string())),
    )
}

fn count(renderer: &Renderer<MemoryHost>, predicate: impl Fn(&HostOp) -> bool) -> usize {
    renderer.host().count_ops(predicate)
}

fn moves(renderer: &Renderer<MemoryHost>) -> usize {
    count(renderer, |op| matches!(op, HostOp::Move { .. }))
}

fn inserts(renderer: &Renderer<MemoryHost>) -> usize {
    count(renderer, |op| matches!(op, HostOp::Insert { .. }))
}

fn removes(renderer: &Renderer<MemoryHost>) -> usize {
    count(renderer, |op| matches!(op, HostOp::Remove { .. }))
}

/// Render `from`, clear the log, then render `to`.
fn rerender(from: &[usize], to: &[usize]) -> (Renderer<MemoryHost>, HostNode) {
    let (_rt, renderer, root) = setup();
    renderer.render(Some(list(from)), root).unwrap();
    renderer.host_mut().take_ops();
    renderer.render(Some(list(to)), root).unwrap();
    (renderer, root)
}

fn rendered(renderer: &Renderer<MemoryHost>, root: HostNode) -> String {
    renderer.host().text_content(root)
}

// ============================================================================
// Keyed children
// ============================================================================

#[test]
fn identical_tree_touches_nothing() {
    let (renderer, root) = rerender(&[1, 2, 3], &[1, 2, 3]);
    assert!(renderer.host().ops().is_empty());
    assert_eq!(rendered(&renderer, root), "123");
}

#[test]
fn transposition_is_a_single_move() {
    let (renderer, root) = rerender(&[1, 2, 3, 4], &[1, 3, 2, 4]);
    assert_eq!(moves(&renderer), 1);
    assert_eq!(inserts(&renderer), 0);
    assert_eq!(removes(&renderer), 0);
    assert_eq!(rendered(&renderer, root), "1324");
}

#[test]
fn append_mounts_without_moving() {
    let (renderer, root) = rerender(&[1, 2, 3], &[1, 2, 3, 4]);
    assert_eq!(inserts(&renderer), 1);
    assert_eq!(moves(&renderer), 0);
    assert_eq!(rendered(&renderer, root), "1234");
}

#[test]
fn prepend_mounts_before_first() {
    let (renderer, root) = rerender(&[2, 3], &[1, 2, 3]);
    assert_eq!(inserts(&renderer), 1);
    assert_eq!(moves(&renderer), 0);
    assert_eq!(rendered(&renderer, root), "123");
}

#[test]
fn removing_the_head_is_a_single_remove() {
    let (renderer, root) = rerender(&[1, 2, 3], &[2, 3]);
    assert_eq!(removes(&renderer), 1);
    assert_eq!(moves(&renderer), 0);
    assert_eq!(rendered(&renderer, root), "23");
}

#[test]
fn reversal_keeps_one_node_in_place() {
    let (renderer, root) = rerender(&[1, 2, 3, 4, 5], &[5, 4, 3, 2, 1]);
    assert_eq!(moves(&renderer), 4);
    assert_eq!(inserts(&renderer), 0);
    assert_eq!(rendered(&renderer, root), "54321");
}

#[test]
fn mixed_middle_section() {
    let (renderer, root) = rerender(&[1, 2, 3, 4, 5], &[1, 4, 6, 2, 5]);
    assert_eq!(removes(&renderer), 1);
    assert_eq!(inserts(&renderer), 1);
    assert_eq!(moves(&renderer), 1);
    assert_eq!(rendered(&renderer, root), "14625");
}

#[test]
fn unkeyed_children_are_replaced() {
    let (_rt, renderer, root) = setup();
    let plain = |labels: &[&str]| {
        VNode::element("ul").children(labels.iter().map(|label| VNode::element("li").text_content(*label)))
    };

    renderer.render(Some(plain(&["a", "b"])), root).unwrap();
    renderer.host_mut().take_ops();
    renderer.render(Some(plain(&["a", "b"])), root).unwrap();

    assert_eq!(removes(&renderer), 2);
    assert_eq!(inserts(&renderer), 2);
    assert_eq!(rendered(&renderer, root), "ab");
}

#[test]
fn keyed_fragment_reorders_in_place() {
    let (_rt, renderer, root) = setup();
    let fragment = |keys: &[usize]| {
        VNode::fragment(keys.iter().map(|key| VNode::text(key.to_string()).key(*key)))
    };

    renderer.render(Some(fragment(&[1, 2, 3])), root).unwrap();
    renderer.render(Some(fragment(&[3, 2, 1])), root).unwrap();
    assert_eq!(rendered(&renderer, root), "321");
}

// ============================================================================
// Elements and text
// ============================================================================

#[test]
fn props_are_diffed_entry_by_entry() {
    let (_rt, renderer, root) = setup();
    renderer
        .render(Some(VNode::element("div").prop("class", "a").prop("id", "x").prop("title", "t")), root)
        .unwrap();
    renderer.host_mut().take_ops();

    renderer
        .render(Some(VNode::element("div").prop("class", "b").prop("title", "t")), root)
        .unwrap();

    let host = renderer.host();
    assert_eq!(host.count_ops(|op| matches!(op, HostOp::SetProp { .. })), 1);
    assert_eq!(host.count_ops(|op| matches!(op, HostOp::RemoveProp { .. })), 1);

    let div = host.children(root)[0];
    assert_eq!(host.attr(div, "class"), Some(&Value::from("b")));
    assert_eq!(host.attr(div, "id"), None);
}

#[test]
fn text_is_only_rewritten_when_changed() {
    let (_rt, renderer, root) = setup();
    renderer.render(Some(VNode::text("a")), root).unwrap();
    renderer.host_mut().take_ops();

    renderer.render(Some(VNode::text("a")), root).unwrap();
    assert!(renderer.host().ops().is_empty());

    renderer.render(Some(VNode::text("b")), root).unwrap();
    assert_eq!(count(&renderer, |op| matches!(op, HostOp::SetText { .. })), 1);
    assert_eq!(rendered(&renderer, root), "b");
}

#[test]
fn type_change_replaces_in_the_same_slot() {
    let (_rt, renderer, root) = setup();
    let tree = |middle: VNode| {
        VNode::fragment([
            VNode::text("a").key(1),
            middle.key(2),
            VNode::text("c").key(3),
        ])
    };

    renderer.render(Some(tree(VNode::element("b").text_content("b"))), root).unwrap();
    renderer.render(Some(tree(VNode::text("B"))), root).unwrap();

    assert_eq!(rendered(&renderer, root), "aBc");
    assert_eq!(renderer.host().children(root).len(), 3);
}

#[test]
fn children_switch_between_text_and_nodes() {
    let (_rt, renderer, root) = setup();

    renderer.render(Some(VNode::element("p").text_content("hi")), root).unwrap();
    renderer
        .render(Some(VNode::element("p").children([VNode::text("a"), VNode::text("b")])), root)
        .unwrap();
    assert_eq!(rendered(&renderer, root), "ab");

    renderer.render(Some(VNode::element("p").text_content("bye")), root).unwrap();
    assert_eq!(rendered(&renderer, root), "bye");
    let p = renderer.host().children(root)[0];
    assert!(renderer.host().children(p).is_empty());

    renderer.render(Some(VNode::element("p")), root).unwrap();
    assert_eq!(rendered(&renderer, root), "");
}

#[test]
fn rendering_none_unmounts() {
    let (_rt, renderer, root) = setup();
    renderer.render(Some(list(&[1, 2])), root).unwrap();
    renderer.render(None, root).unwrap();

    assert!(renderer.host().children(root).is_empty());
    assert_eq!(renderer.root_el(root), None);
}

#[test]
fn element_handlers_are_dispatched() {
    let (_rt, renderer, root) = setup();
    let clicks = Rc::new(Cell::new(0));
    let button = {
        let clicks = clicks.clone();
        VNode::element("button").on("onClick", move |_| clicks.set(clicks.get() + 1))
    };

    renderer.render(Some(button), root).unwrap();
    let el = renderer.root_el(root).unwrap();

    assert!(renderer.dispatch(el, "click", &[]));
    assert!(!renderer.dispatch(el, "hover", &[]));
    assert_eq!(clicks.get(), 1);
}

#[test]
fn json_snapshot_of_rendered_tree() {
    let (_rt, renderer, root) = setup();
    renderer
        .render(Some(VNode::element("ul").prop("class", "list").children([VNode::text("x")])), root)
        .unwrap();

    assert_eq!(
        renderer.host().to_json(root),
        serde_json::json!({
            "tag": "root",
            "attrs": {},
            "children": [{ "tag": "ul", "attrs": { "class": "list" }, "children": ["x"] }]
        })
    );
}

// ============================================================================
// Components
// ============================================================================

struct Counter;

impl Component for Counter {
    fn name(&self) -> &str {
        "Counter"
    }

    fn data(&self) -> Container {
        Container::record([("count", Value::from(0))])
    }

    fn render(&self, ctx: &RenderContext) -> VNode {
        let count = ctx.get("count").as_number().unwrap_or(0.0);
        let state = ctx.state().clone();
        VNode::element("button")
            .on("onClick", move |_| {
                let count = state.get("count").as_number().unwrap_or(0.0);
                state.set("count", count + 1.0);
            })
            .text_content(count.to_string())
    }
}

#[test]
fn component_rerenders_on_flush() {
    let (rt, renderer, root) = setup();
    renderer.render(Some(VNode::component(Rc::new(Counter))), root).unwrap();
    assert_eq!(rendered(&renderer, root), "0");

    let button = renderer.root_el(root).unwrap();
    renderer.dispatch(button, "click", &[]);
    renderer.dispatch(button, "click", &[]);

    // Nothing visible until the tick is flushed, then a single render.
    assert_eq!(rendered(&renderer, root), "0");
    assert_eq!(rt.flush(), 1);
    assert_eq!(rendered(&renderer, root), "2");

    // The button itself is reused.
    assert_eq!(renderer.root_el(root), Some(button));
}

#[test]
fn unmounted_component_stops_rendering() {
    let (rt, renderer, root) = setup();
    renderer.render(Some(VNode::component(Rc::new(Counter))), root).unwrap();
    let button = renderer.root_el(root).unwrap();

    let handler = renderer.host().handler(button, "click").unwrap();
    renderer.render(None, root).unwrap();

    handler.call(&[]);
    assert_eq!(rt.flush(), 0);
    assert!(renderer.host().children(root).is_empty());
}

/// Renders `n` keyed items as a fragment, so it owns no wrapper element.
struct Items {
    state: Container,
}

impl Component for Items {
    fn name(&self) -> &str {
        "Items"
    }

    fn data(&self) -> Container {
        self.state.clone()
    }

    fn render(&self, ctx: &RenderContext) -> VNode {
        let n = ctx.get("n").as_number().unwrap_or(0.0) as usize;
        VNode::fragment((1..=n).map(|i| VNode::element("li").key(i).text_content(format!("i{i}"))))
    }
}

#[test]
fn growing_fragment_component_stays_before_its_siblings() {
    let (rt, renderer, root) = setup();
    let state = Container::record([("n", Value::from(1))]);
    let tree = VNode::element("ul").children([
        VNode::component(Rc::new(Items { state: state.clone() })).key(1),
        VNode::element("li").key(2).text_content("tail"),
    ]);
    renderer.render(Some(tree), root).unwrap();
    assert_eq!(rendered(&renderer, root), "i1tail");

    rt.reactive(&state).set("n", 2);
    assert_eq!(rt.flush(), 1);
    assert_eq!(rendered(&renderer, root), "i1i2tail");

    rt.reactive(&state).set("n", 3);
    rt.flush();
    assert_eq!(rendered(&renderer, root), "i1i2i3tail");
}

struct Label;

impl Component for Label {
    fn name(&self) -> &str {
        "Label"
    }

    fn props(&self) -> &[&'static str] {
        &["text"]
    }

    fn render(&self, ctx: &RenderContext) -> VNode {
        let text = ctx.prop("text");
        VNode::element("span").text_content(text.as_str().unwrap_or_default())
    }

    fn mounted(&self, ctx: &RenderContext) {
        ctx.emit("ready", &[ctx.prop("text")]);
    }
}

struct Parent {
    label: Rc<dyn Component>,
    state: Container,
    ready: Rc<RefCell<Vec<Value>>>,
}

impl Component for Parent {
    fn data(&self) -> Container {
        self.state.clone()
    }

    fn render(&self, ctx: &RenderContext) -> VNode {
        let ready = self.ready.clone();
        VNode::element("div").child(
            VNode::component(self.label.clone())
                .key("label")
                .prop("text", ctx.get("text"))
                .prop("class", "label")
                .on("onReady", move |args| ready.borrow_mut().extend_from_slice(args)),
        )
    }
}

#[test]
fn parent_props_flow_into_child_within_one_flush() {
    let (rt, renderer, root) = setup();
    let state = Container::record([("text", Value::from("a"))]);
    let ready = Rc::new(RefCell::new(Vec::new()));
    let parent = Rc::new(Parent {
        label: Rc::new(Label),
        state: state.clone(),
        ready: ready.clone(),
    });

    renderer.render(Some(VNode::component(parent)), root).unwrap();
    assert_eq!(rendered(&renderer, root), "a");
    assert_eq!(*ready.borrow(), vec![Value::from("a")]);

    let span = {
        let host = renderer.host();
        let div = host.children(root)[0];
        host.children(div)[0]
    };

    // The parent renders, patches the child's props, and the child renders,
    // all in the same tick.
    rt.reactive(&state).set("text", "b");
    assert_eq!(rt.flush(), 2);
    assert_eq!(rendered(&renderer, root), "b");

    // The child was patched, not remounted.
    assert_eq!(*ready.borrow(), vec![Value::from("a")]);
    assert_eq!(renderer.host().tag(span), Some("span"));
    assert_eq!(renderer.host().text_content(span), "b");
    assert!(rt.take_diagnostics().is_empty());
}

struct Shouter;

impl Component for Shouter {
    fn name(&self) -> &str {
        "Shouter"
    }

    fn render(&self, ctx: &RenderContext) -> VNode {
        ctx.get("missing");
        VNode::text("!")
    }

    fn mounted(&self, ctx: &RenderContext) {
        ctx.emit("done", &[]);
    }
}

#[test]
fn component_policy_violations_are_diagnostics() {
    let (rt, renderer, root) = setup();
    renderer.render(Some(VNode::component(Rc::new(Shouter))), root).unwrap();

    assert_eq!(
        rt.take_diagnostics(),
        vec![
            Diagnostic::UndeclaredProperty {
                component: "Shouter".into(),
                name: "missing".into(),
            },
            Diagnostic::MissingHandler {
                component: "Shouter".into(),
                event: "done".into(),
            },
        ]
    );
}

struct Lifecycle {
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Component for Lifecycle {
    fn data(&self) -> Container {
        Container::record([("n", Value::from(0))])
    }

    fn render(&self, ctx: &RenderContext) -> VNode {
        self.log.borrow_mut().push("render");
        VNode::text(format!("{:?}", ctx.get("n").as_number()))
    }

    fn before_create(&self) {
        self.log.borrow_mut().push("before_create");
    }

    fn created(&self, _ctx: &RenderContext) {
        self.log.borrow_mut().push("created");
    }

    fn before_mount(&self, _ctx: &RenderContext) {
        self.log.borrow_mut().push("before_mount");
    }

    fn mounted(&self, ctx: &RenderContext) {
        self.log.borrow_mut().push("mounted");
        // Writes from hooks schedule a render instead of running one.
        ctx.state().set("n", 1);
    }

    fn before_update(&self, _ctx: &RenderContext) {
        self.log.borrow_mut().push("before_update");
    }

    fn updated(&self, _ctx: &RenderContext) {
        self.log.borrow_mut().push("updated");
    }

    fn unmounted(&self, _ctx: &RenderContext) {
        self.log.borrow_mut().push("unmounted");
    }
}

#[test]
fn lifecycle_hooks_run_in_order() {
    let (rt, renderer, root) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));
    let component = Rc::new(Lifecycle { log: log.clone() });

    renderer.render(Some(VNode::component(component)), root).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["before_create", "created", "render", "before_mount", "mounted"]
    );

    log.borrow_mut().clear();
    rt.flush();
    assert_eq!(*log.borrow(), vec!["render", "before_update", "updated"]);
    assert_eq!(rendered(&renderer, root), "Some(1.0)");

    log.borrow_mut().clear();
    renderer.render(None, root).unwrap();
    assert_eq!(*log.borrow(), vec!["unmounted"]);
}
