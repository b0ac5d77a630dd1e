//! Keyed Diff Tests
//!
//! Reconciles keyed child lists against a `MemoryHost` and checks both the
//! resulting order and the host operations it took to get there.

use std::rc::Rc;

use serde_json::json;
use vireo_core::graph::flush_jobs;
use vireo_core::props;
use vireo_core::reactive::Value;
use vireo_core::render::{
    component, fragment, h, text, Children, ComponentDef, HostOp, MemoryHost, NodeHandle, Renderer,
    RendererConfig, VNode,
};

fn setup() -> (Renderer<MemoryHost>, NodeHandle) {
    let renderer = Renderer::new(MemoryHost::new());
    let root = renderer.with_host(|host| host.create_root());
    (renderer, root)
}

fn item(key: &str) -> VNode {
    h("li", props! { "key" => key }, key)
}

fn list(keys: &[&str]) -> VNode {
    h("ul", props! {}, keys.iter().map(|k| item(k)).collect::<Vec<_>>())
}

fn expected(keys: &[&str]) -> String {
    let items: String = keys.iter().map(|k| format!("<li>{k}</li>")).collect();
    format!("<ul>{items}</ul>")
}

fn rerender(renderer: &Renderer<MemoryHost>, root: NodeHandle, from: &[&str], to: &[&str]) {
    renderer.render(Some(list(from)), root);
    renderer.with_host(|host| host.take_ops());
    renderer.render(Some(list(to)), root);
    assert_eq!(renderer.host().inner_markup(root), expected(to));
}

fn inserts(renderer: &Renderer<MemoryHost>) -> usize {
    renderer.host().count_ops(|op| matches!(op, HostOp::Insert { .. }))
}

fn creates(renderer: &Renderer<MemoryHost>) -> usize {
    renderer.host().count_ops(|op| matches!(op, HostOp::CreateElement { .. }))
}

fn removes(renderer: &Renderer<MemoryHost>) -> usize {
    renderer.host().count_ops(|op| matches!(op, HostOp::Remove { .. }))
}

/// Test the textbook case: one insertion and one move in the middle.
#[test]
fn middle_insert_and_move() {
    let (renderer, root) = setup();
    renderer.render(Some(list(&["a", "b", "c", "d", "e", "f", "g"])), root);
    let ul = renderer.with_root(root, VNode::el).flatten().unwrap();
    let before = renderer.host().children(ul);
    let [a, b, c, d, e, f, g] = before[..] else {
        panic!("expected seven items, got {before:?}");
    };

    rerender(
        &renderer,
        root,
        &["a", "b", "c", "d", "e", "f", "g"],
        &["a", "b", "e", "c", "d", "h", "f", "g"],
    );

    let after = renderer.host().children(ul);
    assert_eq!(after.len(), 8);
    let h_node = after[5];
    assert!(!before.contains(&h_node));
    assert_eq!(after, vec![a, b, e, c, d, h_node, f, g]);

    // `h` is mounted first (the walk runs back to front), then `e` moves.
    let moved: Vec<_> = renderer
        .host()
        .ops()
        .iter()
        .filter_map(|op| match op {
            HostOp::Insert { node, parent, anchor } => {
                assert_eq!(*parent, ul);
                Some((*node, *anchor))
            }
            _ => None,
        })
        .collect();
    assert_eq!(moved, vec![(h_node, Some(f)), (e, Some(c))]);

    assert_eq!(creates(&renderer), 1);
    assert_eq!(removes(&renderer), 0);
}

/// Test that a full reversal keeps one node in place.
#[test]
fn reversal_moves_all_but_one() {
    let (renderer, root) = setup();
    rerender(&renderer, root, &["a", "b", "c", "d", "e"], &["e", "d", "c", "b", "a"]);

    assert_eq!(creates(&renderer), 0);
    assert_eq!(inserts(&renderer), 4);
}

/// Test appends and prepends touching only the new nodes.
#[test]
fn pure_insertions() {
    let (renderer, root) = setup();
    rerender(&renderer, root, &["b", "c"], &["a", "b", "c", "d"]);
    assert_eq!(creates(&renderer), 2);
    assert_eq!(inserts(&renderer), 2);

    let (renderer, root) = setup();
    rerender(&renderer, root, &["a", "d"], &["a", "b", "c", "d"]);
    assert_eq!(creates(&renderer), 2);
}

/// Test removals from either end and the middle.
#[test]
fn pure_removals() {
    let (renderer, root) = setup();
    rerender(&renderer, root, &["a", "b", "c", "d", "e"], &["b", "d"]);
    assert_eq!(removes(&renderer), 3);
    assert_eq!(inserts(&renderer), 0);
}

/// Test that unmatched old nodes are removed once every new node is placed.
#[test]
fn replaced_middle() {
    let (renderer, root) = setup();
    rerender(&renderer, root, &["a", "x", "y", "z", "b"], &["a", "c", "b"]);
    assert_eq!(removes(&renderer), 3);
    assert_eq!(creates(&renderer), 1);
}

/// Test that an ordered middle section needs no moves.
#[test]
fn no_moves_when_order_kept() {
    let (renderer, root) = setup();
    rerender(&renderer, root, &["a", "b", "c", "d"], &["a", "c", "x", "d"]);
    assert_eq!(creates(&renderer), 1);
    assert_eq!(inserts(&renderer), 1);
    assert_eq!(removes(&renderer), 1);
}

/// Test that duplicate keys still produce the requested output.
#[test]
fn duplicate_keys_do_not_lose_nodes() {
    let renderer = Renderer::with_config(MemoryHost::new(), RendererConfig { warn_duplicate_keys: true });
    let root = renderer.with_host(|host| host.create_root());

    renderer.render(Some(list(&["a", "b", "c"])), root);
    renderer.render(Some(list(&["c", "a", "a", "b"])), root);
    assert_eq!(renderer.host().inner_markup(root), expected(&["c", "a", "a", "b"]));
}

/// Test that unkeyed children of the same type are patched in place.
#[test]
fn unkeyed_children_patch_in_place() {
    let (renderer, root) = setup();
    renderer.render(Some(h("p", props! {}, vec![text("a"), text("b")])), root);
    renderer.with_host(|host| host.take_ops());

    renderer.render(Some(h("p", props! {}, vec![text("x"), text("b"), text("c")])), root);
    assert_eq!(renderer.host().inner_markup(root), "<p>xbc</p>");
    assert_eq!(renderer.host().count_ops(|op| matches!(op, HostOp::SetText { .. })), 1);
}

fn keyed_fragment(key: &str) -> VNode {
    fragment(vec![text(format!("{key}1")), text(format!("{key}2"))]).with_key(key)
}

/// Test that moving a fragment moves its anchors and every child.
#[test]
fn fragments_move_as_a_unit() {
    let (renderer, root) = setup();
    renderer.render(
        Some(h("div", props! {}, vec![keyed_fragment("a"), keyed_fragment("b"), keyed_fragment("c")])),
        root,
    );
    assert_eq!(renderer.host().inner_markup(root), "<div>a1a2b1b2c1c2</div>");

    renderer.render(
        Some(h("div", props! {}, vec![keyed_fragment("c"), keyed_fragment("a"), keyed_fragment("b")])),
        root,
    );
    assert_eq!(renderer.host().inner_markup(root), "<div>c1c2a1a2b1b2</div>");
}

/// Test that keyed components are moved with their state intact.
#[test]
fn components_keep_state_across_moves() {
    let (renderer, root) = setup();
    let def: Rc<ComponentDef> = ComponentDef::new("Row", |this| {
        h("li", props! {}, format!("{}:{}", this.get("id"), this.get("clicks")))
    })
    .prop("id")
    .data(|_| Value::from(json!({ "clicks": 0 })))
    .build();

    let rows = |ids: &[&str]| {
        h(
            "ul",
            props! {},
            ids.iter()
                .map(|id| component(&def, props! { "key" => *id, "id" => *id }))
                .collect::<Vec<_>>(),
        )
    };

    renderer.render(Some(rows(&["a", "b", "c"])), root);

    renderer.render(Some(rows(&["c", "a", "b"])), root);
    assert_eq!(
        renderer.host().inner_markup(root),
        "<ul><li>c:0</li><li>a:0</li><li>b:0</li></ul>"
    );

    let proxy = renderer
        .with_root(root, |ul| match ul.children() {
            Children::Nodes(nodes) => nodes[1].component_proxy(),
            _ => None,
        })
        .flatten()
        .unwrap();
    proxy.set("clicks", 5);
    flush_jobs().unwrap();
    assert_eq!(
        renderer.host().inner_markup(root),
        "<ul><li>c:0</li><li>a:5</li><li>b:0</li></ul>"
    );
}
