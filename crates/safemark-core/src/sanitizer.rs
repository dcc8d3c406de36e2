use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{Attribute, LocalName, ParseOpts, QualName, local_name, namespace_url, ns, parse_fragment};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use tracing::{debug, trace};

use crate::policy::{
    AttributeHook, ElementHook, HookDecision, SanitizerConfig, SanitizerPolicy,
    markdown_attribute_policy,
};
use crate::protocol::{UriKind, is_allowed_scheme, is_fragment_link, uri_kind};

/// Elements dropped together with their content when rejected.
const CONTENT_DROPPING_TAGS: &[&str] = &[
    "script",
    "style",
    "template",
    "iframe",
    "object",
    "embed",
    "noscript",
    "noembed",
    "noframes",
    "xmp",
    "plaintext",
    "textarea",
    "select",
    "title",
    "svg",
    "math",
];

/// Elements that never get a closing tag when written out as text.
const SELF_CLOSING_TAGS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Upper bound on parse-and-clean passes in one call.
const MAX_PASSES: usize = 4;

/// Read-only view of an element handed to element hooks.
pub struct ElementView<'a> {
    tag: &'a str,
    attrs: &'a [Attribute],
}

impl<'a> ElementView<'a> {
    pub fn tag(&self) -> &'a str {
        self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.attrs
            .iter()
            .find(|attr| (*attr.name.local).eq_ignore_ascii_case(name))
            .map(|attr| &*attr.value)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.attrs
            .iter()
            .map(|attr| (&*attr.name.local, &*attr.value))
    }
}

#[derive(Default)]
struct HookTable {
    attribute: Option<AttributeHook>,
    element: Option<ElementHook>,
}

impl HookTable {
    fn is_empty(&self) -> bool {
        self.attribute.is_none() && self.element.is_none()
    }

    fn register(&mut self, config: &SanitizerConfig) -> HookRegistration<'_> {
        self.attribute = config.attribute_hook.clone();
        self.element = config.element_hook.clone();
        HookRegistration { table: self }
    }
}

/// Keeps a call's hooks registered; dropping it clears the table, including
/// during unwinding.
pub struct HookRegistration<'a> {
    table: &'a mut HookTable,
}

impl HookRegistration<'_> {
    fn hooks(&self) -> &HookTable {
        &*self.table
    }
}

impl Drop for HookRegistration<'_> {
    fn drop(&mut self) {
        self.table.attribute = None;
        self.table.element = None;
    }
}

/// Sanitizer with its own hook table. One call at a time per engine.
#[derive(Default)]
pub struct SanitizerEngine {
    hooks: HookTable,
}

impl SanitizerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether hooks from a previous call are still installed. Always `false`
    /// between calls.
    pub fn has_registered_hooks(&self) -> bool {
        !self.hooks.is_empty()
    }

    pub fn sanitize(&mut self, html: &str, config: &SanitizerConfig) -> String {
        let policy = SanitizerPolicy::resolve(config);
        let registration = self.hooks.register(config);
        let mut pass = Pass {
            policy: &policy,
            hooks: registration.hooks(),
            removed_elements: 0,
            removed_attributes: 0,
        };

        // Unwrapped children can serialize into markup the parser nests
        // differently, so the output is cleaned again until it settles.
        let mut output = pass.run(html);
        let mut passes = 1;
        while passes < MAX_PASSES {
            let next = pass.run(&output);
            passes += 1;
            if next == output {
                break;
            }
            output = next;
        }
        debug!(
            passes,
            removed_elements = pass.removed_elements,
            removed_attributes = pass.removed_attributes,
            plaintext = policy.replace_with_plaintext,
            "sanitized html"
        );
        output
    }
}

/// Sanitizes `html` with a fresh engine.
pub fn sanitize(html: &str, config: &SanitizerConfig) -> String {
    SanitizerEngine::new().sanitize(html, config)
}

fn serialize_children(root: &Handle) -> String {
    let mut out = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    if serialize(&mut out, &SerializableHandle::from(root.clone()), opts).is_err() {
        return String::new();
    }
    String::from_utf8(out).unwrap_or_default()
}

struct Pass<'a> {
    policy: &'a SanitizerPolicy,
    hooks: &'a HookTable,
    removed_elements: usize,
    removed_attributes: usize,
}

impl Pass<'_> {
    fn run(&mut self, html: &str) -> String {
        let dom = parse_fragment(
            RcDom::default(),
            ParseOpts::default(),
            QualName::new(None, ns!(html), local_name!("body")),
            Vec::new(),
        )
        .one(html);

        let root = dom.document.children.borrow().first().cloned();
        let Some(root) = root else {
            return String::new();
        };
        self.clean_children(&root);
        serialize_children(&root)
    }

    fn clean_children(&mut self, parent: &Handle) {
        let children = mem::take(&mut *parent.children.borrow_mut());
        let mut kept = Vec::with_capacity(children.len());
        for child in children {
            self.clean_node(child, &mut kept);
        }
        for node in &kept {
            node.parent.set(Some(Rc::downgrade(parent)));
        }
        *parent.children.borrow_mut() = kept;
    }

    fn clean_node(&mut self, node: Handle, out: &mut Vec<Handle>) {
        let comment = match &node.data {
            NodeData::Text { .. } | NodeData::Element { .. } => None,
            NodeData::Comment { contents } => Some(format!("<!--{contents}-->")),
            NodeData::Document | NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => {
                self.removed_elements += 1;
                return;
            }
        };
        if let Some(comment) = comment {
            self.removed_elements += 1;
            if self.policy.replace_with_plaintext {
                out.push(text_node(comment));
            }
        } else if matches!(node.data, NodeData::Text { .. }) {
            out.push(node);
        } else {
            self.clean_element(node, out);
        }
    }

    fn clean_element(&mut self, node: Handle, out: &mut Vec<Handle>) {
        let NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } = &node.data
        else {
            return;
        };
        let tag = name.local.to_string().to_ascii_lowercase();
        let plaintext = self.policy.replace_with_plaintext;

        let current = attrs.borrow();
        let element = ElementView {
            tag: &tag,
            attrs: current.as_slice(),
        };
        let checkbox = tag == "input" && is_checkbox(&element);
        if tag == "input" && !checkbox && !plaintext {
            trace!(tag = %tag, "removed input");
            self.removed_elements += 1;
            return;
        }
        let allowed = self.policy.tags.allows(&tag) && self.element_hook_accepts(&element);
        let open_tag = (!allowed && plaintext).then(|| open_tag_text(&element));
        drop(current);

        if allowed {
            let mut attrs = attrs.borrow_mut();
            if tag == "input" {
                add_disabled(&mut attrs);
            }
            self.clean_attributes(&tag, checkbox, &mut attrs);
            drop(attrs);
            if let Some(contents) = template_contents.borrow().as_ref() {
                self.clean_children(contents);
            }
            self.clean_children(&node);
            if matches!(tag.as_str(), "pre" | "listing" | "textarea") {
                trim_leading_newlines(&node);
            }
            out.push(node);
            return;
        }

        trace!(tag = %tag, plaintext, "removed element");
        self.removed_elements += 1;
        if let Some(open_tag) = open_tag {
            out.push(text_node(open_tag));
            if let Some(contents) = template_contents.borrow().as_ref() {
                self.clean_children(contents);
                out.append(&mut contents.children.borrow_mut());
            }
            self.clean_children(&node);
            out.append(&mut node.children.borrow_mut());
            if !SELF_CLOSING_TAGS.contains(&tag.as_str()) {
                out.push(text_node(format!("</{tag}>")));
            }
        } else if !CONTENT_DROPPING_TAGS.contains(&tag.as_str()) {
            self.clean_children(&node);
            out.append(&mut node.children.borrow_mut());
        }
    }

    fn element_hook_accepts(&self, element: &ElementView<'_>) -> bool {
        match &self.hooks.element {
            Some(hook) => hook(element.tag(), element),
            None => true,
        }
    }

    fn clean_attributes(&mut self, tag: &str, checkbox: bool, attrs: &mut Vec<Attribute>) {
        let current = mem::take(attrs);
        for attr in current {
            let name = attr.name.local.to_string().to_ascii_lowercase();
            if attr.name.prefix.is_some() || !self.policy.attributes.allows(&name) {
                self.drop_attribute(tag, &name);
                continue;
            }
            let kind = uri_kind(&name);
            if !self.url_allowed(&name, kind, &attr.value) {
                self.drop_attribute(tag, &name);
                continue;
            }
            let decision = match &self.hooks.attribute {
                Some(hook) => hook(tag, &name, &*attr.value),
                None => markdown_attribute_policy(tag, &name, &attr.value, checkbox),
            };
            match decision {
                HookDecision::Keep => attrs.push(attr),
                HookDecision::Remove => self.drop_attribute(tag, &name),
                HookDecision::Replace(value) => {
                    if self.url_allowed(&name, kind, &value) {
                        attrs.push(Attribute {
                            name: attr.name,
                            value: StrTendril::from(value),
                        });
                    } else {
                        self.drop_attribute(tag, &name);
                    }
                }
            }
        }
    }

    fn url_allowed(&self, name: &str, kind: Option<UriKind>, value: &str) -> bool {
        let Some(kind) = kind else {
            return true;
        };
        if kind == UriKind::Link && name == "href" && is_fragment_link(value) {
            return true;
        }
        is_allowed_scheme(value, self.policy.protocols_for(kind))
    }

    fn drop_attribute(&mut self, tag: &str, name: &str) {
        trace!(tag, attribute = name, "removed attribute");
        self.removed_attributes += 1;
    }
}

fn text_node(text: String) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    })
}

fn is_checkbox(element: &ElementView<'_>) -> bool {
    element
        .attr("type")
        .is_some_and(|kind| kind.eq_ignore_ascii_case("checkbox"))
}

fn add_disabled(attrs: &mut Vec<Attribute>) {
    if attrs.iter().any(|attr| &*attr.name.local == "disabled") {
        return;
    }
    attrs.push(Attribute {
        name: QualName::new(None, ns!(), LocalName::from("disabled")),
        value: StrTendril::new(),
    });
}

/// The parser eats one newline right after `<pre>` and its kin, so a leading
/// newline left in the text would be lost on the next parse.
fn trim_leading_newlines(node: &Handle) {
    let children = node.children.borrow();
    let Some(NodeData::Text { contents }) = children.first().map(|first| &first.data) else {
        return;
    };
    let mut contents = contents.borrow_mut();
    if contents.starts_with('\n') {
        let trimmed = contents.trim_start_matches('\n').to_string();
        *contents = StrTendril::from(trimmed);
    }
}

fn open_tag_text(element: &ElementView<'_>) -> String {
    let mut text = format!("<{}", element.tag());
    for (name, value) in element.attributes() {
        text.push(' ');
        text.push_str(name);
        text.push_str("=\"");
        text.push_str(value);
        text.push('"');
    }
    text.push('>');
    text
}
