// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small in-memory [`StyleTree`] for unit tests.

use alloc::string::String;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::converter::{ColorConverter, NumberConverter};
use crate::flags::CssFlags;
use crate::helper::StyleHelper;
use crate::manager::StyleManager;
use crate::meta::{CssMetaData, FONT};
use crate::origin::StyleOrigin;
use crate::pseudo::{PseudoClass, PseudoClassSet};
use crate::tree::{ApplyError, StyleTree};
use crate::value::{Color, StyleValue};

pub(crate) static OPACITY: CssMetaData = CssMetaData {
    property: "-fx-opacity",
    converter: &NumberConverter,
    initial: || StyleValue::Number(1.0),
    inherits: false,
    sub_properties: &[],
};

pub(crate) static FILL: CssMetaData = CssMetaData {
    property: "-fx-fill",
    converter: &ColorConverter,
    initial: || StyleValue::Color(Color::BLACK),
    inherits: true,
    sub_properties: &[],
};

pub(crate) static METAS: &[&CssMetaData] = &[&OPACITY, &FILL, &FONT];

pub(crate) struct NodeBuilder {
    type_name: String,
    id: Option<String>,
    classes: Vec<String>,
    states: PseudoClassSet,
    inline: Option<String>,
}

pub(crate) fn node(type_name: &str) -> NodeBuilder {
    NodeBuilder {
        type_name: type_name.into(),
        id: None,
        classes: Vec::new(),
        states: PseudoClassSet::new(),
        inline: None,
    }
}

impl NodeBuilder {
    pub(crate) fn id(mut self, id: &str) -> Self {
        self.id = Some(id.into());
        self
    }

    pub(crate) fn class(mut self, class: &str) -> Self {
        self.classes.push(class.into());
        self
    }

    pub(crate) fn pseudo(mut self, pc: PseudoClass) -> Self {
        self.states.insert(pc);
        self
    }

    pub(crate) fn inline(mut self, style: &str) -> Self {
        self.inline = Some(style.into());
        self
    }
}

struct TestNode {
    parent: Option<usize>,
    builder: NodeBuilder,
    values: HashMap<&'static str, (Option<StyleOrigin>, StyleValue)>,
    helper: Option<StyleHelper>,
    tracks: bool,
}

#[derive(Default)]
pub(crate) struct TestTree {
    nodes: Vec<TestNode>,
    pub(crate) reapply_requests: Vec<usize>,
}

impl TestTree {
    pub(crate) fn add(&mut self, parent: Option<usize>, builder: NodeBuilder) -> usize {
        self.nodes.push(TestNode {
            parent,
            builder,
            values: HashMap::new(),
            helper: None,
            tracks: false,
        });
        self.nodes.len() - 1
    }

    pub(crate) fn value(&self, node: usize, meta: &CssMetaData) -> StyleValue {
        self.style_value(node, meta)
    }

    pub(crate) fn origin(&self, node: usize, meta: &CssMetaData) -> Option<StyleOrigin> {
        self.style_origin(node, meta)
    }

    pub(crate) fn set_user(&mut self, node: usize, meta: &'static CssMetaData, value: StyleValue) {
        self.nodes[node]
            .values
            .insert(meta.property, (Some(StyleOrigin::User), value));
    }

    pub(crate) fn set_state(&mut self, node: usize, pc: PseudoClass, on: bool) {
        let states = &mut self.nodes[node].builder.states;
        if on {
            states.insert(pc);
        } else {
            states.remove(pc);
        }
    }

    pub(crate) fn set_inline(&mut self, node: usize, style: Option<&str>) {
        self.nodes[node].builder.inline = style.map(String::from);
    }

    pub(crate) fn set_tracking(&mut self, node: usize, on: bool) {
        self.nodes[node].tracks = on;
    }

    /// Processes every node in insertion order, which is parent-first.
    pub(crate) fn process_all(&mut self, manager: &mut StyleManager, flag: CssFlags) {
        for n in 0..self.nodes.len() {
            manager.process(self, n, flag);
        }
        let pending: Vec<usize> = self.reapply_requests.drain(..).collect();
        for n in pending {
            manager.process(self, n, CssFlags::Reapply);
        }
    }
}

impl StyleTree for TestTree {
    type Key = usize;

    fn styleable_parent(&self, node: usize) -> Option<usize> {
        self.nodes[node].parent
    }

    fn type_selector(&self, node: usize) -> &str {
        &self.nodes[node].builder.type_name
    }

    fn style_id(&self, node: usize) -> Option<&str> {
        self.nodes[node].builder.id.as_deref()
    }

    fn has_style_class(&self, node: usize, class: &str) -> bool {
        self.nodes[node].builder.classes.iter().any(|c| c == class)
    }

    fn pseudo_class_states(&self, node: usize) -> &PseudoClassSet {
        &self.nodes[node].builder.states
    }

    fn inline_style(&self, node: usize) -> Option<&str> {
        self.nodes[node].builder.inline.as_deref()
    }

    fn css_meta_data(&self, _node: usize) -> &'static [&'static CssMetaData] {
        METAS
    }

    fn is_settable(&self, _node: usize, _meta: &CssMetaData) -> bool {
        true
    }

    fn style_origin(&self, node: usize, meta: &CssMetaData) -> Option<StyleOrigin> {
        self.nodes[node]
            .values
            .get(meta.property)
            .and_then(|(origin, _)| *origin)
    }

    fn style_value(&self, node: usize, meta: &CssMetaData) -> StyleValue {
        self.nodes[node]
            .values
            .get(meta.property)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| meta.initial_value())
    }

    fn apply_style(
        &mut self,
        node: usize,
        meta: &'static CssMetaData,
        origin: Option<StyleOrigin>,
        value: &StyleValue,
    ) -> Result<(), ApplyError> {
        if meta == &OPACITY {
            let Some(v) = value.as_number() else {
                return Err(ApplyError::TypeMismatch {
                    property: meta.property,
                    expected: "number",
                    found: value.kind(),
                });
            };
            if !(0.0..=1.0).contains(&v) {
                return Err(ApplyError::OutOfRange {
                    property: meta.property,
                });
            }
        }
        self.nodes[node]
            .values
            .insert(meta.property, (origin, value.clone()));
        Ok(())
    }

    fn style_helper(&self, node: usize) -> Option<&StyleHelper> {
        self.nodes[node].helper.as_ref()
    }

    fn style_helper_mut(&mut self, node: usize) -> Option<&mut StyleHelper> {
        self.nodes[node].helper.as_mut()
    }

    fn replace_style_helper(&mut self, node: usize, helper: Option<StyleHelper>) -> Option<StyleHelper> {
        core::mem::replace(&mut self.nodes[node].helper, helper)
    }

    fn request_reapply(&mut self, node: usize) {
        self.reapply_requests.push(node);
    }

    fn tracks_styles(&self, node: usize) -> bool {
        self.nodes[node].tracks
    }
}
