// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Styleable properties of scene nodes and the CSS pass.
//!
//! The scene implements [`StyleTree`] so the style engine can read selector
//! inputs and write computed values back through the same setters user code
//! goes through; a CSS write only differs in the origin it records.

use alloc::format;
use alloc::rc::Rc;
use alloc::vec::Vec;
use alloc::vec;

use understory_style::{
    ApplyError, BooleanConverter, Color, ColorConverter, ConvertError, CssFlags, CssMetaData,
    EnumConverter, FONT, Font, NumberConverter, ParsedValue, PseudoClass, PseudoClassSet,
    SizeConverter, StyleConverter, StyleHelper, StyleManager, StyleOrigin, StyleTree, StyleValue,
    Stylesheet,
};

use crate::tree::SceneGraph;
use crate::types::{BlendMode, NodeId, NodeKind};

/// `-fx-opacity`
pub static OPACITY: CssMetaData = CssMetaData {
    property: "-fx-opacity",
    converter: &NumberConverter,
    initial: || StyleValue::Number(1.0),
    inherits: false,
    sub_properties: &[],
};

/// `visibility`: `visible`, `hidden` or `collapse`.
pub static VISIBILITY: CssMetaData = CssMetaData {
    property: "visibility",
    converter: &EnumConverter {
        values: &["visible", "hidden", "collapse"],
    },
    initial: || StyleValue::String(Rc::from("visible")),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-blend-mode`
pub static BLEND_MODE: CssMetaData = CssMetaData {
    property: "-fx-blend-mode",
    converter: &EnumConverter {
        values: BlendMode::KEYWORDS,
    },
    initial: || StyleValue::Null,
    inherits: false,
    sub_properties: &[],
};

/// `-fx-translate-x`
pub static TRANSLATE_X: CssMetaData = CssMetaData {
    property: "-fx-translate-x",
    converter: &SizeConverter,
    initial: || StyleValue::Number(0.0),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-translate-y`
pub static TRANSLATE_Y: CssMetaData = CssMetaData {
    property: "-fx-translate-y",
    converter: &SizeConverter,
    initial: || StyleValue::Number(0.0),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-translate-z`
pub static TRANSLATE_Z: CssMetaData = CssMetaData {
    property: "-fx-translate-z",
    converter: &SizeConverter,
    initial: || StyleValue::Number(0.0),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-scale-x`
pub static SCALE_X: CssMetaData = CssMetaData {
    property: "-fx-scale-x",
    converter: &NumberConverter,
    initial: || StyleValue::Number(1.0),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-scale-y`
pub static SCALE_Y: CssMetaData = CssMetaData {
    property: "-fx-scale-y",
    converter: &NumberConverter,
    initial: || StyleValue::Number(1.0),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-scale-z`
pub static SCALE_Z: CssMetaData = CssMetaData {
    property: "-fx-scale-z",
    converter: &NumberConverter,
    initial: || StyleValue::Number(1.0),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-rotate`, in degrees.
pub static ROTATE: CssMetaData = CssMetaData {
    property: "-fx-rotate",
    converter: &NumberConverter,
    initial: || StyleValue::Number(0.0),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-fill`
pub static FILL: CssMetaData = CssMetaData {
    property: "-fx-fill",
    converter: &ColorConverter,
    initial: || StyleValue::Color(Color::BLACK),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-stroke`
pub static STROKE: CssMetaData = CssMetaData {
    property: "-fx-stroke",
    converter: &ColorConverter,
    initial: || StyleValue::Null,
    inherits: false,
    sub_properties: &[],
};

/// `-fx-stroke-width`
pub static STROKE_WIDTH: CssMetaData = CssMetaData {
    property: "-fx-stroke-width",
    converter: &SizeConverter,
    initial: || StyleValue::Number(1.0),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-background-color`
pub static BACKGROUND_COLOR: CssMetaData = CssMetaData {
    property: "-fx-background-color",
    converter: &ColorConverter,
    initial: || StyleValue::Null,
    inherits: false,
    sub_properties: &[],
};

/// `-fx-padding`, applied on every side.
pub static PADDING: CssMetaData = CssMetaData {
    property: "-fx-padding",
    converter: &SizeConverter,
    initial: || StyleValue::Number(0.0),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-border-color`
pub static BORDER_COLOR: CssMetaData = CssMetaData {
    property: "-fx-border-color",
    converter: &ColorConverter,
    initial: || StyleValue::Null,
    inherits: false,
    sub_properties: &[],
};

/// `-fx-border-width`
pub static BORDER_WIDTH: CssMetaData = CssMetaData {
    property: "-fx-border-width",
    converter: &SizeConverter,
    initial: || StyleValue::Number(0.0),
    inherits: false,
    sub_properties: &[],
};

/// `-fx-border: [width] color`, a shorthand for the border color and width.
pub static BORDER: CssMetaData = CssMetaData {
    property: "-fx-border",
    converter: &BorderConverter,
    initial: || {
        StyleValue::Composite(vec![
            (BORDER_COLOR.property, StyleValue::Null),
            (BORDER_WIDTH.property, StyleValue::Number(0.0)),
        ])
    },
    inherits: false,
    sub_properties: &[&BORDER_COLOR, &BORDER_WIDTH],
};

/// `-fx-cache`
pub static CACHE: CssMetaData = CssMetaData {
    property: "-fx-cache",
    converter: &BooleanConverter,
    initial: || StyleValue::Bool(false),
    inherits: false,
    sub_properties: &[],
};

/// Converter for [`BORDER`].
#[derive(Copy, Clone, Debug, Default)]
struct BorderConverter;

impl StyleConverter for BorderConverter {
    fn convert(&self, value: &ParsedValue, font: &Font) -> Result<StyleValue, ConvertError> {
        let items: &[ParsedValue] = match value {
            ParsedValue::Sequence(items) => items,
            other => core::slice::from_ref(other),
        };
        let mut width = None;
        let mut color = None;
        for item in items {
            match item {
                ParsedValue::Number(_) | ParsedValue::Size(_) if width.is_none() => {
                    width = Some(NumberConverter.convert(item, font)?);
                }
                _ if color.is_none() => color = Some(ColorConverter.convert(item, font)?),
                _ => {
                    return Err(ConvertError::Mismatch {
                        expected: "[width] color",
                        found: format!("{value}"),
                    });
                }
            }
        }
        Ok(StyleValue::Composite(vec![
            (BORDER_COLOR.property, color.unwrap_or(StyleValue::Null)),
            (
                BORDER_WIDTH.property,
                width.unwrap_or(StyleValue::Number(1.0)),
            ),
        ]))
    }

    fn convert_parts(
        &self,
        parts: Vec<(&'static str, StyleValue)>,
    ) -> Result<StyleValue, ConvertError> {
        Ok(StyleValue::Composite(parts))
    }
}

static GROUP_PROPERTIES: &[&CssMetaData] = &[
    &OPACITY,
    &VISIBILITY,
    &BLEND_MODE,
    &CACHE,
    &TRANSLATE_X,
    &TRANSLATE_Y,
    &TRANSLATE_Z,
    &SCALE_X,
    &SCALE_Y,
    &SCALE_Z,
    &ROTATE,
];

static REGION_PROPERTIES: &[&CssMetaData] = &[
    &OPACITY,
    &VISIBILITY,
    &BLEND_MODE,
    &CACHE,
    &TRANSLATE_X,
    &TRANSLATE_Y,
    &TRANSLATE_Z,
    &SCALE_X,
    &SCALE_Y,
    &SCALE_Z,
    &ROTATE,
    &BACKGROUND_COLOR,
    &PADDING,
    &BORDER,
];

static SHAPE_PROPERTIES: &[&CssMetaData] = &[
    &OPACITY,
    &VISIBILITY,
    &BLEND_MODE,
    &CACHE,
    &TRANSLATE_X,
    &TRANSLATE_Y,
    &TRANSLATE_Z,
    &SCALE_X,
    &SCALE_Y,
    &SCALE_Z,
    &ROTATE,
    &FILL,
    &STROKE,
    &STROKE_WIDTH,
];

static TEXT_PROPERTIES: &[&CssMetaData] = &[
    &OPACITY,
    &VISIBILITY,
    &BLEND_MODE,
    &CACHE,
    &TRANSLATE_X,
    &TRANSLATE_Y,
    &TRANSLATE_Z,
    &SCALE_X,
    &SCALE_Y,
    &SCALE_Z,
    &ROTATE,
    &FILL,
    &STROKE,
    &STROKE_WIDTH,
    &FONT,
];

/// Styleable properties of a node kind.
pub fn properties_of(kind: &NodeKind) -> &'static [&'static CssMetaData] {
    match kind {
        NodeKind::Group => GROUP_PROPERTIES,
        NodeKind::Region => REGION_PROPERTIES,
        NodeKind::Rectangle { .. } | NodeKind::Circle { .. } => SHAPE_PROPERTIES,
        NodeKind::Text { .. } => TEXT_PROPERTIES,
    }
}

fn number(meta: &CssMetaData, value: &StyleValue) -> Result<f64, ApplyError> {
    value.as_number().ok_or(ApplyError::TypeMismatch {
        property: meta.property,
        expected: "number",
        found: value.kind(),
    })
}

fn color(meta: &CssMetaData, value: &StyleValue) -> Result<Option<Color>, ApplyError> {
    match value {
        StyleValue::Null => Ok(None),
        StyleValue::Color(c) => Ok(Some(*c)),
        other => Err(ApplyError::TypeMismatch {
            property: meta.property,
            expected: "color",
            found: other.kind(),
        }),
    }
}

fn keyword<'v>(meta: &CssMetaData, value: &'v StyleValue) -> Result<&'v str, ApplyError> {
    value.as_str().ok_or(ApplyError::TypeMismatch {
        property: meta.property,
        expected: "keyword",
        found: value.kind(),
    })
}

fn color_value(c: Option<Color>) -> StyleValue {
    c.map_or(StyleValue::Null, StyleValue::Color)
}

impl SceneGraph {
    /// The scene's style manager.
    pub fn style_manager(&self) -> &StyleManager {
        &self.styles
    }

    /// Mutable access to the scene's style manager.
    ///
    /// Changing stylesheets through this handle does not restyle the scene;
    /// prefer [`SceneGraph::add_stylesheet`].
    pub fn style_manager_mut(&mut self) -> &mut StyleManager {
        &mut self.styles
    }

    /// Appends a stylesheet and restyles the whole scene on the next pulse.
    pub fn add_stylesheet(&mut self, sheet: Stylesheet) {
        self.styles.add_stylesheet(sheet);
        if let Some(root) = self.root() {
            self.request_css(root, CssFlags::Reapply);
        }
    }

    /// Replaces all stylesheets and restyles the whole scene.
    pub fn set_stylesheets(&mut self, sheets: impl IntoIterator<Item = Stylesheet>) {
        self.styles.set_stylesheets(sheets);
        if let Some(root) = self.root() {
            self.request_css(root, CssFlags::Reapply);
        }
    }

    /// Schedules CSS work for a node.
    ///
    /// The flag merges with any pending request; ancestors are marked so the
    /// next CSS pass reaches the node.
    pub fn request_css(&mut self, id: NodeId, flag: CssFlags) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        n.css_flag = n.css_flag.merge(flag);
        let in_scene = n.in_scene;
        self.mark_css_branch(id);
        if in_scene {
            self.css_dirty = true;
        }
    }

    pub(crate) fn mark_css_branch(&mut self, id: NodeId) {
        let mut cur = self.node(id).space_parent();
        while let Some(p) = cur {
            let n = self.node_mut(p);
            n.css_flag = n.css_flag.merge(CssFlags::DirtyBranch);
            cur = n.space_parent();
        }
    }

    /// Pending CSS work for a node.
    pub fn css_flag(&self, id: NodeId) -> Option<CssFlags> {
        self.node_opt(id).map(|n| n.css_flag)
    }

    /// Sets the node's id, used by `#id` selectors.
    pub fn set_style_id(&mut self, id: NodeId, style_id: Option<&str>) {
        if let Some(n) = self.node_opt_mut(id)
            && n.style_id.as_deref() != style_id
        {
            n.style_id = style_id.map(Rc::from);
            self.request_css(id, CssFlags::Reapply);
        }
    }

    /// Adds a style class. Returns `false` if the node already had it.
    pub fn add_style_class(&mut self, id: NodeId, class: &str) -> bool {
        let Some(n) = self.node_opt_mut(id) else {
            return false;
        };
        if n.style_classes.iter().any(|c| &**c == class) {
            return false;
        }
        n.style_classes.push(Rc::from(class));
        self.request_css(id, CssFlags::Reapply);
        true
    }

    /// Removes a style class. Returns `false` if the node did not have it.
    pub fn remove_style_class(&mut self, id: NodeId, class: &str) -> bool {
        let Some(n) = self.node_opt_mut(id) else {
            return false;
        };
        let before = n.style_classes.len();
        n.style_classes.retain(|c| &**c != class);
        if n.style_classes.len() == before {
            return false;
        }
        self.request_css(id, CssFlags::Reapply);
        true
    }

    /// Sets the node's inline declarations, e.g. `"-fx-opacity: 0.5"`.
    ///
    /// An empty string clears them like `None` does.
    pub fn set_inline_style(&mut self, id: NodeId, style: Option<&str>) {
        let style = style.filter(|s| !s.trim().is_empty());
        if let Some(n) = self.node_opt_mut(id)
            && n.inline_style.as_deref() != style
        {
            n.inline_style = style.map(Rc::from);
            self.request_css(id, CssFlags::Recalculate);
        }
    }

    /// Turns a pseudo-class on or off.
    ///
    /// Only states that some selector depends on schedule CSS work.
    pub fn set_pseudo_class(&mut self, id: NodeId, pc: PseudoClass, on: bool) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        let changed = if on {
            n.pseudo_classes.insert(pc)
        } else {
            n.pseudo_classes.remove(pc)
        };
        if changed && n.helper.as_ref().is_some_and(|h| h.is_trigger(pc)) {
            self.request_css(id, CssFlags::Update);
        }
    }

    /// Records, or stops recording, which declaration supplied each property.
    pub fn set_tracks_styles(&mut self, id: NodeId, on: bool) {
        if self.replace_tracking(id, on) {
            self.request_css(id, CssFlags::Reapply);
        }
    }

    fn replace_tracking(&mut self, id: NodeId, on: bool) -> bool {
        match self.node_opt_mut(id) {
            Some(n) if n.tracks_styles != on => {
                n.tracks_styles = on;
                true
            }
            _ => false,
        }
    }

    /// Source of the declaration that supplied `property`, when tracked.
    pub fn matched_source(&self, id: NodeId, property: &str) -> Option<&str> {
        self.node_opt(id)?.helper.as_ref()?.matched_source(property)
    }

    /// Marks a property as bound, or unbound. CSS never sets bound properties.
    pub fn set_property_bound(&mut self, id: NodeId, meta: &'static CssMetaData, bound: bool) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        let present = n.bound.contains(&meta.property);
        if bound && !present {
            n.bound.push(meta.property);
        } else if !bound && present {
            n.bound.retain(|p| *p != meta.property);
            self.request_css(id, CssFlags::Reapply);
        }
    }

    /// Runs one CSS pass over the flagged branches of the scene, top-down.
    ///
    /// Returns the number of nodes processed. Children are processed with at
    /// least the flag their parent was processed with.
    pub(crate) fn css_pass(&mut self) -> usize {
        if !core::mem::take(&mut self.css_dirty) {
            return 0;
        }
        let Some(root) = self.root() else {
            return 0;
        };
        let mut styles = core::mem::take(&mut self.styles);
        let mut processed = 0;
        let mut stack = vec![(root, CssFlags::Clean)];
        while let Some((id, inherited)) = stack.pop() {
            let Some(n) = self.node_opt_mut(id) else {
                continue;
            };
            let flag = core::mem::take(&mut n.css_flag).merge(inherited);
            if flag == CssFlags::Clean {
                continue;
            }
            let pass_down = if flag.needs_processing() {
                styles.process(self, id, flag);
                processed += 1;
                flag
            } else {
                CssFlags::Clean
            };
            let n = self.node(id);
            stack.extend(n.clip.map(|c| (c, pass_down)));
            stack.extend(n.children.iter().rev().map(|&c| (c, pass_down)));
        }
        self.styles = styles;
        log::trace!("css pass processed {processed} nodes");
        processed
    }
}

impl StyleTree for SceneGraph {
    type Key = NodeId;

    fn styleable_parent(&self, node: NodeId) -> Option<NodeId> {
        self.node_opt(node).and_then(|n| n.space_parent())
    }

    fn type_selector(&self, node: NodeId) -> &str {
        self.node_opt(node)
            .map(|n| n.kind.type_selector())
            .unwrap_or("")
    }

    fn style_id(&self, node: NodeId) -> Option<&str> {
        self.node_opt(node).and_then(|n| n.style_id.as_deref())
    }

    fn has_style_class(&self, node: NodeId, class: &str) -> bool {
        self.node_opt(node)
            .is_some_and(|n| n.style_classes.iter().any(|c| &**c == class))
    }

    fn pseudo_class_states(&self, node: NodeId) -> &PseudoClassSet {
        static NONE: PseudoClassSet = PseudoClassSet::EMPTY;
        self.node_opt(node).map_or(&NONE, |n| &n.pseudo_classes)
    }

    fn inline_style(&self, node: NodeId) -> Option<&str> {
        self.node_opt(node).and_then(|n| n.inline_style.as_deref())
    }

    fn css_meta_data(&self, node: NodeId) -> &'static [&'static CssMetaData] {
        self.node_opt(node)
            .map(|n| properties_of(&n.kind))
            .unwrap_or(&[])
    }

    fn is_settable(&self, node: NodeId, meta: &CssMetaData) -> bool {
        self.node_opt(node)
            .is_some_and(|n| !n.bound.contains(&meta.property))
    }

    fn style_origin(&self, node: NodeId, meta: &CssMetaData) -> Option<StyleOrigin> {
        self.node_opt(node)?.origins.get(meta.property).copied()
    }

    fn style_value(&self, node: NodeId, meta: &CssMetaData) -> StyleValue {
        let Some(n) = self.node_opt(node) else {
            return meta.initial_value();
        };
        let t = n.transform.as_deref();
        let a = &n.appearance;
        match meta.property {
            p if p == OPACITY.property => StyleValue::Number(n.opacity),
            p if p == VISIBILITY.property => {
                StyleValue::String(Rc::from(if n.visible { "visible" } else { "hidden" }))
            }
            p if p == BLEND_MODE.property => n
                .blend_mode
                .map_or(StyleValue::Null, |m| StyleValue::String(Rc::from(m.keyword()))),
            p if p == CACHE.property => StyleValue::Bool(n.cache),
            p if p == TRANSLATE_X.property => StyleValue::Number(t.map_or(0.0, |t| t.translate_x)),
            p if p == TRANSLATE_Y.property => StyleValue::Number(t.map_or(0.0, |t| t.translate_y)),
            p if p == TRANSLATE_Z.property => StyleValue::Number(t.map_or(0.0, |t| t.translate_z)),
            p if p == SCALE_X.property => StyleValue::Number(t.map_or(1.0, |t| t.scale_x)),
            p if p == SCALE_Y.property => StyleValue::Number(t.map_or(1.0, |t| t.scale_y)),
            p if p == SCALE_Z.property => StyleValue::Number(t.map_or(1.0, |t| t.scale_z)),
            p if p == ROTATE.property => StyleValue::Number(t.map_or(0.0, |t| t.rotate)),
            p if p == FILL.property => color_value(a.fill),
            p if p == STROKE.property => color_value(a.stroke),
            p if p == STROKE_WIDTH.property => StyleValue::Number(a.stroke_width),
            p if p == BACKGROUND_COLOR.property => color_value(a.background),
            p if p == PADDING.property => StyleValue::Number(a.padding),
            p if p == BORDER.property => StyleValue::Composite(vec![
                (BORDER_COLOR.property, color_value(a.border_color)),
                (BORDER_WIDTH.property, StyleValue::Number(a.border_width)),
            ]),
            p if p == FONT.property => StyleValue::Font(a.font.clone()),
            _ => meta.initial_value(),
        }
    }

    fn apply_style(
        &mut self,
        node: NodeId,
        meta: &'static CssMetaData,
        origin: Option<StyleOrigin>,
        value: &StyleValue,
    ) -> Result<(), ApplyError> {
        if !self.is_alive(node) {
            return Err(ApplyError::StaleNode);
        }
        match meta.property {
            p if p == OPACITY.property => {
                let v = number(meta, value)?;
                if !(0.0..=1.0).contains(&v) {
                    return Err(ApplyError::OutOfRange { property: p });
                }
                self.write_opacity(node, v);
            }
            p if p == VISIBILITY.property => {
                self.write_visible(node, keyword(meta, value)? == "visible");
            }
            p if p == BLEND_MODE.property => {
                let mode = match value {
                    StyleValue::Null => None,
                    other => Some(
                        BlendMode::from_keyword(keyword(meta, other)?)
                            .ok_or(ApplyError::OutOfRange { property: p })?,
                    ),
                };
                self.write_blend_mode(node, mode);
            }
            p if p == CACHE.property => {
                let on = value.as_bool().ok_or(ApplyError::TypeMismatch {
                    property: p,
                    expected: "boolean",
                    found: value.kind(),
                })?;
                self.write_cache(node, on);
            }
            p if p == TRANSLATE_X.property => {
                let v = number(meta, value)?;
                self.write_transform(node, |t| t.translate_x = v);
            }
            p if p == TRANSLATE_Y.property => {
                let v = number(meta, value)?;
                self.write_transform(node, |t| t.translate_y = v);
            }
            p if p == TRANSLATE_Z.property => {
                let v = number(meta, value)?;
                self.write_transform(node, |t| t.translate_z = v);
            }
            p if p == SCALE_X.property => {
                let v = number(meta, value)?;
                self.write_transform(node, |t| t.scale_x = v);
            }
            p if p == SCALE_Y.property => {
                let v = number(meta, value)?;
                self.write_transform(node, |t| t.scale_y = v);
            }
            p if p == SCALE_Z.property => {
                let v = number(meta, value)?;
                self.write_transform(node, |t| t.scale_z = v);
            }
            p if p == ROTATE.property => {
                let v = number(meta, value)?;
                self.write_transform(node, |t| t.rotate = v);
            }
            p if p == FILL.property => {
                let c = color(meta, value)?;
                self.write_appearance(node, |a| a.fill = c);
            }
            p if p == STROKE.property => {
                let c = color(meta, value)?;
                self.write_appearance(node, |a| a.stroke = c);
            }
            p if p == STROKE_WIDTH.property => {
                let v = number(meta, value)?;
                if v < 0.0 {
                    return Err(ApplyError::OutOfRange { property: p });
                }
                self.write_appearance(node, |a| a.stroke_width = v);
            }
            p if p == BACKGROUND_COLOR.property => {
                let c = color(meta, value)?;
                self.write_appearance(node, |a| a.background = c);
            }
            p if p == PADDING.property => {
                let v = number(meta, value)?;
                self.write_appearance(node, |a| a.padding = v);
            }
            p if p == BORDER.property => {
                let StyleValue::Composite(_) = value else {
                    return Err(ApplyError::TypeMismatch {
                        property: p,
                        expected: "composite",
                        found: value.kind(),
                    });
                };
                let c = value
                    .part(BORDER_COLOR.property)
                    .map(|v| color(&BORDER_COLOR, v))
                    .transpose()?;
                let w = value
                    .part(BORDER_WIDTH.property)
                    .map(|v| number(&BORDER_WIDTH, v))
                    .transpose()?;
                self.write_appearance(node, |a| {
                    if let Some(c) = c {
                        a.border_color = c;
                    }
                    if let Some(w) = w {
                        a.border_width = w;
                    }
                });
            }
            p if p == FONT.property => {
                let font = value.as_font().cloned().ok_or(ApplyError::TypeMismatch {
                    property: p,
                    expected: "font",
                    found: value.kind(),
                })?;
                self.write_appearance(node, |a| a.font = font);
            }
            p => {
                return Err(ApplyError::TypeMismatch {
                    property: p,
                    expected: "styleable property",
                    found: value.kind(),
                });
            }
        }
        let n = self.node_mut(node);
        match origin {
            Some(o) => {
                n.origins.insert(meta.property, o);
            }
            None => {
                n.origins.remove(meta.property);
            }
        }
        Ok(())
    }

    fn style_helper(&self, node: NodeId) -> Option<&StyleHelper> {
        self.node_opt(node)?.helper.as_ref()
    }

    fn style_helper_mut(&mut self, node: NodeId) -> Option<&mut StyleHelper> {
        self.node_opt_mut(node)?.helper.as_mut()
    }

    fn replace_style_helper(
        &mut self,
        node: NodeId,
        helper: Option<StyleHelper>,
    ) -> Option<StyleHelper> {
        let n = self.node_opt_mut(node)?;
        core::mem::replace(&mut n.helper, helper)
    }

    fn request_reapply(&mut self, node: NodeId) {
        self.request_css(node, CssFlags::Reapply);
    }

    fn tracks_styles(&self, node: NodeId) -> bool {
        self.node_opt(node).is_some_and(|n| n.tracks_styles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirty::DirtyBits;

    fn sheet(scene: &mut SceneGraph, origin: StyleOrigin, rules: &[(&str, &str)]) {
        let mut sheet = Stylesheet::new(origin, "test.css");
        for (selector, block) in rules {
            let errors = sheet
                .add_rule(selector, block, scene.style_manager_mut().pseudo_classes_mut())
                .unwrap();
            assert!(errors.is_empty(), "test rules parse: {errors:?}");
        }
        scene.add_stylesheet(sheet);
    }

    fn rect() -> NodeKind {
        NodeKind::Rectangle {
            width: 10.0,
            height: 10.0,
        }
    }

    fn scene_with(kind: NodeKind) -> (SceneGraph, NodeId, NodeId) {
        let mut scene = SceneGraph::new();
        let root = scene.create(NodeKind::Region);
        let node = scene.create(kind);
        scene.add_child(root, node).unwrap();
        scene.set_root(Some(root)).unwrap();
        (scene, root, node)
    }

    #[test]
    fn stylesheet_values_are_applied_with_their_origin() {
        let (mut scene, _, n) = scene_with(rect());
        sheet(&mut scene, StyleOrigin::Author, &[(".faded", "-fx-opacity: 0.4; -fx-fill: red")]);
        scene.add_style_class(n, "faded");
        scene.css_pass();
        assert_eq!(scene.opacity(n), Some(0.4), "opacity from the stylesheet");
        assert_eq!(
            scene.style_origin(n, &OPACITY),
            Some(StyleOrigin::Author),
            "origin recorded"
        );
        assert_eq!(
            scene.appearance(n).unwrap().fill,
            Color::named("red"),
            "fill from the stylesheet"
        );
    }

    #[test]
    fn user_values_beat_user_agent_rules() {
        let (mut scene, _, n) = scene_with(rect());
        sheet(&mut scene, StyleOrigin::UserAgent, &[("Rectangle", "-fx-opacity: 0.2")]);
        scene.set_opacity(n, 0.7);
        scene.css_pass();
        assert_eq!(scene.opacity(n), Some(0.7), "user value kept");
        assert_eq!(scene.style_origin(n, &OPACITY), Some(StyleOrigin::User), "user origin");
    }

    #[test]
    fn clearing_inline_style_restores_the_initial_value() {
        let (mut scene, _, n) = scene_with(rect());
        scene.set_inline_style(n, Some("-fx-opacity: 0.3;"));
        scene.css_pass();
        assert_eq!(scene.opacity(n), Some(0.3), "inline applied");
        assert_eq!(scene.style_origin(n, &OPACITY), Some(StyleOrigin::Inline), "inline origin");

        scene.set_inline_style(n, Some(""));
        assert_eq!(scene.css_flag(n), Some(CssFlags::Recalculate), "inline change recalculates");
        scene.css_pass();
        assert_eq!(scene.opacity(n), Some(1.0), "back to the initial value");
        assert_eq!(scene.style_origin(n, &OPACITY), None, "initial values have no origin");
    }

    #[test]
    fn relative_font_sizes_use_the_parent_font() {
        let mut scene = SceneGraph::new();
        let root = scene.create(NodeKind::Region);
        let text = scene.create(NodeKind::text("hello"));
        scene.add_child(root, text).unwrap();
        scene.set_root(Some(root)).unwrap();
        sheet(
            &mut scene,
            StyleOrigin::Author,
            &[
                (".big", "-fx-font-size: 30px"),
                (".small", "-fx-font-size: 10px"),
                (".half", "-fx-font-size: 0.5em"),
            ],
        );
        scene.add_style_class(root, "big");
        scene.add_style_class(text, "half");
        scene.css_pass();
        assert_eq!(scene.appearance(text).unwrap().font.size, 15.0, "half of the parent size");
        let width = scene.geom_bounds(text).unwrap().rect().unwrap().width();
        assert_eq!(width, 5.0 * 15.0 * 0.6, "text bounds follow the styled font");

        scene.remove_style_class(root, "big");
        scene.add_style_class(root, "small");
        scene.css_pass();
        assert_eq!(scene.appearance(text).unwrap().font.size, 5.0, "follows the new parent size");
    }

    #[test]
    fn pseudo_class_changes_only_matter_for_triggers() {
        let (mut scene, _, n) = scene_with(rect());
        sheet(&mut scene, StyleOrigin::Author, &[("Rectangle:hover", "-fx-opacity: 0.5")]);
        scene.css_pass();
        assert_eq!(scene.opacity(n), Some(1.0), "not hovered");

        scene.set_pseudo_class(n, PseudoClass::PRESSED, true);
        assert_eq!(scene.css_flag(n), Some(CssFlags::Clean), "pressed is not a trigger");

        scene.set_pseudo_class(n, PseudoClass::HOVER, true);
        assert_eq!(scene.css_flag(n), Some(CssFlags::Update), "hover is a trigger");
        scene.css_pass();
        assert_eq!(scene.opacity(n), Some(0.5), "hover rule applied");

        scene.set_pseudo_class(n, PseudoClass::HOVER, false);
        scene.css_pass();
        assert_eq!(scene.opacity(n), Some(1.0), "restored when the state goes away");
    }

    #[test]
    fn requests_mark_ancestors_as_dirty_branches() {
        let (mut scene, root, n) = scene_with(rect());
        scene.css_pass();
        scene.request_css(n, CssFlags::Update);
        assert_eq!(scene.css_flag(root), Some(CssFlags::DirtyBranch), "ancestor marked");
        scene.request_css(n, CssFlags::Recalculate);
        scene.request_css(n, CssFlags::Update);
        assert_eq!(scene.css_flag(n), Some(CssFlags::Recalculate), "stronger request kept");
        assert_eq!(scene.css_pass(), 1, "only the flagged node is processed");
        assert_eq!(scene.css_flag(root), Some(CssFlags::Clean), "cleared");
    }

    #[test]
    fn failed_conversions_become_diagnostics() {
        let (mut scene, _, n) = scene_with(rect());
        sheet(&mut scene, StyleOrigin::Author, &[("Rectangle", "-fx-opacity: 4; -fx-fill: blue")]);
        scene.css_pass();
        assert_eq!(scene.opacity(n), Some(1.0), "out of range value refused");
        assert_eq!(
            scene.appearance(n).unwrap().fill,
            Color::named("blue"),
            "other properties still apply"
        );
        let diagnostics = scene.style_manager_mut().take_diagnostics();
        assert!(
            diagnostics.iter().any(|d| d.property == Some(OPACITY.property)),
            "opacity failure recorded: {diagnostics:?}"
        );
    }

    #[test]
    fn bound_properties_are_not_styled() {
        let (mut scene, _, n) = scene_with(rect());
        sheet(&mut scene, StyleOrigin::Author, &[("Rectangle", "-fx-rotate: 45")]);
        scene.set_property_bound(n, &ROTATE, true);
        scene.css_pass();
        assert_eq!(scene.rotate(n), Some(0.0), "bound property untouched");
        scene.set_property_bound(n, &ROTATE, false);
        scene.css_pass();
        assert_eq!(scene.rotate(n), Some(45.0), "styled once unbound");
    }

    #[test]
    fn border_shorthand_sets_both_parts() {
        let (mut scene, root, _) = scene_with(rect());
        sheet(&mut scene, StyleOrigin::Author, &[("Region", "-fx-border: 2px green")]);
        scene.css_pass();
        let a = scene.appearance(root).unwrap();
        assert_eq!(a.border_width, 2.0, "width part");
        assert_eq!(a.border_color, Color::named("green"), "color part");
    }

    #[test]
    fn border_longhands_fill_the_shorthand() {
        let (mut scene, root, _) = scene_with(rect());
        sheet(
            &mut scene,
            StyleOrigin::Author,
            &[("Region", "-fx-border-color: red; -fx-border-width: 3")],
        );
        scene.css_pass();
        let a = scene.appearance(root).unwrap();
        assert_eq!(a.border_color, Color::named("red"), "color longhand");
        assert_eq!(a.border_width, 3.0, "width longhand");
    }

    #[test]
    fn stale_ids_have_no_pseudo_class_states() {
        let (mut scene, _, n) = scene_with(rect());
        scene.set_pseudo_class(n, PseudoClass::HOVER, true);
        scene.dispose(n);
        assert_eq!(
            *scene.pseudo_class_states(n),
            PseudoClassSet::new(),
            "disposed node reads as empty"
        );
    }

    #[test]
    fn css_writes_mark_dirty_bits() {
        let (mut scene, _, n) = scene_with(rect());
        scene.css_pass();
        scene.node_mut(n).dirty = DirtyBits::empty();
        scene.set_inline_style(n, Some("-fx-translate-x: 4"));
        scene.css_pass();
        assert!(
            scene.dirty_bits(n).unwrap().contains(DirtyBits::TRANSFORM),
            "styled transform is dirty"
        );
        assert_eq!(scene.translate(n), Some((4.0, 0.0, 0.0)), "translation styled");
    }
}
