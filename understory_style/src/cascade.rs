// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cascade resolution for one node.
//!
//! The resolver answers "what value does this property get in these states",
//! walking ancestors for inheritance, lookups, and relative font sizes. It never
//! mutates the tree; failures become diagnostics and a `None` (skip) result.

use alloc::borrow::Cow;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use smallvec::SmallVec;

use crate::cache::{StateKey, TransitionStates};
use crate::converter::ConvertError;
use crate::diagnostics::{DiagnosticKind, Diagnostics, StyleDiagnostic};
use crate::helper::{CacheContainer, StyleHelper};
use crate::meta::{CssMetaData, FONT, FONT_FAMILY, FONT_SIZE, FONT_STYLE, FONT_WEIGHT};
use crate::origin::StyleOrigin;
use crate::pseudo::PseudoClassSet;
use crate::style_map::{CascadingStyle, StyleMap};
use crate::tree::StyleTree;
use crate::value::{CalculatedValue, Font, ParsedValue, StyleValue};

/// Resolves values for `node`, whose helper has been lifted out of the tree.
pub(crate) struct Resolver<'a, T: StyleTree + ?Sized> {
    tree: &'a T,
    node: T::Key,
    helper: &'a StyleHelper,
    default_font: &'a Font,
    diagnostics: &'a mut Diagnostics,
    /// Source of the declaration behind the most recent [`Resolver::lookup`].
    pub(crate) winning_source: Option<Rc<str>>,
}

impl<'a, T: StyleTree + ?Sized> Resolver<'a, T> {
    pub(crate) fn new(
        tree: &'a T,
        node: T::Key,
        helper: &'a StyleHelper,
        default_font: &'a Font,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            tree,
            node,
            helper,
            default_font,
            diagnostics,
            winning_source: None,
        }
    }

    fn helper_of(&self, k: T::Key) -> Option<&'a StyleHelper> {
        if k == self.node {
            Some(self.helper)
        } else {
            self.tree.style_helper(k)
        }
    }

    fn container_of(&self, k: T::Key) -> Option<&'a CacheContainer> {
        self.helper_of(k)?.container.as_ref()
    }

    fn map_of(&self, k: T::Key) -> Option<&'a StyleMap> {
        self.container_of(k).map(|c| &*c.map)
    }

    /// Pseudo-class states of `k` and each styled ancestor, filtered to their
    /// trigger states.
    pub(crate) fn transition_states(&self, k: T::Key) -> TransitionStates {
        let mut out = TransitionStates::new();
        let mut cur = Some(k);
        while let Some(n) = cur {
            if let Some(helper) = self.helper_of(n) {
                out.push(
                    self.tree
                        .pseudo_class_states(n)
                        .intersection(&helper.trigger_states),
                );
            }
            cur = self.tree.styleable_parent(n);
        }
        out
    }

    /// The best style for `property` on `k` whose selector matches `states`.
    fn get_style(
        &self,
        k: T::Key,
        property: &str,
        states: &PseudoClassSet,
    ) -> Option<&'a CascadingStyle> {
        let map = self.map_of(k)?;
        map.get(property)
            .iter()
            .find(|s| s.selector.state_matches(self.tree, k, states))
    }

    /// Resolves `meta` for the node in `states`.
    ///
    /// `cached_font` is the node's font for relative sizes in these states.
    pub(crate) fn lookup(
        &mut self,
        meta: &'static CssMetaData,
        states: &PseudoClassSet,
        cached_font: &CalculatedValue,
    ) -> Option<CalculatedValue> {
        self.winning_source = None;
        let node = self.node;
        if meta.is_font() {
            return self.lookup_font(node, Some(cached_font));
        }
        let Some(mut style) = self.get_style(node, meta.property, states) else {
            if meta.sub_properties.is_empty() {
                return self.handle_no_style_found(meta, states, cached_font);
            }
            return self.lookup_shorthand(meta, states, cached_font);
        };
        if style.origin == StyleOrigin::UserAgent
            && self.tree.style_origin(node, meta) == Some(StyleOrigin::User)
        {
            return None;
        }
        if style.value.is_inherit() {
            style = self.inherited_style(node, meta.property)?;
        }
        self.winning_source = Some(style.source.clone());
        self.calculate_value(style, node, meta, states, Some(cached_font))
    }

    fn lookup_shorthand(
        &mut self,
        meta: &'static CssMetaData,
        states: &PseudoClassSet,
        cached_font: &CalculatedValue,
    ) -> Option<CalculatedValue> {
        let mut parts = Vec::new();
        let mut origin = None;
        let mut relative = false;
        for &sub in meta.sub_properties {
            if let Some(cv) = self.lookup(sub, states, cached_font) {
                origin = StyleOrigin::max_of(origin, cv.origin);
                relative |= cv.relative;
                parts.push((sub.property, cv.value));
            }
        }
        self.winning_source = None;
        if parts.is_empty() {
            return self.handle_no_style_found(meta, states, cached_font);
        }
        match meta.converter.convert_parts(parts) {
            Ok(value) => Some(CalculatedValue::new(value, origin, relative)),
            Err(err) => {
                self.report(
                    DiagnosticKind::Conversion,
                    self.node,
                    meta.property,
                    None,
                    format!("Could not combine sub-properties of '{}': {err}", meta.property),
                );
                None
            }
        }
    }

    fn handle_no_style_found(
        &mut self,
        meta: &'static CssMetaData,
        states: &PseudoClassSet,
        cached_font: &CalculatedValue,
    ) -> Option<CalculatedValue> {
        if !meta.inherits {
            return None;
        }
        let node = self.node;
        if self.tree.style_origin(node, meta) == Some(StyleOrigin::User) {
            return None;
        }
        let style = self.inherited_style(node, meta.property)?;
        self.winning_source = Some(style.source.clone());
        self.calculate_value(style, node, meta, states, Some(cached_font))
    }

    /// The nearest ancestor style for `property` that is not `inherit`.
    fn inherited_style(&self, k: T::Key, property: &str) -> Option<&'a CascadingStyle> {
        let mut cur = self.tree.styleable_parent(k);
        while let Some(p) = cur {
            if self.map_of(p).is_some()
                && let Some(style) = self.get_style(p, property, self.tree.pseudo_class_states(p))
                && !style.value.is_inherit()
            {
                return Some(style);
            }
            cur = self.tree.styleable_parent(p);
        }
        None
    }

    /// Finds the declaration a lookup name refers to: `k` in `states`, then `k`
    /// with no states, then each styled ancestor in its own states.
    fn resolve_ref(
        &self,
        k: T::Key,
        name: &str,
        states: Option<&PseudoClassSet>,
    ) -> Option<&'a CascadingStyle> {
        let empty = PseudoClassSet::new();
        if let Some(style) = self.get_style(k, name, states.unwrap_or(&empty)) {
            return Some(style);
        }
        if states.is_some_and(|s| !s.is_empty()) {
            return self.resolve_ref(k, name, None);
        }
        let mut parent = self.tree.styleable_parent(k);
        while let Some(p) = parent {
            if self.helper_of(p).is_some() {
                return self.resolve_ref(p, name, Some(self.tree.pseudo_class_states(p)));
            }
            parent = self.tree.styleable_parent(p);
        }
        None
    }

    /// Replaces lookups in `value` with the values they refer to.
    ///
    /// `whence` is raised to the most significant origin seen. Unresolvable
    /// lookups are left in place for the converter to report; a reference cycle
    /// returns the name that closed it.
    fn resolve_lookups<'v>(
        &self,
        k: T::Key,
        value: &'v ParsedValue,
        states: &PseudoClassSet,
        whence: &mut Option<StyleOrigin>,
        resolving: &mut SmallVec<[Rc<str>; 4]>,
    ) -> Result<Cow<'v, ParsedValue>, Rc<str>> {
        match value {
            ParsedValue::Lookup(name) => {
                let Some(style) = self.resolve_ref(k, name, Some(states)) else {
                    return Ok(Cow::Borrowed(value));
                };
                if resolving.contains(name) {
                    return Err(name.clone());
                }
                resolving.push(name.clone());
                *whence = StyleOrigin::max_of(*whence, Some(style.origin));
                let inner = self.resolve_lookups(k, &style.value, states, whence, resolving);
                resolving.pop();
                inner.map(|v| Cow::Owned(v.into_owned()))
            }
            ParsedValue::Sequence(items) | ParsedValue::Layers(items) if value.contains_lookups() => {
                let resolved = items
                    .iter()
                    .map(|item| {
                        self.resolve_lookups(k, item, states, whence, resolving)
                            .map(Cow::into_owned)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Cow::Owned(match value {
                    ParsedValue::Layers(_) => ParsedValue::Layers(resolved),
                    _ => ParsedValue::Sequence(resolved),
                }))
            }
            _ => Ok(Cow::Borrowed(value)),
        }
    }

    /// Resolves lookups in `style`, picks the font for relative units, and
    /// converts.
    fn calculate_value(
        &mut self,
        style: &'a CascadingStyle,
        k: T::Key,
        meta: &'static CssMetaData,
        states: &PseudoClassSet,
        font_from_cache: Option<&CalculatedValue>,
    ) -> Option<CalculatedValue> {
        if style.value.is_null_or_none() {
            return Some(CalculatedValue::new(
                StyleValue::Null,
                Some(style.origin),
                false,
            ));
        }
        let mut whence = Some(style.origin);
        let mut resolving = SmallVec::new();
        let resolved = match self.resolve_lookups(k, &style.value, states, &mut whence, &mut resolving) {
            Ok(v) => v,
            Err(name) => {
                self.report(
                    DiagnosticKind::LookupLoop,
                    k,
                    meta.property,
                    Some(style.source.clone()),
                    format!("Loop detected in {} while resolving '{name}'", style.source),
                );
                return None;
            }
        };
        let is_font_property = meta.property == FONT.property || meta.property == FONT_SIZE.property;
        let relative = resolved.contains_font_relative_size(is_font_property);

        let mut font_for_relative = None;
        if relative && is_font_property && font_from_cache.is_none_or(|f| f.relative) {
            // A font computed from this same relative size must not be the base
            // for it again; climb until the ancestors' fonts differ.
            let mut parent = k;
            let mut childs_font = font_from_cache.cloned();
            loop {
                let parent_key = self.tree.styleable_parent(parent);
                if let Some(parents_font) = self.cached_font(parent_key) {
                    if parents_font.relative
                        && childs_font.as_ref().is_none_or(|c| *c == parents_font)
                    {
                        childs_font = Some(parents_font);
                    } else {
                        font_for_relative = parents_font.font().cloned();
                    }
                }
                if font_for_relative.is_some() {
                    break;
                }
                match parent_key {
                    Some(p) => parent = p,
                    None => break,
                }
            }
        }
        let font = font_for_relative.unwrap_or_else(|| match font_from_cache {
            Some(f) if !f.relative || !is_font_property => {
                f.font().cloned().unwrap_or_else(|| self.default_font.clone())
            }
            _ => self.default_font.clone(),
        });

        match meta.converter.convert(&resolved, &font) {
            Ok(value) => Some(CalculatedValue::new(value, whence, relative)),
            Err(ConvertError::UnresolvedLookup(name)) => {
                self.report(
                    DiagnosticKind::UnresolvedLookup,
                    k,
                    meta.property,
                    Some(style.source.clone()),
                    format!(
                        "Could not resolve '{name}' while resolving lookups for '{}' from rule '{}'",
                        meta.property, style.source
                    ),
                );
                None
            }
            Err(err) => {
                self.report(
                    DiagnosticKind::Conversion,
                    k,
                    meta.property,
                    Some(style.source.clone()),
                    format!(
                        "Caught '{err}' while converting value for '{}' from rule '{}'",
                        meta.property, style.source
                    ),
                );
                None
            }
        }
    }

    /// The font `k` would use for relative sizes, from its font-size cache if
    /// possible. Nodes without a cache container defer to their parent.
    pub(crate) fn cached_font(&mut self, k: Option<T::Key>) -> Option<CalculatedValue> {
        let k = k?;
        let Some(container) = self.container_of(k) else {
            return self.cached_font(self.tree.styleable_parent(k));
        };
        let key = StateKey::new(self.transition_states(k), None);
        if let Some(font) = container.font_size_cache.get(&key) {
            return Some(font.clone());
        }
        self.lookup_font(k, None)
    }

    /// Resolves the `-fx-font` shorthand and its sub-properties for `k`.
    ///
    /// With `cached_font` of `None` only the size matters: the result is the
    /// base font for relative sizes at `k`.
    pub(crate) fn lookup_font(
        &mut self,
        k: T::Key,
        cached_font: Option<&CalculatedValue>,
    ) -> Option<CalculatedValue> {
        let tree = self.tree;
        let states = tree.pseudo_class_states(k);
        let mut origin = None;
        let mut distance = 0_usize;
        let mut found = false;
        let mut family: Option<Rc<str>> = None;
        let mut size = -1.0;
        let mut weight = None;
        let mut posture = None;
        let mut cv_font = cached_font.cloned();

        if let Some(font_prop) = self.container_of(k).and_then(|c| c.font_property)
            && tree.style_origin(k, font_prop) == Some(StyleOrigin::User)
        {
            let font = match tree.style_value(k, font_prop) {
                StyleValue::Font(f) => f,
                _ => self.default_font.clone(),
            };
            origin = Some(StyleOrigin::User);
            family = Some(font.family.clone());
            size = font.size;
            weight = Some(font.weight);
            posture = Some(font.posture);
            cv_font = Some(CalculatedValue::new(
                StyleValue::Font(font),
                origin,
                false,
            ));
        }

        let parent_font = self
            .cached_font(tree.styleable_parent(k))
            .unwrap_or_else(|| {
                CalculatedValue::new(StyleValue::Font(self.default_font.clone()), None, false)
            });

        let mut shorthand = self.get_style(k, FONT.property, states);
        if shorthand.is_none() && origin != Some(StyleOrigin::User) {
            let mut parent = tree.styleable_parent(k);
            while let Some(p) = parent {
                if self.helper_of(p).is_some() {
                    distance += 1;
                    if let Some(style) = self.get_style(p, FONT.property, tree.pseudo_class_states(p))
                        && !style.value.is_inherit()
                    {
                        shorthand = Some(style);
                        break;
                    }
                }
                parent = tree.styleable_parent(p);
            }
        }

        if let Some(style) = shorthand
            && origin.is_none_or(|o| o <= style.origin)
            && let Some(cv) = self.calculate_value(style, k, &FONT, states, Some(&parent_font))
            && let StyleValue::Font(font) = &cv.value
        {
            origin = cv.origin;
            family = Some(font.family.clone());
            size = font.size;
            weight = Some(font.weight);
            posture = Some(font.posture);
            self.winning_source = Some(style.source.clone());
            cv_font = Some(cv);
            found = true;
        }

        let size_style = match self.get_style(k, FONT_SIZE.property, states) {
            Some(s) if shorthand.is_some_and(|sh| sh.cascade_cmp(s).is_lt()) => None,
            Some(s) if origin == Some(StyleOrigin::User) && s.origin < StyleOrigin::User => None,
            Some(s) => Some(s),
            None if origin != Some(StyleOrigin::User) => {
                self.inherited_font_property(k, FONT_SIZE.property, distance, shorthand)
            }
            None => None,
        };
        if let Some(style) = size_style
            && let Some(cv) = self.calculate_value(style, k, &FONT_SIZE, states, Some(&parent_font))
            && let StyleValue::Number(px) = cv.value
        {
            if origin.is_none_or(|o| o <= style.origin) {
                origin = cv.origin;
            }
            size = px;
            let (base, relative) = match &cv_font {
                Some(f) => (
                    f.font().cloned().unwrap_or_else(|| self.default_font.clone()),
                    f.relative || cv.relative,
                ),
                None => (self.default_font.clone(), cv.relative),
            };
            let derived = base.derive(family.as_deref(), weight, posture, size);
            cv_font = Some(CalculatedValue::new(StyleValue::Font(derived), origin, relative));
            found = true;
        }

        if cached_font.is_none() {
            return cv_font;
        }

        for meta in [&FONT_WEIGHT, &FONT_STYLE, &FONT_FAMILY] {
            let style = match self.get_style(k, meta.property, states) {
                Some(s) if shorthand.is_some_and(|sh| sh.cascade_cmp(s).is_lt()) => None,
                Some(s) => Some(s),
                None if origin != Some(StyleOrigin::User) => {
                    self.inherited_font_property(k, meta.property, distance, shorthand)
                }
                None => None,
            };
            let Some(style) = style else { continue };
            let Some(cv) = self.calculate_value(style, k, meta, states, None) else {
                continue;
            };
            let applied = match &cv.value {
                StyleValue::FontWeight(w) => {
                    weight = Some(*w);
                    true
                }
                StyleValue::FontPosture(p) => {
                    posture = Some(*p);
                    true
                }
                StyleValue::String(f) => {
                    family = Some(f.clone());
                    true
                }
                _ => false,
            };
            if applied {
                if origin.is_none_or(|o| o <= style.origin) {
                    origin = cv.origin;
                }
                found = true;
            }
        }

        if !found {
            return None;
        }
        let base = cv_font
            .as_ref()
            .and_then(|f| f.font().cloned())
            .unwrap_or_else(|| self.default_font.clone());
        let derived = base.derive(family.as_deref(), weight, posture, size);
        Some(CalculatedValue::new(StyleValue::Font(derived), origin, false))
    }

    /// Looks for a font sub-property on styled ancestors no farther away than
    /// the font shorthand was found.
    fn inherited_font_property(
        &self,
        k: T::Key,
        property: &str,
        distance: usize,
        shorthand: Option<&'a CascadingStyle>,
    ) -> Option<&'a CascadingStyle> {
        let mut parent = self.tree.styleable_parent(k);
        let mut remaining = distance;
        while let Some(p) = parent {
            if remaining == 0 {
                break;
            }
            if self.helper_of(p).is_some() {
                remaining -= 1;
                if let Some(style) = self.get_style(p, property, self.tree.pseudo_class_states(p)) {
                    if remaining == 0
                        && shorthand.is_some_and(|sh| sh.cascade_cmp(style).is_lt())
                    {
                        return None;
                    }
                    if !style.value.is_inherit() {
                        return Some(style);
                    }
                }
            }
            parent = self.tree.styleable_parent(p);
        }
        None
    }

    fn report(
        &mut self,
        kind: DiagnosticKind,
        k: T::Key,
        property: &'static str,
        source: Option<Rc<str>>,
        message: String,
    ) {
        self.diagnostics.push(StyleDiagnostic {
            kind,
            property: Some(property),
            node: format!("{k:?}"),
            source,
            message,
        });
    }
}
