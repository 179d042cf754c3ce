// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Style manager: stylesheets, style-map interning, and per-node processing.

use alloc::format;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::cache::{Cached, LocalEntry, SharedCacheStore, StateKey, StyleCacheKey};
use crate::cascade::Resolver;
use crate::diagnostics::{DiagnosticKind, Diagnostics, StyleDiagnostic};
use crate::flags::CssFlags;
use crate::helper::{CacheContainer, InitialValue, StyleHelper};
use crate::origin::StyleOrigin;
use crate::parse::{ParsedBlock, parse_declarations};
use crate::pseudo::{PseudoClassSet, PseudoClassTable};
use crate::selector::Selector;
use crate::style_map::{CascadingStyle, StyleMap, StyleMapId};
use crate::stylesheet::Stylesheet;
use crate::tree::StyleTree;
use crate::value::{CalculatedValue, Font, StyleValue};

/// Style manager configuration.
#[derive(Clone, Debug)]
pub struct StyleConfig {
    /// Font used when nothing in the tree sets one.
    pub default_font: Font,
    /// How many diagnostics to keep before dropping the oldest.
    pub diagnostics_capacity: usize,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            default_font: Font::default(),
            diagnostics_capacity: 256,
        }
    }
}

/// A rule that matched a node: indices of the stylesheet, the rule, and the
/// most specific matching selector of the rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct MatchRef {
    sheet: u32,
    rule: u32,
    selector: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MapKey {
    matches: Rc<[MatchRef]>,
    inline: Option<Rc<str>>,
}

/// Owns stylesheets and the shared style state of one scene.
///
/// Nodes are processed through [`StyleManager::process`] with the flag their
/// tree recorded for them; the manager never walks the tree itself.
pub struct StyleManager {
    config: StyleConfig,
    pseudo_classes: PseudoClassTable,
    stylesheets: Vec<Stylesheet>,
    rule_ordinals: Vec<Vec<u32>>,
    maps: HashMap<StyleMapId, Rc<StyleMap>>,
    map_ids: HashMap<MapKey, StyleMapId>,
    next_map_id: u32,
    inline_blocks: HashMap<Rc<str>, Rc<ParsedBlock>>,
    inline_selector: Rc<Selector>,
    shared: SharedCacheStore,
    diagnostics: Diagnostics,
}

impl Default for StyleManager {
    fn default() -> Self {
        Self::new(StyleConfig::default())
    }
}

impl core::fmt::Debug for StyleManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StyleManager")
            .field("stylesheets", &self.stylesheets.len())
            .field("style_maps", &self.maps.len())
            .field("shared_caches", &self.shared.len())
            .field("diagnostics", &self.diagnostics.len())
            .finish_non_exhaustive()
    }
}

impl StyleManager {
    /// Creates a manager with no stylesheets.
    pub fn new(config: StyleConfig) -> Self {
        let diagnostics = Diagnostics::with_capacity(config.diagnostics_capacity);
        let mut maps = HashMap::new();
        maps.insert(StyleMapId::EMPTY, Rc::new(StyleMap::empty()));
        Self {
            config,
            pseudo_classes: PseudoClassTable::default(),
            stylesheets: Vec::new(),
            rule_ordinals: Vec::new(),
            maps,
            map_ids: HashMap::new(),
            next_map_id: 1,
            inline_blocks: HashMap::new(),
            inline_selector: Rc::new(Selector::universal()),
            shared: SharedCacheStore::default(),
            diagnostics,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    /// Pseudo-class name table used for parsing selectors.
    pub fn pseudo_classes(&self) -> &PseudoClassTable {
        &self.pseudo_classes
    }

    /// Mutable pseudo-class table, for interning custom pseudo-classes.
    pub fn pseudo_classes_mut(&mut self) -> &mut PseudoClassTable {
        &mut self.pseudo_classes
    }

    /// Stylesheets in cascade order.
    pub fn stylesheets(&self) -> &[Stylesheet] {
        &self.stylesheets
    }

    /// Appends a stylesheet.
    ///
    /// Callers must reapply styles to the whole tree afterwards.
    pub fn add_stylesheet(&mut self, sheet: Stylesheet) {
        self.stylesheets.push(sheet);
        self.stylesheets_changed();
    }

    /// Replaces all stylesheets.
    pub fn set_stylesheets(&mut self, sheets: impl IntoIterator<Item = Stylesheet>) {
        self.stylesheets = sheets.into_iter().collect();
        self.stylesheets_changed();
    }

    /// Drops everything derived from the stylesheets.
    ///
    /// Existing helpers notice on their next transition and ask for a reapply.
    pub fn stylesheets_changed(&mut self) {
        let mut next = 0_u32;
        self.rule_ordinals = self
            .stylesheets
            .iter()
            .map(|sheet| {
                sheet
                    .rules
                    .iter()
                    .map(|rule| {
                        let base = next;
                        let count = u32::try_from(rule.declarations.len()).unwrap_or(u32::MAX);
                        next = next.saturating_add(count);
                        base
                    })
                    .collect()
            })
            .collect();
        self.maps.clear();
        self.maps
            .insert(StyleMapId::EMPTY, Rc::new(StyleMap::empty()));
        self.map_ids.clear();
        self.shared.evict_all();
        log::debug!("stylesheets changed; {} sheets", self.stylesheets.len());
    }

    /// Interned style map by id.
    pub fn style_map(&self, id: StyleMapId) -> Option<&StyleMap> {
        self.maps.get(&id).map(|m| &**m)
    }

    /// Number of interned style maps, including the empty one.
    pub fn style_map_count(&self) -> usize {
        self.maps.len()
    }

    /// The shared computed-value caches.
    pub fn shared_caches(&self) -> &SharedCacheStore {
        &self.shared
    }

    /// Drops all shared caches, as under memory pressure.
    ///
    /// Nodes holding stale handles reapply their styles on their next pass.
    pub fn evict_shared_caches(&mut self) {
        self.shared.evict_all();
    }

    /// Recorded diagnostics.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Removes and returns recorded diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<StyleDiagnostic> {
        self.diagnostics.take().collect()
    }

    /// Processes one node according to its flag.
    ///
    /// The caller handles descent: children are processed afterwards with at
    /// least [`CssFlags::Update`] when the parent was processed.
    pub fn process<T: StyleTree + ?Sized>(&mut self, tree: &mut T, node: T::Key, flag: CssFlags) {
        match flag {
            CssFlags::Clean | CssFlags::DirtyBranch => return,
            CssFlags::Update => {}
            CssFlags::Recalculate => self.create_style_helper(tree, node, false),
            CssFlags::Reapply => self.create_style_helper(tree, node, true),
        }
        log::trace!("css {node:?}: {flag:?}");
        self.transition_to_state(tree, node);
    }

    /// Builds or refreshes the node's helper.
    ///
    /// With `rematch` the selectors are matched again; otherwise the previous
    /// matches are kept and only the inline part of the map is rebuilt.
    fn create_style_helper<T: StyleTree + ?Sized>(
        &mut self,
        tree: &mut T,
        node: T::Key,
        rematch: bool,
    ) {
        let old = tree.replace_style_helper(node, None);

        let mut depth = 1;
        let mut cur = tree.styleable_parent(node);
        while let Some(p) = cur {
            depth += 1;
            cur = tree.styleable_parent(p);
        }
        let mut triggers = vec![PseudoClassSet::new(); depth];

        let kept = if rematch {
            None
        } else {
            old.as_ref()
                .and_then(|h| h.container.as_ref().map(|c| (h, c)))
                .map(|(h, c)| (h.trigger_states.clone(), c.matches.clone()))
        };
        let matches = match kept {
            Some((states, matches)) => {
                triggers[0] = states;
                matches
            }
            None => self.find_matching_styles(&*tree, node, &mut triggers),
        };

        let inline: Option<Rc<str>> = tree
            .inline_style(node)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Rc::from);
        let map = self.style_map_for(&matches, inline.as_ref(), node);
        let cache_key = cache_key_for(&*tree, node, map.id());
        let metas = tree.css_meta_data(node);

        let reusable = old
            .as_ref()
            .and_then(|h| h.container.as_ref())
            .is_some_and(|c| c.map.id() == map.id() && c.cache_key == cache_key);
        if reusable && let Some(mut old) = old {
            if let Some(c) = old.container.as_mut() {
                if c.font_property
                    .is_some_and(|f| tree.style_origin(node, f) == Some(StyleOrigin::User))
                {
                    c.font_size_cache.clear();
                }
                c.force_slow_path = true;
            }
            old.trigger_states.union_with(&triggers[0]);
            tree.replace_style_helper(node, Some(old));
            update_parent_triggers(tree, node, &triggers);
            return;
        }

        if map.is_empty() && !metas.iter().any(|m| m.inherits) {
            if let Some(old) = old {
                reset_to_initial_values(tree, node, old);
            }
            update_parent_triggers(tree, node, &triggers);
            return;
        }

        let shared = self.shared.handle_for(&cache_key);
        let css_set = old
            .and_then(|h| h.container)
            .map(|c| c.css_set)
            .unwrap_or_default();
        let container = CacheContainer {
            map,
            matches,
            cache_key,
            shared,
            font_property: metas.iter().copied().find(|m| m.is_font()),
            font_size_cache: HashMap::new(),
            local: HashMap::new(),
            css_set,
            force_slow_path: false,
            current: None,
        };
        let mut helper = StyleHelper::bare(triggers[0].clone());
        helper.container = Some(container);
        tree.replace_style_helper(node, Some(helper));
        update_parent_triggers(tree, node, &triggers);
    }

    /// Matches every selector against `node`, recording trigger states.
    fn find_matching_styles<T: StyleTree + ?Sized>(
        &self,
        tree: &T,
        node: T::Key,
        triggers: &mut [PseudoClassSet],
    ) -> Rc<[MatchRef]> {
        let mut out = Vec::new();
        for (si, sheet) in self.stylesheets.iter().enumerate() {
            for (ri, rule) in sheet.rules.iter().enumerate() {
                let mut best: Option<(usize, u32)> = None;
                for (xi, selector) in rule.selectors.iter().enumerate() {
                    if selector.applies(tree, node, triggers) {
                        let specificity = selector.specificity();
                        if best.is_none_or(|(_, s)| specificity > s) {
                            best = Some((xi, specificity));
                        }
                    }
                }
                if let Some((xi, _)) = best {
                    out.push(MatchRef {
                        sheet: index(si),
                        rule: index(ri),
                        selector: index(xi),
                    });
                }
            }
        }
        Rc::from(out)
    }

    /// Returns the interned map for `matches` plus `inline`.
    fn style_map_for<K: core::fmt::Debug>(
        &mut self,
        matches: &Rc<[MatchRef]>,
        inline: Option<&Rc<str>>,
        node: K,
    ) -> Rc<StyleMap> {
        if matches.is_empty() && inline.is_none() {
            return self.empty_map();
        }
        let key = MapKey {
            matches: matches.clone(),
            inline: inline.cloned(),
        };
        if let Some(id) = self.map_ids.get(&key)
            && let Some(map) = self.maps.get(id)
        {
            return map.clone();
        }

        let mut styles = Vec::new();
        for m in matches.iter() {
            let Some(sheet) = self.stylesheets.get(m.sheet as usize) else {
                continue;
            };
            let Some(rule) = sheet.rules.get(m.rule as usize) else {
                continue;
            };
            let Some(selector) = rule.selectors.get(m.selector as usize) else {
                continue;
            };
            let base = self
                .rule_ordinals
                .get(m.sheet as usize)
                .and_then(|r| r.get(m.rule as usize))
                .copied()
                .unwrap_or(0);
            let source: Rc<str> = Rc::from(format!("{}: {selector}", sheet.url).as_str());
            for (i, decl) in rule.declarations.iter().enumerate() {
                styles.push(CascadingStyle {
                    property: decl.property.clone(),
                    value: decl.value.clone(),
                    important: decl.important,
                    origin: sheet.origin,
                    specificity: selector.specificity(),
                    order: base.saturating_add(index(i)),
                    selector: selector.clone(),
                    source: source.clone(),
                });
            }
        }
        if let Some(text) = inline {
            let block = self.inline_block(text, &node);
            let source: Rc<str> = Rc::from("inline");
            for (i, decl) in block.declarations.iter().enumerate() {
                styles.push(CascadingStyle {
                    property: decl.property.clone(),
                    value: decl.value.clone(),
                    important: decl.important,
                    origin: StyleOrigin::Inline,
                    specificity: 0,
                    order: (u32::MAX / 2).saturating_add(index(i)),
                    selector: self.inline_selector.clone(),
                    source: source.clone(),
                });
            }
        }

        let id = StyleMapId(self.next_map_id);
        self.next_map_id += 1;
        let map = Rc::new(StyleMap::new(id, styles));
        self.maps.insert(id, map.clone());
        self.map_ids.insert(key, id);
        map
    }

    fn empty_map(&mut self) -> Rc<StyleMap> {
        self.maps
            .entry(StyleMapId::EMPTY)
            .or_insert_with(|| Rc::new(StyleMap::empty()))
            .clone()
    }

    /// Parses an inline block once; errors are reported on first parse.
    fn inline_block<K: core::fmt::Debug>(&mut self, text: &Rc<str>, node: &K) -> Rc<ParsedBlock> {
        if let Some(block) = self.inline_blocks.get(text) {
            return block.clone();
        }
        let block = Rc::new(parse_declarations(text));
        for error in &block.errors {
            self.diagnostics.push(StyleDiagnostic {
                kind: DiagnosticKind::Parse,
                property: None,
                node: format!("{node:?}"),
                source: Some(Rc::from("inline")),
                message: format!("Could not parse inline declaration '{error}'"),
            });
        }
        self.inline_blocks.insert(text.clone(), block.clone());
        block
    }

    /// Resolves and applies every styleable property for the node's current
    /// pseudo-class states.
    fn transition_to_state<T: StyleTree + ?Sized>(&mut self, tree: &mut T, node: T::Key) {
        let Some(mut helper) = tree.replace_style_helper(node, None) else {
            return;
        };
        let Some(container) = helper.container.as_ref() else {
            tree.replace_style_helper(node, Some(helper));
            return;
        };
        let map_live = self
            .maps
            .get(&container.map.id())
            .is_some_and(|m| Rc::ptr_eq(m, &container.map));
        if !map_live || !self.shared.is_live(container.shared) {
            log::debug!("style caches for {node:?} are gone; reapplying");
            helper.container = None;
            tree.replace_style_helper(node, Some(helper));
            tree.request_reapply(node);
            return;
        }

        let tracking = tree.tracks_styles(node);
        let has_inline = tree
            .inline_style(node)
            .is_some_and(|s| !s.trim().is_empty());

        let (states, font_key, cached_font, font_is_new) = {
            let mut resolver = Resolver::new(
                &*tree,
                node,
                &helper,
                &self.config.default_font,
                &mut self.diagnostics,
            );
            let states = resolver.transition_states(node);
            let font_key = StateKey::new(states.clone(), None);
            match container.font_size_cache.get(&font_key) {
                Some(font) => (states, font_key, font.clone(), false),
                None => {
                    let font = resolver
                        .lookup_font(node, None)
                        .or_else(|| resolver.cached_font(tree.styleable_parent(node)))
                        .unwrap_or_else(|| {
                            CalculatedValue::new(
                                StyleValue::Font(self.config.default_font.clone()),
                                None,
                                false,
                            )
                        });
                    (states, font_key, font, true)
                }
            }
        };
        let font_origin = cached_font.origin;
        let entry_key = StateKey::new(
            states.clone(),
            cached_font.font().map(Font::key),
        );

        let (fastpath, force_slow_path, inherit_only) = {
            let Some(container) = helper.container.as_mut() else {
                tree.replace_style_helper(node, Some(helper));
                return;
            };
            if font_is_new {
                container.font_size_cache.insert(font_key, cached_font.clone());
            }
            let existed = container.local.contains_key(&entry_key);
            if !existed {
                let Some(shared) = self.shared.entry_for(container.shared, &entry_key) else {
                    helper.container = None;
                    tree.replace_style_helper(node, Some(helper));
                    tree.request_reapply(node);
                    return;
                };
                container
                    .local
                    .insert(entry_key.clone(), LocalEntry::new(shared));
            }
            container.current = container.local.get(&entry_key).map(LocalEntry::shared);
            let fastpath = existed
                && !tracking
                && !has_inline
                && !matches!(font_origin, Some(StyleOrigin::User | StyleOrigin::Inline));
            let force = core::mem::take(&mut container.force_slow_path);
            (fastpath, force, container.map.is_empty())
        };
        let local_font = matches!(font_origin, Some(StyleOrigin::User | StyleOrigin::Inline));
        let node_states = states.first().cloned().unwrap_or_default();

        for &meta in tree.css_meta_data(node) {
            let prop = meta.property;
            let Some(container) = helper.container.as_ref() else {
                break;
            };
            if inherit_only && !meta.inherits && !container.css_set.contains_key(prop) {
                continue;
            }
            if !tree.is_settable(node, meta) {
                continue;
            }
            let cached = match container.local.get(&entry_key) {
                Some(local) => match local.get(&self.shared, prop) {
                    Cached::Missing => None,
                    Cached::Failed => continue,
                    Cached::Value(v) => Some(v.clone()),
                },
                None => None,
            };
            let force_slow = fastpath && cached.is_none() && force_slow_path;
            let add_to_cache = (!fastpath && cached.is_none()) || force_slow;

            let calculated = if fastpath && !force_slow {
                cached
            } else if cached.is_some() && !tracking {
                cached
            } else {
                let mut resolver = Resolver::new(
                    &*tree,
                    node,
                    &helper,
                    &self.config.default_font,
                    &mut self.diagnostics,
                );
                let value = resolver.lookup(meta, &node_states, &cached_font);
                let source = resolver.winning_source.take();
                if tracking {
                    match source {
                        Some(source) => {
                            helper.tracked.insert(prop, source);
                        }
                        None => {
                            helper.tracked.remove(prop);
                        }
                    }
                }
                value
            };

            let Some(container) = helper.container.as_mut() else {
                break;
            };
            let Some(calculated) = calculated else {
                // Nothing applies any more: restore what CSS replaced.
                if let Some(initial) = container.css_set.get(prop)
                    && tree.style_origin(node, meta) != Some(StyleOrigin::User)
                    && let Err(err) = tree.apply_style(node, meta, initial.origin, &initial.value)
                {
                    log::error!("Could not reset [{prop}] on [{node:?}]: {err}");
                }
                continue;
            };

            if add_to_cache && let Some(local) = container.local.get_mut(&entry_key) {
                let local_only = calculated.origin >= Some(StyleOrigin::Inline) || local_font || has_inline;
                local.put(&mut self.shared, prop, calculated.clone(), local_only);
            }

            let current_origin = tree.style_origin(node, meta);
            let Some(origin) = calculated.origin else {
                debug_assert!(false, "calculated value for {prop} has no origin");
                continue;
            };
            if current_origin == Some(StyleOrigin::User) && origin == StyleOrigin::UserAgent {
                continue;
            }
            let current_value = tree.style_value(node, meta);
            if current_origin == calculated.origin && current_value == calculated.value {
                continue;
            }
            match tree.apply_style(node, meta, calculated.origin, &calculated.value) {
                Ok(()) => {
                    container.css_set.entry(prop).or_insert(InitialValue {
                        meta,
                        origin: current_origin,
                        value: current_value,
                    });
                }
                Err(err) => {
                    self.diagnostics.push(StyleDiagnostic {
                        kind: DiagnosticKind::Apply,
                        property: Some(prop),
                        node: format!("{node:?}"),
                        source: helper.tracked.get(prop).cloned(),
                        message: format!("Failed to set css [{prop}] on [{node:?}] due to '{err}'"),
                    });
                    if let Some(local) = container.local.get_mut(&entry_key) {
                        local.mark_failed(prop);
                    }
                    let (origin, value) = match container.css_set.get(prop) {
                        Some(initial) => (initial.origin, initial.value.clone()),
                        None => (None, meta.initial_value()),
                    };
                    if let Err(err) = tree.apply_style(node, meta, origin, &value) {
                        log::error!("Could not reset [{prop}] on [{node:?}]: {err}");
                    }
                }
            }
        }

        tree.replace_style_helper(node, Some(helper));
    }
}

fn index(i: usize) -> u32 {
    u32::try_from(i).unwrap_or(u32::MAX)
}

/// Own map id followed by the map ids of styled ancestors.
fn cache_key_for<T: StyleTree + ?Sized>(tree: &T, node: T::Key, own: StyleMapId) -> StyleCacheKey {
    let mut ids = vec![own];
    let mut cur = tree.styleable_parent(node);
    while let Some(p) = cur {
        if let Some(id) = tree.style_helper(p).and_then(StyleHelper::style_map_id) {
            ids.push(id);
        }
        cur = tree.styleable_parent(p);
    }
    StyleCacheKey::new(ids)
}

/// Adds the states descendants' selectors need to each ancestor's helper,
/// creating bare helpers where there are none.
fn update_parent_triggers<T: StyleTree + ?Sized>(
    tree: &mut T,
    node: T::Key,
    triggers: &[PseudoClassSet],
) {
    let mut cur = tree.styleable_parent(node);
    for states in triggers.iter().skip(1) {
        let Some(p) = cur else { break };
        if !states.is_empty() {
            match tree.style_helper_mut(p) {
                Some(helper) => helper.trigger_states.union_with(states),
                None => {
                    tree.replace_style_helper(p, Some(StyleHelper::bare(states.clone())));
                }
            }
        }
        cur = tree.styleable_parent(p);
    }
}

/// Restores properties CSS changed, unless the user has since set them.
fn reset_to_initial_values<T: StyleTree + ?Sized>(tree: &mut T, node: T::Key, helper: StyleHelper) {
    let Some(container) = helper.container else {
        return;
    };
    for (prop, initial) in container.css_set {
        let origin = tree.style_origin(node, initial.meta);
        if origin.is_some() && origin != Some(StyleOrigin::User)
            && let Err(err) = tree.apply_style(node, initial.meta, initial.origin, &initial.value)
        {
            log::error!("Could not reset [{prop}] on [{node:?}]: {err}");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use crate::meta::FONT;
    use crate::pseudo::PseudoClass;
    use crate::testing::{FILL, OPACITY, TestTree, node};
    use crate::value::Color;

    fn sheet(m: &mut StyleManager, origin: StyleOrigin, rules: &[(&str, &str)]) -> Stylesheet {
        let mut sheet = Stylesheet::new(origin, "test.css");
        for (selector, block) in rules {
            let errors = sheet
                .add_rule(selector, block, m.pseudo_classes_mut())
                .unwrap();
            assert!(errors.is_empty(), "test rules parse: {errors:?}");
        }
        sheet
    }

    fn add_sheet(m: &mut StyleManager, origin: StyleOrigin, rules: &[(&str, &str)]) {
        let s = sheet(m, origin, rules);
        m.add_stylesheet(s);
    }

    fn font_size(tree: &TestTree, n: usize) -> f64 {
        tree.value(n, &FONT).as_font().map_or(-1.0, |f| f.size)
    }

    #[test]
    fn inline_beats_author_beats_user_agent() {
        let mut m = StyleManager::default();
        add_sheet(&mut m, StyleOrigin::UserAgent, &[(".label", "-fx-opacity: 0.2")]);
        add_sheet(&mut m, StyleOrigin::Author, &[(".label", "-fx-opacity: 0.5")]);
        let mut tree = TestTree::default();
        let leaf = tree.add(None, node("Text").class("label").inline("-fx-opacity: 0.7"));

        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(0.7), "inline value");
        assert_eq!(tree.origin(leaf, &OPACITY), Some(StyleOrigin::Inline), "inline origin");

        tree.set_inline(leaf, None);
        tree.process_all(&mut m, CssFlags::Recalculate);
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(0.5), "author value");
        assert_eq!(tree.origin(leaf, &OPACITY), Some(StyleOrigin::Author), "author origin");
    }

    #[test]
    fn user_agent_never_overrides_user_set_value() {
        let mut m = StyleManager::default();
        add_sheet(&mut m, StyleOrigin::UserAgent, &[(".label", "-fx-opacity: 0.2")]);
        let mut tree = TestTree::default();
        let leaf = tree.add(None, node("Text").class("label"));
        tree.set_user(leaf, &OPACITY, StyleValue::Number(0.9));

        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(0.9), "user value kept");
        assert_eq!(tree.origin(leaf, &OPACITY), Some(StyleOrigin::User), "user origin kept");

        add_sheet(&mut m, StyleOrigin::Author, &[(".label", "-fx-opacity: 0.4")]);
        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(
            tree.value(leaf, &OPACITY),
            StyleValue::Number(0.4),
            "author stylesheets still override setters"
        );
    }

    #[test]
    fn structurally_identical_siblings_share_cache_entries() {
        let mut m = StyleManager::default();
        add_sheet(
            &mut m,
            StyleOrigin::Author,
            &[(".label", "-fx-opacity: 0.5"), ("#special", "-fx-fill: red")],
        );
        let mut tree = TestTree::default();
        let root = tree.add(None, node("Group"));
        let a = tree.add(Some(root), node("Text").class("label"));
        let b = tree.add(Some(root), node("Text").class("label"));
        let c = tree.add(Some(root), node("Text").class("label").id("special"));
        tree.process_all(&mut m, CssFlags::Reapply);

        let entry = |n: usize| tree.style_helper(n).and_then(StyleHelper::current_entry);
        assert!(entry(a).is_some(), "a has an entry");
        assert_eq!(entry(a), entry(b), "siblings share one entry");
        assert_ne!(entry(a), entry(c), "a different map gets its own cache");
        assert_eq!(tree.value(c, &FILL), StyleValue::Color(Color::rgb(255, 0, 0)), "id rule applied");
        assert_eq!(tree.value(b, &OPACITY), StyleValue::Number(0.5), "b styled from the cache");
    }

    #[test]
    fn clearing_inline_style_restores_initial_value() {
        let mut m = StyleManager::default();
        let mut tree = TestTree::default();
        let leaf = tree.add(None, node("Text").inline("-fx-opacity: 0.3;"));
        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(0.3), "inline applied");

        tree.set_inline(leaf, Some(""));
        tree.process_all(&mut m, CssFlags::Recalculate);
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(1.0), "initial value");
        assert_eq!(tree.origin(leaf, &OPACITY), None, "initial values have no origin");
    }

    #[test]
    fn lookups_into_inline_styles_take_the_inline_origin() {
        let mut m = StyleManager::default();
        add_sheet(&mut m, StyleOrigin::Author, &[(".label", "-fx-fill: -my-base")]);
        let mut tree = TestTree::default();
        let root = tree.add(None, node("Group").inline("-my-base: #ff0000"));
        let leaf = tree.add(Some(root), node("Text").class("label"));
        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(
            tree.value(leaf, &FILL),
            StyleValue::Color(Color::rgb(255, 0, 0)),
            "lookup resolved through the ancestor"
        );
        assert_eq!(
            tree.origin(leaf, &FILL),
            Some(StyleOrigin::Inline),
            "inline lookup raises the author declaration's origin"
        );
    }

    #[test]
    fn relative_font_sizes_follow_the_parent() {
        let mut m = StyleManager::default();
        let mut tree = TestTree::default();
        let outer = tree.add(None, node("Group").class("outer"));
        let inner = tree.add(Some(outer), node("Text").class("inner"));

        let s = sheet(
            &mut m,
            StyleOrigin::Author,
            &[(".outer", "-fx-font-size: 20px"), (".inner", "-fx-font-size: 1.5em")],
        );
        m.set_stylesheets([s]);
        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(font_size(&tree, outer), 20.0, "absolute size");
        assert_eq!(font_size(&tree, inner), 30.0, "1.5em of 20px");

        let s = sheet(
            &mut m,
            StyleOrigin::Author,
            &[(".outer", "-fx-font-size: 10px"), (".inner", "-fx-font-size: 1.5em")],
        );
        m.set_stylesheets([s]);
        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(font_size(&tree, inner), 15.0, "1.5em of 10px");
    }

    #[test]
    fn hover_transitions_apply_and_reset() {
        let mut m = StyleManager::default();
        add_sheet(&mut m, StyleOrigin::Author, &[(".label:hover", "-fx-opacity: 0.5")]);
        let mut tree = TestTree::default();
        let leaf = tree.add(None, node("Text").class("label"));
        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(tree.origin(leaf, &OPACITY), None, "not hovered yet");
        assert!(
            tree.style_helper(leaf).is_some_and(|h| h.is_trigger(PseudoClass::HOVER)),
            "hover is a trigger"
        );
        assert!(
            !tree.style_helper(leaf).is_some_and(|h| h.is_trigger(PseudoClass::PRESSED)),
            "pressed is not"
        );

        tree.set_state(leaf, PseudoClass::HOVER, true);
        tree.process_all(&mut m, CssFlags::Update);
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(0.5), "hover style");

        tree.set_state(leaf, PseudoClass::HOVER, false);
        tree.process_all(&mut m, CssFlags::Update);
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(1.0), "back to initial");
        assert_eq!(tree.origin(leaf, &OPACITY), None, "origin cleared");
    }

    #[test]
    fn ancestor_states_become_triggers() {
        let mut m = StyleManager::default();
        add_sheet(&mut m, StyleOrigin::Author, &[(".root:focused .label", "-fx-opacity: 0.25")]);
        let mut tree = TestTree::default();
        let root = tree.add(None, node("Group").class("root"));
        let leaf = tree.add(Some(root), node("Text").class("label"));
        tree.process_all(&mut m, CssFlags::Reapply);
        assert!(
            tree.style_helper(root).is_some_and(|h| h.is_trigger(PseudoClass::FOCUSED)),
            "descendant selector makes :focused a trigger on the root"
        );
        tree.set_state(root, PseudoClass::FOCUSED, true);
        tree.process_all(&mut m, CssFlags::Update);
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(0.25), "ancestor state applies");
    }

    #[test]
    fn failed_application_is_reported_once_and_latched() {
        let mut m = StyleManager::default();
        add_sheet(&mut m, StyleOrigin::Author, &[(".label", "-fx-opacity: 2")]);
        let mut tree = TestTree::default();
        let leaf = tree.add(None, node("Text").class("label"));
        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(1.0), "reset to initial");
        tree.process_all(&mut m, CssFlags::Update);
        let diagnostics = m.take_diagnostics();
        assert_eq!(diagnostics.len(), 1, "one failure: {diagnostics:?}");
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Apply, "apply failure");
        assert_eq!(diagnostics[0].property, Some("-fx-opacity"), "property recorded");
    }

    #[test]
    fn lookups_resolve_through_ancestors() {
        let mut m = StyleManager::default();
        add_sheet(
            &mut m,
            StyleOrigin::Author,
            &[
                (".root", "-my-base: #ff0000"),
                (".label", "-fx-fill: -my-base"),
                (".loop", "-a: -b; -b: -a; -fx-fill: -a"),
                (".missing", "-fx-fill: -nowhere"),
            ],
        );
        let mut tree = TestTree::default();
        let root = tree.add(None, node("Group").class("root"));
        let label = tree.add(Some(root), node("Text").class("label"));
        let looped = tree.add(Some(root), node("Text").class("loop"));
        let missing = tree.add(Some(root), node("Text").class("missing"));
        tree.process_all(&mut m, CssFlags::Reapply);

        assert_eq!(tree.value(label, &FILL), StyleValue::Color(Color::rgb(255, 0, 0)), "looked up");
        assert_eq!(tree.origin(looped, &FILL), None, "loop leaves the property alone");
        assert_eq!(tree.origin(missing, &FILL), None, "unresolved leaves the property alone");
        let kinds: Vec<_> = m.diagnostics().iter().map(|d| d.kind).collect();
        assert!(kinds.contains(&DiagnosticKind::LookupLoop), "loop reported: {kinds:?}");
        assert!(kinds.contains(&DiagnosticKind::UnresolvedLookup), "miss reported: {kinds:?}");
    }

    #[test]
    fn inheritable_properties_flow_down() {
        let mut m = StyleManager::default();
        add_sheet(
            &mut m,
            StyleOrigin::Author,
            &[(".root", "-fx-fill: #00ff00; -fx-opacity: 0.4"), (".label", "-fx-opacity: inherit")],
        );
        let mut tree = TestTree::default();
        let root = tree.add(None, node("Group").class("root"));
        let mid = tree.add(Some(root), node("Group"));
        let leaf = tree.add(Some(mid), node("Text").class("label"));
        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(tree.value(leaf, &FILL), StyleValue::Color(Color::rgb(0, 255, 0)), "fill inherits");
        assert_eq!(tree.origin(leaf, &FILL), Some(StyleOrigin::Author), "inherited origin");
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(0.4), "explicit inherit");
        assert_eq!(tree.origin(mid, &OPACITY), None, "opacity does not inherit implicitly");
    }

    #[test]
    fn evicted_shared_caches_trigger_reapply() {
        let mut m = StyleManager::default();
        add_sheet(&mut m, StyleOrigin::Author, &[(".label", "-fx-opacity: 0.5")]);
        let mut tree = TestTree::default();
        let leaf = tree.add(None, node("Text").class("label"));
        tree.process_all(&mut m, CssFlags::Reapply);
        m.evict_shared_caches();
        assert!(m.shared_caches().is_empty(), "evicted");

        tree.process_all(&mut m, CssFlags::Update);
        let entry = tree.style_helper(leaf).and_then(StyleHelper::current_entry);
        assert!(
            entry.is_some_and(|e| m.shared_caches().is_live(e.cache())),
            "fresh cache after reapply"
        );
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(0.5), "value kept");
    }

    #[test]
    fn tracking_records_winning_declaration() {
        let mut m = StyleManager::default();
        add_sheet(&mut m, StyleOrigin::Author, &[(".label", "-fx-opacity: 0.5")]);
        let mut tree = TestTree::default();
        let leaf = tree.add(None, node("Text").class("label"));
        tree.set_tracking(leaf, true);
        tree.process_all(&mut m, CssFlags::Reapply);
        let source = tree
            .style_helper(leaf)
            .and_then(|h| h.matched_source("-fx-opacity"))
            .map(String::from);
        assert_eq!(source.as_deref(), Some("test.css: .label"), "source recorded");
    }

    #[test]
    fn bad_inline_declarations_are_diagnosed() {
        let mut m = StyleManager::default();
        let mut tree = TestTree::default();
        let leaf = tree.add(None, node("Text").inline("-fx-opacity: 0.3; -fx-fill: ???"));
        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(tree.value(leaf, &OPACITY), StyleValue::Number(0.3), "good declaration kept");
        assert!(
            m.diagnostics().iter().any(|d| d.kind == DiagnosticKind::Parse),
            "parse error recorded"
        );
    }

    #[test]
    fn unchanged_inputs_reuse_the_style_map() {
        let mut m = StyleManager::default();
        add_sheet(&mut m, StyleOrigin::Author, &[(".label", "-fx-opacity: 0.5")]);
        let mut tree = TestTree::default();
        let a = tree.add(None, node("Text").class("label"));
        let b = tree.add(None, node("Text").class("label"));
        tree.process_all(&mut m, CssFlags::Reapply);
        let map_a = tree.style_helper(a).and_then(StyleHelper::style_map_id);
        assert_eq!(map_a, tree.style_helper(b).and_then(StyleHelper::style_map_id), "interned");
        let count = m.style_map_count();
        tree.process_all(&mut m, CssFlags::Reapply);
        assert_eq!(m.style_map_count(), count, "no new maps for the same inputs");
        assert_eq!(tree.style_helper(a).and_then(StyleHelper::style_map_id), map_a, "same id");
    }
}
