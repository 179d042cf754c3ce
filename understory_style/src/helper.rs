// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node style state.

use alloc::rc::Rc;
use core::fmt;

use hashbrown::HashMap;

use crate::cache::{LocalEntry, SharedCacheHandle, SharedEntryId, StateKey, StyleCacheKey};
use crate::manager::MatchRef;
use crate::meta::CssMetaData;
use crate::origin::StyleOrigin;
use crate::pseudo::{PseudoClass, PseudoClassSet};
use crate::style_map::{StyleMap, StyleMapId};
use crate::value::{CalculatedValue, StyleValue};

/// Style state attached to a node.
///
/// A helper without a cache container is "bare": it only records trigger
/// states that descendants' selectors require of this node.
pub struct StyleHelper {
    pub(crate) trigger_states: PseudoClassSet,
    pub(crate) container: Option<CacheContainer>,
    pub(crate) tracked: HashMap<&'static str, Rc<str>>,
}

impl StyleHelper {
    pub(crate) fn bare(trigger_states: PseudoClassSet) -> Self {
        Self {
            trigger_states,
            container: None,
            tracked: HashMap::new(),
        }
    }

    /// Pseudo-classes whose changes affect this node's styles or those of its
    /// descendants.
    pub fn trigger_states(&self) -> &PseudoClassSet {
        &self.trigger_states
    }

    /// Returns `true` if a change to `pc` requires a CSS update.
    pub fn is_trigger(&self, pc: PseudoClass) -> bool {
        self.trigger_states.contains(pc)
    }

    /// Returns `true` if this helper has matched styles.
    pub fn has_styles(&self) -> bool {
        self.container.is_some()
    }

    /// Id of the node's style map.
    pub fn style_map_id(&self) -> Option<StyleMapId> {
        self.container.as_ref().map(|c| c.map.id())
    }

    /// Key of the shared cache this node uses.
    pub fn cache_key(&self) -> Option<&StyleCacheKey> {
        self.container.as_ref().map(|c| &c.cache_key)
    }

    /// The shared cache entry used by the most recent state transition.
    pub fn current_entry(&self) -> Option<SharedEntryId> {
        self.container.as_ref().and_then(|c| c.current)
    }

    /// Source of the declaration that supplied `property`, when style tracking
    /// is enabled for the node.
    pub fn matched_source(&self, property: &str) -> Option<&str> {
        self.tracked.get(property).map(|s| &**s)
    }

    /// Properties that CSS has changed from their pre-CSS values.
    pub fn css_set_properties(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.container
            .iter()
            .flat_map(|c| c.css_set.keys().copied())
    }
}

impl fmt::Debug for StyleHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleHelper")
            .field("trigger_states", &self.trigger_states)
            .field("style_map", &self.style_map_id())
            .finish_non_exhaustive()
    }
}

/// Value a property had before CSS first changed it.
#[derive(Clone, Debug)]
pub(crate) struct InitialValue {
    pub(crate) meta: &'static CssMetaData,
    pub(crate) origin: Option<StyleOrigin>,
    pub(crate) value: StyleValue,
}

/// Caches and bookkeeping for a node with matched styles.
#[derive(Debug)]
pub(crate) struct CacheContainer {
    pub(crate) map: Rc<StyleMap>,
    pub(crate) matches: Rc<[MatchRef]>,
    pub(crate) cache_key: StyleCacheKey,
    pub(crate) shared: SharedCacheHandle,
    pub(crate) font_property: Option<&'static CssMetaData>,
    pub(crate) font_size_cache: HashMap<StateKey, CalculatedValue>,
    pub(crate) local: HashMap<StateKey, LocalEntry>,
    pub(crate) css_set: HashMap<&'static str, InitialValue>,
    pub(crate) force_slow_path: bool,
    pub(crate) current: Option<SharedEntryId>,
}
