// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node matched styles, grouped by property and sorted by precedence.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cmp::Ordering;

use hashbrown::HashMap;

use crate::origin::StyleOrigin;
use crate::selector::Selector;
use crate::value::ParsedValue;

/// One declaration that matched a node, with everything needed to rank it.
#[derive(Clone, Debug, PartialEq)]
pub struct CascadingStyle {
    /// Property name.
    pub property: Rc<str>,
    /// Declared value.
    pub value: Rc<ParsedValue>,
    /// `!important` flag.
    pub important: bool,
    /// Origin of the stylesheet (or [`StyleOrigin::Inline`]).
    pub origin: StyleOrigin,
    /// Selector specificity.
    pub specificity: u32,
    /// Source order across all stylesheets; later wins ties.
    pub order: u32,
    /// Selector that matched. Inline declarations use the universal selector.
    pub selector: Rc<Selector>,
    /// Human readable source, for diagnostics.
    pub source: Rc<str>,
}

impl CascadingStyle {
    /// Ranks two styles for the same property.
    ///
    /// `Less` means `self` takes precedence: importance first, then origin, then
    /// specificity, then later source order.
    pub fn cascade_cmp(&self, other: &Self) -> Ordering {
        other
            .important
            .cmp(&self.important)
            .then_with(|| other.origin.cmp(&self.origin))
            .then_with(|| other.specificity.cmp(&self.specificity))
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Identity of an interned [`StyleMap`].
///
/// Ids are never reused, so a stale id simply fails to resolve.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StyleMapId(pub(crate) u32);

impl StyleMapId {
    /// The shared map of a node that matched nothing.
    pub const EMPTY: Self = Self(0);
}

/// All styles that may apply to a node, by property, best first.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleMap {
    id: StyleMapId,
    styles: HashMap<Rc<str>, Vec<CascadingStyle>>,
}

impl StyleMap {
    /// Builds a map from unsorted styles.
    pub fn new(id: StyleMapId, styles: impl IntoIterator<Item = CascadingStyle>) -> Self {
        let mut by_property: HashMap<Rc<str>, Vec<CascadingStyle>> = HashMap::new();
        for style in styles {
            by_property.entry(style.property.clone()).or_default().push(style);
        }
        for list in by_property.values_mut() {
            list.sort_by(CascadingStyle::cascade_cmp);
        }
        Self {
            id,
            styles: by_property,
        }
    }

    /// The empty map.
    pub fn empty() -> Self {
        Self {
            id: StyleMapId::EMPTY,
            styles: HashMap::new(),
        }
    }

    /// This map's id.
    pub fn id(&self) -> StyleMapId {
        self.id
    }

    /// Styles for `property`, best first.
    pub fn get(&self, property: &str) -> &[CascadingStyle] {
        self.styles.get(property).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns `true` if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Property names with at least one style.
    pub fn properties(&self) -> impl Iterator<Item = &str> + '_ {
        self.styles.keys().map(|k| &**k)
    }
}
