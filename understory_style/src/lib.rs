// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_style --heading-base-level=0

//! Understory Style: a CSS-like style cascade for retained node trees.
//!
//! For each styleable node the engine finds the matching declarations, ranks
//! them by importance, origin, specificity, and source order, resolves lookups
//! (`-fx-fill: -my-base`) and relative font sizes through the ancestor chain,
//! and writes the computed values back into the tree.
//!
//! - Cascade origins are [`StyleOrigin::UserAgent`] < [`StyleOrigin::Author`] <
//!   [`StyleOrigin::Inline`] < [`StyleOrigin::User`]. User-agent styles never
//!   replace a value set by calling code.
//! - Pseudo-class changes are cheap: each node records the pseudo-classes its
//!   styles depend on (its trigger states), and computed values are cached per
//!   combination of filtered ancestor states.
//! - Caches are two-level. Nodes whose chain of style maps from root to node is
//!   identical share computed values; each node layers local overrides and an
//!   apply-failure latch on top.
//!
//! ## Integration
//!
//! A host tree implements [`StyleTree`]: structure, selector inputs, property
//! access, and a slot for each node's [`StyleHelper`]. The host tracks a
//! [`CssFlags`] per node and calls [`StyleManager::process`] parent-first,
//! giving each processed node's children at least [`CssFlags::Update`].
//!
//! Recoverable failures (unresolved lookups, lookup loops, conversion or apply
//! errors, unparsable inline declarations) never abort a pass. They are logged
//! through [`log`] and collected in [`Diagnostics`].
//!
//! ## API overview
//!
//! - [`StyleManager`]: stylesheets, style-map interning, shared caches, processing.
//! - [`Stylesheet`], [`Rule`], [`Declaration`], [`Selector`]: style sources.
//! - [`CssMetaData`], [`StyleConverter`]: per-property metadata and conversion.
//! - [`ParsedValue`], [`StyleValue`], [`CalculatedValue`]: values before and after conversion.
//! - [`StyleMap`], [`CascadingStyle`]: a node's matched declarations.
//!
//! This crate uses `std` through `cssparser`; its own code sticks to `alloc`.

extern crate alloc;

mod cache;
mod cascade;
mod converter;
mod diagnostics;
mod flags;
mod helper;
mod manager;
mod meta;
mod origin;
mod parse;
mod pseudo;
mod selector;
mod style_map;
mod stylesheet;
mod tree;
mod value;

#[cfg(test)]
mod testing;

pub use cache::{
    Cached, LocalEntry, SharedCacheHandle, SharedCacheStore, SharedEntryId, StateKey,
    StyleCacheEntry, StyleCacheKey, TransitionStates,
};
pub use converter::{
    BooleanConverter, ColorConverter, ConvertError, EnumConverter, FontConverter,
    FontPostureConverter, FontSizeConverter, FontWeightConverter, NumberConverter, SizeConverter,
    StringConverter, StyleConverter,
};
pub use diagnostics::{DiagnosticKind, Diagnostics, StyleDiagnostic};
pub use flags::CssFlags;
pub use helper::StyleHelper;
pub use manager::{StyleConfig, StyleManager};
pub use meta::{CssMetaData, FONT, FONT_FAMILY, FONT_SIZE, FONT_STYLE, FONT_WEIGHT};
pub use origin::StyleOrigin;
pub use parse::{ParsedBlock, parse_declarations};
pub use pseudo::{PseudoClass, PseudoClassSet, PseudoClassTable};
pub use selector::{Combinator, Selector, SelectorParseError, SimpleSelector};
pub use style_map::{CascadingStyle, StyleMap, StyleMapId};
pub use stylesheet::{Declaration, Rule, Stylesheet};
pub use tree::{ApplyError, StyleTree};
pub use value::{
    CalculatedValue, Color, Font, FontKey, FontPosture, FontWeight, ParsedValue, Size, SizeUnit,
    StyleValue,
};
