// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The seam between the style engine and a node tree.

use core::fmt;
use core::hash::Hash;

use crate::helper::StyleHelper;
use crate::meta::CssMetaData;
use crate::origin::StyleOrigin;
use crate::pseudo::PseudoClassSet;
use crate::value::StyleValue;

/// Error returned when a tree refuses a computed style value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyError {
    /// The value has the wrong type for the property.
    TypeMismatch {
        /// Property being applied.
        property: &'static str,
        /// Expected value kind.
        expected: &'static str,
        /// Kind that was supplied.
        found: &'static str,
    },
    /// The value was of the right type but out of range.
    OutOfRange {
        /// Property being applied.
        property: &'static str,
    },
    /// The node is gone.
    StaleNode,
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch {
                property,
                expected,
                found,
            } => write!(f, "{property} expects a {expected}, got a {found}"),
            Self::OutOfRange { property } => write!(f, "value out of range for {property}"),
            Self::StaleNode => f.write_str("node no longer exists"),
        }
    }
}

impl core::error::Error for ApplyError {}

/// A tree of styleable nodes.
///
/// The style engine reads structure and selector inputs through this trait and
/// writes computed values back through [`StyleTree::apply_style`]. Each node
/// owns an optional [`StyleHelper`] slot that the engine manages.
pub trait StyleTree {
    /// Node handle.
    type Key: Copy + Eq + Hash + fmt::Debug;

    /// The nearest ancestor that participates in styling.
    fn styleable_parent(&self, node: Self::Key) -> Option<Self::Key>;

    /// Type name matched by type selectors, e.g. `Text`.
    fn type_selector(&self, node: Self::Key) -> &str;

    /// The node's id, if any.
    fn style_id(&self, node: Self::Key) -> Option<&str>;

    /// Whether the node carries the given style class.
    fn has_style_class(&self, node: Self::Key, class: &str) -> bool;

    /// Current pseudo-class states of the node.
    fn pseudo_class_states(&self, node: Self::Key) -> &PseudoClassSet;

    /// The node's inline declaration block, if any.
    fn inline_style(&self, node: Self::Key) -> Option<&str>;

    /// Styleable properties of the node.
    fn css_meta_data(&self, node: Self::Key) -> &'static [&'static CssMetaData];

    /// Whether CSS may set the property right now.
    ///
    /// Bound properties are the usual reason to answer `false`.
    fn is_settable(&self, node: Self::Key, meta: &CssMetaData) -> bool;

    /// Origin of the property's current value; `None` for an initial value.
    fn style_origin(&self, node: Self::Key, meta: &CssMetaData) -> Option<StyleOrigin>;

    /// The property's current value.
    fn style_value(&self, node: Self::Key, meta: &CssMetaData) -> StyleValue;

    /// Stores a computed value and records its origin.
    fn apply_style(
        &mut self,
        node: Self::Key,
        meta: &'static CssMetaData,
        origin: Option<StyleOrigin>,
        value: &StyleValue,
    ) -> Result<(), ApplyError>;

    /// The node's style helper.
    fn style_helper(&self, node: Self::Key) -> Option<&StyleHelper>;

    /// Mutable access to the node's style helper.
    fn style_helper_mut(&mut self, node: Self::Key) -> Option<&mut StyleHelper>;

    /// Replaces the node's style helper, returning the previous one.
    fn replace_style_helper(
        &mut self,
        node: Self::Key,
        helper: Option<StyleHelper>,
    ) -> Option<StyleHelper>;

    /// Asks for the node's styles to be fully reapplied on the next CSS pass.
    fn request_reapply(&mut self, node: Self::Key);

    /// Whether to record which declaration supplied each property.
    ///
    /// Tracking bypasses the shared cache for the node.
    fn tracks_styles(&self, node: Self::Key) -> bool {
        let _ = node;
        false
    }
}
