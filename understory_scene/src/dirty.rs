// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node change tracking between peer syncs.

bitflags::bitflags! {
    /// Aspects of a node that changed since its peer was last synchronized.
    ///
    /// A node attached to a scene with any bit set is on the scene's dirty
    /// list; the next pulse pushes exactly the flagged aspects and clears them.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DirtyBits: u16 {
        /// Local-to-parent transform.
        const TRANSFORM          = 1 << 0;
        /// Bounds in local space (content bounds).
        const BOUNDS             = 1 << 1;
        /// Bounds in parent space.
        const TRANSFORMED_BOUNDS = 1 << 2;
        /// Opacity.
        const OPACITY            = 1 << 3;
        /// Visibility.
        const VISIBLE            = 1 << 4;
        /// Clip node.
        const CLIP               = 1 << 5;
        /// Effect.
        const EFFECT             = 1 << 6;
        /// Cache-as-bitmap hint.
        const CACHE              = 1 << 7;
        /// Blend mode.
        const BLEND_MODE         = 1 << 8;
        /// Depth test.
        const DEPTH_TEST         = 1 << 9;
        /// Shape or size.
        const GEOMETRY           = 1 << 10;
        /// Paint and other styled appearance.
        const CONTENTS           = 1 << 11;
        /// Child list of a parent node.
        const PARENT_CHILDREN    = 1 << 12;
    }
}

impl Default for DirtyBits {
    /// Fresh nodes have never been synchronized.
    fn default() -> Self {
        Self::all()
    }
}

impl DirtyBits {
    /// Bits that carry bounds.
    pub const ANY_BOUNDS: Self = Self::BOUNDS.union(Self::TRANSFORMED_BOUNDS);

    /// Returns `true` if nothing needs synchronizing.
    pub fn is_clean(self) -> bool {
        self.is_empty()
    }
}
