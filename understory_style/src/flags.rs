// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node CSS processing state.

/// What the next CSS pass must do for a node.
///
/// Variants are ordered by strength; a stronger request subsumes a weaker one,
/// so pending requests combine with [`CssFlags::merge`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CssFlags {
    /// Nothing to do.
    #[default]
    Clean,
    /// Only descendants need processing.
    DirtyBranch,
    /// Pseudo-class state changed; re-run the state transition.
    Update,
    /// Inline style changed; rebuild the inline part of the style map.
    Recalculate,
    /// Structure or stylesheets changed; re-match selectors.
    Reapply,
}

impl CssFlags {
    /// Returns the stronger of two requests.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }

    /// Returns `true` if the node itself must be processed.
    pub fn needs_processing(self) -> bool {
        self >= Self::Update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stronger_request_wins() {
        assert_eq!(CssFlags::Update.merge(CssFlags::Reapply), CssFlags::Reapply, "reapply subsumes update");
        assert_eq!(
            CssFlags::Recalculate.merge(CssFlags::DirtyBranch),
            CssFlags::Recalculate,
            "dirty branch never weakens a request"
        );
        assert!(!CssFlags::DirtyBranch.needs_processing(), "branch flag is for descent only");
        assert!(CssFlags::Update.needs_processing(), "update processes the node");
    }
}
