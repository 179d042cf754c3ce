// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cascade origins.

use core::fmt;

/// Provenance tier of a style value.
///
/// Variants are ordered by increasing override precedence, so `Ord` can be used
/// directly to pick the more significant origin.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StyleOrigin {
    /// Default stylesheet supplied by the toolkit.
    UserAgent,
    /// Stylesheet supplied by the application.
    Author,
    /// Per-node inline declarations.
    Inline,
    /// A value set directly by calling code.
    User,
}

impl StyleOrigin {
    /// Returns the more significant of two optional origins.
    ///
    /// `None` (an initial value) never beats a concrete origin.
    pub fn max_of(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

impl fmt::Display for StyleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UserAgent => "user-agent",
            Self::Author => "author",
            Self::Inline => "inline",
            Self::User => "user",
        })
    }
}
