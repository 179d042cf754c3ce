// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recoverable style failures.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::String;
use core::fmt;

/// Category of a [`StyleDiagnostic`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A lookup referenced a name with no matching declaration.
    UnresolvedLookup,
    /// A lookup chain referred back to itself.
    LookupLoop,
    /// A value could not be converted for its property.
    Conversion,
    /// The tree refused the computed value.
    Apply,
    /// An inline declaration could not be parsed.
    Parse,
}

/// One recorded failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleDiagnostic {
    /// Category.
    pub kind: DiagnosticKind,
    /// Property involved, when known.
    pub property: Option<&'static str>,
    /// Debug rendering of the node.
    pub node: String,
    /// Declaration source (stylesheet and selector), when known.
    pub source: Option<Rc<str>>,
    /// Description.
    pub message: String,
}

impl fmt::Display for StyleDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(source) = &self.source {
            write!(f, " [{source}]")?;
        }
        Ok(())
    }
}

/// Bounded collector of style diagnostics.
///
/// Each diagnostic is also logged at `warn` level. When full, the oldest entry
/// is dropped.
#[derive(Clone, Debug)]
pub struct Diagnostics {
    entries: VecDeque<StyleDiagnostic>,
    capacity: usize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl Diagnostics {
    /// Creates a collector that keeps at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Records a diagnostic.
    pub fn push(&mut self, diagnostic: StyleDiagnostic) {
        log::warn!("{diagnostic}");
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(diagnostic);
    }

    /// Iterates over recorded diagnostics, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &StyleDiagnostic> + '_ {
        self.entries.iter()
    }

    /// Number of recorded diagnostics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns all recorded diagnostics.
    pub fn take(&mut self) -> impl Iterator<Item = StyleDiagnostic> + '_ {
        self.entries.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(message: &str) -> StyleDiagnostic {
        StyleDiagnostic {
            kind: DiagnosticKind::Conversion,
            property: Some("-fx-opacity"),
            node: String::from("n"),
            source: None,
            message: String::from(message),
        }
    }

    #[test]
    fn oldest_entries_are_dropped_at_capacity() {
        let mut d = Diagnostics::with_capacity(2);
        d.push(diag("a"));
        d.push(diag("b"));
        d.push(diag("c"));
        let messages: alloc::vec::Vec<_> = d.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["b", "c"], "first entry evicted");
        assert_eq!(d.take().count(), 2, "drained");
        assert!(d.is_empty(), "empty after take");
    }
}
