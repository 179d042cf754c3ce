// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-frame pulse: CSS, layout, then peer synchronization.
//!
//! A layout pass may change pseudo-class state or otherwise request more
//! styling, and styling may request more layout. The driver alternates the two
//! until the scene settles or [`PulseConfig::layout_retry_cap`] is reached;
//! whatever is left stays flagged for the next pulse.

use alloc::vec::Vec;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use understory_style::StyleDiagnostic;

use crate::peer::PeerFactory;
use crate::tree::SceneGraph;
use crate::types::NodeId;

/// Pulse tuning.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PulseConfig {
    /// Maximum number of CSS-then-layout rounds per pulse.
    pub layout_retry_cap: usize,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            layout_retry_cap: 3,
        }
    }
}

/// What one pulse did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PulseReport {
    /// CSS passes run.
    pub css_passes: usize,
    /// Layout passes run.
    pub layout_passes: usize,
    /// `false` when the retry cap was hit with work still pending.
    pub settled: bool,
    /// Nodes whose peers received updates.
    pub nodes_synced: usize,
    /// Peers created for nodes synchronized for the first time.
    pub peers_created: usize,
    /// Peers dropped for nodes that left the scene.
    pub peers_dropped: usize,
    /// Style problems reported during the pulse.
    pub diagnostics: Vec<StyleDiagnostic>,
}

/// Drives pulses over a [`SceneGraph`] and owns the peers.
pub struct PulseDriver<F: PeerFactory> {
    config: PulseConfig,
    factory: F,
    peers: HashMap<NodeId, F::Peer>,
}

impl<F: PeerFactory> core::fmt::Debug for PulseDriver<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PulseDriver")
            .field("config", &self.config)
            .field("peers", &self.peers.len())
            .finish_non_exhaustive()
    }
}

impl<F: PeerFactory> PulseDriver<F> {
    /// Creates a driver with the default configuration.
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, PulseConfig::default())
    }

    /// Creates a driver with an explicit configuration.
    pub fn with_config(factory: F, config: PulseConfig) -> Self {
        Self {
            config,
            factory,
            peers: HashMap::new(),
        }
    }

    /// The configuration.
    pub fn config(&self) -> PulseConfig {
        self.config
    }

    /// The peer factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// The peer of `id`, if it was ever synchronized.
    pub fn peer(&self, id: NodeId) -> Option<&F::Peer> {
        self.peers.get(&id)
    }

    /// Number of live peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Runs one pulse.
    pub fn pulse(&mut self, scene: &mut SceneGraph) -> PulseReport {
        let mut report = PulseReport::default();
        for _ in 0..self.config.layout_retry_cap {
            if scene.css_pass() > 0 {
                report.css_passes += 1;
            }
            if scene.layout_pass() > 0 {
                report.layout_passes += 1;
            }
            if !scene.css_dirty && !scene.root().is_some_and(|r| scene.needs_layout(r)) {
                report.settled = true;
                break;
            }
        }
        if !report.settled {
            log::debug!(
                "pulse stopped after {} rounds with work pending",
                self.config.layout_retry_cap
            );
        }

        for id in core::mem::take(&mut scene.departed) {
            if !scene.is_in_scene(id) && self.peers.remove(&id).is_some() {
                report.peers_dropped += 1;
            }
        }

        for id in scene.take_dirty() {
            let Some(kind) = scene.kind(id) else {
                continue;
            };
            if !scene.is_in_scene(id) {
                continue;
            }
            let peer = match self.peers.entry(id) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    report.peers_created += 1;
                    e.insert(self.factory.create_peer(id, kind))
                }
            };
            if !scene.sync_peer(id, peer).is_empty() {
                report.nodes_synced += 1;
            }
        }

        report.diagnostics = scene.style_manager_mut().take_diagnostics();
        log::debug!(
            "pulse: {} css, {} layout, {} synced, {} diagnostics",
            report.css_passes,
            report.layout_passes,
            report.nodes_synced,
            report.diagnostics.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutPolicy;
    use crate::peer::{PeerCall, RecordingPeerFactory};
    use crate::types::NodeKind;
    use alloc::rc::Rc;
    use understory_style::{DiagnosticKind, PseudoClass, StyleOrigin, Stylesheet};

    fn scene_with_leaf() -> (SceneGraph, NodeId, NodeId) {
        let mut scene = SceneGraph::new();
        let root = scene.create(NodeKind::Group);
        let leaf = scene.create(NodeKind::Rectangle {
            width: 10.0,
            height: 10.0,
        });
        scene.add_child(root, leaf).unwrap();
        scene.set_root(Some(root)).unwrap();
        (scene, root, leaf)
    }

    #[test]
    fn first_pulse_creates_and_syncs_every_peer() {
        let (mut scene, root, leaf) = scene_with_leaf();
        let mut driver = PulseDriver::new(RecordingPeerFactory::new());
        let report = driver.pulse(&mut scene);
        assert!(report.settled, "nothing feeds back");
        assert_eq!(report.peers_created, 2, "root and leaf");
        assert_eq!(report.nodes_synced, 2, "both pushed");
        assert!(driver.peer(root).is_some() && driver.peer(leaf).is_some(), "peers kept");
        assert_eq!(scene.pending_sync(), 0, "dirty list drained");
    }

    #[test]
    fn changed_opacity_reaches_the_peer_once() {
        let (mut scene, _, leaf) = scene_with_leaf();
        let mut driver = PulseDriver::new(RecordingPeerFactory::new());
        driver.pulse(&mut scene);
        driver.factory().take_calls();

        scene.set_opacity(leaf, 0.5);
        let report = driver.pulse(&mut scene);
        assert_eq!(report.nodes_synced, 1, "only the leaf");
        assert_eq!(
            driver.factory().take_calls(),
            alloc::vec![(leaf, PeerCall::Opacity(0.5))],
            "opacity only"
        );

        scene.set_opacity(leaf, 0.5);
        let report = driver.pulse(&mut scene);
        assert_eq!(report.nodes_synced, 0, "unchanged value is not pushed");
        assert!(driver.factory().take_calls().is_empty(), "no peer calls");
    }

    #[test]
    fn peers_are_dropped_when_nodes_leave_the_scene() {
        let (mut scene, root, leaf) = scene_with_leaf();
        let mut driver = PulseDriver::new(RecordingPeerFactory::new());
        driver.pulse(&mut scene);

        assert!(scene.remove_child(root, leaf), "removed");
        let report = driver.pulse(&mut scene);
        assert_eq!(report.peers_dropped, 1, "leaf peer dropped");
        assert!(driver.peer(leaf).is_none(), "gone");
        assert_eq!(driver.peer_count(), 1, "root remains");

        scene.add_child(root, leaf).unwrap();
        let report = driver.pulse(&mut scene);
        assert_eq!(report.peers_created, 1, "recreated on return");
    }

    #[test]
    fn moving_within_the_scene_keeps_the_peer() {
        let (mut scene, root, leaf) = scene_with_leaf();
        let other = scene.create(NodeKind::Group);
        scene.add_child(root, other).unwrap();
        let mut driver = PulseDriver::new(RecordingPeerFactory::new());
        driver.pulse(&mut scene);

        scene.add_child(other, leaf).unwrap();
        let report = driver.pulse(&mut scene);
        assert_eq!(report.peers_dropped, 0, "still in the scene");
        assert_eq!(report.peers_created, 0, "no new peer");
    }

    #[test]
    fn disposed_nodes_lose_their_peers() {
        let (mut scene, _, leaf) = scene_with_leaf();
        let mut driver = PulseDriver::new(RecordingPeerFactory::new());
        driver.pulse(&mut scene);
        scene.dispose(leaf);
        let report = driver.pulse(&mut scene);
        assert_eq!(report.peers_dropped, 1, "disposed leaf");
    }

    /// Flips `:hover` on the region every time it is laid out.
    #[derive(Debug, Default)]
    struct Flicker {
        on: core::cell::Cell<bool>,
    }

    impl LayoutPolicy for Flicker {
        fn pref_width(&self, _: &mut SceneGraph, _: NodeId, _: f64) -> f64 {
            20.0
        }

        fn pref_height(&self, _: &mut SceneGraph, _: NodeId, _: f64) -> f64 {
            20.0
        }

        fn layout_children(&self, scene: &mut SceneGraph, region: NodeId) {
            let on = !self.on.get();
            self.on.set(on);
            scene.set_pseudo_class(region, PseudoClass::HOVER, on);
        }
    }

    fn flickering_scene() -> SceneGraph {
        let mut scene = SceneGraph::new();
        let region = scene.create(NodeKind::Region);
        scene.add_style_class(region, "box");
        scene.set_layout_policy(region, Some(Rc::new(Flicker::default())));
        let mut sheet = Stylesheet::new(StyleOrigin::Author, "flicker.css");
        let errors = sheet
            .add_rule(
                ".box:hover",
                "-fx-padding: 10",
                scene.style_manager_mut().pseudo_classes_mut(),
            )
            .unwrap();
        assert!(errors.is_empty(), "rule parses: {errors:?}");
        scene.add_stylesheet(sheet);
        scene.set_root(Some(region)).unwrap();
        scene
    }

    #[test]
    fn feedback_between_css_and_layout_stops_at_the_cap() {
        let mut scene = flickering_scene();
        let mut driver = PulseDriver::new(RecordingPeerFactory::new());
        let report = driver.pulse(&mut scene);
        assert!(!report.settled, "never settles");
        assert_eq!(report.css_passes, 3, "default cap");
        assert_eq!(report.layout_passes, 3, "default cap");
        assert_eq!(report.peers_created, 1, "peers still synced");

        let mut scene = flickering_scene();
        let mut driver = PulseDriver::with_config(
            RecordingPeerFactory::new(),
            PulseConfig {
                layout_retry_cap: 5,
            },
        );
        let report = driver.pulse(&mut scene);
        assert_eq!(report.css_passes, 5, "configured cap");
        assert_eq!(report.layout_passes, 5, "configured cap");
    }

    #[test]
    fn style_diagnostics_are_reported_by_the_pulse() {
        let (mut scene, _, leaf) = scene_with_leaf();
        scene.set_inline_style(leaf, Some("-fx-opacity: 3"));
        let mut driver = PulseDriver::new(RecordingPeerFactory::new());
        let report = driver.pulse(&mut scene);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::Apply && d.property == Some("-fx-opacity")),
            "out of range opacity reported: {:?}",
            report.diagnostics
        );
        assert_eq!(scene.opacity(leaf), Some(1.0), "value reset");
    }
}
