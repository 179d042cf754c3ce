// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The layout surface of scene nodes and the layout pass.
//!
//! Regions are resizable: their parent's layout assigns their size. Every
//! other kind reports its layout bounds as its minimum, preferred and maximum
//! size and ignores [`SceneGraph::resize`]. Sizes take a cross-dimension hint
//! where `-1` means unconstrained.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use crate::tree::SceneGraph;
use crate::types::{ContentBias, NodeId};

/// Lays out the children of a region.
///
/// Policies receive the whole scene so they can query and size children; the
/// region being laid out is marked as performing layout, so layout requests
/// raised by its children while it works do not bubble past it.
pub trait LayoutPolicy: fmt::Debug {
    /// Preferred width of the region's content, excluding padding.
    fn pref_width(&self, scene: &mut SceneGraph, region: NodeId, height: f64) -> f64;

    /// Preferred height of the region's content, excluding padding.
    fn pref_height(&self, scene: &mut SceneGraph, region: NodeId, width: f64) -> f64;

    /// Positions and sizes the region's managed children.
    fn layout_children(&self, scene: &mut SceneGraph, region: NodeId);

    /// Which dimension depends on the other, if any.
    fn content_bias(&self) -> Option<ContentBias> {
        None
    }
}

/// Direction in which [`StackLayout`] places children.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Left to right.
    Horizontal,
    /// Top to bottom.
    #[default]
    Vertical,
}

/// Places managed children one after another at their preferred sizes.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct StackLayout {
    /// Direction of the stack.
    pub axis: Axis,
    /// Gap between adjacent children.
    pub spacing: f64,
}

impl StackLayout {
    fn managed(scene: &SceneGraph, region: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        scene
            .children_of(region)
            .iter()
            .copied()
            .filter(|&c| scene.node(c).managed)
    }

    fn gaps(&self, count: usize) -> f64 {
        let gaps = count.saturating_sub(1) as f64;
        gaps * self.spacing
    }
}

impl LayoutPolicy for StackLayout {
    fn pref_width(&self, scene: &mut SceneGraph, region: NodeId, _height: f64) -> f64 {
        let children: Vec<NodeId> = Self::managed(scene, region).collect();
        let widths = children.iter().map(|&c| scene.pref_width(c, -1.0));
        match self.axis {
            Axis::Horizontal => widths.sum::<f64>() + self.gaps(children.len()),
            Axis::Vertical => widths.fold(0.0, f64::max),
        }
    }

    fn pref_height(&self, scene: &mut SceneGraph, region: NodeId, _width: f64) -> f64 {
        let children: Vec<NodeId> = Self::managed(scene, region).collect();
        let heights = children.iter().map(|&c| scene.pref_height(c, -1.0));
        match self.axis {
            Axis::Horizontal => heights.fold(0.0, f64::max),
            Axis::Vertical => heights.sum::<f64>() + self.gaps(children.len()),
        }
    }

    fn layout_children(&self, scene: &mut SceneGraph, region: NodeId) {
        let padding = scene.appearance(region).map_or(0.0, |a| a.padding);
        let children: Vec<NodeId> = Self::managed(scene, region).collect();
        let mut cursor = padding;
        for c in children {
            let w = scene.pref_width(c, -1.0);
            let h = scene.pref_height(c, w);
            scene.resize(c, w, h);
            match self.axis {
                Axis::Horizontal => {
                    scene.relocate(c, cursor, padding);
                    cursor += w + self.spacing;
                }
                Axis::Vertical => {
                    scene.relocate(c, padding, cursor);
                    cursor += h + self.spacing;
                }
            }
        }
    }
}

impl SceneGraph {
    /// Whether the parent's layout sizes the node.
    pub fn is_resizable(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.kind.is_resizable())
    }

    /// Orientation dependency of the node's preferred size.
    pub fn content_bias(&self, id: NodeId) -> Option<ContentBias> {
        self.node_opt(id)?.layout.as_ref()?.content_bias()
    }

    /// Installs or removes the policy that lays out a region's children.
    pub fn set_layout_policy(&mut self, id: NodeId, policy: Option<Rc<dyn LayoutPolicy>>) {
        if let Some(n) = self.node_opt_mut(id) {
            n.layout = policy;
            self.request_layout(id);
        }
    }

    /// Overrides the computed preferred size of a region; `-1` computes it.
    pub fn set_pref_size(&mut self, id: NodeId, width: f64, height: f64) {
        if let Some(n) = self.node_opt_mut(id)
            && (n.pref_width != width || n.pref_height != height)
        {
            n.pref_width = width;
            n.pref_height = height;
            self.request_layout(id);
        }
    }

    /// Current size of a region; zero for other kinds.
    pub fn size(&self, id: NodeId) -> Option<(f64, f64)> {
        self.node_opt(id).map(|n| (n.width, n.height))
    }

    fn padding(&self, id: NodeId) -> f64 {
        self.node(id).appearance.padding
    }

    /// Smallest width the node can be given.
    pub fn min_width(&mut self, id: NodeId, _height: f64) -> f64 {
        if !self.is_alive(id) {
            return 0.0;
        }
        if self.is_resizable(id) {
            2.0 * self.padding(id)
        } else {
            self.layout_bounds_of(id).width()
        }
    }

    /// Smallest height the node can be given.
    pub fn min_height(&mut self, id: NodeId, _width: f64) -> f64 {
        if !self.is_alive(id) {
            return 0.0;
        }
        if self.is_resizable(id) {
            2.0 * self.padding(id)
        } else {
            self.layout_bounds_of(id).height()
        }
    }

    /// Preferred width for a given height (`-1` when unconstrained).
    pub fn pref_width(&mut self, id: NodeId, height: f64) -> f64 {
        let Some(n) = self.node_opt(id) else {
            return 0.0;
        };
        if !n.kind.is_resizable() {
            return self.layout_bounds_of(id).width();
        }
        if n.pref_width >= 0.0 {
            return n.pref_width;
        }
        let padding = n.appearance.padding;
        let content = match n.layout.clone() {
            Some(policy) => policy.pref_width(self, id, height),
            None => self.children_extent(id).0,
        };
        content + 2.0 * padding
    }

    /// Preferred height for a given width (`-1` when unconstrained).
    pub fn pref_height(&mut self, id: NodeId, width: f64) -> f64 {
        let Some(n) = self.node_opt(id) else {
            return 0.0;
        };
        if !n.kind.is_resizable() {
            return self.layout_bounds_of(id).height();
        }
        if n.pref_height >= 0.0 {
            return n.pref_height;
        }
        let padding = n.appearance.padding;
        let content = match n.layout.clone() {
            Some(policy) => policy.pref_height(self, id, width),
            None => self.children_extent(id).1,
        };
        content + 2.0 * padding
    }

    /// Largest width the node can be given.
    pub fn max_width(&mut self, id: NodeId, _height: f64) -> f64 {
        if self.is_resizable(id) {
            f64::INFINITY
        } else if self.is_alive(id) {
            self.layout_bounds_of(id).width()
        } else {
            0.0
        }
    }

    /// Largest height the node can be given.
    pub fn max_height(&mut self, id: NodeId, _width: f64) -> f64 {
        if self.is_resizable(id) {
            f64::INFINITY
        } else if self.is_alive(id) {
            self.layout_bounds_of(id).height()
        } else {
            0.0
        }
    }

    /// Far edge of managed children placed at their preferred sizes.
    fn children_extent(&mut self, id: NodeId) -> (f64, f64) {
        let mut extent = (0.0_f64, 0.0_f64);
        for i in 0..self.node(id).children.len() {
            let c = self.node(id).children[i];
            if !self.node(c).managed {
                continue;
            }
            let origin = self.layout_position(c).unwrap_or_default();
            let bounds = self.layout_bounds_of(c);
            let w = self.pref_width(c, -1.0);
            let h = self.pref_height(c, w);
            extent.0 = extent.0.max(origin.x + bounds.x0 + w);
            extent.1 = extent.1.max(origin.y + bounds.y0 + h);
        }
        extent
    }

    /// Sets the size of a region. Ignored for other kinds.
    pub fn resize(&mut self, id: NodeId, width: f64, height: f64) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        if !n.kind.is_resizable() || (n.width == width && n.height == height) {
            return;
        }
        n.width = width;
        n.height = height;
        n.needs_layout = true;
        self.invalidate_layout_bounds(id);
        self.geom_changed(id);
    }

    /// Moves the node so its layout bounds start at `(x, y)` in the parent.
    pub fn relocate(&mut self, id: NodeId, x: f64, y: f64) {
        let Some(bounds) = self.layout_bounds(id) else {
            return;
        };
        self.set_layout_position(id, x - bounds.x0, y - bounds.y0);
    }

    /// Resizes a region to its preferred size, honoring its content bias.
    pub fn autosize(&mut self, id: NodeId) {
        if !self.is_resizable(id) {
            return;
        }
        let (w, h) = match self.content_bias(id) {
            Some(ContentBias::Vertical) => {
                let h = self.pref_height(id, -1.0);
                (self.pref_width(id, h), h)
            }
            _ => {
                let w = self.pref_width(id, -1.0);
                (w, self.pref_height(id, w))
            }
        };
        self.resize(id, w, h);
    }

    /// Whether the node waits for the next layout pass.
    pub fn needs_layout(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.needs_layout)
    }

    /// Schedules a layout pass for the node and its ancestors.
    ///
    /// The request stops at an ancestor that is performing layout: that
    /// ancestor is already placing the node.
    pub fn request_layout(&mut self, id: NodeId) {
        let mut cur = Some(id);
        while let Some(n) = cur {
            let Some(node) = self.node_opt_mut(n) else {
                return;
            };
            if node.performing_layout {
                return;
            }
            node.needs_layout = true;
            cur = node.parent;
        }
    }

    /// Lays out every node that requested it, top-down. Returns the number of
    /// nodes laid out.
    pub(crate) fn layout_pass(&mut self) -> usize {
        let Some(root) = self.root() else {
            return 0;
        };
        if !self.node(root).needs_layout {
            return 0;
        }
        self.autosize(root);
        let mut count = 0;
        self.layout_node(root, &mut count);
        log::trace!("layout pass laid out {count} nodes");
        count
    }

    fn layout_node(&mut self, id: NodeId, count: &mut usize) {
        let n = self.node_mut(id);
        if !n.needs_layout {
            return;
        }
        n.needs_layout = false;
        if !n.kind.is_parent() {
            return;
        }
        n.performing_layout = true;
        let policy = n.layout.clone();
        *count += 1;
        match policy {
            Some(policy) => policy.layout_children(self, id),
            None => {
                for i in 0..self.node(id).children.len() {
                    let c = self.node(id).children[i];
                    if self.node(c).managed {
                        self.autosize(c);
                    }
                }
            }
        }
        for i in 0..self.node(id).children.len() {
            let c = self.node(id).children[i];
            self.layout_node(c, count);
        }
        self.node_mut(id).performing_layout = false;
    }
}
