// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A styled scene driven through a few pulses.
//!
//! This example shows how to:
//! - build a scene of regions and shapes and lay it out with a `StackLayout`,
//! - style it with user-agent and author stylesheets plus an inline style,
//! - run pulses and watch which aspects reach the peers,
//! - read back diagnostics for declarations that could not be applied.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example scene_pulse`

use std::rc::Rc;

use kurbo::Point;
use understory_scene::{
    Axis, NodeKind, PeerCall, PulseDriver, RecordingPeerFactory, SceneGraph, StackLayout,
};
use understory_style::{PseudoClass, StyleOrigin, Stylesheet};

fn sheet(scene: &mut SceneGraph, origin: StyleOrigin, url: &str, rules: &[(&str, &str)]) {
    let mut sheet = Stylesheet::new(origin, url);
    for (selector, block) in rules {
        match sheet.add_rule(selector, block, scene.style_manager_mut().pseudo_classes_mut()) {
            Ok(errors) => {
                for e in errors {
                    println!("  {url}: skipped declaration in `{selector}`: {e}");
                }
            }
            Err(e) => println!("  {url}: bad selector `{selector}`: {e}"),
        }
    }
    scene.add_stylesheet(sheet);
}

fn main() {
    env_logger::init();

    let mut scene = SceneGraph::new();
    let root = scene.create(NodeKind::Region);
    scene.set_layout_policy(
        root,
        Some(Rc::new(StackLayout {
            axis: Axis::Vertical,
            spacing: 4.0,
        })),
    );
    scene.add_style_class(root, "panel");

    let title = scene.create(NodeKind::Text {
        content: Rc::from("Understory"),
    });
    scene.add_style_class(title, "title");
    let swatch = scene.create(NodeKind::Rectangle {
        width: 40.0,
        height: 20.0,
    });
    scene.add_style_class(swatch, "swatch");
    let dot = scene.create(NodeKind::Circle { radius: 6.0 });
    scene.set_inline_style(dot, Some("-fx-fill: -accent; -fx-opacity: 2"));

    for child in [title, swatch, dot] {
        if let Err(e) = scene.add_child(root, child) {
            println!("add_child failed: {e}");
        }
    }
    if let Err(e) = scene.set_root(Some(root)) {
        println!("set_root failed: {e}");
        return;
    }

    sheet(
        &mut scene,
        StyleOrigin::UserAgent,
        "ua.css",
        &[
            ("Region", "-fx-padding: 2"),
            ("Rectangle", "-fx-fill: gray"),
        ],
    );
    sheet(
        &mut scene,
        StyleOrigin::Author,
        "app.css",
        &[
            (".panel", "-fx-font-size: 20px; -fx-border: 1 black"),
            (".title", "-fx-font-size: 1.5em"),
            (".swatch", "-fx-fill: steelblue"),
            (".swatch:hover", "-fx-fill: orange; -fx-scale-x: 1.2"),
        ],
    );

    let mut driver = PulseDriver::new(RecordingPeerFactory::new());

    println!("pulse 1: initial sync");
    let report = driver.pulse(&mut scene);
    println!(
        "  css {} / layout {} / settled {} / peers created {} / synced {}",
        report.css_passes,
        report.layout_passes,
        report.settled,
        report.peers_created,
        report.nodes_synced
    );
    for d in &report.diagnostics {
        println!("  diagnostic: {d}");
    }
    driver.factory().take_calls();

    for (name, id) in [("title", title), ("swatch", swatch), ("dot", dot)] {
        let at = scene.local_to_scene_point(id, Point::ZERO);
        println!(
            "  {name}: size {:?}, scene origin {:?}, parent bounds {:?}",
            scene.size(id),
            at,
            scene.bounds_in_parent(id)
        );
    }

    println!("pulse 2: hover the swatch");
    scene.set_pseudo_class(swatch, PseudoClass::HOVER, true);
    let report = driver.pulse(&mut scene);
    println!("  synced {} nodes", report.nodes_synced);
    for (id, call) in driver.factory().take_calls() {
        let name = if id == swatch { "swatch" } else { "other" };
        match call {
            PeerCall::Appearance(a) => println!("  {name}: fill {:?}", a.fill),
            PeerCall::Transform(t) => println!("  {name}: transform {t:?}"),
            other => println!("  {name}: {other:?}"),
        }
    }

    println!("pulse 3: nothing changed");
    let report = driver.pulse(&mut scene);
    println!(
        "  synced {} nodes, {} peer calls",
        report.nodes_synced,
        driver.factory().take_calls().len()
    );

    println!("pulse 4: remove the dot");
    scene.remove_child(root, dot);
    let report = driver.pulse(&mut scene);
    println!(
        "  dropped {} peers, {} remain",
        report.peers_dropped,
        driver.peer_count()
    );
}
