//! View-driven refinement: error ranking, the per-frame driver and height
//! functions.

use std::sync::Arc;

use glam::DVec3;
use orbis_roam::{
    DiamondId, EARTH_RADIUS, GeoBounds, RoamSettings, Sphere, TriangleId, View, lle_to_xyz,
};

fn settings() -> RoamSettings {
    RoamSettings {
        target_polys: 400,
        max_iterations: 1_000,
        slack: 20,
        silhouette_bias: 500.0,
    }
}

/// Camera three Earth radii out, looking at the centre from above `lon`.
fn camera_over(lon: f64) -> View {
    View::look_at(
        lle_to_xyz(0.0, lon, 2.0 * EARTH_RADIUS),
        DVec3::ZERO,
        DVec3::Y,
        60.0,
        1_000.0,
        10.0 * EARTH_RADIUS,
        [0, 0, 800, 600],
    )
    .unwrap()
}

fn frame(sphere: &mut Sphere, view: View) -> usize {
    sphere.update_view(view);
    sphere.update_errors();
    sphere.split_merge()
}

fn count_in(sphere: &Sphere, bounds: GeoBounds) -> usize {
    sphere.get_intersect(&bounds, false).len()
}

/// Without a camera the driver does nothing.
#[test]
fn test_split_merge_without_view_is_noop() {
    let mut sphere = Sphere::with_settings(settings());
    assert_eq!(sphere.split_merge(), 0);
    assert_eq!(sphere.polys(), 8);
    assert_eq!(sphere.stats().splits, 0);
}

/// A leaf under a mergeable, non-root diamond whose base neighbour shares
/// the base edge back, so splitting it forces nothing else. Everything
/// around the pair was itself produced by a split.
fn interior_pair(sphere: &Sphere) -> Option<(DiamondId, TriangleId, TriangleId)> {
    let has_parent = |id: TriangleId| sphere.triangle(id).is_some_and(|t| t.parent().is_some());
    sphere.mergeable_diamonds().find_map(|diamond| {
        let parents = sphere.diamond(diamond)?.parents();
        if !parents.iter().all(|&p| has_parent(p)) {
            return None;
        }
        parents
            .iter()
            .filter_map(|&p| sphere.triangle(p)?.children())
            .flatten()
            .find_map(|kid| {
                let kid_links = sphere.triangle(kid)?.neighbors();
                let base = sphere.triangle(kid_links.base)?;
                let mutual = base.neighbors().base == kid && base.is_leaf();
                let outer_ok = [kid_links, base.neighbors()]
                    .iter()
                    .flat_map(|n| [n.left, n.right])
                    .all(has_parent);
                let other_diamond = base.parent().is_some_and(|d| d != diamond);
                (mutual && outer_ok && other_diamond).then_some((diamond, kid, kid_links.base))
            })
    })
}

/// Each view change advances the projection epoch.
#[test]
fn test_update_view_bumps_epoch() {
    let mut sphere = Sphere::new();
    assert_eq!(sphere.epoch(), 0);
    sphere.update_view(camera_over(0.0));
    sphere.update_view(camera_over(10.0));
    assert_eq!(sphere.epoch(), 2);
    assert!(sphere.view().is_some());
}

/// Front faces rank positive, back faces negative.
#[test]
fn test_error_sign_follows_facing() {
    let mut sphere = Sphere::new();
    // Off the roots' symmetry axes, so no split point projects onto the
    // middle of its own base edge.
    sphere.update_view(camera_over(30.0));
    sphere.update_errors();

    // Root 0 spans lon 0..90 in the north and faces the camera.
    let front = sphere.triangle(sphere.roots()[0]).unwrap().error();
    assert!(front > 0.0, "front error {front}");
    // Root 2 spans lon -180..-90 on the far side.
    let back = sphere.triangle(sphere.roots()[2]).unwrap().error();
    assert!(back < 0.0, "back error {back}");
    assert!(sphere.max_triangle_error() >= front);
    assert!(sphere.max_triangle_error() > back);
}

/// Seen head-on along a triangle's own axis its split point lands on the
/// base edge midpoint: no error, but still ranked as back-facing.
#[test]
fn test_error_on_axis_is_negative_zero() {
    let mut sphere = Sphere::new();
    sphere.update_view(camera_over(45.0));
    sphere.update_errors();

    let back = sphere.triangle(sphere.roots()[2]).unwrap().error();
    assert_eq!(back, 0.0);
    assert!(back.is_sign_negative(), "back error {back}");
}

/// The first frame fills the mesh up to the target and leaves it consistent.
#[test]
fn test_first_frame_fills_to_target() {
    let mut sphere = Sphere::with_settings(settings());
    let iters = frame(&mut sphere, camera_over(0.0));

    assert!(iters > 0);
    assert!(sphere.polys() >= 400, "polys {}", sphere.polys());
    assert_eq!(sphere.validate(), Ok(()));
    if iters < settings().max_iterations {
        assert!(sphere.split_merge() <= 1);
    }
}

/// Repeated frames from a fixed camera stay consistent, and once a frame
/// settles within its step budget another pass has nothing left to trade.
#[test]
fn test_steady_camera_frames() {
    let mut sphere = Sphere::with_settings(settings());
    for _ in 0..5 {
        let iters = frame(&mut sphere, camera_over(0.0));
        assert_eq!(sphere.validate(), Ok(()));
        if iters < settings().max_iterations {
            assert!(sphere.split_merge() <= 1);
        }
        let stats = sphere.stats();
        assert_eq!(stats.polys as u64, 8 + 2 * stats.splits - 2 * stats.merges);
    }
}

/// Detail concentrates on the hemisphere facing the camera and follows it
/// when it moves.
#[test]
fn test_detail_follows_camera() {
    let near_side = GeoBounds::new(30.0, -30.0, 30.0, -30.0);
    let far_side = GeoBounds::new(30.0, -30.0, 180.0, 150.0);

    let mut sphere = Sphere::with_settings(settings());
    for _ in 0..3 {
        frame(&mut sphere, camera_over(0.0));
    }
    let front_before = count_in(&sphere, near_side);
    let back_before = count_in(&sphere, far_side);
    assert!(
        front_before > back_before,
        "front {front_before} back {back_before}"
    );

    for _ in 0..10 {
        frame(&mut sphere, camera_over(165.0));
    }
    assert_eq!(sphere.validate(), Ok(()));
    let back_after = count_in(&sphere, far_side);
    assert!(
        back_after > back_before,
        "far side before {back_before} after {back_after}"
    );
}

/// Recomputing errors without a view change gives identical rankings.
#[test]
fn test_update_errors_is_idempotent() {
    let mut sphere = Sphere::with_settings(settings());
    frame(&mut sphere, camera_over(20.0));

    let snapshot = |sphere: &Sphere| {
        let mut leaves: Vec<_> = sphere
            .leaves()
            .map(|id| (id, sphere.triangle(id).unwrap().error()))
            .collect();
        leaves.sort_by_key(|&(id, _)| id);
        let mut diamonds: Vec<_> = sphere
            .mergeable_diamonds()
            .map(|id| (id, sphere.diamond(id).unwrap().error()))
            .collect();
        diamonds.sort_by_key(|&(id, _)| id);
        (leaves, diamonds)
    };

    let before = snapshot(&sphere);
    sphere.update_errors();
    sphere.update_errors();
    assert_eq!(snapshot(&sphere), before);
}

/// A diamond's error is the larger of its parents' errors.
#[test]
fn test_diamond_error_is_max_of_parents() {
    let mut sphere = Sphere::with_settings(settings());
    frame(&mut sphere, camera_over(0.0));
    for id in sphere.mergeable_diamonds() {
        let diamond = sphere.diamond(id).unwrap();
        let [a, b] = diamond.parents();
        let expected = sphere
            .triangle(a)
            .unwrap()
            .error()
            .max(sphere.triangle(b).unwrap().error());
        assert_eq!(diamond.error(), expected);
    }
}

/// Lowering the target drains the mesh through merges.
#[test]
fn test_lower_target_drains() {
    let mut sphere = Sphere::with_settings(settings());
    frame(&mut sphere, camera_over(0.0));
    let full = sphere.polys();

    sphere.set_settings(RoamSettings {
        target_polys: 100,
        ..settings()
    });
    frame(&mut sphere, camera_over(0.0));

    assert!(sphere.stats().merges > 0);
    assert!(sphere.polys() < full, "polys {} from {full}", sphere.polys());
    assert_eq!(sphere.validate(), Ok(()));
}

/// Splitting and merging under a fixed view restores the original errors.
#[test]
fn test_merge_restores_errors() {
    let mut sphere = Sphere::new();
    sphere.update_view(camera_over(30.0));
    sphere.update_errors();
    let errors: Vec<_> = sphere
        .roots()
        .iter()
        .map(|&r| sphere.triangle(r).unwrap().error())
        .collect();

    let root = sphere.roots()[0];
    sphere.split(root);
    sphere.merge_all();

    let after: Vec<_> = sphere
        .roots()
        .iter()
        .map(|&r| sphere.triangle(r).unwrap().error())
        .collect();
    for (a, b) in errors.iter().zip(&after) {
        assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0), "{a} != {b}");
    }
}

/// A height function over the whole globe lifts every point, and split
/// points created later inherit it.
#[test]
fn test_height_func_inherited_by_splits() {
    let mut sphere = Sphere::new();
    let updated =
        sphere.set_height_func(&GeoBounds::WORLD, Arc::new(|_lat: f64, _lon: f64| 1_000.0));
    assert_eq!(updated, sphere.stats().points);

    for _ in 0..3 {
        let leaves: Vec<_> = sphere.leaves().collect();
        for leaf in leaves {
            if sphere.triangle(leaf).is_some_and(|t| t.is_leaf()) {
                sphere.split(leaf);
            }
        }
    }

    for leaf in sphere.leaves() {
        for corner in sphere.corners(leaf).unwrap() {
            assert_eq!(corner.elev(), 1_000.0);
            assert!((corner.position().length() - (EARTH_RADIUS + 1_000.0)).abs() < 1e-6);
            assert!(corner.height_fn().is_some());
        }
    }
    assert_eq!(sphere.validate(), Ok(()));
}

/// A regional height function leaves points outside the region alone.
#[test]
fn test_height_func_regional() {
    let mut sphere = Sphere::new();
    let region = GeoBounds::new(90.0, 0.0, 90.0, 0.0);
    let updated = sphere.set_height_func(&region, Arc::new(|lat: f64, _lon: f64| lat * 10.0));
    assert!(updated > 0);

    let [left, north, right] = sphere.corners(sphere.roots()[0]).unwrap();
    assert_eq!(north.elev(), 900.0);
    assert_eq!(left.elev(), 0.0);
    assert!(left.height_fn().is_some());
    assert!(right.height_fn().is_some());

    // Root 6 lies entirely in the south-west.
    let [_, south, _] = sphere.corners(sphere.roots()[6]).unwrap();
    assert!(south.height_fn().is_none());
    assert_eq!(south.elev(), 0.0);
}

/// A refined, height-mapped sphere under a view tears down cleanly.
#[test]
fn test_free_after_refinement() {
    let mut sphere = Sphere::with_settings(settings());
    sphere.set_height_func(&GeoBounds::WORLD, Arc::new(|lat: f64, lon: f64| (lat + lon) * 5.0));
    for lon in [0.0, 40.0, 80.0] {
        frame(&mut sphere, camera_over(lon));
    }
    assert_eq!(sphere.validate(), Ok(()));
    sphere.free();
}

/// Splitting and merging back a pair deep inside the mesh restores both
/// triangles, their outer links and the enclosing diamonds' queue state.
#[test]
fn test_interior_split_merge_round_trip() {
    let mut sphere = Sphere::with_settings(settings());
    for _ in 0..3 {
        frame(&mut sphere, camera_over(0.0));
    }
    let (enclosing, kid, base) = interior_pair(&sphere).unwrap();
    let base_diamond = sphere.triangle(base).unwrap().parent().unwrap();
    let base_diamond_active = sphere.diamond(base_diamond).unwrap().is_active();
    assert!(sphere.diamond(enclosing).unwrap().is_active());

    let snapshot = |sphere: &Sphere| {
        [kid, base].map(|id| {
            let t = sphere.triangle(id).unwrap();
            (t.vertices(), t.neighbors(), t.is_leaf())
        })
    };
    let before = snapshot(&sphere);
    let stats_before = sphere.stats();

    sphere.split(kid);
    assert_eq!(sphere.stats().splits, stats_before.splits + 1);
    assert_eq!(sphere.polys(), stats_before.polys + 2);
    let [child, _] = sphere.triangle(kid).unwrap().children().unwrap();
    let split_diamond = sphere.triangle(child).unwrap().parent().unwrap();
    let parents = sphere.diamond(split_diamond).unwrap().parents();
    assert!(parents.contains(&kid) && parents.contains(&base));
    assert!(!sphere.diamond(enclosing).unwrap().is_active());
    assert!(!sphere.diamond(base_diamond).unwrap().is_active());
    assert_eq!(sphere.validate(), Ok(()));

    sphere.merge(split_diamond);
    assert!(sphere.diamond(split_diamond).is_none());
    assert_eq!(snapshot(&sphere), before);
    assert_eq!(sphere.polys(), stats_before.polys);

    // Each outer neighbour points back at the restored triangle.
    for id in [kid, base] {
        let links = sphere.triangle(id).unwrap().neighbors();
        for outer in [links.left, links.right] {
            let back = sphere.triangle(outer).unwrap().neighbors().to_array();
            assert!(back.contains(&id), "{outer:?} lost its link to {id:?}");
        }
    }

    // The merge re-queues the diamonds the split made ineligible.
    assert!(sphere.diamond(enclosing).unwrap().is_active());
    assert_eq!(
        sphere.diamond(base_diamond).unwrap().is_active(),
        base_diamond_active
    );
    assert_eq!(sphere.stats().active_diamonds, stats_before.active_diamonds);
    assert_eq!(sphere.validate(), Ok(()));
}

/// A fixed camera settles: the inversion trade stops once it would only
/// undo itself, so later frames leave the mesh alone.
#[test]
fn test_fixed_camera_settles() {
    let mut sphere = Sphere::with_settings(settings());
    for _ in 0..10 {
        frame(&mut sphere, camera_over(0.0));
    }
    let iters = frame(&mut sphere, camera_over(0.0));
    assert!(iters <= 1, "still trading after settling: {iters} steps");
    assert_eq!(sphere.validate(), Ok(()));
}
