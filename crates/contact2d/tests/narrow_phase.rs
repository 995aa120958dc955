use contact2d::collision::{circle_circle, circle_rect, rect_circle, rect_rect, test_bodies};
use contact2d::{BodyGeometry, ShapeView, Vec2};
use proptest::prelude::*;

fn coord() -> impl Strategy<Value = f32> {
    -5.0f32..5.0
}

proptest! {
    #[test]
    fn circle_circle_is_symmetric(
        ax in coord(), ay in coord(), ra in 0.1f32..2.0,
        bx in coord(), by in coord(), rb in 0.1f32..2.0,
    ) {
        let (a, b) = (Vec2::new(ax, ay), Vec2::new(bx, by));
        prop_assume!(a.distance(b) > 1e-3);

        let forward = circle_circle(a, ra, b, rb);
        let backward = circle_circle(b, rb, a, ra);
        prop_assert_eq!(forward.is_some(), backward.is_some());
        if let (Some(f), Some(r)) = (forward, backward) {
            prop_assert!((f.depth - r.depth).abs() < 1e-5);
            prop_assert!((f.normal + r.normal).length() < 1e-5);
            prop_assert!(f.depth >= 0.0);
            // B toward A
            prop_assert!(f.normal.dot(a - b) > 0.0);
        }
    }

    #[test]
    fn circle_rect_is_symmetric(
        cx in coord(), cy in coord(), radius in 0.1f32..2.0,
        rx in coord(), ry in coord(), w in 0.2f32..4.0, h in 0.2f32..4.0, angle in -3.1f32..3.1,
    ) {
        let center = Vec2::new(cx, cy);
        let half = Vec2::new(w, h) * 0.5;
        let rect = ShapeView::rect(Vec2::new(rx, ry), half, angle);
        prop_assume!(center.distance(rect.center) > 1e-3);

        let forward = circle_rect(center, radius, &rect, half);
        let backward = rect_circle(&rect, half, center, radius);
        prop_assert_eq!(forward.is_some(), backward.is_some());
        if let (Some(f), Some(r)) = (forward, backward) {
            prop_assert!((f.depth - r.depth).abs() < 1e-5);
            prop_assert!((f.normal + r.normal).length() < 1e-5);
            prop_assert_eq!(f.len(), 1);
        }
    }

    #[test]
    fn rect_rect_depth_is_order_independent(
        ax in coord(), ay in coord(), aa in -3.1f32..3.1,
        bx in coord(), by in coord(), ba in -3.1f32..3.1,
    ) {
        let half = Vec2::new(1.0, 0.5);
        let a = ShapeView::rect(Vec2::new(ax, ay), half, aa);
        let b = ShapeView::rect(Vec2::new(bx, by), half, ba);

        let forward = rect_rect(&a, half, &b, half);
        let backward = rect_rect(&b, half, &a, half);
        prop_assert_eq!(forward.is_some(), backward.is_some());
        if let (Some(f), Some(r)) = (forward, backward) {
            prop_assert!((f.depth - r.depth).abs() < 1e-4);
            prop_assert!(!f.is_empty() && f.len() <= 2);
            prop_assert!(f.points().iter().all(|p| p.depth >= 0.0));
        }
    }
}

#[test]
fn circle_on_box_scenario() {
    let floor = ShapeView::rect(Vec2::new(0.0, -1.0), Vec2::ONE, 0.0);

    // Touching the top face from inside: depth is the full radius.
    let flush = circle_rect(Vec2::ZERO, 0.5, &floor, Vec2::ONE).expect("contact");
    assert!((flush.depth - 0.5).abs() < 1e-6);
    assert!((flush.normal - Vec2::Y).length() < 1e-6);

    let resting = circle_rect(Vec2::new(0.0, 0.25), 0.5, &floor, Vec2::ONE).expect("contact");
    assert_eq!(resting.len(), 1);
    assert!((resting.depth - 0.25).abs() < 1e-6);
    assert!((resting.normal - Vec2::Y).length() < 1e-6);
    assert!((resting.points()[0].position - Vec2::ZERO).length() < 1e-6);
}

#[test]
fn coincident_centers_still_push_apart() {
    let m = circle_circle(Vec2::ONE, 0.5, Vec2::ONE, 0.5).expect("contact");
    assert!((m.depth - 1.0).abs() < 1e-6);
    assert!((m.normal.length() - 1.0).abs() < 1e-6);
}

#[test]
fn body_level_test_uses_shape_views() {
    let ball = BodyGeometry::from_view(ShapeView::circle(Vec2::new(0.0, 0.25), 0.5));
    let floor = BodyGeometry::from_view(ShapeView::rect(Vec2::new(0.0, -1.0), Vec2::ONE, 0.0));
    let m = test_bodies(&ball, &floor).expect("contact");
    assert!((m.depth - 0.25).abs() < 1e-6);
    assert!(test_bodies(&floor, &ball).is_some_and(|r| (r.normal + m.normal).length() < 1e-6));
}
