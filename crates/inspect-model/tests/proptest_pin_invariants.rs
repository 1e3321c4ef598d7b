//! Property-based invariant tests for pins, coordinates and zoom.
//!
//! 1. Pin numbers are exactly 1..=N in creation order
//! 2. Plan/page queries return exactly the matching pins, by number
//! 3. Pixel -> fraction -> pixel is the identity inside the surface
//! 4. Zoom never leaves its limits
//! 5. Rejected category updates leave the pin untouched

use inspect_model::{
    to_fractional, to_pixel, Action, FractionalPoint, Inspection, InspectError, PageStep, Pin,
    PinStore, PlanId, PlanUpload, SourceRef, SurfaceBounds, ZoomLimits,
};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

fn placement_strategy() -> impl Strategy<Value = (u64, u32, f64, f64)> {
    (1u64..4, 1u32..5, 0.0f64..=100.0, 0.0f64..=100.0)
}

fn bounds_strategy() -> impl Strategy<Value = SurfaceBounds> {
    (-500.0f64..500.0, -500.0f64..500.0, 1.0f64..4000.0, 1.0f64..4000.0)
        .prop_map(|(left, top, width, height)| SurfaceBounds::new(left, top, width, height))
}

#[derive(Debug, Clone, Copy)]
enum ZoomOp {
    In,
    Out,
}

fn zoom_ops() -> impl Strategy<Value = Vec<ZoomOp>> {
    prop::collection::vec(prop_oneof![Just(ZoomOp::In), Just(ZoomOp::Out)], 0..64)
}

fn build_store(placements: &[(u64, u32, f64, f64)]) -> PinStore {
    let mut store = PinStore::new();
    for &(plan, page, x, y) in placements {
        store.create_pin(PlanId(plan), page, FractionalPoint { x, y });
    }
    store
}

// ═══════════════════════════════════════════════════════════════════════
// 1. Numbering
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn numbers_are_one_to_n_in_call_order(
        placements in prop::collection::vec(placement_strategy(), 0..100),
    ) {
        let store = build_store(&placements);
        let numbers: Vec<u32> = store.all().iter().map(Pin::number).collect();
        let expected: Vec<u32> = (1..=placements.len() as u32).collect();
        prop_assert_eq!(numbers, expected);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 2. Query filtering
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn query_returns_exact_subset_ordered_by_number(
        placements in prop::collection::vec(placement_strategy(), 0..100),
        plan in 1u64..4,
        page in 1u32..5,
    ) {
        let store = build_store(&placements);

        let queried: Vec<u32> =
            store.query_by_plan_and_page(PlanId(plan), page).map(Pin::number).collect();

        let expected: Vec<u32> = placements
            .iter()
            .enumerate()
            .filter(|(_, placement)| placement.0 == plan && placement.1 == page)
            .map(|(index, _)| index as u32 + 1)
            .collect();

        prop_assert_eq!(&queried, &expected);
        prop_assert!(queried.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Coordinate round trip
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn pixel_round_trip_is_identity_inside_surface(
        bounds in bounds_strategy(),
        fx in 0.0f64..=1.0,
        fy in 0.0f64..=1.0,
    ) {
        let px = bounds.left + fx * bounds.width;
        let py = bounds.top + fy * bounds.height;

        let fraction = to_fractional(px, py, bounds).expect("surface has area");
        prop_assert!(fraction.is_in_range());

        let pixel = to_pixel(fraction, bounds);
        prop_assert!((pixel.x - px).abs() < 1e-6, "x: {} vs {}", pixel.x, px);
        prop_assert!((pixel.y - py).abs() < 1e-6, "y: {} vs {}", pixel.y, py);
    }

    #[test]
    fn fractions_are_always_in_range(
        bounds in bounds_strategy(),
        px in -10_000.0f64..10_000.0,
        py in -10_000.0f64..10_000.0,
    ) {
        let fraction = to_fractional(px, py, bounds).expect("surface has area");
        prop_assert!(fraction.is_in_range());
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4. Zoom limits
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn zoom_stays_within_limits(ops in zoom_ops()) {
        let mut inspection =
            Inspection::new(ZoomLimits::default()).expect("default limits are valid");

        for op in ops {
            let action = match op {
                ZoomOp::In => Action::ZoomIn,
                ZoomOp::Out => Action::ZoomOut,
            };
            inspection.apply(action).expect("zoom is available in the plan view");

            let factor = inspection.view_state().zoom_factor();
            prop_assert!((0.5..=2.0).contains(&factor), "zoom factor {}", factor);
            prop_assert_eq!(inspection.view_state().zoom_percent % 10, 0);
        }
    }

    #[test]
    fn current_page_stays_within_page_count(
        page_count in 1u32..50,
        targets in prop::collection::vec(0u32..100, 1..20),
    ) {
        let mut inspection =
            Inspection::new(ZoomLimits::default()).expect("default limits are valid");
        inspection
            .apply(Action::RegisterPlans(vec![PlanUpload::new("a.pdf", SourceRef::new("a.pdf"))]))
            .expect("registration always succeeds");
        let plan = inspection.plans().active_id().expect("first plan is active");
        inspection
            .apply(Action::ResolvePageCount { plan, page_count })
            .expect("plan exists");

        for target in targets {
            inspection.apply(Action::TurnPage(PageStep::To(target))).expect("page count known");
            let page = inspection.view_state().current_page;
            prop_assert!((1..=page_count).contains(&page));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 5. Rejected category updates
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unlisted_category_is_rejected_without_change(name in "[a-z ]{1,16}") {
        let mut store = PinStore::new();
        let id = store.create_pin(PlanId(1), 1, FractionalPoint { x: 1.0, y: 2.0 }).id();
        let before = store.get(id).expect("pin exists").clone();

        // Every listed name starts with an uppercase letter.
        let result = store.update_category(id, &name);
        prop_assert_eq!(result, Err(InspectError::UnknownCategory(name.clone())));
        prop_assert_eq!(store.get(id).expect("pin exists"), &before);
    }
}
