//! Property-based invariant tests for viewport mapping and scroll negotiation.
//!
//! 1. Offsets stay within `[0, max(0, extent - client)]` under any sequence of
//!    resizes, extent changes and offset requests, and are 0 on axes
//!    without an active scrollbar.
//! 2. `to_physical(to_virtual(p)) == p` for any offset.
//! 3. Negotiation does not depend on which axis is evaluated first, as long
//!    as both client sizes are large enough to host a scrollbar.

use proptest::prelude::*;
use vcanvas_core::{Axis, CoordinateMapper, Point, Scrollbars, Size};

const THICKNESS: i32 = 17;

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Resize(Size),
    Extents(Option<i32>, Option<i32>),
    SetOffset(Axis, i32),
    ScrollBy(Axis, i32),
}

fn axis_strategy() -> impl Strategy<Value = Axis> {
    prop_oneof![Just(Axis::Horizontal), Just(Axis::Vertical)]
}

fn extent_strategy() -> impl Strategy<Value = Option<i32>> {
    prop_oneof![Just(None), (0i32..8000).prop_map(Some)]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i32..3000, 0i32..3000).prop_map(|(w, h)| Op::Resize(Size::new(w, h))),
        (extent_strategy(), extent_strategy()).prop_map(|(h, v)| Op::Extents(h, v)),
        (axis_strategy(), -500i32..9000).prop_map(|(a, o)| Op::SetOffset(a, o)),
        (axis_strategy(), -3000i32..3000).prop_map(|(a, d)| Op::ScrollBy(a, d)),
    ]
}

fn assert_clamped(bars: &Scrollbars) -> Result<(), TestCaseError> {
    for axis in [Axis::Horizontal, Axis::Vertical] {
        let a = bars.axis(axis);
        prop_assert!(a.offset() >= 0, "{:?} offset negative: {}", axis, a.offset());
        if a.uses_scrollbar() {
            let extent = a.extent().unwrap_or(0);
            prop_assert!(
                a.offset() <= (extent - a.client()).max(0),
                "{:?} offset {} + client {} exceeds extent {}",
                axis,
                a.offset(),
                a.client(),
                extent
            );
        } else {
            prop_assert_eq!(a.offset(), 0, "{:?} scrolled without a scrollbar", axis);
        }
    }
    Ok(())
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Offset clamping
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn offsets_stay_clamped(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut bars = Scrollbars::new(THICKNESS, 16);
        for op in ops {
            match op {
                Op::Resize(size) => {
                    bars.set_client(size);
                    bars.negotiate();
                }
                Op::Extents(h, v) => {
                    bars.set_extents(h, v);
                    bars.negotiate();
                }
                Op::SetOffset(axis, offset) => {
                    bars.axis_mut(axis).set_offset(offset);
                }
                Op::ScrollBy(axis, delta) => {
                    bars.axis_mut(axis).scroll_by(delta);
                }
            }
            assert_clamped(&bars)?;
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Mapper round trip
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn mapper_round_trip(
        ox in 0i32..100_000,
        oy in 0i32..100_000,
        px in -5000i32..5000,
        py in -5000i32..5000,
    ) {
        let mapper = CoordinateMapper::new(Point::new(ox, oy), Size::new(800, 600));
        let p = Point::new(px, py);
        prop_assert_eq!(mapper.to_physical(mapper.to_virtual(p)), p);
        prop_assert_eq!(mapper.to_virtual(mapper.to_physical(p)), p);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Negotiation order independence
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn negotiation_is_order_independent(
        cw in 60i32..3000,
        ch in 60i32..3000,
        ew in extent_strategy(),
        eh in extent_strategy(),
    ) {
        let setup = || {
            let mut bars = Scrollbars::new(THICKNESS, 16);
            bars.set_client(Size::new(cw, ch));
            bars.set_extents(ew, eh);
            bars
        };
        let vertical_first = setup().negotiate_from(Axis::Vertical);
        let horizontal_first = setup().negotiate_from(Axis::Horizontal);

        prop_assert_eq!(vertical_first.horizontal, horizontal_first.horizontal);
        prop_assert_eq!(vertical_first.vertical, horizontal_first.vertical);
    }
}
