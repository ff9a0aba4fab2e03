use proptest::prelude::*;
use rapidchange_atc::PocketLayout;
use rapidchange_core::ToolId;
use rapidchange_settings::{Alignment, Direction};

fn arb_alignment() -> impl Strategy<Value = Alignment> {
    prop_oneof![Just(Alignment::X), Just(Alignment::Y)]
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Positive), Just(Direction::Negative)]
}

prop_compose! {
    fn arb_layout()(
        alignment in arb_alignment(),
        direction in arb_direction(),
        pocket_count in 1u32..40,
        pocket_offset in 0.0f32..120.0,
        x in -500.0f32..500.0,
        y in -500.0f32..500.0,
    ) -> PocketLayout {
        PocketLayout {
            alignment,
            direction,
            pocket_count,
            pocket_offset,
            origin: (x, y),
            manual_position: (x + 10.0, y + 10.0),
        }
    }
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-3 * (1.0 + a.abs().max(b.abs()))
}

proptest! {
    #[test]
    fn prop_adjacent_pockets_one_offset_apart(layout in arb_layout(), seed in any::<u32>()) {
        prop_assume!(layout.pocket_count >= 2);
        let id = 1 + seed % (layout.pocket_count - 1);
        let (x1, y1) = layout.pocket_position(ToolId(id)).unwrap();
        let (x2, y2) = layout.pocket_position(ToolId(id + 1)).unwrap();

        let step = layout.pocket_offset * layout.direction.sign();
        match layout.alignment {
            Alignment::X => {
                prop_assert!(close(x2 - x1, step));
                prop_assert_eq!(y1, y2);
            }
            Alignment::Y => {
                prop_assert!(close(y2 - y1, step));
                prop_assert_eq!(x1, x2);
            }
        }
    }

    #[test]
    fn prop_pocket_boundaries(layout in arb_layout()) {
        prop_assert!(!layout.tool_has_pocket(ToolId(0)));
        prop_assert!(layout.tool_has_pocket(ToolId(1)));
        prop_assert!(layout.tool_has_pocket(ToolId(layout.pocket_count)));
        prop_assert!(!layout.tool_has_pocket(ToolId(layout.pocket_count + 1)));
        prop_assert_eq!(layout.pocket_position(ToolId(1)), Some(layout.origin));
    }

    #[test]
    fn prop_resolved_position(layout in arb_layout(), raw in 0u32..100) {
        let tool = ToolId(raw);
        let resolved = layout.resolved_position(tool);
        if layout.tool_has_pocket(tool) {
            prop_assert_eq!(Some(resolved), layout.pocket_position(tool));
        } else {
            prop_assert_eq!(resolved, layout.manual_position);
            prop_assert_eq!(layout.pocket_position(tool), None);
        }
    }
}

#[test]
fn test_example_magazine() {
    let layout = PocketLayout {
        alignment: Alignment::X,
        direction: Direction::Positive,
        pocket_count: 6,
        pocket_offset: 45.0,
        origin: (0.0, 0.0),
        manual_position: (0.0, 0.0),
    };
    assert_eq!(layout.pocket_position(ToolId(3)), Some((90.0, 0.0)));
    assert!(layout.tool_has_pocket(ToolId(6)));
    assert!(!layout.tool_has_pocket(ToolId(7)));
}
