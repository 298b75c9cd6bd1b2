// tests/ordering_props.rs
use proptest::prelude::*;
use stepgen::{WellOrder, order_wells};

const ROWS: &str = "ABCDEFGHIJKLMNOP";

fn grid(columns: usize, rows: usize) -> Vec<Vec<String>> {
    (1..=columns)
        .map(|col| {
            ROWS.chars()
                .take(rows)
                .map(|row| format!("{row}{col}"))
                .collect()
        })
        .collect()
}

fn valid_pair() -> impl Strategy<Value = (WellOrder, WellOrder)> {
    let vertical = prop_oneof![Just(WellOrder::TopToBottom), Just(WellOrder::BottomToTop)];
    let horizontal = prop_oneof![Just(WellOrder::LeftToRight), Just(WellOrder::RightToLeft)];
    (vertical, horizontal, any::<bool>()).prop_map(|(v, h, vertical_first)| {
        if vertical_first { (v, h) } else { (h, v) }
    })
}

proptest! {
    #[test]
    fn test_ordering_is_a_permutation(
        columns in 1usize..=24,
        rows in 1usize..=16,
        (first, second) in valid_pair(),
    ) {
        let ordering = grid(columns, rows);
        let ordered = order_wells(&ordering, first, second).unwrap();

        let mut expected: Vec<String> = ordering.iter().flatten().cloned().collect();
        let mut actual = ordered.clone();
        expected.sort();
        actual.sort();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn test_ordering_is_deterministic(
        columns in 1usize..=24,
        rows in 1usize..=16,
        (first, second) in valid_pair(),
    ) {
        let ordering = grid(columns, rows);
        prop_assert_eq!(
            order_wells(&ordering, first, second).unwrap(),
            order_wells(&ordering, first, second).unwrap()
        );
    }

    #[test]
    fn test_ordering_starts_in_the_right_corner(
        columns in 1usize..=24,
        rows in 1usize..=16,
        (first, second) in valid_pair(),
    ) {
        let ordering = grid(columns, rows);
        let ordered = order_wells(&ordering, first, second).unwrap();

        let top = first != WellOrder::BottomToTop && second != WellOrder::BottomToTop;
        let left = first != WellOrder::RightToLeft && second != WellOrder::RightToLeft;
        let column = if left { 0 } else { columns - 1 };
        let row = if top { 0 } else { rows - 1 };
        prop_assert_eq!(&ordered[0], &ordering[column][row]);
    }

    #[test]
    fn test_parallel_axes_are_rejected(
        vertical in any::<bool>(),
        flip in any::<bool>(),
    ) {
        let (a, b) = if vertical {
            (WellOrder::TopToBottom, WellOrder::BottomToTop)
        } else {
            (WellOrder::LeftToRight, WellOrder::RightToLeft)
        };
        let (first, second) = if flip { (b, a) } else { (a, b) };
        prop_assert!(order_wells(&grid(3, 2), first, second).is_err());
    }
}
