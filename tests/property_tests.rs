//! Property-based tests for the catalog, basket and quotation arithmetic.
//!
//! Catalogs are generated with arbitrary (including dangling and looping)
//! parent links to check that rendering never loses or repeats a node.

use std::collections::HashSet;

use labdesk::{
    models::Parameter,
    services::{
        basket::SelectionBasket,
        catalog::ParameterCatalog,
        quotation_document::{amount_in_words, compute_totals, number_to_words},
    },
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn node(id: i64, parent_id: Option<i64>, price: Option<u32>, hidden: bool) -> Parameter {
    Parameter {
        id,
        name: format!("Parameter {}", id),
        parent_id,
        price: price.map(Decimal::from),
        unit: None,
        min_range: None,
        max_range: None,
        is_3025_method: None,
        apha_24th_edition_method: None,
        is_active: Some(true),
        is_delete: Some(hidden),
    }
}

// Parent ids range past the catalog size so some links dangle.
fn catalog_strategy() -> impl Strategy<Value = Vec<Parameter>> {
    (1usize..40).prop_flat_map(|size| {
        prop::collection::vec(
            (
                prop::option::of(1i64..(size as i64 + 5)),
                prop::option::of(1u32..5_000),
                prop::bool::weighted(0.1),
            ),
            size,
        )
        .prop_map(|nodes| {
            nodes
                .into_iter()
                .enumerate()
                .map(|(i, (parent, price, hidden))| node(i as i64 + 1, parent, price, hidden))
                .collect()
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn hierarchy_renders_every_visible_parameter_once(parameters in catalog_strategy()) {
        let visible: HashSet<i64> = parameters.iter().filter(|p| p.is_visible()).map(|p| p.id).collect();
        let catalog = ParameterCatalog::new(parameters);
        let rows = catalog.render_hierarchy(&SelectionBasket::new());

        let rendered: Vec<i64> = rows.iter().map(|r| r.parameter_id).collect();
        let unique: HashSet<i64> = rendered.iter().copied().collect();
        prop_assert_eq!(rendered.len(), unique.len());
        prop_assert_eq!(unique, visible);
    }

    #[test]
    fn children_sit_one_level_below_their_parent(parameters in catalog_strategy()) {
        let catalog = ParameterCatalog::new(parameters);
        let rows = catalog.render_hierarchy(&SelectionBasket::new());
        for (index, row) in rows.iter().enumerate() {
            if row.depth == 0 {
                continue;
            }
            let parent = rows[..index].iter().rev().find(|r| r.depth == row.depth - 1);
            prop_assert!(parent.is_some());
            let ancestors = catalog.ancestors(row.parameter_id);
            prop_assert_eq!(ancestors.len(), row.depth);
        }
    }

    #[test]
    fn basket_total_is_sum_of_lines(
        picks in prop::collection::vec((1u32..10_000, 1u32..20), 1..15)
    ) {
        let mut basket = SelectionBasket::new();
        let mut expected = Decimal::ZERO;
        for (i, (price, quantity)) in picks.iter().enumerate() {
            let parameter = node(i as i64 + 1, None, Some(*price), false);
            basket.toggle_select(&parameter, true).unwrap();
            basket.set_quantity(parameter.id, *quantity).unwrap();
            expected += Decimal::from(*price) * Decimal::from(*quantity);
        }
        prop_assert_eq!(basket.grand_total(), expected);
        prop_assert_eq!(basket.len(), picks.len());
    }

    #[test]
    fn reselecting_keeps_quantity(price in 1u32..10_000, quantity in 2u32..50) {
        let parameter = node(1, None, Some(price), false);
        let mut basket = SelectionBasket::new();
        basket.toggle_select(&parameter, true).unwrap();
        basket.set_quantity(1, quantity).unwrap();
        basket.toggle_select(&parameter, true).unwrap();
        prop_assert_eq!(basket.get(1).map(|e| e.quantity), Some(quantity));
    }

    #[test]
    fn totals_balance_to_a_whole_rupee(subtotal in 0u64..10_000_000) {
        let subtotal = Decimal::from(subtotal);
        let totals = compute_totals(subtotal, Decimal::from(9), Decimal::from(9));

        prop_assert_eq!(totals.total_amount.fract(), Decimal::ZERO);
        prop_assert_eq!(
            totals.subtotal + totals.sgst_amount + totals.cgst_amount + totals.round_off,
            totals.total_amount
        );
        prop_assert!(totals.round_off.abs() <= Decimal::new(5, 1));
    }

    #[test]
    fn amounts_always_read_as_rupees(n in 0u64..100_000_000_000) {
        let words = amount_in_words(Decimal::from(n));
        prop_assert!(words.starts_with("Rupees "));
        prop_assert!(words.ends_with(" Only"));
        prop_assert!(!number_to_words(n).contains("  "));
    }
}
