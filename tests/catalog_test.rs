//! Catalog browsing and basket selection against a seeded in-memory API.

mod common;

use assert_matches::assert_matches;
use common::*;
use labdesk::{
    errors::ServiceError,
    services::{
        basket::SelectionBasket,
        catalog::{CatalogIssue, ParameterCatalog, RowKind},
    },
    session::{SessionContext, ViewMode},
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn hierarchy_renders_depth_first_with_categories() {
    let lab = TestLab::new().await;
    let catalog = lab.catalog().await;
    let rows = catalog.render_hierarchy(&SelectionBasket::new());

    let outline: Vec<(&str, usize)> = rows.iter().map(|r| (r.name.as_str(), r.depth)).collect();
    assert_eq!(
        outline,
        vec![
            ("Water Tests", 0),
            ("pH", 1),
            ("Turbidity", 1),
            ("Metals", 1),
            ("Lead", 2),
            ("Iron", 2),
            ("Soil Tests", 0),
            ("Moisture", 1),
        ]
    );
    assert_eq!(rows[0].kind, RowKind::Category);
    assert_matches!(rows[1].kind, RowKind::Leaf { selected: false, quantity: None, .. });
}

#[tokio::test]
async fn search_lists_only_matching_leaves() {
    let lab = TestLab::new().await;
    let catalog = lab.catalog().await;

    let names: Vec<&str> = catalog.search("TE").iter().map(|p| p.name.as_str()).collect();
    // "Water Tests" and "Soil Tests" are categories and never match.
    assert!(names.is_empty());

    let rows = catalog.render("ur", &SelectionBasket::new());
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Turbidity", "Moisture"]);
    assert!(rows.iter().all(|r| r.depth == 0));
}

#[tokio::test]
async fn whitespace_search_falls_back_to_hierarchy() {
    let lab = TestLab::new().await;
    let catalog = lab.catalog().await;
    let basket = SelectionBasket::new();
    assert_eq!(catalog.render("   ", &basket), catalog.render_hierarchy(&basket));
}

#[tokio::test]
async fn selection_state_survives_view_switches() {
    let lab = TestLab::new().await;
    let catalog = lab.catalog().await;
    let mut session = SessionContext::default();

    session
        .basket
        .toggle_select(catalog.get(PH).unwrap(), true)
        .unwrap();
    session.basket.set_quantity(PH, 3).unwrap();

    session.set_search("ph");
    assert_eq!(session.view_mode, ViewMode::Search);
    let rows = catalog.render(&session.search_term, &session.basket);
    assert_matches!(rows[0].kind, RowKind::Leaf { selected: true, quantity: Some(3), .. });

    session.set_search("");
    assert_eq!(session.view_mode, ViewMode::Hierarchy);
    let rows = catalog.render(&session.search_term, &session.basket);
    let ph = rows.iter().find(|r| r.parameter_id == PH).unwrap();
    assert_matches!(ph.kind, RowKind::Leaf { selected: true, quantity: Some(3), .. });
    assert_eq!(session.basket.grand_total(), dec!(300));
}

#[tokio::test]
async fn categories_cannot_be_selected() {
    let lab = TestLab::new().await;
    let catalog = lab.catalog().await;
    let mut basket = SelectionBasket::new();

    let err = basket
        .toggle_select(catalog.get(METALS).unwrap(), true)
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert!(basket.is_empty());
}

#[tokio::test]
async fn basket_total_tracks_quantities() {
    let lab = TestLab::new().await;
    let mut basket = lab.basket(&[PH, LEAD]).await;
    basket.set_quantity(LEAD, 2).unwrap();

    assert_eq!(basket.grand_total(), dec!(1700));
    let lines = basket.to_parameter_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines.iter().map(|l| l.line_total()).sum::<rust_decimal::Decimal>(), dec!(1700));
}

#[tokio::test]
async fn hidden_parameters_are_left_out() {
    let mut parameters = seeded_catalog();
    parameters[2].is_delete = Some(true);
    parameters[5].is_active = Some(false);
    let catalog = ParameterCatalog::new(parameters);

    assert!(catalog.get(TURBIDITY).is_none());
    assert!(catalog.get(IRON).is_none());
    let metals: Vec<_> = catalog.children_of(Some(METALS)).iter().map(|p| p.id).collect();
    assert_eq!(metals, vec![LEAD]);
}

#[tokio::test]
async fn broken_parents_are_reported_and_still_rendered() {
    let mut parameters = seeded_catalog();
    parameters.push(parameter(20, "Stray", Some(99), Some(dec!(10))));
    parameters.push(parameter(30, "Loop A", Some(31), None));
    parameters.push(parameter(31, "Loop B", Some(30), None));
    let catalog = ParameterCatalog::new(parameters);

    assert!(catalog.issues().contains(&CatalogIssue::Orphan {
        parameter_id: 20,
        missing_parent: 99
    }));
    assert!(catalog
        .issues()
        .iter()
        .any(|issue| matches!(issue, CatalogIssue::Cycle { members } if members.contains(&30) && members.contains(&31))));

    let rendered: Vec<_> = catalog
        .render_hierarchy(&SelectionBasket::new())
        .into_iter()
        .map(|r| r.parameter_id)
        .collect();
    for id in [20, 30, 31] {
        assert!(rendered.contains(&id), "{} missing from hierarchy", id);
    }
    assert_eq!(rendered.len(), catalog.len());
}

#[tokio::test]
async fn path_names_walk_to_the_root() {
    let lab = TestLab::new().await;
    let catalog = lab.catalog().await;
    assert_eq!(catalog.path_name(LEAD).as_deref(), Some("Water Tests > Metals > Lead"));
    assert_eq!(catalog.path_name(SOIL).as_deref(), Some("Soil Tests"));
    assert_eq!(catalog.path_name(404), None);
}
