#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use labdesk::{
    client::{InMemoryLabApi, LabApi},
    models::{CustomerInput, Parameter, ParameterId, SampleCondition, SampleInput},
    services::{basket::SelectionBasket, catalog::ParameterCatalog, lifecycle::IntakeOutcome, LabServices},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const WATER: ParameterId = 1;
pub const PH: ParameterId = 2;
pub const TURBIDITY: ParameterId = 3;
pub const METALS: ParameterId = 4;
pub const LEAD: ParameterId = 5;
pub const IRON: ParameterId = 6;
pub const SOIL: ParameterId = 7;
pub const MOISTURE: ParameterId = 8;

pub fn parameter(id: ParameterId, name: &str, parent_id: Option<ParameterId>, price: Option<Decimal>) -> Parameter {
    Parameter {
        id,
        name: name.to_string(),
        parent_id,
        price,
        unit: None,
        min_range: None,
        max_range: None,
        is_3025_method: None,
        apha_24th_edition_method: None,
        is_active: Some(true),
        is_delete: Some(false),
    }
}

/// Water Tests > pH, Turbidity, Metals > Lead, Iron; Soil Tests > Moisture.
pub fn seeded_catalog() -> Vec<Parameter> {
    let mut ph = parameter(PH, "pH", Some(WATER), Some(dec!(100)));
    ph.min_range = Some(6.5);
    ph.max_range = Some(8.5);
    ph.is_3025_method = Some("IS:3025 (Part 11)".into());
    ph.apha_24th_edition_method = Some("APHA 4500-H+ B".into());

    let mut turbidity = parameter(TURBIDITY, "Turbidity", Some(WATER), Some(dec!(250)));
    turbidity.unit = Some("NTU".into());
    turbidity.min_range = Some(0.0);
    turbidity.max_range = Some(5.0);
    turbidity.is_3025_method = Some("IS:3025 (Part 10)".into());

    let mut lead = parameter(LEAD, "Lead", Some(METALS), Some(dec!(800)));
    lead.unit = Some("mg/L".into());
    lead.max_range = Some(0.01);
    lead.apha_24th_edition_method = Some("APHA 3111 B".into());

    let mut iron = parameter(IRON, "Iron", Some(METALS), Some(dec!(400)));
    iron.unit = Some("mg/L".into());
    iron.min_range = Some(0.0);
    iron.max_range = Some(0.3);

    vec![
        parameter(WATER, "Water Tests", None, None),
        ph,
        turbidity,
        parameter(METALS, "Metals", Some(WATER), None),
        lead,
        iron,
        parameter(SOIL, "Soil Tests", None, None),
        parameter(MOISTURE, "Moisture", Some(SOIL), Some(dec!(150))),
    ]
}

pub fn customer_input(name: &str) -> CustomerInput {
    CustomerInput {
        c_name: "Acme Waterworks".to_string(),
        name: name.to_string(),
        email: format!("{}@acme.test", name.to_lowercase()),
        phone_number: "9876543210".to_string(),
        whatsapp_number: String::new(),
        address: "12 Industrial Estate, Pune".to_string(),
        is_delete: false,
    }
}

pub fn sample_input(order_id: i64) -> SampleInput {
    SampleInput {
        order_id,
        sample_type: "Drinking Water".to_string(),
        collect_date: date(2024, 3, 1),
        receipt_date: date(2024, 3, 2),
        collected_by: "Field team".to_string(),
        particulars: "Borewell".to_string(),
        location: "Pune".to_string(),
        quantity: "2 L".to_string(),
        condition: SampleCondition::Good,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Services wired to a seeded in-memory API.
pub struct TestLab {
    pub api: Arc<InMemoryLabApi>,
    pub services: LabServices,
}

impl TestLab {
    pub async fn new() -> Self {
        let api = Arc::new(InMemoryLabApi::with_parameters(seeded_catalog()).await);
        let dyn_api: Arc<dyn LabApi> = api.clone();
        Self {
            services: LabServices::new(dyn_api),
            api,
        }
    }

    pub async fn catalog(&self) -> ParameterCatalog {
        ParameterCatalog::load(self.api.as_ref())
            .await
            .expect("catalog loads")
    }

    pub async fn intake(&self, name: &str) -> IntakeOutcome {
        self.services
            .lifecycle
            .intake(
                customer_input(name),
                Some("Potability check".to_string()),
                None,
                date(2024, 3, 1),
            )
            .await
            .expect("intake succeeds")
    }

    /// A basket holding the given leaves with quantity 1.
    pub async fn basket(&self, ids: &[ParameterId]) -> SelectionBasket {
        let catalog = self.catalog().await;
        let mut basket = SelectionBasket::new();
        for id in ids {
            let parameter = catalog.get(*id).expect("seeded parameter");
            basket.toggle_select(parameter, true).expect("leaf selectable");
        }
        basket
    }
}
