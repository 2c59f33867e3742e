// Catalog and selection
pub mod basket;
pub mod catalog;
pub mod catalog_import;
pub mod parameters;

// Request workflow
pub mod lifecycle;
pub mod results;

// Reporting
pub mod overview;
pub mod quotation_document;

use crate::client::LabApi;
use std::sync::Arc;

/// The services a front end needs, sharing one API client.
#[derive(Clone)]
pub struct LabServices {
    pub api: Arc<dyn LabApi>,
    pub lifecycle: lifecycle::LifecycleService,
    pub results: results::ResultService,
    pub parameters: parameters::ParameterAdmin,
    pub overview: overview::OverviewService,
}

impl LabServices {
    pub fn new(api: Arc<dyn LabApi>) -> Self {
        Self {
            lifecycle: lifecycle::LifecycleService::new(api.clone()),
            results: results::ResultService::new(api.clone()),
            parameters: parameters::ParameterAdmin::new(api.clone()),
            overview: overview::OverviewService::new(api.clone()),
            api,
        }
    }
}
