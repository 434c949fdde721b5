//! Test suites for the CRM backend
//!
//! Groups are concatenated in a fixed order; the scheduler only reorders
//! where a dependency demands it.

mod catalog;
mod crud;
mod dashboard;
mod setup;
mod workflow;

pub use crud::{CrudSuite, Payload};

use crate::definition::TestDefinition;

pub const SETUP: &str = "setup";
pub const CONTACTS: &str = "contacts";
pub const ARTICLES: &str = "articles";
pub const PROJECTS: &str = "projects";
pub const TASKS: &str = "tasks";
pub const OFFERS: &str = "offers";
pub const SALES: &str = "sales";
pub const SERVICE_ORDERS: &str = "service-orders";
pub const DISPATCHES: &str = "dispatches";
pub const DASHBOARD: &str = "dashboard";

/// Fixture keys shared across suites
pub mod keys {
    pub const CONTACT: &str = "test-contact-1";
    pub const ARTICLE: &str = "test-article-1";
    pub const PROJECT: &str = "test-project-1";
    pub const TASK: &str = "test-task-1";
    pub const OFFER: &str = "test-offer-1";
    pub const SALE: &str = "test-sale-1";
    pub const SERVICE_ORDER: &str = "test-service-order-1";
    pub const DISPATCH: &str = "test-dispatch-1";
}

/// Every built-in group, in registry order
pub fn standard() -> Vec<Vec<TestDefinition>> {
    vec![
        setup::tests(),
        catalog::contacts(),
        catalog::articles(),
        catalog::projects(),
        catalog::tasks(),
        workflow::offers(),
        workflow::sales(),
        workflow::service_orders(),
        workflow::dispatches(),
        dashboard::tests(),
    ]
}
