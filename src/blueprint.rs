//! Static blueprint catalog.
//!
//! Blueprints are predefined application template categories used to seed
//! the minimal specification. The catalog itself is static metadata; this
//! module only provides lookup.

use serde::{Deserialize, Serialize};

/// Metadata for one application template category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: String,
    pub name: String,
    pub industry: String,
    pub description: String,
}

impl Blueprint {
    fn new(id: &str, name: &str, industry: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            industry: industry.to_string(),
            description: description.to_string(),
        }
    }
}

/// The built-in blueprint catalog.
pub fn catalog() -> Vec<Blueprint> {
    vec![
        Blueprint::new(
            "pms",
            "Property management",
            "real_estate",
            "Rental property, tenant and lease management",
        ),
        Blueprint::new(
            "inventory",
            "Inventory tracking",
            "retail",
            "Stock levels, warehouses and purchase orders",
        ),
        Blueprint::new(
            "booking",
            "Booking and scheduling",
            "services",
            "Appointments, resources and calendars",
        ),
        Blueprint::new(
            "crm",
            "Customer relationship management",
            "sales",
            "Contacts, deals and pipelines",
        ),
        Blueprint::new(
            "helpdesk",
            "Help desk",
            "support",
            "Tickets, queues and SLAs",
        ),
        Blueprint::new(
            "invoicing",
            "Invoicing",
            "finance",
            "Invoices, payments and reminders",
        ),
    ]
}

/// Look up a blueprint by identifier.
pub fn get_blueprint(id: &str) -> Option<Blueprint> {
    catalog().into_iter().find(|b| b.id == id)
}
