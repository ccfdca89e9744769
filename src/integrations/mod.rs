mod airtable;
mod hubspot;
mod integration;

pub use airtable::AirtableIntegration;
pub use hubspot::HubspotIntegration;
pub use integration::{AuthorizeResponseShape, Integration, RequestFormat};
