use crate::{Integration, TreeStrategy};

/// HubSpot lists CRM objects nested under object-list parents.
#[derive(Debug, Clone, Copy, Default)]
pub struct HubspotIntegration;

impl Integration for HubspotIntegration {
    fn id(&self) -> &'static str {
        "hubspot"
    }

    fn display_name(&self) -> &'static str {
        "HubSpot"
    }

    fn type_tag(&self) -> &'static str {
        "Hubspot"
    }

    fn item_noun(&self) -> &'static str {
        "items"
    }

    fn tree_strategy(&self) -> TreeStrategy {
        TreeStrategy::ParentPointer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AirtableIntegration, ErrorKind};

    #[test]
    fn routes_and_messages_follow_integration_id() {
        let hubspot = HubspotIntegration;
        assert_eq!(hubspot.authorize_path(), "/integrations/hubspot/authorize");
        assert_eq!(hubspot.items_path(), "/integrations/hubspot/items");
        assert_eq!(hubspot.window_title(), "HubSpot Authorization");
        assert_eq!(
            hubspot.default_error_message(ErrorKind::ItemFetchFailed),
            "Failed to fetch HubSpot items"
        );
        assert_eq!(hubspot.empty_message(), "No HubSpot items found");

        let airtable = AirtableIntegration;
        assert_eq!(airtable.credentials_path(), "/integrations/airtable/credentials");
        assert_eq!(
            airtable.default_error_message(ErrorKind::AuthorizeRequestFailed),
            "Failed to connect to Airtable"
        );
        assert_eq!(airtable.empty_message(), "No Airtable bases found");
    }
}
