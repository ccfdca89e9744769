use crate::{Integration, TreeStrategy};

const BASE_TYPE: &str = "Base";
const TABLE_TYPE: &str = "Table";

/// Airtable lists bases and their tables, two levels deep.
#[derive(Debug, Clone, Copy, Default)]
pub struct AirtableIntegration;

impl Integration for AirtableIntegration {
    fn id(&self) -> &'static str {
        "airtable"
    }

    fn display_name(&self) -> &'static str {
        "Airtable"
    }

    fn type_tag(&self) -> &'static str {
        "Airtable"
    }

    fn item_noun(&self) -> &'static str {
        "bases"
    }

    fn tree_strategy(&self) -> TreeStrategy {
        TreeStrategy::typed(BASE_TYPE, TABLE_TYPE)
    }
}
