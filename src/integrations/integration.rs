use crate::{ErrorKind, TreeStrategy};

/// Body encoding for the authorize and credentials calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFormat {
    Json,
    Form,
}

/// Where the authorization URL sits in the authorize response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeResponseShape {
    /// The body is the URL, either as raw text or a JSON string.
    Raw,
    /// The body is a JSON object with a `url` field.
    UrlField,
    /// Accept either of the above.
    Auto,
}

pub trait Integration: Send + Sync {
    /// Path segment used by the backend routes, e.g. `airtable`.
    fn id(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    /// Discriminator emitted alongside the credentials.
    fn type_tag(&self) -> &'static str;
    /// Plural noun for the listed items, e.g. `bases`.
    fn item_noun(&self) -> &'static str;
    fn tree_strategy(&self) -> TreeStrategy;

    fn request_format(&self) -> RequestFormat {
        RequestFormat::Form
    }

    fn authorize_response_shape(&self) -> AuthorizeResponseShape {
        AuthorizeResponseShape::Auto
    }

    fn authorize_path(&self) -> String {
        format!("/integrations/{}/authorize", self.id())
    }

    fn credentials_path(&self) -> String {
        format!("/integrations/{}/credentials", self.id())
    }

    fn items_path(&self) -> String {
        format!("/integrations/{}/items", self.id())
    }

    fn window_title(&self) -> String {
        format!("{} Authorization", self.display_name())
    }

    fn default_error_message(&self, kind: ErrorKind) -> String {
        let name = self.display_name();
        match kind {
            ErrorKind::Configuration => format!("{name} integration is misconfigured"),
            ErrorKind::PopupBlocked => format!("Could not open the {name} authorization window"),
            ErrorKind::AuthorizeRequestFailed => format!("Failed to connect to {name}"),
            ErrorKind::CredentialExchangeFailed => "Failed to get credentials".to_string(),
            ErrorKind::CredentialsEmpty => format!("{name} did not return any credentials"),
            ErrorKind::ItemFetchFailed => {
                format!("Failed to fetch {name} {}", self.item_noun())
            }
            ErrorKind::InvalidResponseShape => {
                "Invalid data format received from server".to_string()
            }
            ErrorKind::PollTimeout => format!("{name} authorization timed out"),
        }
    }

    fn empty_message(&self) -> String {
        format!("No {} {} found", self.display_name(), self.item_noun())
    }
}
