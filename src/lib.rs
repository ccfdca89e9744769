//! Popup-based OAuth connection flow for third-party data sources.
//!
//! A [`ConnectionController`] asks the integrations backend for an
//! authorization URL, shows it on an [`ApprovalSurface`], polls until the
//! surface is closed and then exchanges for credentials. Once connected, its
//! [`ItemTreeLoader`] fetches the integration's flat item list and rebuilds it
//! into a tree using the integration's [`TreeStrategy`].

#[cfg(feature = "browser")]
mod browser;
mod client;
mod config;
mod controller;
mod error;
mod expansion;
mod integrations;
mod popup;
mod tree;
mod tree_loader;
mod types;
mod view;

#[cfg(feature = "browser")]
pub use browser::BrowserSurface;
pub use client::{IntegrationBackend, IntegrationClient};
pub use config::ConnectConfig;
pub use controller::{ConnectionController, ConnectionSnapshot};
pub use error::{ConnectError, ErrorKind};
pub use expansion::ExpansionState;
pub use integrations::{
    AirtableIntegration, AuthorizeResponseShape, HubspotIntegration, Integration, RequestFormat,
};
pub use popup::{ApprovalSurface, PollOutcome, PopupHandle, PopupSize, wait_for_close};
pub use tree::{TreeNode, TreeStrategy};
pub use tree_loader::{ItemTreeLoader, TreeSnapshot};
pub use types::{ConnectionState, Credentials, IntegrationParams, RemoteItem};
pub use view::{TreeRow, visible_rows};
