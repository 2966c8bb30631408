//! Messages exchanged between tabs, the coordinator and the control surface

use crate::model::AppData;
use crate::CoordinatorError;
use serde::{Deserialize, Serialize};

/// A message between contexts
///
/// Serialized with a `type` tag, e.g. `{"type":"TOGGLE_SEARCH","isActive":true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// tab -> coordinator
    RegisterTab,

    /// tab -> coordinator
    UnregisterTab,

    /// tab -> coordinator, sent after the tab navigated away
    TabRedirected,

    /// coordinator <-> tab
    AppDataUpdate { payload: AppData, timestamp: i64 },

    /// coordinator -> tab: start or stop polling
    FetchStatusUpdate {
        #[serde(rename = "isActive")]
        is_active: bool,
    },

    /// control surface -> coordinator
    ToggleSearch {
        #[serde(rename = "isActive")]
        is_active: bool,
    },

    /// control surface -> coordinator
    GetSearchStatus,
}

impl Message {
    /// The wire name of this message's type
    pub fn kind(&self) -> &'static str {
        match self {
            Message::RegisterTab => "REGISTER_TAB",
            Message::UnregisterTab => "UNREGISTER_TAB",
            Message::TabRedirected => "TAB_REDIRECTED",
            Message::AppDataUpdate { .. } => "APP_DATA_UPDATE",
            Message::FetchStatusUpdate { .. } => "FETCH_STATUS_UPDATE",
            Message::ToggleSearch { .. } => "TOGGLE_SEARCH",
            Message::GetSearchStatus => "GET_SEARCH_STATUS",
        }
    }
}

/// The coordinator's answer to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reply {
    Ack,

    Registered {
        #[serde(rename = "isPromotedActive")]
        is_active: bool,
    },

    Status {
        #[serde(rename = "isActive")]
        is_active: bool,
    },
}

impl Reply {
    /// Error for a reply that does not answer `request`
    pub fn unexpected(self, request: &Message) -> CoordinatorError {
        tracing::error!(reply = ?self, "Unexpected reply to {}", request.kind());
        CoordinatorError::UnexpectedReply {
            request: request.kind(),
            reply: format!("{:?}", self),
        }
    }
}
