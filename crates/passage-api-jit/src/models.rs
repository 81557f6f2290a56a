//! Wire shapes for the password-submit event.

use serde::{Deserialize, Serialize};

use passage_jit::{JitMigrationResult, MigrationAction};

/// Inbound password-submit event.
#[derive(Debug, Default, Deserialize)]
pub struct SignInEventRequest {
    #[serde(default)]
    pub data: Option<EventData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventData {
    #[serde(rename = "@odata.type")]
    pub odata_type: Option<String>,
    pub tenant_id: Option<String>,
    pub authentication_event_listener_id: Option<String>,
    pub custom_authentication_extension_id: Option<String>,
    pub authentication_context: Option<AuthenticationContext>,
    /// Plaintext password context, used by test harnesses.
    pub password_context: Option<PlainPasswordContext>,
    /// Nested encrypted password context, the production path.
    pub encrypted_password_context: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthenticationContext {
    pub correlation_id: Option<String>,
    pub protocol: Option<String>,
    pub client: Option<ClientInfo>,
    pub user: Option<EventUser>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub locale: Option<String>,
    pub market: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventUser {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlainPasswordContext {
    pub user_password: Option<String>,
    pub nonce: Option<String>,
}

/// Response envelope the tenant expects.
#[derive(Debug, Serialize)]
pub struct SignInEventResponse {
    pub data: ResponseData,
}

#[derive(Debug, Serialize)]
pub struct ResponseData {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,
    pub actions: Vec<ResponseAction>,
    /// Echo of the request's single-use nonce, when one was present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResponseAction {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SignInEventResponse {
    /// Builds the wire response for a pipeline decision.
    #[must_use]
    pub fn from_result(result: JitMigrationResult, nonce: Option<String>) -> Self {
        Self {
            data: ResponseData {
                odata_type: "microsoft.graph.onPasswordSubmitResponseData",
                actions: vec![ResponseAction {
                    odata_type: action_odata_type(result.action),
                    title: result.title,
                    message: result.message,
                }],
                nonce,
            },
        }
    }
}

fn action_odata_type(action: MigrationAction) -> &'static str {
    match action {
        MigrationAction::MigratePassword => "microsoft.graph.passwordsubmit.MigratePassword",
        MigrationAction::Block => "microsoft.graph.passwordsubmit.Block",
        MigrationAction::UpdatePassword => "microsoft.graph.passwordsubmit.UpdatePassword",
        MigrationAction::Retry => "microsoft.graph.passwordsubmit.Retry",
    }
}
