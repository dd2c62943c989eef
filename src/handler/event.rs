//! CloudFormation custom-resource request and response documents.

use crate::role::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle operation CloudFormation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    /// Parse the event's `RequestType`; `None` for anything unrecognised
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Create" => Some(Self::Create),
            "Update" => Some(Self::Update),
            "Delete" => Some(Self::Delete),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The custom resource's properties; only `roles` is read
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoleProperties {
    #[serde(default)]
    pub roles: Option<Vec<Role>>,
}

/// Custom-resource event as CloudFormation delivers it
///
/// `RequestType` is kept as a string so an unknown type is reported by the
/// dispatcher instead of failing deserialization.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceRequest {
    pub request_type: String,
    #[serde(rename = "ResponseURL", default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub stack_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub logical_resource_id: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: RoleProperties,
    #[serde(default)]
    pub old_resource_properties: Option<RoleProperties>,
}

impl CustomResourceRequest {
    /// The id to report back
    ///
    /// Kept as received so an Update never replaces the resource; a Create
    /// gets `db-roles-{LogicalResourceId}`.
    #[must_use]
    pub fn physical_resource_id(&self) -> String {
        match self.physical_resource_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!(
                "{}-{}",
                crate::constants::PHYSICAL_RESOURCE_ID_PREFIX,
                self.logical_resource_id
            ),
        }
    }
}

/// Terminal status of the custom-resource operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Response document sent back to CloudFormation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub data: Value,
}

impl CustomResourceResponse {
    #[must_use]
    pub fn success(request: &CustomResourceRequest, data: Value) -> Self {
        Self {
            status: ResponseStatus::Success,
            reason: None,
            physical_resource_id: request.physical_resource_id(),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            data,
        }
    }

    #[must_use]
    pub fn failed(request: &CustomResourceRequest, reason: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failed,
            reason: Some(reason.into()),
            physical_resource_id: request.physical_resource_id(),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            data: Value::Object(serde_json::Map::new()),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}
