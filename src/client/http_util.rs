use serde::de::DeserializeOwned;

use crate::error::RegistryError;

pub const VND_SCHEMA_REGISTRY_V1_JSON: &str = "application/vnd.schemaregistry.v1+json";

/// The error code Confluent's schema registry reports on HTTP 422 when a soft delete
/// is blocked by live referrers.
pub const REFERENCED_BY_OTHER_SCHEMAS_ERROR_CODE: i32 = 42206;

#[derive(Debug, serde::Deserialize)]
pub struct ErrorResponse {
    pub error_code: i32,
    #[serde(default)]
    pub message: String,
}

/// Parse a response into JSON, or into a structured `RegistryError` carrying method,
/// URL, status, and body for non-2xx responses.
pub async fn parse_response<T: DeserializeOwned>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T, RegistryError> {
    let status = response.status();
    let url = response.url().to_string();
    let bytes = response.bytes().await?;

    if status.is_success() {
        return serde_json::from_slice::<T>(&bytes).map_err(|source| RegistryError::JsonParse {
            body: String::from_utf8_lossy(&bytes).to_string(),
            target: std::any::type_name::<T>(),
            source: Box::new(source),
        });
    }

    Err(RegistryError::Http {
        method,
        url,
        status: status.as_u16(),
        body: String::from_utf8_lossy(&bytes).to_string(),
    })
}

/// Parse an error body's machine-readable code without failing the caller if it isn't
/// JSON-shaped the way Confluent's registry normally sends it.
pub fn error_code(body: &str) -> Option<i32> {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|e| e.error_code)
}
