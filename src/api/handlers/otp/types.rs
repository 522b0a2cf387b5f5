//! Request/response types for the reset-code endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SendCodeRequest {
    pub role: String,
    pub identifier: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyCodeRequest {
    pub role: String,
    pub identifier: String,
    pub otp: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub role: String,
    pub identifier: String,
    pub otp: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Uniform `{success, message}` envelope used by the reset-code endpoints.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

impl StatusResponse {
    #[must_use]
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn fail(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn reset_request_uses_camel_case_fields() -> Result<()> {
        let request: ResetPasswordRequest = serde_json::from_value(serde_json::json!({
            "role": "student",
            "identifier": "21CS042",
            "otp": "482913",
            "newPassword": "s3cret!",
            "confirmPassword": "s3cret!",
        }))?;
        assert_eq!(request.new_password, "s3cret!");
        assert_eq!(request.confirm_password, "s3cret!");
        Ok(())
    }

    #[test]
    fn status_response_round_trips() -> Result<()> {
        let value = serde_json::to_value(StatusResponse::fail("Invalid OTP"))?;
        assert_eq!(value["success"], false);
        assert_eq!(value["message"], "Invalid OTP");
        Ok(())
    }
}
