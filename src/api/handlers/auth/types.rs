//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub password: String,
}

/// Acknowledgement for OTP issuance (signup and forgot-password): the opaque
/// session token the client must present together with the emailed code.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpIssuedResponse {
    pub message: String,
    #[serde(rename = "tempToken")]
    pub temp_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
    #[serde(rename = "tempToken")]
    pub temp_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendOtpRequest {
    pub email: String,
    #[serde(rename = "tempToken")]
    pub temp_token: String,
}

/// Bearer token plus the account it is bound to.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionTokenResponse {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SigninRequest {
    pub phone: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EmailSigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GoogleSigninRequest {
    #[serde(rename = "idToken")]
    pub id_token: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GoogleSigninResponse {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    #[serde(rename = "tempToken")]
    pub temp_token: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordResponse {
    pub message: String,
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn signup_request_round_trips() -> Result<()> {
        let request = SignupRequest {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            phone: Some("555".to_string()),
            address: None,
            password: "hunter2".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: SignupRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.phone.as_deref(), Some("555"));
        Ok(())
    }

    #[test]
    fn verify_otp_request_uses_temp_token_key() -> Result<()> {
        let decoded: VerifyOtpRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "otp": "123456",
            "tempToken": "deadbeef",
        }))?;
        assert_eq!(decoded.temp_token, "deadbeef");
        Ok(())
    }

    #[test]
    fn session_token_response_uses_user_id_key() -> Result<()> {
        let response = SessionTokenResponse {
            token: "jwt".to_string(),
            user_id: "uid".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert!(value.get("userId").is_some());
        assert!(value.get("user_id").is_none());
        Ok(())
    }

    #[test]
    fn google_signin_request_optional_fields() -> Result<()> {
        let decoded: GoogleSigninRequest =
            serde_json::from_value(serde_json::json!({ "idToken": "tok" }))?;
        assert_eq!(decoded.id_token, "tok");
        assert_eq!(decoded.name, None);
        assert_eq!(decoded.email, None);
        Ok(())
    }
}
