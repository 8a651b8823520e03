//! Request and response bodies for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::delivery::ChannelKind;
use crate::store::User;

#[derive(ToSchema, Deserialize, Debug)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CodeRequest {
    pub email: String,
    pub otp: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct SendOtpRequest {
    pub email: String,
    /// Requested delivery channel; defaults to email.
    pub method: Option<ChannelKind>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RegisterResponse {
    pub message: String,
    /// Always true: the new account must verify before logging in.
    pub requires_verification: bool,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public view of a user; never includes credential material.
#[derive(ToSchema, Serialize, Debug)]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
        }
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserInfo,
}

/// Token pair returned by the passwordless OTP login.
#[derive(ToSchema, Serialize, Debug)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_info_omits_missing_username() {
        let info = UserInfo {
            id: 1,
            email: "alice@example.com".to_string(),
            username: None,
        };
        let value = serde_json::to_value(info).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "id": 1, "email": "alice@example.com" })
        );
    }

    #[test]
    fn send_otp_method_is_optional() {
        let request: SendOtpRequest =
            serde_json::from_str(r#"{ "email": "a@example.com" }"#).unwrap();
        assert!(request.method.is_none());

        let request: SendOtpRequest =
            serde_json::from_str(r#"{ "email": "a@example.com", "method": "whatsapp" }"#).unwrap();
        assert_eq!(request.method, Some(ChannelKind::Whatsapp));
    }
}
