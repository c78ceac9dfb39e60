use serde::{Deserialize, Serialize};

use super::user::User;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email_id: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email_id: String,
    pub password: String,
}

/// Signup form as typed by the user, before validation.
#[derive(Clone, Debug, Default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email_id: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub email_id: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<User>,
}

/// How an email verification link failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    InvalidToken,
    Expired,
    Other(String),
}

impl VerificationFailure {
    pub fn classify(message: &str) -> Self {
        if message.contains("Invalid verification token") {
            VerificationFailure::InvalidToken
        } else if message.contains("expired") {
            VerificationFailure::Expired
        } else {
            VerificationFailure::Other(String::from(message))
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            VerificationFailure::InvalidToken => String::from(
                "This verification link is invalid. Please request a new verification email.",
            ),
            VerificationFailure::Expired => String::from(
                "This verification link has expired. Please request a new verification email.",
            ),
            VerificationFailure::Other(message) => message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified { message: String },
    AlreadyVerified { message: String },
    Failed(VerificationFailure),
}
