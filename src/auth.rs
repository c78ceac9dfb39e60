use tracing::{debug, info, warn};

use crate::{
    api::ApiClient,
    api_objects::{
        ChangePasswordRequest, EmailRequest, LoginRequest, MessageResponse, ResetPasswordRequest,
        SignupForm, SignupRequest, SignupResponse, User, VerificationFailure, VerificationOutcome,
    },
    error::ClientError,
    store::{Action, Store},
    types::{AnonymousReason, Result, Route},
    validation::{
        ValidationError, require, validate_confirmation, validate_email, validate_password,
    },
};

const ALREADY_VERIFIED: &str = "already been verified";

/// Account flows. Every form is validated before anything is sent.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    store: Store,
}

impl AuthService {
    pub fn new(api: ApiClient, store: Store) -> Self {
        Self { api, store }
    }

    pub async fn login(&self, email_id: &str, password: &str) -> Result<User> {
        let request = LoginRequest {
            email_id: String::from(require(email_id, "Email")?),
            password: String::from(require(password, "Password")?),
        };

        let user = self.api.login(&request).await?;
        info!("Logged in as {}.", user.id);
        self.store.dispatch(Action::SetUser(user.clone())).await;
        self.store.navigate(Route::Feed).await;
        Ok(user)
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<SignupResponse> {
        let request = SignupRequest {
            first_name: String::from(require(&form.first_name, "First name")?),
            last_name: String::from(require(&form.last_name, "Last name")?),
            email_id: String::from(validate_email(&form.email_id)?),
            password: form.password.clone(),
        };
        validate_password(&form.password)?;
        validate_confirmation(&form.password, &form.confirm_password)?;

        let response = self.api.signup(&request).await?;
        debug!("Signup accepted: {}", response.message);
        Ok(response)
    }

    /// Ends the session on the server, then locally. A failed request keeps
    /// the local session, unless the server already rejected it with a 401.
    pub async fn logout(&self) -> Result<()> {
        if let Err(error) = self.store.intercept(self.api.logout().await).await {
            warn!("Logout failed: {error}");
            return Err(error);
        }

        self.store
            .dispatch(Action::ClearSession(AnonymousReason::LoggedOut))
            .await;
        self.store.navigate(Route::Login).await;
        Ok(())
    }

    pub async fn forgot_password(&self, email_id: &str) -> Result<MessageResponse> {
        let request = EmailRequest {
            email_id: String::from(require(email_id, "Email")?),
        };
        self.api.forgot_password(&request).await
    }

    pub async fn reset_password(
        &self,
        token: Option<&str>,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<MessageResponse> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ValidationError::MissingToken)?;
        validate_password(new_password)?;
        validate_confirmation(new_password, confirm_password)?;

        self.api
            .reset_password(&ResetPasswordRequest {
                token: String::from(token),
                new_password: String::from(new_password),
            })
            .await
    }

    /// Confirms an email link. Backend rejections become
    /// [`VerificationOutcome::Failed`]; transport failures are errors.
    pub async fn verify_email(&self, token: Option<&str>) -> Result<VerificationOutcome> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ValidationError::MissingToken)?;

        match self.api.verify_email(token).await {
            Ok(MessageResponse { message }) if message.contains(ALREADY_VERIFIED) => {
                Ok(VerificationOutcome::AlreadyVerified { message })
            }
            Ok(MessageResponse { message }) => Ok(VerificationOutcome::Verified { message }),
            Err(ClientError::Api { message, .. }) => Ok(VerificationOutcome::Failed(
                VerificationFailure::classify(&message),
            )),
            Err(error) => Err(error),
        }
    }

    pub async fn resend_verification(&self, email_id: &str) -> Result<MessageResponse> {
        let request = EmailRequest {
            email_id: String::from(validate_email(email_id)?),
        };
        self.api.resend_verification(&request).await
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<MessageResponse> {
        validate_confirmation(new_password, confirm_password)?;
        require(current_password, "Current password")?;
        require(new_password, "New password")?;
        require(confirm_password, "Password confirmation")?;

        let request = ChangePasswordRequest {
            current_password: String::from(current_password),
            new_password: String::from(new_password),
        };
        self.store
            .intercept(self.api.change_password(&request).await)
            .await
    }
}
