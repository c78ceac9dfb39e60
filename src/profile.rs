use tracing::info;

use crate::{
    api::ApiClient,
    api_objects::{ProfileUpdate, User},
    store::{Action, Store},
    types::Result,
    validation::{require, validate_age},
};

#[derive(Clone)]
pub struct ProfileService {
    api: ApiClient,
    store: Store,
}

impl ProfileService {
    pub fn new(api: ApiClient, store: Store) -> Self {
        Self { api, store }
    }

    /// Own profile, refreshed from the backend into the store.
    pub async fn view(&self) -> Result<User> {
        let user = self.store.intercept(self.api.view_profile().await).await?;
        self.store.dispatch(Action::SetUser(user.clone())).await;
        Ok(user)
    }

    pub async fn view_user(&self, user_id: &str) -> Result<User> {
        self.store
            .intercept(self.api.user_profile(user_id).await)
            .await
    }

    pub async fn edit(&self, update: ProfileUpdate) -> Result<User> {
        let update = normalize(update)?;
        let user = self
            .store
            .intercept(self.api.edit_profile(&update).await)
            .await?;

        info!("Profile {} updated.", user.id);
        self.store.dispatch(Action::SetUser(user.clone())).await;
        Ok(user)
    }
}

fn normalize(update: ProfileUpdate) -> Result<ProfileUpdate> {
    validate_age(update.age)?;

    Ok(ProfileUpdate {
        first_name: String::from(require(&update.first_name, "First name")?),
        last_name: String::from(require(&update.last_name, "Last name")?),
        photo_url: non_blank(update.photo_url),
        age: update.age,
        gender: non_blank(update.gender).map(|gender| gender.to_lowercase()),
        about: update.about,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ClientError, validation::ValidationError};

    fn update() -> ProfileUpdate {
        ProfileUpdate {
            first_name: String::from(" Ada "),
            last_name: String::from("Lovelace"),
            photo_url: Some(String::from("   ")),
            age: Some(36),
            gender: Some(String::from("Female")),
            about: None,
        }
    }

    #[test]
    fn test_normalize_drops_blank_photo_and_lowercases_gender() {
        let normalized = normalize(update()).unwrap();
        assert_eq!(normalized.first_name, "Ada");
        assert!(normalized.photo_url.is_none());
        assert_eq!(normalized.gender.as_deref(), Some("female"));

        let json = serde_json::to_value(&normalized).unwrap();
        assert!(json.get("photoUrl").is_none());
    }

    #[test]
    fn test_normalize_rejects_bad_input() {
        let young = ProfileUpdate {
            age: Some(17),
            ..update()
        };
        assert!(matches!(
            normalize(young),
            Err(ClientError::Validation(ValidationError::AgeOutOfRange(17)))
        ));

        let nameless = ProfileUpdate {
            last_name: String::new(),
            ..update()
        };
        assert!(matches!(
            normalize(nameless),
            Err(ClientError::Validation(ValidationError::MissingField(_)))
        ));
    }
}
