//! Explicit session context handed to screens instead of ambient user lookups.

use chrono::{DateTime, Utc};
use shared::{domain::UserProfile, error::CoreError, keys::USER_KEY};
use storage::{save_json, KeyValueStore};
use tracing::{info, warn};

const MIN_PASSWORD_LEN: usize = 6;

struct FixtureAccount {
    username: &'static str,
    password: &'static str,
    name: &'static str,
    email: &'static str,
    age: u32,
    skin_type: &'static str,
    hair_type: &'static str,
    is_admin: bool,
    avatar: &'static str,
}

const FIXTURE_ACCOUNTS: &[FixtureAccount] = &[
    FixtureAccount {
        username: "admin",
        password: "admin",
        name: "Admin User",
        email: "admin@careful.com",
        age: 30,
        skin_type: "Combination",
        hair_type: "Normal",
        is_admin: true,
        avatar: "/woman-profile-avatar.png",
    },
    FixtureAccount {
        username: "olivia",
        password: "olivia123",
        name: "Olivia Bennett",
        email: "olivia@careful.com",
        age: 24,
        skin_type: "Combination",
        hair_type: "Combination",
        is_admin: false,
        avatar: "/woman-profile-avatar.png",
    },
    FixtureAccount {
        username: "demo",
        password: "demo123",
        name: "Demo User",
        email: "demo@careful.com",
        age: 28,
        skin_type: "Sensitive",
        hair_type: "Dry",
        is_admin: false,
        avatar: "/placeholder-user.jpg",
    },
];

pub struct SessionContext<S> {
    store: S,
    user: Option<UserProfile>,
}

impl<S: KeyValueStore> SessionContext<S> {
    pub async fn load(store: S) -> Result<Self, CoreError> {
        let raw = store.get(USER_KEY).await.map_err(CoreError::storage)?;
        let user = match raw.map(|raw| serde_json::from_str::<UserProfile>(&raw)) {
            Some(Ok(user)) => Some(user),
            Some(Err(err)) => {
                warn!(error = %err, "stored user is unreadable; treating as signed out");
                None
            }
            None => None,
        };
        Ok(Self { store, user })
    }

    pub fn current_user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Signs in against the fixture accounts; the username doubles as the email field.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<&UserProfile, CoreError> {
        let account = FIXTURE_ACCOUNTS
            .iter()
            .find(|account| account.username == username && account.password == password)
            .ok_or(CoreError::InvalidCredentials)?;

        let profile = UserProfile {
            name: account.name.to_string(),
            email: username.to_string(),
            age: account.age,
            skin_type: account.skin_type.to_string(),
            hair_type: account.hair_type.to_string(),
            is_admin: account.is_admin,
            avatar: account.avatar.to_string(),
            is_logged_in: true,
            login_time: now,
        };
        self.store_user(profile).await?;
        info!(username, "signed in");
        self.current()
    }

    pub async fn signup(
        &mut self,
        email: &str,
        password: &str,
        confirmation: &str,
        now: DateTime<Utc>,
    ) -> Result<&UserProfile, CoreError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(CoreError::Validation("Please enter an email".into()));
        }
        if password != confirmation {
            return Err(CoreError::Validation("Passwords do not match".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }
        let lowered = email.to_lowercase();
        if FIXTURE_ACCOUNTS
            .iter()
            .any(|account| account.username == lowered)
        {
            return Err(CoreError::Validation(
                "User already exists. Please try a different email or sign in instead.".into(),
            ));
        }

        let name = email.split('@').next().unwrap_or(email);
        let profile = UserProfile {
            name: name.to_string(),
            email: email.to_string(),
            age: 25,
            skin_type: "Normal".into(),
            hair_type: "Normal".into(),
            is_admin: false,
            avatar: "/placeholder-user.jpg".into(),
            is_logged_in: true,
            login_time: now,
        };
        self.store_user(profile).await?;
        info!(email, "account created");
        self.current()
    }

    pub async fn logout(&mut self) -> Result<(), CoreError> {
        self.store
            .remove(USER_KEY)
            .await
            .map_err(CoreError::storage)?;
        self.user = None;
        info!("signed out");
        Ok(())
    }

    async fn store_user(&mut self, profile: UserProfile) -> Result<(), CoreError> {
        save_json(&self.store, USER_KEY, &profile)
            .await
            .map_err(CoreError::storage)?;
        self.user = Some(profile);
        Ok(())
    }

    fn current(&self) -> Result<&UserProfile, CoreError> {
        self.user
            .as_ref()
            .ok_or_else(|| CoreError::Internal("session user missing after write".into()))
    }
}
