use super::auth::{AuthToken, AuthTokenValue, PasswordHasherKind};
use crate::error::{ServiceError, ServiceResult};
use crate::ids::UserId;
use crate::store::{FullStore, InsertOutcome};
use crate::validation::require_non_empty;
use anyhow::Context;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

pub struct UserManager {
    store: Arc<dyn FullStore>,
}

impl UserManager {
    pub fn new(store: Arc<dyn FullStore>) -> Self {
        Self { store }
    }

    /// Registers a new user with password credentials.
    pub fn register_user(
        &self,
        username: &str,
        password: &str,
        fullname: &str,
    ) -> ServiceResult<UserId> {
        require_non_empty("username", username)?;
        require_non_empty("password", password)?;
        require_non_empty("fullname", fullname)?;

        let hasher = PasswordHasherKind::Argon2;
        let salt = hasher.generate_b64_salt();
        let hash = hasher.hash(password.as_bytes(), &salt)?;

        match self
            .store
            .create_user(username, fullname, &salt, &hash, &hasher.to_string())?
        {
            InsertOutcome::Inserted(user_id) => {
                info!("Registered user {} as {}", username, user_id);
                Ok(user_id)
            }
            InsertOutcome::Duplicate => Err(ServiceError::conflict(format!(
                "Username {} is already taken",
                username
            ))),
            InsertOutcome::Skipped => Err(ServiceError::invariant("Failed to add user")),
        }
    }

    /// Checks the credentials and issues a fresh auth token.
    /// Unknown usernames and wrong passwords fail the same way.
    pub fn login(&self, username: &str, password: &str) -> ServiceResult<AuthToken> {
        let Some(credentials) = self.store.get_user_credentials(username)? else {
            debug!("Login attempt for unknown user {}", username);
            return Err(ServiceError::authorization(INVALID_CREDENTIALS));
        };

        let hasher: PasswordHasherKind = credentials
            .hasher
            .parse()
            .with_context(|| format!("Bad hasher stored for user {}", credentials.user_id))?;
        if !hasher.verify(password, &credentials.hash)? {
            debug!("Wrong password for user {}", username);
            return Err(ServiceError::authorization(INVALID_CREDENTIALS));
        }

        let token = AuthToken {
            value: AuthTokenValue::generate(),
            user_id: credentials.user_id,
            created: SystemTime::now(),
            last_used: None,
        };
        self.store.add_auth_token(&token)?;
        info!("User {} logged in", username);
        Ok(token)
    }

    /// Returns whether the token existed.
    pub fn logout(&self, token: &AuthTokenValue) -> ServiceResult<bool> {
        Ok(self.store.delete_auth_token(token)?)
    }

    pub fn get_auth_token(&self, value: &AuthTokenValue) -> anyhow::Result<Option<AuthToken>> {
        self.store.get_auth_token(value)
    }

    pub fn update_auth_token_last_used(&self, value: &AuthTokenValue) -> anyhow::Result<()> {
        self.store.touch_auth_token(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use tempfile::TempDir;

    fn create_manager() -> (UserManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::new(temp_dir.path().join("test.db")).unwrap();
        (UserManager::new(Arc::new(store)), temp_dir)
    }

    #[test]
    fn register_then_login() {
        let (manager, _dir) = create_manager();
        let user_id = manager
            .register_user("dicoding", "secret", "Dicoding Indonesia")
            .unwrap();

        let token = manager.login("dicoding", "secret").unwrap();
        assert_eq!(token.user_id, user_id);
        assert!(manager.get_auth_token(&token.value).unwrap().is_some());
    }

    #[test]
    fn duplicate_username_conflicts() {
        let (manager, _dir) = create_manager();
        manager.register_user("dicoding", "secret", "A").unwrap();
        let err = manager.register_user("dicoding", "other", "B").unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn bad_credentials_fail_the_same_way() {
        let (manager, _dir) = create_manager();
        manager.register_user("dicoding", "secret", "A").unwrap();

        let wrong_password = manager.login("dicoding", "nope").unwrap_err();
        let unknown_user = manager.login("nobody", "secret").unwrap_err();
        assert!(wrong_password.is_authorization());
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[test]
    fn empty_fields_are_rejected() {
        let (manager, _dir) = create_manager();
        assert!(matches!(
            manager.register_user("", "secret", "A"),
            Err(ServiceError::Invariant(_))
        ));
        assert!(matches!(
            manager.register_user("dicoding", "", "A"),
            Err(ServiceError::Invariant(_))
        ));
    }

    #[test]
    fn logout_deletes_token() {
        let (manager, _dir) = create_manager();
        manager.register_user("dicoding", "secret", "A").unwrap();
        let token = manager.login("dicoding", "secret").unwrap();

        assert!(manager.logout(&token.value).unwrap());
        assert!(manager.get_auth_token(&token.value).unwrap().is_none());
        assert!(!manager.logout(&token.value).unwrap());
    }
}
