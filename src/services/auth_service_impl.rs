//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::{AdminSeedConfig, SecurityConfig};
use crate::db::{Store, is_unique_violation};
use crate::models::{User, UserRole};
use crate::services::auth_service::{AuthError, AuthService, LoginResult};

pub struct SeaOrmAuthService {
    store: Store,
    clock: Arc<dyn Clock>,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, clock: Arc<dyn Clock>, security: SecurityConfig) -> Self {
        Self {
            store,
            clock,
            security,
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.trim().is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let Some(user) = self
            .store
            .user_repo()
            .verify_password(username, password)
            .await?
        else {
            warn!(username, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        };

        let now = self.clock.now();
        let sessions = self.store.session_repo();

        match sessions.purge_expired(now).await {
            Ok(0) => {}
            Ok(purged) => info!(purged, "Purged expired sessions"),
            Err(e) => warn!("Failed to purge expired sessions: {e}"),
        }

        let expires_at = Duration::try_hours(self.security.session_ttl_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AuthError::Internal(format!(
                    "Session TTL of {} hours is out of range",
                    self.security.session_ttl_hours
                ))
            })?;
        let token = generate_session_token();
        sessions.create(user.id, &token, expires_at).await?;

        info!(user_id = user.id, username = %user.username, "User logged in");

        Ok(LoginResult { token, user })
    }

    async fn resolve_user(&self, token: &str) -> Result<Option<User>, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }

        let Some(session) = self.store.session_repo().find_with_user(token).await? else {
            return Ok(None);
        };

        if session.expires_at > self.clock.now() {
            Ok(Some(User::from(session.user)))
        } else {
            Ok(None)
        }
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.store.session_repo().delete_by_token(token).await?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.store.user_repo().list().await?)
    }

    async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.trim().is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let users = self.store.user_repo();

        if users.get_by_username(username).await?.is_some() {
            return Err(AuthError::DuplicateUsername(username.to_string()));
        }

        let user = users
            .create(username, password, role, &self.security)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AuthError::DuplicateUsername(username.to_string())
                } else {
                    AuthError::from(e)
                }
            })?;

        info!(user_id = user.id, username = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    async fn update_user(
        &self,
        id: i32,
        role: Option<UserRole>,
        password: Option<&str>,
    ) -> Result<User, AuthError> {
        let password = password.filter(|p| !p.trim().is_empty());

        let user = self
            .store
            .user_repo()
            .update(id, role, password, &self.security)
            .await?
            .ok_or(AuthError::UserNotFound(id))?;

        info!(
            user_id = id,
            role_changed = role.is_some(),
            password_changed = password.is_some(),
            "User updated"
        );
        Ok(user)
    }

    async fn delete_user(&self, actor: &User, id: i32) -> Result<(), AuthError> {
        if actor.id == id {
            return Err(AuthError::Validation(
                "You cannot delete your own account".to_string(),
            ));
        }

        if !self.store.user_repo().delete(id).await? {
            return Err(AuthError::UserNotFound(id));
        }

        info!(user_id = id, deleted_by = actor.id, "User deleted");
        Ok(())
    }

    async fn seed_admin(&self, seed: &AdminSeedConfig) -> Result<bool, AuthError> {
        let Some((username, password)) = seed.credentials() else {
            return Ok(false);
        };

        if self.store.user_repo().count().await? > 0 {
            return Ok(false);
        }

        self.create_user(username, password, UserRole::Admin).await?;
        info!(username, "Seeded initial admin user");
        Ok(true)
    }
}

/// Generate a random session token (64 character hex string)
#[must_use]
pub fn generate_session_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    async fn service() -> (SeaOrmAuthService, MockClock) {
        let db_path =
            std::env::temp_dir().join(format!("phantom-sales-auth-{}.db", uuid::Uuid::new_v4()));
        let store = Store::new(&format!("sqlite:{}", db_path.display()))
            .await
            .unwrap();
        let clock = MockClock::default();
        let security = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        };
        (
            SeaOrmAuthService::new(store, Arc::new(clock.clone()), security),
            clock,
        )
    }

    #[test]
    fn test_session_token_shape() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_session_valid_until_ttl() {
        let (auth, clock) = service().await;
        auth.create_user("seller1", "pw", UserRole::Seller)
            .await
            .unwrap();

        let login = auth.login(" seller1 ", "pw").await.unwrap();
        assert_eq!(login.user.username, "seller1");
        assert_eq!(login.user.role, UserRole::Seller);

        clock.advance(Duration::hours(11) + Duration::minutes(59));
        let resolved = auth.resolve_user(&login.token).await.unwrap().unwrap();
        assert_eq!(resolved.id, login.user.id);

        clock.advance(Duration::minutes(1));
        assert!(auth.resolve_user(&login.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (auth, _) = service().await;
        auth.create_user("admin", "secret", UserRole::Admin)
            .await
            .unwrap();

        assert!(matches!(
            auth.login("admin", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "secret").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("", "secret").await,
            Err(AuthError::Validation(_))
        ));
        assert!(auth.resolve_user("not-a-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_session_ttl_is_an_error() {
        let (auth, clock) = service().await;
        auth.create_user("seller1", "pw", UserRole::Seller)
            .await
            .unwrap();

        let auth = SeaOrmAuthService::new(
            auth.store.clone(),
            Arc::new(clock),
            SecurityConfig {
                session_ttl_hours: i64::MAX,
                ..auth.security.clone()
            },
        );

        assert!(matches!(
            auth.login("seller1", "pw").await,
            Err(AuthError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let (auth, _) = service().await;
        auth.create_user("u", "p", UserRole::Seller).await.unwrap();
        let login = auth.login("u", "p").await.unwrap();

        auth.logout(&login.token).await.unwrap();
        assert!(auth.resolve_user(&login.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_management() {
        let (auth, _) = service().await;
        let admin = auth.create_user("root", "pw", UserRole::Admin).await.unwrap();

        assert!(matches!(
            auth.create_user("root", "other", UserRole::Seller).await,
            Err(AuthError::DuplicateUsername(_))
        ));

        let seller = auth.create_user("bob", "pw", UserRole::Seller).await.unwrap();
        let updated = auth
            .update_user(seller.id, Some(UserRole::Admin), Some("new-pw"))
            .await
            .unwrap();
        assert_eq!(updated.role, UserRole::Admin);
        assert!(auth.login("bob", "new-pw").await.is_ok());
        assert!(auth.login("bob", "pw").await.is_err());

        let usernames: Vec<_> = auth
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(usernames, vec!["bob", "root"]);

        assert!(matches!(
            auth.delete_user(&admin, admin.id).await,
            Err(AuthError::Validation(_))
        ));

        let bob_session = auth.login("bob", "new-pw").await.unwrap();
        auth.delete_user(&admin, seller.id).await.unwrap();
        assert!(auth.resolve_user(&bob_session.token).await.unwrap().is_none());
        assert!(matches!(
            auth.delete_user(&admin, seller.id).await,
            Err(AuthError::UserNotFound(_))
        ));
        assert!(matches!(
            auth.update_user(999, None, None).await,
            Err(AuthError::UserNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_seed_admin_only_when_empty() {
        let (auth, _) = service().await;
        let seed = AdminSeedConfig {
            username: Some("boss".to_string()),
            password: Some("pw".to_string()),
        };

        assert!(!auth.seed_admin(&AdminSeedConfig::default()).await.unwrap());
        assert!(auth.seed_admin(&seed).await.unwrap());
        assert!(!auth.seed_admin(&seed).await.unwrap());

        let login = auth.login("boss", "pw").await.unwrap();
        assert_eq!(login.user.role, UserRole::Admin);
    }
}
