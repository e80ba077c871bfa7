use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    db::UserStore,
    error::{AppError, Result},
    models::user::{Role, TokenResponse, User},
};

/// JWT claims issued at login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::Auth("Invalid token subject".into()))
    }
}

/// HS256 signing material
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiration_hours: i64,
}

impl JwtKeys {
    pub fn new(secret: &str, expiration_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiration_hours,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let expires_at = TimeDelta::try_hours(self.expiration_hours)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| AppError::Internal("Token lifetime out of range".into()))?;
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Auth("Invalid or expired token".into()))
    }
}

/// Hash a password into an Argon2 PHC string with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill(&mut salt_bytes[..]);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to encode salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Hashing off the async executor
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

/// Login and credential management
#[derive(Clone)]
pub struct AuthService {
    user_store: UserStore,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(user_store: UserStore, keys: JwtKeys) -> Self {
        Self { user_store, keys }
    }

    /// Check credentials and issue a bearer token
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let user = self
            .user_store
            .find_by_username(username.trim())
            .await?
            .ok_or_else(|| AppError::Auth("Incorrect username or password".into()))?;

        let candidate = password.to_string();
        let stored = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&candidate, &stored))
            .await
            .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?;

        if !valid {
            tracing::info!("Failed login for {}", user.username);
            return Err(AppError::Auth("Incorrect username or password".into()));
        }

        let access_token = self.keys.issue(&user)?;
        tracing::info!("User {} ({}) logged in", user.username, user.id);

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".into(),
            role: user.role,
            username: user.username,
            user_id: user.id,
        })
    }

    /// Resolve a bearer token to the live user record
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.keys.verify(token)?;
        match self.user_store.get_user_by_id(claims.user_id()?).await {
            Ok(user) => Ok(user),
            Err(AppError::NotFound(_)) => Err(AppError::Auth("User no longer exists".into())),
            Err(e) => Err(e),
        }
    }

    pub async fn change_password(&self, user_id: i64, password: &str) -> Result<()> {
        let hash = hash_password_blocking(password.to_string()).await?;
        self.user_store.update_password(user_id, &hash).await?;
        tracing::info!("Password changed for user {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: 42,
            username: "ops".into(),
            password_hash: String::new(),
            role,
            car_id: None,
        }
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn token_round_trips_subject_and_role() {
        let keys = JwtKeys::new("test-secret", 1);
        let token = keys.issue(&user(Role::Admin)).unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = JwtKeys::new("one", 1).issue(&user(Role::Driver)).unwrap();
        let err = JwtKeys::new("two", 1).verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = JwtKeys::new("test-secret", -2);
        let token = keys.issue(&user(Role::Driver)).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn oversized_lifetime_is_an_error() {
        let keys = JwtKeys::new("test-secret", i64::MAX);
        let err = keys.issue(&user(Role::Driver)).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
