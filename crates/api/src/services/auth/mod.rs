//! Authentication service.
//!
//! Password registration and login, plus profile edits.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use sqlx::PgPool;

use shopfront_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::user::{ProfileUpdate, User, clean_optional};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration form.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new customer account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidProfile` if the name is blank.
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, form: &Registration) -> Result<User, AuthError> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidProfile("Name is required".to_string()));
        }
        let email = Email::parse(&form.email)?;
        validate_password(&form.password)?;
        let password_hash = hash_password(&form.password)?;

        let user = self
            .users
            .create(NewUser {
                name,
                email: &email,
                password_hash: &password_hash,
                phone: form.phone.as_deref(),
                address: form.address.as_deref(),
                city: form.city.as_deref(),
                district: form.district.as_deref(),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_with_password(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Apply a profile update.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidProfile` if the new name is blank.
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, AuthError> {
        let mut user = self.get_user(user_id).await?;

        match update.normalized_name() {
            Some(Some(name)) => user.name = name,
            Some(None) => return Err(AuthError::InvalidProfile("Name is required".to_string())),
            None => {}
        }
        if let Some(phone) = &update.phone {
            user.phone = clean_optional(Some(phone));
        }
        if let Some(address) = &update.address {
            user.address = clean_optional(Some(address));
        }
        if let Some(city) = &update.city {
            user.city = clean_optional(Some(city));
        }
        if let Some(district) = &update.district {
            user.district = clean_optional(Some(district));
        }

        self.users.update_profile(&user).await.map_err(|e| match e {
            RepositoryError::NotFound => AuthError::UserNotFound,
            other => AuthError::Repository(other),
        })
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse battery", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
