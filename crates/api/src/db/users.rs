//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shopfront_core::{Email, UserId, UserRole};

use super::{RepositoryError, conflict_on_unique};
use crate::models::user::{User, clean_optional};

const USER_COLUMNS: &str = "id, name, email, role, phone, address, city, district, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    role: UserRole,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    district: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: r.id,
            name: r.name,
            email,
            role: r.role,
            phone: r.phone,
            address: r.address,
            city: r.city,
            district: r.district,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserWithPasswordRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a Email,
    pub password_hash: &'a str,
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
    pub city: Option<&'a str>,
    pub district: Option<&'a str>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user and their password hash by email, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithPasswordRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM shop.user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((User::try_from(r.user)?, r.password_hash))),
            None => Ok(None),
        }
    }

    /// Create a customer account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: NewUser<'_>) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO shop.user (name, email, password_hash, phone, address, city, district)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(new.name.trim())
        .bind(new.email.as_str())
        .bind(new.password_hash)
        .bind(clean_optional(new.phone))
        .bind(clean_optional(new.address))
        .bind(clean_optional(new.city))
        .bind(clean_optional(new.district))
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("email already exists"))?;

        User::try_from(row)
    }

    /// Overwrite a user's profile fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_profile(&self, user: &User) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE shop.user
            SET name = $2, phone = $3, address = $4, city = $5, district = $6
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.city)
        .bind(&user.district)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(row)
    }
}
