use chrono::Utc;
use uuid::Uuid;

use crate::password::{hash_password, verify_password};
use crate::repository::Repositories;
use crate::user::{check_password, normalize_email, require_name, NewUser, ProfileUpdate, User};
use crate::{CoreError, CoreResult};

/// Registration, login and profile management for reseller accounts.
#[derive(Clone)]
pub struct AccountService {
    repos: Repositories,
}

impl AccountService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Self-service sign up. Never grants admin rights.
    pub async fn register(&self, new_user: NewUser) -> CoreResult<User> {
        self.create(NewUser {
            is_admin: false,
            ..new_user
        })
        .await
    }

    /// Admin-side account creation, may grant admin rights.
    pub async fn create_user(&self, new_user: NewUser) -> CoreResult<User> {
        self.create(new_user).await
    }

    async fn create(&self, new_user: NewUser) -> CoreResult<User> {
        let name = require_name(&new_user.name)?;
        let email = normalize_email(&new_user.email)?;
        check_password(&new_user.password)?;

        let user = User {
            id: Uuid::new_v4(),
            name,
            email,
            phone: new_user.phone.trim().to_string(),
            is_admin: new_user.is_admin,
            password_hash: hash_password(&new_user.password),
            created_at: Utc::now(),
        };
        self.repos.users.create_user(&user).await?;
        tracing::info!("User {} registered (role {})", user.id, user.role());
        Ok(user)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> CoreResult<User> {
        let invalid = || CoreError::Unauthorized("invalid email or password".into());
        let email = email.trim().to_lowercase();

        let user = self.repos.users.find_user_by_email(&email).await?.ok_or_else(invalid)?;
        if !verify_password(password, &user.password_hash) {
            tracing::debug!("Failed login for user {}", user.id);
            return Err(invalid());
        }
        Ok(user)
    }

    pub async fn profile(&self, id: Uuid) -> CoreResult<User> {
        self.repos
            .users
            .get_user(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {}", id)))
    }

    pub async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> CoreResult<User> {
        let mut user = self.profile(id).await?;
        if let Some(name) = update.name {
            user.name = require_name(&name)?;
        }
        if let Some(email) = update.email {
            user.email = normalize_email(&email)?;
        }
        if let Some(phone) = update.phone {
            user.phone = phone.trim().to_string();
        }
        self.repos.users.update_user(&user).await?;
        Ok(user)
    }

    pub async fn change_password(&self, id: Uuid, current: &str, new: &str) -> CoreResult<()> {
        let mut user = self.profile(id).await?;
        if !verify_password(current, &user.password_hash) {
            return Err(CoreError::Unauthorized("current password is incorrect".into()));
        }
        check_password(new)?;
        user.password_hash = hash_password(new);
        self.repos.users.update_user(&user).await?;
        tracing::info!("User {} changed password", id);
        Ok(())
    }

    pub async fn list_users(&self) -> CoreResult<Vec<User>> {
        self.repos.users.list_users().await
    }

    /// Removes an account and everything it owns.
    pub async fn delete_user(&self, actor_id: Uuid, id: Uuid) -> CoreResult<()> {
        if actor_id == id {
            return Err(CoreError::Forbidden("admins cannot delete their own account".into()));
        }
        self.repos.users.delete_user(id).await?;
        tracing::info!("User {} deleted by {}", id, actor_id);
        Ok(())
    }
}
