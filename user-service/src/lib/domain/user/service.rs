use std::sync::Arc;

use async_trait::async_trait;
use auth::AuthenticationError;
use auth::Authenticator;
use chrono::Utc;

use crate::domain::user::models::LoginCommand;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::UpdateUserCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::UserError;
use crate::user::ports::UserRepository;
use crate::user::ports::UserServicePort;

/// Domain service implementation for registration and login.
///
/// Concrete implementation of UserServicePort with dependency injection.
pub struct UserService<UR>
where
    UR: UserRepository,
{
    repository: Arc<UR>,
    authenticator: Arc<Authenticator>,
}

impl<UR> UserService<UR>
where
    UR: UserRepository,
{
    /// Create a new user service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User persistence implementation
    /// * `authenticator` - Password hashing and token issuance
    pub fn new(repository: Arc<UR>, authenticator: Arc<Authenticator>) -> Self {
        Self {
            repository,
            authenticator,
        }
    }

    fn hash_password(&self, password: &str) -> Result<String, UserError> {
        self.authenticator
            .hash_password(password)
            .map_err(|e| UserError::PasswordHashing(e.to_string()))
    }
}

#[async_trait]
impl<UR> UserServicePort for UserService<UR>
where
    UR: UserRepository,
{
    async fn register(&self, command: RegisterUserCommand) -> Result<User, UserError> {
        if self.repository.find_by_email(&command.email).await?.is_some() {
            tracing::info!("Registration rejected: email already registered");
            return Err(UserError::EmailAlreadyExists);
        }

        let password_hash = self.hash_password(command.password.expose())?;
        let user = User::new(command.username, command.email, password_hash);

        let created_user = self.repository.create(user).await?;
        tracing::info!(user_id = %created_user.id, "User registered");

        Ok(created_user)
    }

    async fn login(&self, command: LoginCommand) -> Result<String, UserError> {
        let Some(user) = self.repository.find_by_email(&command.email).await? else {
            tracing::debug!("Login rejected: unknown email");
            self.authenticator.reject_unknown_subject(command.password.expose());
            return Err(UserError::InvalidCredentials);
        };

        let result = self
            .authenticator
            .authenticate(
                command.password.expose(),
                &user.password_hash,
                &user.id.to_string(),
                user.email.as_str(),
            )
            .map_err(|e| match e {
                AuthenticationError::InvalidCredentials => {
                    tracing::debug!(user_id = %user.id, "Login rejected: password mismatch");
                    UserError::InvalidCredentials
                }
                AuthenticationError::JwtError(err) => UserError::TokenSigning(err.to_string()),
            })?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(result.access_token)
    }

    async fn get_user(&self, id: &UserId) -> Result<User, UserError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))
    }

    async fn update_user(
        &self,
        id: &UserId,
        command: UpdateUserCommand,
    ) -> Result<User, UserError> {
        let mut user = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))?;

        if let Some(new_username) = command.username {
            user.username = new_username;
        }

        if let Some(new_password) = command.password {
            user.password_hash = self.hash_password(new_password.expose())?;
        }

        user.updated_at = Utc::now();

        let updated_user = self.repository.update(user).await?;
        tracing::info!(user_id = %updated_user.id, "User updated");

        Ok(updated_user)
    }
}
