use async_trait::async_trait;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::LoginCommand;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::UpdateUserCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::UserError;

/// Port for user domain service operations.
#[async_trait]
pub trait UserServicePort: Send + Sync + 'static {
    /// Register a new user.
    ///
    /// # Arguments
    /// * `command` - Validated command containing username, email, and password
    ///
    /// # Returns
    /// Stored user entity
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `PasswordHashing` - Password could not be hashed
    /// * `Storage` - Store operation failed
    async fn register(&self, command: RegisterUserCommand) -> Result<User, UserError>;

    /// Exchange credentials for a signed access token.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email or wrong password (indistinguishable)
    /// * `TokenSigning` - Token could not be issued
    /// * `Storage` - Store operation failed
    async fn login(&self, command: LoginCommand) -> Result<String, UserError>;

    /// Retrieve user by unique identifier.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `Storage` - Store operation failed
    async fn get_user(&self, id: &UserId) -> Result<User, UserError>;

    /// Update display name and/or password of an existing user.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `PasswordHashing` - New password could not be hashed
    /// * `Storage` - Store operation failed
    async fn update_user(&self, id: &UserId, command: UpdateUserCommand)
        -> Result<User, UserError>;
}

/// Persistence operations for user aggregate.
///
/// Implementations must make `create` atomic with respect to the email
/// uniqueness check: of two concurrent creates with the same email, at most
/// one succeeds.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist new user to storage.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `Storage` - Store operation failed
    async fn create(&self, user: User) -> Result<User, UserError>;

    /// Retrieve user by email address (exact match).
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError>;

    /// Retrieve user by identifier.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;

    /// Replace an existing user record.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `EmailAlreadyExists` - New email belongs to another user
    /// * `Storage` - Store operation failed
    async fn update(&self, user: User) -> Result<User, UserError>;
}
