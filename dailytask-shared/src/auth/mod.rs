/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and validation
/// - [`jwt`]: locally issued HS256 access and refresh tokens
/// - [`identity`]: external identity-provider verification
/// - [`middleware`]: the Axum authentication gate and `AuthContext`
/// - [`authorization`]: role and ownership policy
///
/// # Example
///
/// ```
/// use dailytask_shared::auth::password::{hash_password, verify_password};
/// use dailytask_shared::auth::jwt::{issue_token_pair, validate_access_token};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let secret = "a-secret-key-that-is-at-least-32-bytes";
/// let pair = issue_token_pair(Uuid::new_v4(), "ada@example.com", secret)?;
/// assert!(validate_access_token(&pair.token, secret).is_ok());
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod password;
