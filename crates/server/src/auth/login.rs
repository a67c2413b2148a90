use crate::auth::password::PasswordHasher;
use crate::auth::throttle::LoginThrottle;
use crate::entity::user;
use crate::error::AuthError;
use crate::store::UserRepository;

/// Email/password login guarded by the failed-attempt throttle.
#[derive(Clone)]
pub struct Authenticator {
    users: UserRepository,
    hasher: PasswordHasher,
    throttle: LoginThrottle,
}

impl Authenticator {
    pub fn new(users: UserRepository, hasher: PasswordHasher, throttle: LoginThrottle) -> Self {
        Self {
            users,
            hasher,
            throttle,
        }
    }

    pub fn throttle(&self) -> &LoginThrottle {
        &self.throttle
    }

    /// Authenticate a user.
    ///
    /// A blocked (username, address) pair is refused before the password is
    /// looked at. Unknown email, wrong password and inactive account all look
    /// the same to the caller and count as a failure.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remote_addr: &str,
    ) -> Result<user::Model, AuthError> {
        if self.throttle.check(email, remote_addr).await? {
            tracing::warn!(remote_addr, "Login refused: too many failed attempts");
            return Err(AuthError::RateLimited);
        }

        // Every branch pays for one password verification.
        let user = match self.users.find_by_email(email).await? {
            Some(user) if self.hasher.check_password(&user, password) && user.is_active => user,
            found => {
                if found.is_none() {
                    self.hasher.verify_dummy(password);
                }
                self.throttle.record_failure(email, remote_addr).await?;
                tracing::info!(remote_addr, "Failed login attempt");
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.throttle.purge(email, remote_addr).await?;
        self.users.touch_last_login(&user.id).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user)
    }
}
