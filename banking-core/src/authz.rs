//! Identity and authorization: password hashing and session issuance are
//! both injected collaborators, mirroring the way `detectors::Detector` and
//! `connection::ConnectionManager` are swapped out in the teacher -- the
//! actual hashing primitive and token format are out of scope for this
//! service, only the shape of the seam is.

use std::hash::{Hash, Hasher};

use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;

use crate::database::DatabaseClient;
use crate::types::{Permission, User, UserId, UserStatus};
use crate::{Error, Result};

#[cfg_attr(test, automock)]
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> String;
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// Salted-hash stand-in for the real password KDF (bcrypt/argon2), which is
/// out of scope for this core -- only the seam matters. A fresh random salt
/// per call keeps two users with the same password from producing the same
/// stored hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPasswordHasher;

impl DefaultPasswordHasher {
    fn digest(salt: u64, plaintext: &str) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        salt.hash(&mut hasher);
        plaintext.hash(&mut hasher);
        hasher.finish()
    }
}

impl PasswordHasher for DefaultPasswordHasher {
    fn hash(&self, plaintext: &str) -> String {
        let salt = uuid::Uuid::new_v4().as_u128() as u64;
        format!("{salt:x}${:x}", Self::digest(salt, plaintext))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let Some((salt_hex, digest_hex)) = hash.split_once('$') else {
            return false;
        };
        let Ok(salt) = u64::from_str_radix(salt_hex, 16) else {
            return false;
        };
        format!("{:x}", Self::digest(salt, plaintext)) == digest_hex
    }
}

/// Session token minted on successful login. Format and lifetime are the
/// issuer's business; `AuthzContext` only ever compares the resolved user
/// against the required permission/ownership.
#[cfg_attr(test, automock)]
pub trait SessionIssuer: Send + Sync {
    fn issue(&self, user_id: UserId) -> String;
    fn resolve(&self, token: &str) -> Option<UserId>;
}

/// In-process session table. Tokens do not survive a restart -- acceptable
/// for this core since real deployments would swap this for a Redis-backed
/// issuer, but that's out of scope here (DESIGN NOTES §9).
#[derive(Debug, Default)]
pub struct InMemorySessionIssuer {
    tokens: DashMap<String, UserId>,
}

impl SessionIssuer for InMemorySessionIssuer {
    fn issue(&self, user_id: UserId) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), user_id);
        token
    }

    fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token).map(|entry| *entry.value())
    }
}

/// Lets `LoginService` and `Authenticator` share one issuer instance behind
/// an `Arc` -- tokens minted by the former must resolve against the same
/// table the latter reads, which two independently-constructed issuers
/// could never do.
impl<T: SessionIssuer + ?Sized> SessionIssuer for std::sync::Arc<T> {
    fn issue(&self, user_id: UserId) -> String {
        (**self).issue(user_id)
    }

    fn resolve(&self, token: &str) -> Option<UserId> {
        (**self).resolve(token)
    }
}

/// The authenticated caller, resolved once per request and threaded
/// through to every operation that needs an `initiated_by`/ownership check.
#[derive(Debug, Clone)]
pub struct AuthzContext {
    pub user: User,
}

impl AuthzContext {
    pub fn require_permission(&self, permission: Permission) -> Result<()> {
        if self.user.permissions().contains(&permission) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("missing permission {permission}")))
        }
    }

    pub fn require_any_permission(&self, permissions: &[Permission]) -> Result<()> {
        let held = self.user.permissions();
        if permissions.iter().any(|p| held.contains(p)) {
            Ok(())
        } else {
            Err(Error::Forbidden("missing required permission".into()))
        }
    }

    /// True when the caller is either the resource owner, or holds a
    /// permission that lets staff act on any customer's behalf.
    pub fn can_act_on_customer(&self, customer_id: crate::types::CustomerId, staff_permission: Permission) -> bool {
        self.user.customer_id == Some(customer_id) || self.user.permissions().contains(&staff_permission)
    }

    pub fn require_active(&self) -> Result<()> {
        if matches!(self.user.status, UserStatus::Active) {
            Ok(())
        } else {
            Err(Error::InvalidUserState(format!(
                "user {} is not active",
                self.user.id
            )))
        }
    }
}

/// Resolves a session token against the database into a fully-permissioned
/// `AuthzContext`. Calling this on every request is deliberate (no
/// in-process session cache): roles/permissions changing mid-session take
/// effect on the very next call.
pub struct Authenticator<S: SessionIssuer> {
    db: std::sync::Arc<DatabaseClient>,
    session_issuer: S,
}

impl<S: SessionIssuer> Authenticator<S> {
    pub fn new(db: std::sync::Arc<DatabaseClient>, session_issuer: S) -> Self {
        Self { db, session_issuer }
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthzContext> {
        let user_id = self.session_issuer.resolve(token).ok_or(Error::Unauthenticated)?;
        let user = self.db.get_user(user_id).await?;
        Ok(AuthzContext { user })
    }
}

/// Validates a username/password pair and mints a session token. Separate
/// from `Authenticator` because login needs the password hasher and
/// `Authenticator` (resolving an existing session) does not.
pub struct LoginService<H: PasswordHasher, S: SessionIssuer> {
    db: std::sync::Arc<DatabaseClient>,
    hasher: H,
    session_issuer: S,
}

impl<H: PasswordHasher, S: SessionIssuer> LoginService<H, S> {
    pub fn new(db: std::sync::Arc<DatabaseClient>, hasher: H, session_issuer: S) -> Self {
        Self { db, hasher, session_issuer }
    }

    /// `identifier` resolves against username, then email, then mobile, in
    /// that order (§4.2) -- whichever one the caller actually has to hand.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<(String, User)> {
        let user = self
            .db
            .find_user_by_login_identifier(identifier)
            .await?
            .ok_or(Error::Unauthenticated)?;

        if !self.hasher.verify(password, &user.password_hash) {
            return Err(Error::Unauthenticated);
        }

        if matches!(user.status, UserStatus::Rejected) {
            return Err(Error::InvalidUserState("account was rejected during onboarding".into()));
        }

        let token = self.session_issuer.issue(user.id);
        Ok((token, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, RoleName};
    use uuid::Uuid;

    fn user_with(permissions: &[Permission], status: UserStatus) -> User {
        User {
            id: Uuid::new_v4(),
            username: "jdoe".into(),
            email: "jdoe@example.com".into(),
            mobile: None,
            password_hash: "hash".into(),
            status,
            customer_id: Some(Uuid::new_v4()),
            roles: vec![Role {
                name: RoleName::Customer,
                permissions: permissions.iter().copied().collect(),
            }],
        }
    }

    #[test]
    fn require_permission_denies_without_grant() {
        let ctx = AuthzContext {
            user: user_with(&[Permission::AccountRead], UserStatus::Active),
        };
        assert!(ctx.require_permission(Permission::AccountRead).is_ok());
        assert!(ctx.require_permission(Permission::AccountWrite).is_err());
    }

    #[test]
    fn can_act_on_customer_allows_owner_or_staff() {
        let customer_id = Uuid::new_v4();
        let mut user = user_with(&[], UserStatus::Active);
        user.customer_id = Some(customer_id);
        let ctx = AuthzContext { user };
        assert!(ctx.can_act_on_customer(customer_id, Permission::AccountWrite));
        assert!(!ctx.can_act_on_customer(Uuid::new_v4(), Permission::AccountWrite));
    }

    #[test]
    fn require_active_rejects_non_active_status() {
        let ctx = AuthzContext {
            user: user_with(&[], UserStatus::PendingReview),
        };
        assert!(ctx.require_active().is_err());
    }

    #[test]
    fn password_hasher_round_trips() {
        let hasher = DefaultPasswordHasher;
        let hash = hasher.hash("correct-horse-battery-staple");
        assert!(hasher.verify("correct-horse-battery-staple", &hash));
        assert!(!hasher.verify("wrong-password", &hash));
    }

    #[test]
    fn password_hasher_salts_differently_each_time() {
        let hasher = DefaultPasswordHasher;
        assert_ne!(hasher.hash("same-password"), hasher.hash("same-password"));
    }

    #[test]
    fn session_issuer_resolves_only_issued_tokens() {
        let issuer = InMemorySessionIssuer::default();
        let user_id = Uuid::new_v4();
        let token = issuer.issue(user_id);
        assert_eq!(issuer.resolve(&token), Some(user_id));
        assert_eq!(issuer.resolve("not-a-real-token"), None);
    }
}
