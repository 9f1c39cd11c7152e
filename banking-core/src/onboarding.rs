//! Onboarding and admin workflow (§4.7): the `User`/`Customer` status
//! machines that gate every other component -- the Ledger and EFT engines
//! both refuse to move money for a customer who has not cleared admin
//! review, and account ownership checks have nothing to check against until
//! approval opens the first account.

use std::sync::Arc;

use uuid::Uuid;

use crate::database::DatabaseClient;
use crate::ids::{self, Clock};
use crate::types::*;
use crate::{Error, Result};

impl UserStatus {
    /// §4.7's state diagram, closed at the type level (DESIGN NOTES §9):
    /// `PENDING_DETAILS -> PENDING_REVIEW -> ACTIVE | REJECTED`, with
    /// `REJECTED -> PENDING_REVIEW` the one resubmission edge back in.
    pub fn transition(self, to: UserStatus) -> Result<UserStatus> {
        use UserStatus::*;
        let allowed = matches!(
            (self, to),
            (PendingDetails, PendingReview) | (PendingReview, Active) | (PendingReview, Rejected) | (Rejected, PendingReview)
        );
        if allowed {
            Ok(to)
        } else {
            Err(Error::InvalidUserState(format!("cannot move from {self:?} to {to:?}")))
        }
    }

    /// Only these two starting states may submit (or resubmit) customer
    /// details; any other attempt is `INVALID_USER_STATE` per §4.7.
    pub fn can_submit_customer_details(self) -> bool {
        matches!(self, UserStatus::PendingDetails | UserStatus::Rejected)
    }
}

impl CustomerStatus {
    /// Mirrors `UserStatus` (§4.7): `PENDING_REVIEW -> ACTIVE | REJECTED`,
    /// and `REJECTED -> PENDING_REVIEW` on resubmission.
    pub fn transition(self, to: CustomerStatus) -> Result<CustomerStatus> {
        use CustomerStatus::*;
        let allowed = matches!((self, to), (PendingReview, Active) | (PendingReview, Rejected) | (Rejected, PendingReview));
        if allowed {
            Ok(to)
        } else {
            Err(Error::InvalidCustomerState(format!("cannot move from {self:?} to {to:?}")))
        }
    }
}

/// Everything a customer-details submission carries. `otherInfo`'s address
/// half (DESIGN NOTES §9: typed replacement for the source's free-form JSON
/// blob) lives here; the rejection-reason half is written only by `reject`.
#[derive(Debug, Clone)]
pub struct CustomerDetailsSubmission {
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub address: Address,
}

/// Registration, submission, and admin approve/reject -- the write path of
/// the onboarding state machine. Read paths (`list_users_by_status`,
/// `list_pending_customers`) are thin enough to call `DatabaseClient`
/// directly from `http.rs`.
pub struct OnboardingService {
    db: Arc<DatabaseClient>,
    clock: Arc<dyn Clock>,
}

impl OnboardingService {
    pub fn new(db: Arc<DatabaseClient>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// §4.2 registration: `PENDING_DETAILS`, default role `CUSTOMER`, no
    /// linked `Customer` yet. Uniqueness on username/email (mobile, if
    /// given) is the database's unique indexes; a conflict surfaces as
    /// `Error::Conflict` here rather than a raw constraint-violation string.
    pub async fn register(&self, username: String, email: String, mobile: Option<String>, password_hash: String) -> Result<User> {
        if self.db.get_user_by_username(&username).await?.is_some() {
            return Err(Error::Conflict(format!("username '{username}' is already taken")));
        }
        if self.db.get_user_by_email(&email).await?.is_some() {
            return Err(Error::Conflict(format!("email '{email}' is already registered")));
        }
        if let Some(m) = &mobile {
            if self.db.get_user_by_mobile(m).await?.is_some() {
                return Err(Error::Conflict(format!("mobile '{m}' is already registered")));
            }
        }

        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            mobile,
            password_hash,
            status: UserStatus::PendingDetails,
            customer_id: None,
            roles: vec![],
        };

        let mut client = self.db.pool().get().await.map_err(Error::Pool)?;
        let tx = client.transaction().await.map_err(Error::Database)?;
        self.db.insert_user(&tx, &user).await?;
        self.db.assign_role(&tx, user.id, RoleName::Customer).await?;
        tx.commit().await.map_err(Error::Database)?;

        Ok(User {
            roles: vec![Role {
                name: RoleName::Customer,
                permissions: std::collections::HashSet::from([Permission::AccountRead, Permission::UserRead, Permission::TransactionRead]),
            }],
            ..user
        })
    }

    /// Submit or resubmit customer details (§4.7). Legal only from
    /// `PENDING_DETAILS` (first submission, creates the `Customer` row) or
    /// `REJECTED` (resubmission, overwrites the existing row and wipes the
    /// rejection reason). Both paths land the user and customer in
    /// `PENDING_REVIEW`; neither opens an account -- that is approval's job.
    pub async fn submit_customer_details(&self, user_id: UserId, submission: CustomerDetailsSubmission) -> Result<Customer> {
        let user = self.db.get_user(user_id).await?;
        if !user.status.can_submit_customer_details() {
            return Err(Error::InvalidUserState(format!(
                "user {} in status {:?} may not submit customer details",
                user_id, user.status
            )));
        }
        user.status.transition(UserStatus::PendingReview)?;

        let other_info = CustomerOtherInfo {
            address: Some(submission.address),
            rejection_reason: None,
        };

        let mut client = self.db.pool().get().await.map_err(Error::Pool)?;
        let tx = client.transaction().await.map_err(Error::Database)?;

        let customer = match self.db.get_customer_by_user_id(user_id).await? {
            Some(existing) => {
                existing.status.transition(CustomerStatus::PendingReview)?;
                self.db
                    .update_customer_details_tx(&tx, existing.id, &submission.first_name, &submission.last_name, &submission.national_id, &other_info)
                    .await?;
                Customer {
                    first_name: submission.first_name,
                    last_name: submission.last_name,
                    national_id: submission.national_id,
                    status: CustomerStatus::PendingReview,
                    other_info,
                    ..existing
                }
            }
            None => {
                let customer = Customer {
                    id: Uuid::new_v4(),
                    customer_number: ids::customer_number(),
                    user_id,
                    first_name: submission.first_name,
                    last_name: submission.last_name,
                    national_id: submission.national_id,
                    status: CustomerStatus::PendingReview,
                    other_info,
                };
                self.db.insert_customer(&tx, &customer).await?;
                self.db.link_customer(&tx, user_id, customer.id).await?;
                customer
            }
        };

        self.db.update_user_status_tx(&tx, user_id, UserStatus::PendingReview).await?;
        tx.commit().await.map_err(Error::Database)?;

        Ok(customer)
    }

    /// Admin approval (§4.7): the only path that opens accounts. One default
    /// `SAVINGS` account is created for the approved customer in the same
    /// unit of work as the status flip, so a crash mid-approval never leaves
    /// a customer `ACTIVE` with zero accounts.
    pub async fn approve(&self, customer_id: CustomerId, default_minimum_balance: Money, default_currency: &str) -> Result<Account> {
        let customer = self.db.get_customer(customer_id).await?;
        customer.status.transition(CustomerStatus::Active)?;

        let mut client = self.db.pool().get().await.map_err(Error::Pool)?;
        let tx = client.transaction().await.map_err(Error::Database)?;

        self.db.update_customer_status_tx(&tx, customer_id, CustomerStatus::Active, None).await?;
        self.db.update_user_status_tx(&tx, customer.user_id, UserStatus::Active).await?;

        let now = self.clock.now();
        let account = Account {
            id: Uuid::new_v4(),
            account_number: ids::account_number(),
            customer_id,
            account_type: AccountType::Savings,
            balance: Money::ZERO,
            available_balance: Money::ZERO,
            minimum_balance: default_minimum_balance,
            currency: default_currency.to_string(),
            status: AccountStatus::Active,
            last_transaction_date: Some(now),
        };
        self.db.insert_account(&tx, &account).await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(account)
    }

    /// Admin rejection (§4.7): the reason is merged into `Customer.otherInfo`
    /// (DESIGN NOTES §9's typed replacement for the source's free-form JSON
    /// blob), not a bare string column, so a later resubmission's "wipe the
    /// rejection reason" step has exactly one field to clear.
    pub async fn reject(&self, customer_id: CustomerId, reason: String) -> Result<()> {
        let customer = self.db.get_customer(customer_id).await?;
        customer.status.transition(CustomerStatus::Rejected)?;

        let mut client = self.db.pool().get().await.map_err(Error::Pool)?;
        let tx = client.transaction().await.map_err(Error::Database)?;
        self.db.update_customer_status_tx(&tx, customer_id, CustomerStatus::Rejected, Some(&reason)).await?;
        self.db.update_user_status_tx(&tx, customer.user_id, UserStatus::Rejected).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    pub async fn list_pending_details(&self) -> Result<Vec<User>> {
        self.db.list_users_by_status(UserStatus::PendingDetails).await
    }

    pub async fn list_pending_review(&self) -> Result<Vec<Customer>> {
        self.db.list_pending_customers().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        assert_eq!(
            UserStatus::PendingDetails.transition(UserStatus::PendingReview).unwrap(),
            UserStatus::PendingReview
        );
        assert_eq!(UserStatus::PendingReview.transition(UserStatus::Active).unwrap(), UserStatus::Active);
        assert_eq!(UserStatus::PendingReview.transition(UserStatus::Rejected).unwrap(), UserStatus::Rejected);
        assert_eq!(
            UserStatus::Rejected.transition(UserStatus::PendingReview).unwrap(),
            UserStatus::PendingReview
        );
    }

    #[test]
    fn active_is_terminal_for_the_happy_path() {
        assert!(UserStatus::Active.transition(UserStatus::PendingReview).is_err());
        assert!(UserStatus::Active.transition(UserStatus::Rejected).is_err());
    }

    #[test]
    fn cannot_skip_review() {
        assert!(UserStatus::PendingDetails.transition(UserStatus::Active).is_err());
    }

    #[test]
    fn only_pending_details_or_rejected_may_submit() {
        assert!(UserStatus::PendingDetails.can_submit_customer_details());
        assert!(UserStatus::Rejected.can_submit_customer_details());
        assert!(!UserStatus::PendingReview.can_submit_customer_details());
        assert!(!UserStatus::Active.can_submit_customer_details());
    }

    #[test]
    fn customer_status_mirrors_user_status() {
        assert_eq!(
            CustomerStatus::PendingReview.transition(CustomerStatus::Active).unwrap(),
            CustomerStatus::Active
        );
        assert!(CustomerStatus::Active.transition(CustomerStatus::Rejected).is_err());
    }
}
