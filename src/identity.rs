//! Caller identity as asserted by the upstream identity provider.
//!
//! Nothing here authenticates anyone. The provider has already done that;
//! these types only carry its verdict into the services.

use crate::EcommerceError;

pub const ADMIN_ROLE: &str = "admin";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Proof that the caller carries the admin role. Only [`Caller::admin`] hands these out.
#[derive(Debug)]
pub struct AdminGrant {
    _private: (),
}

impl Caller {
    pub fn anonymous() -> Self { Self::default() }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()), ..Self::default() }
    }

    pub fn admin_user(user_id: impl Into<String>) -> Self {
        Self { role: Some(ADMIN_ROLE.to_string()), ..Self::user(user_id) }
    }

    pub fn is_signed_in(&self) -> bool { self.user_id.as_deref().is_some_and(|id| !id.is_empty()) }
    pub fn is_admin(&self) -> bool { self.is_signed_in() && self.role.as_deref() == Some(ADMIN_ROLE) }

    pub fn admin(&self) -> Result<AdminGrant, EcommerceError> {
        if !self.is_signed_in() {
            return Err(EcommerceError::Unauthorized);
        }
        if !self.is_admin() {
            return Err(EcommerceError::Forbidden);
        }
        Ok(AdminGrant { _private: () })
    }

    /// Orders may be placed by the user they belong to, or by an admin on anyone's behalf.
    pub fn authorize_placement(&self, user_id: &str) -> Result<(), EcommerceError> {
        if !self.is_signed_in() {
            return Err(EcommerceError::Unauthorized);
        }
        if self.is_admin() || self.user_id.as_deref() == Some(user_id) {
            Ok(())
        } else {
            Err(EcommerceError::Forbidden)
        }
    }

    /// The caller's own email, offered only for their own orders.
    pub fn email_for(&self, user_id: &str) -> Option<&str> {
        if self.user_id.as_deref() == Some(user_id) { self.email.as_deref() } else { None }
    }

    /// Resolves which user's orders a listing covers. `None` means every order.
    pub fn order_scope(&self, requested: Option<String>) -> Result<Option<String>, EcommerceError> {
        if self.is_admin() {
            return Ok(requested);
        }
        let own = self.user_id.clone().filter(|id| !id.is_empty()).ok_or(EcommerceError::Unauthorized)?;
        match requested {
            Some(other) if other != own => Err(EcommerceError::Forbidden),
            _ => Ok(Some(own)),
        }
    }
}
