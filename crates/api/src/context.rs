use campusdesk_auth::Principal;

/// The authenticated caller of a request, resolved by the auth middleware
/// from the bearer token and the stored user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
