use uuid::Uuid;

use super::Principal;
use crate::access::{Plan, Subscription};

/// Typed per-request state the access gate attaches before a handler runs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal: Option<Principal>,
    pub request_id: String,
    pub subscription: Option<Subscription>,
    pub plan: Option<Plan>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self { principal: None, request_id: Uuid::new_v4().to_string(), subscription: None, plan: None }
    }
}

impl RequestContext {
    pub fn for_principal(principal: Option<Principal>) -> Self {
        Self { principal, ..Self::default() }
    }

    pub fn is_authenticated(&self) -> bool { self.principal.is_some() }

    pub fn user_id(&self) -> Option<&str> { self.principal.as_ref().map(|p| p.user_id.as_str()) }
}
