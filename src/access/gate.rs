use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::audit::{QueryLogEntry, QueryLogSink};
use super::clock::Clock;
use super::repo::SubscriptionRepo;
use super::subscription::Subscription;
use super::tier::{Feature, Plan, PlanCatalog, Tier};
use crate::identity::{Principal, RequestContext};

/// Machine-readable reason a request was refused. Serialized with a `reason` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason")]
pub enum Denial {
    AuthenticationRequired,
    QuotaExceeded { used: u32, limit: u32, tier: Tier },
    TierInsufficient { current: Tier, required: Tier },
    FeatureUnavailable { feature: Feature, current: Tier },
    HistoryInsufficient { available: u32, required: u32 },
    SubscriptionRequired,
}

impl Denial {
    pub fn http_status(&self) -> u16 {
        match self {
            Denial::AuthenticationRequired => 401,
            Denial::QuotaExceeded { .. } => 429,
            Denial::TierInsufficient { .. }
            | Denial::FeatureUnavailable { .. }
            | Denial::HistoryInsufficient { .. }
            | Denial::SubscriptionRequired => 403,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Denial::AuthenticationRequired => "Please log in to access ICFES Analytics".into(),
            Denial::QuotaExceeded { limit, .. } => format!("You have reached your daily limit of {} queries", limit),
            Denial::TierInsufficient { required, .. } => format!("This feature requires {} plan or higher", required),
            Denial::FeatureUnavailable { feature, .. } => format!("Upgrade your plan to access {}", feature.label()),
            Denial::HistoryInsufficient { required, .. } => {
                format!("This feature requires access to at least {} years of data", required)
            }
            Denial::SubscriptionRequired => "Please subscribe to access this feature".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    MinTier(Tier),
    Feature(Feature),
    Years(u32),
}

pub fn require_tier(ctx: &RequestContext, min: Tier) -> Result<(), Denial> {
    let plan = ctx.plan.as_ref().ok_or(Denial::SubscriptionRequired)?;
    if plan.tier.satisfies(min) { Ok(()) } else { Err(Denial::TierInsufficient { current: plan.tier, required: min }) }
}

pub fn require_feature(ctx: &RequestContext, feature: Feature) -> Result<(), Denial> {
    let plan = ctx.plan.as_ref().ok_or(Denial::SubscriptionRequired)?;
    if plan.has(feature) { Ok(()) } else { Err(Denial::FeatureUnavailable { feature, current: plan.tier }) }
}

pub fn require_years(ctx: &RequestContext, years: u32) -> Result<(), Denial> {
    let plan = ctx.plan.as_ref().ok_or(Denial::SubscriptionRequired)?;
    if plan.years_of_data >= years {
        Ok(())
    } else {
        Err(Denial::HistoryInsufficient { available: plan.years_of_data, required: years })
    }
}

pub fn check(ctx: &RequestContext, req: Requirement) -> Result<(), Denial> {
    match req {
        Requirement::MinTier(t) => require_tier(ctx, t),
        Requirement::Feature(f) => require_feature(ctx, f),
        Requirement::Years(y) => require_years(ctx, y),
    }
}

/// Which paths the gate covers, which of those are free to call, and what the rest need.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    pub covered_prefix: String,
    pub exempt: Vec<String>,
    pub routes: Vec<(String, Vec<Requirement>)>,
}

impl AccessPolicy {
    pub fn standard() -> Self {
        let exempt = [
            "/icfes/api/mapa-estudiantes-heatmap/",
            "/icfes/api/mapa-departamentos/",
            "/icfes/api/mapa-municipios/",
            "/icfes/api/estadisticas/",
            "/icfes/api/anos/",
            "/icfes/api/charts/",
            "/icfes/api/hierarchy/",
            "/icfes/api/search/colegios/",
            "/icfes/api/generate-ai-analysis/",
            "/icfes/api/colegios/destacados/",
            "/icfes/api/colegio/",
            "/icfes/api/uso/",
        ];
        AccessPolicy {
            covered_prefix: "/icfes/api/".into(),
            exempt: exempt.iter().map(|s| s.to_string()).collect(),
            routes: Vec::new(),
        }
        .with_route("/icfes/api/municipios/", vec![Requirement::Feature(Feature::Municipalities)])
        .with_route("/icfes/api/historico/", vec![Requirement::MinTier(Tier::Basic), Requirement::Feature(Feature::Schools)])
    }

    pub fn with_route<S: Into<String>>(mut self, prefix: S, reqs: Vec<Requirement>) -> Self {
        self.routes.push((prefix.into(), reqs));
        self
    }

    pub fn covers(&self, path: &str) -> bool { path.starts_with(&self.covered_prefix) }

    pub fn is_exempt(&self, path: &str) -> bool { self.exempt.iter().any(|p| path.starts_with(p.as_str())) }

    pub fn requirements_for(&self, path: &str) -> Vec<Requirement> {
        self.routes.iter().filter(|(p, _)| path.starts_with(p.as_str())).flat_map(|(_, r)| r.iter().copied()).collect()
    }
}

/// A request the gate let through. Hand it back to `AccessGate::complete` after responding.
#[derive(Debug, Clone)]
pub struct Admission {
    pub context: RequestContext,
    pub path: String,
    /// Counts against the daily quota once the response is known to be 2xx.
    pub counted: bool,
    pub started: Instant,
}

#[derive(Debug, Clone)]
pub enum Verdict {
    Allow(Admission),
    Deny(Denial),
}

/// Today's usage for one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub tier: Tier,
    pub plan: String,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
}

pub struct AccessGate {
    policy: AccessPolicy,
    catalog: PlanCatalog,
    subscriptions: Arc<dyn SubscriptionRepo>,
    log: Arc<dyn QueryLogSink>,
    clock: Arc<dyn Clock>,
}

impl AccessGate {
    pub fn new(
        policy: AccessPolicy,
        catalog: PlanCatalog,
        subscriptions: Arc<dyn SubscriptionRepo>,
        log: Arc<dyn QueryLogSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { policy, catalog, subscriptions, log, clock }
    }

    pub fn policy(&self) -> &AccessPolicy { &self.policy }

    pub fn catalog(&self) -> &PlanCatalog { &self.catalog }

    /// Decide on a request before its handler runs.
    pub fn admit(&self, path: &str, principal: Option<Principal>) -> Result<Verdict> {
        let mut ctx = RequestContext::for_principal(principal);
        if !self.policy.covers(path) {
            return Ok(Verdict::Allow(Admission { context: ctx, path: path.to_string(), counted: false, started: Instant::now() }));
        }
        let exempt = self.policy.is_exempt(path);
        let Some(user_id) = ctx.user_id().map(str::to_string) else {
            if !exempt {
                debug!(target: "icfes::access", "anonymous request to {} refused", path);
                return Ok(Verdict::Deny(Denial::AuthenticationRequired));
            }
            return Ok(self.after_requirements(ctx, path, false));
        };

        let mut sub = self.subscription_for(&user_id)?;
        let plan = self.catalog.plan_for(sub.tier);
        if !exempt {
            let today = self.clock.today();
            let reset = sub.reset_if_new_day(today);
            if reset {
                self.subscriptions.store(&sub)?;
            }
            if !sub.can_query(plan.max_queries_per_day, today) {
                info!(
                    target: "icfes::access",
                    "quota exceeded for {} ({}/{} on {})",
                    user_id, sub.queries_today, plan.max_queries_per_day, plan.tier
                );
                return Ok(Verdict::Deny(Denial::QuotaExceeded {
                    used: sub.queries_today,
                    limit: plan.max_queries_per_day,
                    tier: plan.tier,
                }));
            }
        }
        ctx.subscription = Some(sub);
        ctx.plan = Some(plan);
        Ok(self.after_requirements(ctx, path, !exempt))
    }

    // Exempt paths are admitted without route requirements.
    fn after_requirements(&self, ctx: RequestContext, path: &str, counted: bool) -> Verdict {
        let reqs = if counted { self.policy.requirements_for(path) } else { Vec::new() };
        for req in reqs {
            if let Err(d) = check(&ctx, req) {
                debug!(target: "icfes::access", "{} refused for {:?}: {:?}", path, ctx.user_id(), d);
                return Verdict::Deny(d);
            }
        }
        Verdict::Allow(Admission { context: ctx, path: path.to_string(), counted, started: Instant::now() })
    }

    /// Post-response bookkeeping: increment and audit counted 2xx requests. Returns whether it counted.
    pub fn complete(&self, admission: &Admission, status: u16, params: BTreeMap<String, String>) -> Result<bool> {
        if !admission.counted || !(200..300).contains(&status) {
            return Ok(false);
        }
        let Some(user_id) = admission.context.user_id() else { return Ok(false) };
        let today = self.clock.today();
        let seed = match &admission.context.subscription {
            Some(s) => s.clone(),
            None => match self.subscriptions.load(user_id)? {
                Some(s) => s,
                None => return Ok(false),
            },
        };
        let sub = self.subscriptions.increment(&seed, today)?;
        let entry = QueryLogEntry {
            request_id: admission.context.request_id.clone(),
            user_id: user_id.to_string(),
            endpoint: admission.path.clone(),
            query_params: params,
            timestamp: self.clock.now(),
            response_time_ms: admission.started.elapsed().as_millis() as u64,
            status_code: status,
        };
        self.log.record(&entry)?;
        debug!(target: "icfes::access", "counted {} for {} ({} today)", admission.path, user_id, sub.queries_today);
        Ok(true)
    }

    /// Load the user's subscription, creating or reactivating it at the lowest tier.
    pub fn subscription_for(&self, user_id: &str) -> Result<Subscription> {
        match self.subscriptions.load(user_id)? {
            Some(s) if s.is_active => Ok(s),
            Some(mut s) => {
                let lowest = self.catalog.lowest();
                warn!(target: "icfes::access", "reactivating inactive subscription of {} at {}", user_id, lowest.tier);
                s.reactivate(lowest.tier, self.clock.now());
                self.subscriptions.store(&s)?;
                Ok(s)
            }
            None => {
                let lowest = self.catalog.lowest();
                info!(target: "icfes::access", "creating {} subscription for {}", lowest.tier, user_id);
                let s = Subscription::new(user_id, lowest.tier, self.clock.now());
                self.subscriptions.store(&s)?;
                Ok(s)
            }
        }
    }

    pub fn usage(&self, user_id: &str) -> Result<Usage> {
        let sub = self.subscription_for(user_id)?;
        let plan: Plan = self.catalog.plan_for(sub.tier);
        let today = self.clock.today();
        let used = if sub.last_query_date == Some(today) { sub.queries_today } else { 0 };
        Ok(Usage {
            tier: plan.tier,
            plan: plan.name.clone(),
            used,
            remaining: sub.remaining(plan.max_queries_per_day, today),
            limit: plan.max_queries_per_day,
        })
    }
}
