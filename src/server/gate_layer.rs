use std::collections::BTreeMap;

use axum::extract::{Query, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use super::response::denial_response;
use super::AppState;
use crate::access::Verdict;
use crate::error::AppError;
use crate::identity::principal_from_headers;

/// Admit, run the handler, then settle the quota and audit log for counted requests.
pub async fn access_gate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let params: BTreeMap<String, String> =
        Query::<BTreeMap<String, String>>::try_from_uri(req.uri()).map(|Query(p)| p).unwrap_or_default();
    let principal = principal_from_headers(req.headers(), &state.settings.auth_header);

    let gate = state.gate.clone();
    let admit_path = path.clone();
    let verdict = match tokio::task::spawn_blocking(move || gate.admit(&admit_path, principal)).await {
        Ok(Ok(v)) => v,
        Ok(Err(e)) => {
            error!(target: "icfes::server", "access check failed for {}: {:#}", path, e);
            return AppError::from(e).into_response();
        }
        Err(e) => return AppError::internal("join_error".to_string(), e.to_string()).into_response(),
    };
    let admission = match verdict {
        Verdict::Allow(a) => a,
        Verdict::Deny(d) => return denial_response(&d),
    };

    req.extensions_mut().insert(admission.context.clone());
    let response = next.run(req).await;
    if admission.counted {
        let status = response.status().as_u16();
        let gate = state.gate.clone();
        match tokio::task::spawn_blocking(move || gate.complete(&admission, status, params)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(target: "icfes::server", "usage bookkeeping failed for {}: {:#}", path, e),
            Err(e) => warn!(target: "icfes::server", "usage bookkeeping task failed for {}: {}", path, e),
        }
    }
    response
}
