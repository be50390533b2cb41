//! Who is asking, and what the access layer learned about them for this request.
//! Authentication itself happens upstream; this crate only trusts the proxy header.

mod principal;
mod request_context;

pub use principal::{principal_from_headers, Attrs, Principal};
pub use request_context::RequestContext;
