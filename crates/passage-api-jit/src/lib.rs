//! Sign-in event webhook for just-in-time password migration.
//!
//! The replacement tenant calls this endpoint on every password submit for
//! users flagged as requiring migration. The handler recovers the password
//! (decrypting the nested context when present), re-domains the principal
//! name for the legacy tenant, runs the JIT pipeline and answers with one
//! action. A GET on the same route returns a static readiness
//! acknowledgment used by the tenant's endpoint registration check.
//!
//! Protocol note: failures are expressed as HTTP 200 responses carrying a
//! block action, never as error statuses — the caller treats non-200 as an
//! outage, not a decision.

mod handlers;
mod models;
mod router;

pub use models::{SignInEventRequest, SignInEventResponse};
pub use router::{jit_router, JitApiState};
