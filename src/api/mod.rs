//! HTTP control plane for the backup orchestrator.
//!
//! Two endpoints, matching the two original Lambda entry points:
//!
//! - `POST /api/v1/backups`: safety gate + worker launch. Always `200`;
//!   the JSON body carries `status: success|error`.
//! - `POST /api/v1/scale-up`: scale the primary fleet from 0 to 1.
//!   `404` unknown fleet, `200` started or already active, `500` provider
//!   error. Body: `{"user": "<name>"}`, defaulting to `System`.

pub mod errors;
pub mod handlers;
pub mod server;
pub mod types;

pub use handlers::AppContext;
pub use server::ApiServer;
