//! Provider-agnostic core: control-plane orchestration, the worker
//! lifecycle, and the capability interfaces both sides depend on.

pub mod lifecycle;
pub mod mock;
pub mod orchestration;
pub mod traits;
pub mod types;

pub use orchestration::request_backup;
pub use orchestration::request_scale_up;
