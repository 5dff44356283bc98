//! Session module
//!
//! Lifecycle of one remote shell session: provisioning, the credential retry,
//! byte streaming, resize propagation and teardown.

mod machine;
mod path;
mod provision;
mod request;
mod status;
mod stream;
mod teardown;

pub use machine::{
    RetryContext, Session, SessionCommand, SessionController, SessionError, SessionOutcome,
};
pub use path::{extract_start_path, initial_command};
pub use provision::{classify, ProvisionOutcome, ProvisioningClient, AUTH_FAILURE_MARKER};
pub use request::{Geometry, SessionHandle, SessionRequest, TargetType};
pub use status::{SessionStatus, StatusUpdate};
pub use stream::StreamAdapter;
pub use teardown::Teardown;
