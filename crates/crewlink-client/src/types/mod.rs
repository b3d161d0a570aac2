//! Wire and session data types.

mod envelope;
mod request;
mod response;
mod session;

pub use envelope::Envelope;
pub use request::ApiRequest;
pub use response::ApiResponse;
pub use session::{Session, UserProfile};
