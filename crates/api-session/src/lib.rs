//! Authenticated REST client for the Waypost backend.
//!
//! [`ApiClient`] attaches the current bearer credential to every request.
//! When the backend rejects it, a single renewal runs while every other
//! rejected caller waits in a queue. When the renewal settles the queue is
//! replayed in arrival order. If renewal fails the session ends: the stored
//! credential is cleared, every waiter gets `SESSION_EXPIRED`, and
//! listeners hear [`SessionEvent::Ended`] once.
//!
//! # Example
//!
//! ```no_run
//! use api_session::{ApiClient, ErrorKind, SessionEvent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::builder("https://api.waypost.app").build()?;
//! client.subscribe(|event| {
//!     if *event == SessionEvent::Ended {
//!         eprintln!("Signed out, please log in again");
//!     }
//! });
//!
//! client.login("ada@example.com", "correct horse").await?;
//! match client.get("/posts").await {
//!     Ok(response) => println!("{}", response.text()),
//!     Err(err) if err.kind() == ErrorKind::TooManyRequests => {
//!         println!("Retry in {:?}", err.retry_after());
//!     }
//!     Err(err) => return Err(err.into()),
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod classifier;
mod client;
mod coordinator;
mod credential;
mod error;
mod notifier;
mod renewal_fsm;
mod request;
mod store;
mod transport;

#[cfg(test)]
mod tests;

pub use backend::EndpointKind;
pub use classifier::{parse_error_envelope, parse_retry_after, ErrorEnvelope};
pub use client::{ApiClient, ApiClientBuilder, Registration};
pub use credential::{token_expiry, Credential, Identity};
pub use error::{ApiResult, ClassifiedError, ErrorKind, Failure, FieldError, TransportError};
pub use notifier::{ListenerId, SessionEvent, SessionListener, SessionNotifier};
pub use renewal_fsm::{RenewalInput, RenewalMachine, RenewalMachineState, RenewalPhase};
pub use request::{ApiRequest, ApiResponse};
pub use store::CredentialStore;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
