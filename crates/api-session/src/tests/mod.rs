//! Integration tests for the API client.
//!
//! - `harness.rs`        - scripted backend and client constructors
//! - `single_flight.rs`  - one renewal per episode, however many callers
//! - `ordering.rs`       - queued callers resume or fail in arrival order
//! - `failures.rs`       - renewal failure ends the session
//! - `exclusion.rs`      - authentication endpoints bypass renewal
//! - `notification.rs`   - session events and the once-per-episode latch
//! - `classification.rs` - error taxonomy end to end
//! - `persistence.rs`    - the stored credential follows the session

mod exclusion;
mod notification;
