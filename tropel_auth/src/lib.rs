//! Load tests for the identity and authentication endpoints, built on
//! [`tropel`].
//!
//! - [`behaviors`]: registration, login and logout flows with their checks.
//! - [`suite`]: the weighted case set each feature runs.
//! - [`profile`]: smoke, load, stress, spike and soak stages.
//! - [`smoke`]: the login and logout suites smoke-tested side by side.
//! - [`http`]: the [`Transport`](http::Transport) seam and its `reqwest`
//!   implementation.
//! - [`config`]: TOML configuration.
pub mod behaviors;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod http;
pub mod profile;
pub mod smoke;
pub mod suite;

pub use behaviors::{AuthBehaviors, AuthCase};
pub use config::Config;
pub use error::{Error, Result};
pub use http::{HttpTransport, Request, Response, Transport};
pub use profile::Profile;
pub use suite::Suite;
