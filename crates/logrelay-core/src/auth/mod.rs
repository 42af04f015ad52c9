//! Sign-in, sign-out and auth-state gating.
//!
//! `AuthController` wraps the identity provider with user feedback and
//! timed transitions. Timed steps run through `Sequence`, which names each
//! stage and can be cancelled as a whole.

pub mod controller;
pub mod error;
pub mod sequence;

pub use controller::{AuthController, AuthOptions};
pub use error::AuthError;
pub use sequence::{Cancelled, Sequence};
