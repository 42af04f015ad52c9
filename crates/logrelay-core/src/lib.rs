//! Core library for logrelay.
//!
//! logrelay signs a user in against an identity provider, relays the
//! provider's ID token to a log server, and keeps a log view fresh by
//! polling the server with that token. This crate holds everything that
//! is not terminal rendering:
//!
//! - `identity`: the provider seam (`IdentityGateway`) and the Firebase REST gateway
//! - `auth`: `AuthController` plus the staged `Sequence` used for timed steps
//! - `relay`: `TokenRelay`, which persists a token and submits it to `/view_logs`
//! - `poller`: `LogPoller`, the cancellable `/get_logs` refresh loop
//! - `storage`: where the relayed token lives between ticks
//! - `notify` / `view`: the seams a front end implements

pub mod auth;
pub mod config;
pub mod events;
pub mod identity;
pub mod notify;
pub mod poller;
pub mod relay;
pub mod storage;
pub mod view;

pub use auth::{AuthController, AuthError, AuthOptions};
pub use config::{Config, Timing, TokenStoreKind};
pub use events::LogClient;
pub use identity::{AuthState, FirebaseGateway, IdentityError, IdentityGateway, Session};
pub use notify::{NoticeKind, Notifier, TracingNotifier};
pub use poller::{LogPoller, PollHandle};
pub use relay::{Relay, RelayOutcome, TokenRelay};
pub use storage::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use view::{Destination, ViewBinding};
