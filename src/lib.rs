//! State sync core for a podcast browser.
//!
//! The crate is organized in three layers:
//!
//! - [`remote`] - HTTP access to the catalog service and the preference
//!   backend
//! - [`state`] - state containers with per-request lifecycle bookkeeping
//! - [`store`] - the shared async store gluing containers to the network
//!
//! [`model`] carries the data shapes all layers share and [`config`] the
//! optional configuration file.
//!
//! The containers never talk to the network themselves and the remote
//! client holds no state, so each half is testable on its own; the store is
//! the only place the two meet.

pub mod config;
pub mod model;
pub mod remote;
pub mod state;
pub mod store;
