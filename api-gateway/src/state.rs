//! Shared application state.
//!
//! The gateway performs no consensus logic of its own: it talks to a
//! running node over the node's own admin-accessor API, in-process, since
//! there is no separate node/gateway process boundary modeled here.

use std::sync::Arc;

pub type SharedState = Arc<chain::Node>;
