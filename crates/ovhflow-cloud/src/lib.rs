//! ovhflow cloud core
//!
//! Provider-agnostic building blocks for reconciling declared cloud
//! resources against a remote REST API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │          Orchestrator (ovhflow CLI, ...)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │ create / read / delete
//! ┌─────────────────▼───────────────────────────────┐
//! │                 ovhflow-cloud                    │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │  Reconciler  │  │    Poller    │             │
//! │  │    trait     │  │ (wait state) │             │
//! │  └──────────────┘  └──────────────┘             │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │  ApiClient   │  │  State Mgmt  │             │
//! │  └──────────────┘  └──────────────┘             │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │   ovh cloud   │
//! │   provider    │
//! └───────────────┘
//! ```

pub mod api;
pub mod descriptor;
pub mod error;
pub mod poller;
pub mod reconciler;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports
pub use api::{ApiClient, ApiError, Method};
pub use descriptor::{AttributeValue, ResourceData};
pub use error::{CloudError, ConvergenceError, Result};
pub use poller::{NotFoundPolicy, Refresh, StateChangeConf, UnlistedState};
pub use reconciler::{
    Reconciler, create_resource, delete_resource, discard_partial, read_resource,
};
pub use state::{GlobalState, ManagedResource, StateLock, StateManager};
