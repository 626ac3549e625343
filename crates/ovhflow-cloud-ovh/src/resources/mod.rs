//! Reconcilers for the OVH resource kinds

pub mod failover_ip;
pub mod instance;
pub mod lb_backend;
pub mod private_network;
pub mod subnet;
pub mod user;
pub mod volume;
pub mod vrack;

pub use failover_ip::FailoverIpAttachment;
pub use instance::CloudInstance;
pub use lb_backend::LoadBalancerBackend;
pub use private_network::PrivateNetwork;
pub use subnet::PrivateNetworkSubnet;
pub use user::CloudUser;
pub use volume::CloudVolume;
pub use vrack::VrackAttachment;

use ovhflow_cloud::{
    ApiClient, NotFoundPolicy, Refresh, Result, StateChangeConf, UnlistedState,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Transient poll failures tolerated before a wait gives up
pub(crate) const TRANSIENT_RETRIES: u32 = 3;

/// DELETE `endpoint`, treating "not found" as already deleted.
///
/// Returns the decoded answer, or `None` when the object was already gone.
pub(crate) async fn delete_if_exists<T: DeserializeOwned>(
    client: &dyn ApiClient,
    endpoint: &str,
) -> Result<Option<T>> {
    match client.delete::<T>(endpoint).await {
        Ok(answer) => Ok(Some(answer)),
        Err(e) if e.is_not_found() => {
            tracing::warn!(endpoint, "Object already deleted");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[derive(Deserialize)]
struct StatusOnly {
    #[serde(default)]
    status: String,
}

/// Poll `endpoint` until it answers 404, reported as `gone_state`
pub(crate) async fn wait_until_gone(
    client: &dyn ApiClient,
    endpoint: &str,
    gone_state: &'static str,
    conf: StateChangeConf,
) -> Result<()> {
    let not_found = NotFoundPolicy::Completes(gone_state);

    conf.with_target(&[gone_state])
        .with_unlisted(UnlistedState::KeepWaiting)
        .wait_for_state(move || async move {
            match client.get::<StatusOnly>(endpoint).await {
                Ok(object) => Ok(Refresh::new((), object.status)),
                Err(e) => not_found.recover((), e),
            }
        })
        .await
}
