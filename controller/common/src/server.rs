//! Probe and debug endpoints of the controller.

use crate::api::{Device, DeviceProfile};
use crate::controller::ControllerState;
use crate::scheduler::{ResourceIndex, Store};
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use color_eyre::Result;
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::watch;
use tracing::info;

/// Caches shared with the watchers, exposed read-only on `/debug`.
#[derive(Clone, Default)]
pub struct Caches {
    pub devices: Arc<Store<Device>>,
    pub profiles: Arc<Store<DeviceProfile>>,
}

#[derive(Serialize)]
struct DebugReport {
    devices: Vec<ResourceIndex<Device>>,
    profiles: Vec<ResourceIndex<DeviceProfile>>,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(
    Extension(state): Extension<watch::Receiver<ControllerState>>,
) -> (StatusCode, &'static str) {
    match *state.borrow() {
        ControllerState::Running => (StatusCode::OK, "ok"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "not running"),
    }
}

#[tracing::instrument(skip_all)]
async fn debug(Extension(caches): Extension<Caches>) -> Json<DebugReport> {
    let mut devices: Vec<_> = caches.devices.iter().map(|e| e.key().clone()).collect();
    let mut profiles: Vec<_> = caches.profiles.iter().map(|e| e.key().clone()).collect();
    devices.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
    profiles.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
    Json(DebugReport { devices, profiles })
}

fn router(state: watch::Receiver<ControllerState>, caches: Caches) -> axum::Router {
    use axum::{routing::get, Router};

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/debug", get(debug))
        .layer(Extension(state))
        .layer(Extension(caches))
}

#[tracing::instrument(skip_all)]
pub async fn probe_server(
    addr: SocketAddr,
    state: watch::Receiver<ControllerState>,
    caches: Caches,
) -> Result<()> {
    let app = router(state, caches);
    info!("Probe server listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::device::DeviceSpec;
    use std::net::TcpListener;

    async fn serve(state: watch::Receiver<ControllerState>, caches: Caches) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router(state, caches).into_make_service());
        tokio::spawn(server);
        addr
    }

    #[tokio::test]
    async fn readiness_follows_controller_state() {
        let (tx, rx) = watch::channel(ControllerState::Init);
        let addr = serve(rx, Caches::default()).await;
        let url = format!("http://{}/readyz", addr);

        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
        tx.send(ControllerState::Running).unwrap();
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let resp = reqwest::get(format!("http://{}/healthz", addr)).await.unwrap();
        assert_eq!(resp.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn debug_lists_cached_objects() {
        let (_tx, rx) = watch::channel(ControllerState::Running);
        let caches = Caches::default();
        let mut dev = Device::new("boiler", DeviceSpec::default());
        dev.metadata.namespace = Some("default".to_owned());
        caches.devices.insert((&dev).into(), dev);
        let addr = serve(rx, caches).await;

        let body: serde_json::Value = reqwest::get(format!("http://{}/debug", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "devices": [{ "namespace": "default", "name": "boiler" }],
                "profiles": [],
            })
        );
    }
}
