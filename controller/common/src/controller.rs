use crate::api::{Device, DeviceProfile};
use crate::config::Config;
use crate::edgex::{EdgexDeviceClient, EdgexDeviceProfileClient};
use crate::predicate::FirstUpdateFilter;
use crate::reconciler::{DeviceProfileReconciler, DeviceReconciler};
use crate::scheduler::run_workers;
use crate::server::{probe_server, Caches};
use crate::store::KubeStore;
use crate::watch::reflector;
use color_eyre::{eyre::eyre, Result};
use kube::{api::ListParams, Api, Client, Resource};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Capacity of each per-kind work queue.
const QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ControllerState {
    Init,
    Running,
    Stop,
}

#[tracing::instrument(skip_all)]
pub async fn wait_for_init(rx: &mut watch::Receiver<ControllerState>) {
    loop {
        let state = *rx.borrow_and_update();
        if state != ControllerState::Init {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[tracing::instrument(skip_all)]
pub async fn wait_for_stop(rx: &mut watch::Receiver<ControllerState>) {
    loop {
        let state = *rx.borrow_and_update();
        if state == ControllerState::Stop {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

pub struct Controller {
    pub controller_tasks: Vec<JoinHandle<()>>,
    state: watch::Sender<ControllerState>,
    state_rx: watch::Receiver<ControllerState>,
    config: Config,
    caches: Caches,
}

impl Controller {
    pub fn new(config: Config) -> Result<Controller> {
        if config.node_pool.is_empty() {
            return Err(eyre!("node pool must not be empty"));
        }
        let (tx, rx) = watch::channel(ControllerState::Init);
        Ok(Controller {
            controller_tasks: Vec::new(),
            state: tx,
            state_rx: rx,
            config,
            caches: Caches::default(),
        })
    }

    pub fn state(&self) -> ControllerState {
        *self.state_rx.borrow()
    }

    /// Start every spawned task and block until SIGINT, SIGTERM or SIGHUP.
    #[tracing::instrument(skip_all)]
    pub async fn run(mut self) -> Result<()> {
        self.init()?;
        use tokio::{signal, time};
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = Self::setup_term_handler() => {}
            _ = Self::setup_hup_handler() => {}
        }
        self.stop()?;
        time::sleep(time::Duration::from_millis(100)).await;
        self.kill_all();
        Ok(())
    }

    #[tracing::instrument]
    pub async fn setup_term_handler() -> Result<()> {
        use tokio::signal;
        let mut signal = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        signal.recv().await;
        Ok(())
    }

    #[tracing::instrument]
    pub async fn setup_hup_handler() -> Result<()> {
        use tokio::signal;
        let mut signal = signal::unix::signal(signal::unix::SignalKind::hangup())?;
        signal.recv().await;
        Ok(())
    }

    /// Run `task` once the controller is running, cancelling it on stop.
    pub fn spawn(&mut self, task: impl Future<Output = Result<()>> + Send + 'static) {
        let mut state = self.state_rx.clone();
        let handle = tokio::spawn(async move {
            wait_for_init(&mut state).await;
            if let Err(e) = tokio::select! {
                r = task => r,
                _ = wait_for_stop(&mut state) => Ok(())
            } {
                error!(error =? e, "Task throw a error")
            }
        });
        self.controller_tasks.push(handle)
    }

    fn api<K>(&self, client: Client) -> Api<K>
    where
        K: Resource<DynamicType = ()>,
    {
        match self.config.namespace.as_deref() {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        }
    }

    /// Watch Devices and reconcile them against EdgeX core-metadata and
    /// core-command.
    pub fn spawn_device_controller(&mut self, client: Client) -> Result<()> {
        let edge = EdgexDeviceClient::new(
            &self.config.core_metadata_addr,
            &self.config.core_command_addr,
            self.config.edge_timeout(),
        )?;
        let workers = self.config.worker_config();
        let reconciler = Arc::new(
            DeviceReconciler::new(KubeStore::new(client.clone()), edge, self.config.node_pool.clone())
                .with_retry_after(workers.error_backoff),
        );
        let api: Api<Device> = self.api(client);
        let (tx, rx) = flume::bounded(QUEUE_CAPACITY);

        let cache = self.caches.devices.clone();
        let queue = tx.clone();
        self.spawn(async move {
            reflector(api, ListParams::default(), cache, FirstUpdateFilter::new("device"), queue).await
        });
        self.spawn(async move { run_workers(reconciler, rx, tx, workers).await });
        info!(node_pool = %self.config.node_pool, "Device controller spawned");
        Ok(())
    }

    /// Watch DeviceProfiles and register them on EdgeX core-metadata.
    pub fn spawn_deviceprofile_controller(&mut self, client: Client) -> Result<()> {
        let edge = EdgexDeviceProfileClient::new(
            &self.config.core_metadata_addr,
            self.config.edge_timeout(),
        )?;
        let workers = self.config.worker_config();
        let reconciler = Arc::new(
            DeviceProfileReconciler::new(KubeStore::new(client.clone()), edge, self.config.node_pool.clone())
                .with_retry_after(workers.error_backoff),
        );
        let api: Api<DeviceProfile> = self.api(client);
        let (tx, rx) = flume::bounded(QUEUE_CAPACITY);

        let cache = self.caches.profiles.clone();
        let queue = tx.clone();
        self.spawn(async move {
            reflector(
                api,
                ListParams::default(),
                cache,
                FirstUpdateFilter::new("deviceprofile"),
                queue,
            )
            .await
        });
        self.spawn(async move { run_workers(reconciler, rx, tx, workers).await });
        info!(node_pool = %self.config.node_pool, "DeviceProfile controller spawned");
        Ok(())
    }

    pub fn spawn_probe_server(&mut self) {
        let addr = self.config.probe_addr;
        let state = self.state_rx.clone();
        let caches = self.caches.clone();
        self.spawn(async move { probe_server(addr, state, caches).await });
    }

    pub fn init(&mut self) -> Result<()> {
        if self.state() != ControllerState::Init {
            return Err(eyre!("Can't run twice"));
        }
        self.state.send(ControllerState::Running)?;
        info!("Init!");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        match self.state() {
            ControllerState::Init => return Err(eyre!("not init yet")),
            ControllerState::Stop => return Err(eyre!("Already stop")),
            ControllerState::Running => {}
        }
        self.state.send(ControllerState::Stop)?;
        info!("Stop!");
        Ok(())
    }

    pub fn kill_all(&self) {
        for j in &self.controller_tasks {
            j.abort()
        }
    }
}
