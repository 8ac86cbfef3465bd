use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
};

use crate::{
    connection::{self, LineReader},
    Command, CommandSender, CommandWriter, ConnectionError, DispatchError, HomeRegistry,
    MasterConfig, Notifications, RegistryUpdate, Reply,
};

/// Progress of [`HomeMaster::setup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    Disconnected,
    Connecting,
    AwaitingHomeModel,
    AwaitingModuleList,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    HomeModel,
    ModuleList,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupStep::HomeModel => write!(f, "Home model"),
            SetupStep::ModuleList => write!(f, "Module list"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("{0} receive timeout")]
    Timeout(SetupStep),
    #[error("Master is already set up")]
    AlreadyRunning,
    #[error("Setup aborted")]
    Aborted,
}

#[derive(Debug, Error)]
pub enum MasterError {
    #[error("Error waiting for master task to complete: {0} -- {0:#?}")]
    Join(#[from] JoinError),
}

struct Shared {
    config: MasterConfig,
    registry: Arc<Mutex<HomeRegistry>>,
    writer: CommandWriter,
    online: AtomicBool,
    phase: watch::Sender<SetupPhase>,
}

pub struct MasterTaskHandle {
    stop_sender: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MasterTaskHandle {
    /// Stops the receiver task and waits for it to finish.
    pub async fn stop(self) -> Result<(), MasterError> {
        let _ = self.stop_sender.send(true);
        self.handle.await?;
        Ok(())
    }
}

/// Connection to one csLights master and the devices it reports.
pub struct HomeMaster {
    shared: Arc<Shared>,
    commands: CommandSender,
    task: Option<MasterTaskHandle>,
}

impl HomeMaster {
    pub fn new(config: MasterConfig) -> Self {
        log::info!(
            "HomeMaster initialized host: {} port: {}",
            config.host,
            config.port
        );
        let registry = Arc::new(Mutex::new(HomeRegistry::new()));
        let writer = CommandWriter::new();
        let (phase, _) = watch::channel(SetupPhase::Disconnected);
        Self {
            commands: CommandSender::new(writer.clone(), registry.clone()),
            shared: Arc::new(Shared {
                config,
                registry,
                writer,
                online: AtomicBool::new(false),
                phase,
            }),
            task: None,
        }
    }

    /// Connects, starts the receiver task and loads the home model and the
    /// module list.
    ///
    /// A failed discovery step leaves the connection and receiver running; the
    /// master keeps reconnecting until [`HomeMaster::shutdown`] is called.
    pub async fn setup(&mut self) -> Result<(), SetupError> {
        if self.task.is_some() {
            return Err(SetupError::AlreadyRunning);
        }
        log::debug!("HomeMaster async setup");
        self.shared.phase.send_replace(SetupPhase::Connecting);

        let (reader, writer) = match connection::connect(&self.shared.config).await {
            Ok(connection) => connection,
            Err(err) => {
                self.shared.phase.send_replace(SetupPhase::Failed);
                return Err(err.into());
            }
        };
        self.shared.writer.install(writer).await;
        self.shared.online.store(true, Ordering::SeqCst);
        self.shared.phase.send_replace(SetupPhase::AwaitingHomeModel);

        // the receiver has to run while we wait for the replies below
        self.task = Some(self.spawn_receiver(reader));

        self.discover(
            Command::GetHomeModel,
            SetupStep::HomeModel,
            SetupPhase::AwaitingHomeModel,
        )
        .await?;
        self.discover(
            Command::GetModules,
            SetupStep::ModuleList,
            SetupPhase::AwaitingModuleList,
        )
        .await?;

        log::info!("HomeMaster setup completed");
        Ok(())
    }

    /// Stops the receiver task, closes the connection and drops all devices.
    pub async fn shutdown(&mut self) -> Result<(), MasterError> {
        let result = match self.task.take() {
            Some(task) => task.stop().await,
            None => Ok(()),
        };
        self.shared.writer.disconnect().await;
        self.shared.online.store(false, Ordering::SeqCst);
        self.shared.registry.lock().clear();
        self.shared.phase.send_replace(SetupPhase::Disconnected);
        log::info!("HomeMaster cleanup completed");
        result
    }

    pub fn config(&self) -> &MasterConfig {
        &self.shared.config
    }

    /// Whether the TCP connection to the master is up.
    pub fn is_online(&self) -> bool {
        self.shared.online.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> SetupPhase {
        *self.shared.phase.borrow()
    }

    /// Locks the registry. Don't keep the guard across `.await` points, the
    /// receiver task needs it for every message.
    pub fn registry(&self) -> MutexGuard<'_, HomeRegistry> {
        self.shared.registry.lock()
    }

    /// Shared handle to the registry, for observers that read device state
    /// from within their callbacks.
    pub fn registry_handle(&self) -> Arc<Mutex<HomeRegistry>> {
        self.shared.registry.clone()
    }

    pub fn commands(&self) -> &CommandSender {
        &self.commands
    }

    /// Whether the accessory is known, reported by the master and the
    /// connection is up.
    pub fn is_available(&self, acc_id: u32) -> bool {
        self.is_online()
            && self
                .registry()
                .device(acc_id)
                .is_some_and(|device| device.online())
    }

    fn spawn_receiver(&self, reader: LineReader) -> MasterTaskHandle {
        let (stop_sender, stop_receiver) = watch::channel(false);
        let shared = self.shared.clone();
        let commands = self.commands.clone();
        let handle = tokio::task::spawn(shared.receive(reader, commands, stop_receiver));
        MasterTaskHandle {
            stop_sender,
            handle,
        }
    }

    async fn discover(
        &self,
        command: Command,
        step: SetupStep,
        waiting: SetupPhase,
    ) -> Result<(), SetupError> {
        let mut phase = self.shared.phase.subscribe();
        if let Err(err) = self.shared.writer.send(&command).await {
            self.shared.phase.send_replace(SetupPhase::Failed);
            return Err(err.into());
        }
        let reached = tokio::time::timeout(self.shared.config.discovery_timeout, async {
            phase.wait_for(|phase| *phase != waiting).await.map(|p| *p)
        })
        .await;
        match reached {
            Ok(Ok(SetupPhase::Failed)) | Ok(Err(_)) => Err(SetupError::Aborted),
            Ok(Ok(_)) => Ok(()),
            Err(_) => {
                log::error!("{} receive timeout!", step);
                self.shared.phase.send_replace(SetupPhase::Failed);
                Err(SetupError::Timeout(step))
            }
        }
    }
}

impl Drop for HomeMaster {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.handle.abort();
        }
    }
}

/// Resolves once a stop was requested or the handle was dropped.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

impl Shared {
    async fn receive(
        self: Arc<Self>,
        mut reader: LineReader,
        commands: CommandSender,
        mut stop: watch::Receiver<bool>,
    ) {
        log::debug!("receiver task started");
        loop {
            let line = tokio::select! {
                line = reader.next_line() => line,
                _ = stop_requested(&mut stop) => break,
            };
            match line {
                Ok(Some(line)) => {
                    self.handle_line(&line);
                    continue;
                }
                Ok(None) => log::error!("Connection error, reconnecting..."),
                Err(err) => log::error!("Connection error ({}), reconnecting...", err),
            }
            match self.reconnect(&commands, &mut stop).await {
                Some(new_reader) => reader = new_reader,
                None => break,
            }
        }
        log::info!("receiver task cancelled");
    }

    fn handle_line(&self, line: &[u8]) {
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        log::trace!("<- {}", String::from_utf8_lossy(line));
        let reply = match Reply::decode(line) {
            Ok(reply) => reply,
            Err(err) => {
                log::error!("{} data: {}", err, String::from_utf8_lossy(line));
                return;
            }
        };

        let mut pending = Notifications::new();
        let result = self.registry.lock().apply(reply, &mut pending);
        match result {
            Ok(RegistryUpdate::HomeModel { .. }) => {
                self.advance(SetupPhase::AwaitingHomeModel, SetupPhase::AwaitingModuleList)
            }
            Ok(RegistryUpdate::ModuleList { .. }) => {
                self.advance(SetupPhase::AwaitingModuleList, SetupPhase::Ready)
            }
            Ok(update) => log::trace!("{:?}", update),
            Err(err @ DispatchError::UnknownAccessory(_)) => log::info!("{}", err),
            Err(err) => log::warn!("{}", err),
        }
        pending.fire();
    }

    /// Moves the setup phase forward, but only out of the phase that expects
    /// this reply.
    fn advance(&self, from: SetupPhase, to: SetupPhase) {
        self.phase.send_if_modified(|phase| {
            if *phase == from {
                *phase = to;
                true
            } else {
                false
            }
        });
    }

    async fn reconnect(
        &self,
        commands: &CommandSender,
        stop: &mut watch::Receiver<bool>,
    ) -> Option<LineReader> {
        self.online.store(false, Ordering::SeqCst);
        self.writer.disconnect().await;
        let mut pending = Notifications::new();
        self.registry.lock().mark_offline(&mut pending);
        pending.fire();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                _ = stop_requested(stop) => return None,
            }
            let connected = tokio::select! {
                connected = connection::connect(&self.config) => connected,
                _ = stop_requested(stop) => return None,
            };
            let Ok((reader, writer)) = connected else {
                continue;
            };
            self.writer.install(writer).await;
            self.online.store(true, Ordering::SeqCst);
            if let Err(err) = commands.refresh_all().await {
                log::error!("Failed to request accessory states: {}", err);
            }
            log::info!("Connection restored");
            return Some(reader);
        }
    }
}
