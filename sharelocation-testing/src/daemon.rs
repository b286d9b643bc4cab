use std::{collections::HashMap, sync::Arc, time::Duration};

use log::{error, info, warn};
use sharelocation_logic::{
    AccountRegistry, App as BaseApp, MemoryAuth, MemoryMap, MemoryStore, Notice, Screen,
    SimulatedPosition, SyncSettings, UiSender,
};
use sharelocation_test_shared::*;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc,
};

/// Forwards one device's notices and screen changes to whoever is connected
struct ChannelUi {
    device: String,
    responses: mpsc::Sender<TestingResponse>,
}

impl ChannelUi {
    /// Events are dropped when nobody is draining them
    fn push(&self, resp: TestingResponse) {
        if let Err(why) = self.responses.try_send(resp) {
            warn!("Dropped event from {}: {why}", self.device);
        }
    }
}

impl UiSender for ChannelUi {
    fn notify(&self, notice: Notice) {
        self.push(TestingResponse::Notice(self.device.clone(), notice));
    }

    fn change_screen(&self, screen: Screen) {
        self.push(TestingResponse::ScreenChanged(self.device.clone(), screen));
    }
}

type App = BaseApp<SimulatedPosition, MemoryStore, MemoryAuth, MemoryMap, ChannelUi>;

struct Device {
    source: Arc<SimulatedPosition>,
    app: App,
}

struct DaemonState {
    store: Arc<MemoryStore>,
    registry: Arc<AccountRegistry>,
    settings: SyncSettings,
    devices: HashMap<String, Device>,
    responses: mpsc::Sender<TestingResponse>,
}

impl DaemonState {
    pub fn new(settings: SyncSettings, responses: mpsc::Sender<TestingResponse>) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            registry: AccountRegistry::new(),
            settings,
            devices: HashMap::new(),
            responses,
        }
    }

    fn interval(&self) -> Duration {
        self.settings
            .report_interval()
            .max(self.settings.sync_interval())
    }

    fn add_device(&mut self, name: String) -> Result<(), TestingResponse> {
        if self.devices.contains_key(&name) {
            return Err(TestingResponse::DeviceExists(name));
        }

        let source = Arc::new(SimulatedPosition::new());
        let ui = Arc::new(ChannelUi {
            device: name.clone(),
            responses: self.responses.clone(),
        });
        let app = App::new(
            source.clone(),
            self.store.clone(),
            Arc::new(MemoryAuth::new(self.registry.clone())),
            Arc::new(MemoryMap::new()),
            ui,
            self.settings.clone(),
        );

        info!("Added device {name}");
        self.devices.insert(name, Device { source, app });
        Ok(())
    }

    async fn process_device_req(
        &mut self,
        name: String,
        req: DeviceRequest,
    ) -> Result<TestingResponse, TestingResponse> {
        let Some(device) = self.devices.get_mut(&name) else {
            return Err(TestingResponse::UnknownDevice(name));
        };

        match req {
            DeviceRequest::CreateAccount(form) => {
                device
                    .app
                    .create_account(&form)
                    .await
                    .map_err(|why| TestingResponse::Error(why.to_string()))?;
            }
            DeviceRequest::SignIn(form) => {
                device
                    .app
                    .sign_in(&form)
                    .await
                    .map_err(|why| TestingResponse::Error(why.to_string()))?;
            }
            DeviceRequest::Resume => device.app.resume().await,
            DeviceRequest::MoveTo(location) => device.source.set_location(location),
            DeviceRequest::SetPermission(granted) => device.source.set_permission(granted),
            DeviceRequest::Logout => device.app.logout().await,
            DeviceRequest::ListMarkers => {
                let markers = match device.app.session() {
                    Some(session) => session.synchronizer().markers().await,
                    None => Vec::new(),
                };
                return Ok(markers.into());
            }
        }

        Ok(TestingResponse::Complete)
    }

    pub async fn process_req(&mut self, req: TestingRequest) -> TestingResponse {
        let res = match req {
            TestingRequest::AddDevice(name) => {
                self.add_device(name).map(|_| TestingResponse::Complete)
            }
            TestingRequest::Device(name, req) => self.process_device_req(name, req).await,
            TestingRequest::NextTick => {
                tokio::time::sleep(self.interval()).await;
                Ok(TestingResponse::Complete)
            }
            TestingRequest::FailWrites(fail) => {
                self.store.set_fail_writes(fail);
                Ok(TestingResponse::Complete)
            }
            TestingRequest::FailReads(fail) => {
                self.store.set_fail_reads(fail);
                Ok(TestingResponse::Complete)
            }
            TestingRequest::DumpStore => Ok(self.store.records().into()),
        };

        res.unwrap_or_else(|resp| resp)
    }

    /// Log every device out so their sentinels land before the daemon goes away
    pub async fn shutdown(&mut self) {
        for (name, mut device) in self.devices.drain() {
            if device.app.is_signed_in() {
                info!("Logging out {name}");
                device.app.logout().await;
            }
        }
    }
}

fn load_settings(path: Option<&String>) -> Result<SyncSettings> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).context("Failed to read settings file")?;
            serde_json::from_str(&raw).context("Failed to parse settings file")
        }
        None => Ok(SyncSettings::default()),
    }
}

async fn write_resp(send: &mut (impl AsyncWriteExt + Unpin), resp: &TestingResponse) -> Result {
    let mut encoded = serde_json::to_vec(resp).context("Failed to encode response")?;
    encoded.push(b'\n');
    send.write_all(&encoded)
        .await
        .context("Failed to send response")
}

use interprocess::local_socket::{ListenerOptions, tokio::prelude::*};

const CLI_MSG: &str = "Usage: sharelocation-test-daemon SOCKET_NAME [SETTINGS_JSON]";

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result {
    colog::init();

    let args = std::env::args().collect::<Vec<_>>();
    let raw_socket_name = args.get(1).cloned().context(CLI_MSG)?;
    let settings = load_settings(args.get(2))?;
    let socket_name = get_socket_name(raw_socket_name)?;
    let opts = ListenerOptions::new().name(socket_name);
    let listener = opts.create_tokio().context("Failed to bind to socket")?;
    let (resp_tx, mut resp_rx) = mpsc::channel::<TestingResponse>(64);

    let mut state = DaemonState::new(settings, resp_tx);

    info!("Testing Daemon Ready");

    'server: loop {
        let res = tokio::select! {
            res = listener.accept() => {
                res
            },
            Ok(_) = tokio::signal::ctrl_c() => {
                break 'server;
            }
        };

        match res {
            Ok(stream) => {
                let mut recv = BufReader::new(&stream);
                let mut send = &stream;

                let mut buffer = String::with_capacity(256);

                loop {
                    tokio::select! {
                        Ok(_) = tokio::signal::ctrl_c() => {
                            break 'server;
                        }
                        res = recv.read_line(&mut buffer) => {
                            match res {
                                Ok(0) => {
                                    break;
                                }
                                Ok(_amnt) => {
                                    let resp = match serde_json::from_str(&buffer) {
                                        Ok(req) => state.process_req(req).await,
                                        Err(why) => TestingResponse::Error(format!("Bad request: {why}")),
                                    };
                                    buffer.clear();
                                    if let Err(why) = write_resp(&mut send, &resp).await {
                                        error!("{why:?}");
                                        break;
                                    }
                                }
                                Err(why) => {
                                    error!("Read Error: {why:?}");
                                    break;
                                }
                            }
                        }
                        Some(resp) = resp_rx.recv() => {
                            if let Err(why) = write_resp(&mut send, &resp).await {
                                error!("{why:?}");
                                break;
                            }
                        }
                    }
                }
            }
            Err(why) => error!("Error from connection: {why:?}"),
        }
    }

    state.shutdown().await;

    Ok(())
}
