#![deny(warnings)]

mod platform;
mod storage;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::timer::EspTaskTimerService;
use log::info;

use meshx::bus::Bus;
use meshx::cli::{UnitTestConsole, MODULE_ID_NVS, MODULE_ID_TXCM};
use meshx::config::MeshxConfig;
use meshx::element::Composition;
use meshx::error::MeshxError;
use meshx::models::generic::onoff::{OnOffClient, OnOffServer};
use meshx::models::generic::model_id as gen_model_id;
use meshx::models::light::ctl::{CtlClient, CtlServer};
use meshx::models::light::model_id as light_model_id;
use meshx::storage::PersistStore;
use meshx::txcm::Txcm;
use meshx::types::{Address, TransportHandle};

use crate::platform::{EspClock, EspStabilityTimer};
use crate::storage::EspNvsBackend;
use crate::transport::EspBleMeshTransport;

/// Company/product id persisted at init (spec.md §6.4); placeholder
/// values until a provisioner-assigned pair is wired through.
const MESHX_CID: u16 = 0x02E5;
const MESHX_PID: u16 = 0x0001;

/// Reads `ut ...` lines from the console UART on a dedicated thread,
/// handing each to [`UnitTestConsole::dispatch_line`]. A malformed or
/// unrecognized line is logged and skipped rather than killing the reader.
fn spawn_console_reader(console: Arc<UnitTestConsole>) {
    std::thread::Builder::new()
        .name("meshx-ut-console".into())
        .stack_size(4096)
        .spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                if stdin.read_line(&mut line).is_err() {
                    continue;
                }
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(err) = console.dispatch_line(line) {
                    log::warn!("ut console: '{line}' failed: {err}");
                }
            }
        })
        .expect("failed to spawn ut console reader thread");
}

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();
    info!("Starting MeshX node");

    let bus = Arc::new(Bus::new());
    let config = MeshxConfig::default();
    match config.to_json() {
        Ok(json) => info!("meshx config: {json}"),
        Err(err) => log::warn!("failed to render meshx config as JSON: {err}"),
    }
    let txcm = Arc::new(Txcm::init(config, bus.clone()));
    let transport = Arc::new(EspBleMeshTransport::new());

    // Module 3 (TXCM) on the `ut` console: `ut 3 0 1 <addr>` manually acks
    // the head of the send queue, mirroring the original's console-driven
    // TXCM test hook.
    let console = Arc::new(UnitTestConsole::new());
    let ack_txcm = txcm.clone();
    console.register(
        MODULE_ID_TXCM,
        Arc::new(move |_cmd_id, args| {
            let raw: u16 = args.first().ok_or(MeshxError::InvalidArg)?.parse().map_err(|_| MeshxError::InvalidArg)?;
            ack_txcm.ack(Address(raw))
        }),
    );
    spawn_console_reader(console);

    let nvs_partition = EspDefaultNvsPartition::take()?;
    let backend = Arc::new(EspNvsBackend::new(nvs_partition)?);
    let timer_service = EspTaskTimerService::new()?;
    let commit_backend = backend.clone();
    let stability_timer = Arc::new(EspStabilityTimer::new(
        timer_service,
        Arc::new(move || {
            if let Err(err) = commit_backend.commit() {
                log::warn!("deferred NVS commit failed: {err}");
            }
        }),
    ));
    let store = Arc::new(PersistStore::open(backend, stability_timer, MESHX_CID, MESHX_PID, Duration::from_millis(500))?);
    info!("NVS opened: cid=0x{:04x} pid=0x{:04x}", store.cid()?, store.pid()?);

    // Module 4 (NVS) on the `ut` console (spec.md §6.2): `ut 4 0 0` forces
    // an immediate commit past the stability timer; `ut 4 1 0` dumps
    // `(cid, pid)` as a JSON line, mirroring the teacher's own
    // serde_json-encoded diagnostic frames (`bluetooth::types::encode_json_frame`).
    let nvs_store = store.clone();
    console.register(
        MODULE_ID_NVS,
        Arc::new(move |cmd_id, _args| match cmd_id {
            0 => nvs_store.commit_now(),
            1 => {
                let snapshot = serde_json::json!({ "cid": nvs_store.cid()?, "pid": nvs_store.pid()? });
                info!("meshx nvs: {snapshot}");
                Ok(())
            }
            _ => Err(MeshxError::NotFound),
        }),
    );

    let mut composition = Composition::new();
    let primary = composition.add_element();
    composition.element_mut(primary).unwrap().address = Some(Address(0x0001));

    // Model references are placeholders here: the vendor stack's own
    // composition macros allocate the real `esp_ble_mesh_model_t`
    // instances and hand back their addresses once the node is
    // provisioned (spec.md's Non-goals: provisioning is the transport's
    // job, not this crate's).
    let onoff_client = OnOffClient::construct(bus.clone(), txcm.clone(), config, transport.clone())?;
    let onoff_server = OnOffServer::construct(bus.clone(), transport.clone())?;
    let ctl_client = CtlClient::construct(bus.clone(), txcm.clone(), config, transport.clone())?;
    let ctl_server = CtlServer::construct(bus.clone(), transport.clone())?;

    composition
        .element_mut(primary)
        .unwrap()
        .add_model(gen_model_id::ONOFF_CLIENT, Address(0x0001), TransportHandle(0))?;
    composition
        .element_mut(primary)
        .unwrap()
        .add_model(light_model_id::CTL_CLIENT, Address(0x0001), TransportHandle(0))?;

    let _ = (&onoff_client, &onoff_server, &ctl_client, &ctl_server);

    info!("MeshX node composed with {} element(s)", composition.len());

    loop {
        FreeRtos::delay_ms(1000);
    }
}
