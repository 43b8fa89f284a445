//! Bluetooth Low Energy subsystem.
//!
//! Drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **Link task** - advertises on request, accepts one bonded or
//!    just-works central and runs the GATT server until the link drops.
//! 2. **Session** - the state machine's handle on that link: start/stop
//!    advertising, send consumer keys and the center-tap mouse gesture,
//!    publish the battery level.
//!
//! The two meet through [`ADVERTISE`] and the connection slot [`LINK`].

pub mod advertise;
pub mod server;

use core::cell::RefCell;
use core::mem;

use defmt::{debug, error, info, warn};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use heapless::Vec;
use nrf_softdevice::ble::gatt_server::{self, NotifyValueError};
use nrf_softdevice::ble::peripheral::{self, ConnectableAdvertisement};
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{Connection, EncryptionInfo, IdentityKey, MasterId, SecurityMode};
use nrf_softdevice::{raw, Config, Softdevice};
use static_cell::StaticCell;

use page_turner::error::BleError;
use page_turner::hid::consumer::ConsumerReport;
use page_turner::hid::mouse::CenterTapGesture;
use page_turner::{Command, Error, Session};

use self::advertise::{ADV_DATA, SCAN_DATA};
use self::server::Server;

/// Bonds kept in RAM; the oldest is dropped when full.
const MAX_BONDS: usize = 4;

/// 0.625 ms units; 100 ms.
const ADV_INTERVAL: u32 = 160;

/// Gap between a key press and its release report.
const KEY_RELEASE_MS: u64 = 10;

/// `true` starts advertising, `false` stops it.
pub static ADVERTISE: Signal<CriticalSectionRawMutex, bool> = Signal::new();

/// The live connection, if any.
pub static LINK: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>> =
    Mutex::new(RefCell::new(None));

/// SoftDevice configuration: one peripheral link, no central role.
pub fn softdevice_config(name: &'static str) -> Config {
    Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 128 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: 1024,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: name.as_ptr() as _,
            current_len: name.len() as u16,
            max_len: name.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        conn_gatts: Some(raw::ble_gatts_conn_cfg_t {
            hvn_tx_queue_size: 4,
        }),
        ..Default::default()
    }
}

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    // DC/DC regulator is fitted on the XIAO; halves radio current.
    unsafe {
        raw::sd_power_dcdc_mode_set(raw::NRF_POWER_DCDC_MODES_NRF_POWER_DCDC_ENABLE as u8);
    }
    sd.run().await
}

/// Advertise whenever asked to and serve the resulting connection.
#[embassy_executor::task]
pub async fn link_task(sd: &'static Softdevice, server: &'static Server) -> ! {
    let bonder = bonder();
    let mut config = peripheral::Config::default();
    config.interval = ADV_INTERVAL;

    loop {
        // Drop stale stop requests.
        while !ADVERTISE.wait().await {}

        loop {
            let adv = ConnectableAdvertisement::ScannableUndirected {
                adv_data: &ADV_DATA,
                scan_data: &SCAN_DATA,
            };
            let advertising = peripheral::advertise_pairable(sd, adv, &config, bonder);
            match select(advertising, wait_for_stop()).await {
                Either::First(Ok(conn)) => {
                    serve(conn, server).await;
                    break;
                }
                Either::First(Err(e)) => {
                    error!("Advertise error: {}", e);
                    Timer::after_millis(200).await;
                }
                Either::Second(()) => {
                    debug!("Advertising stopped");
                    break;
                }
            }
        }
    }
}

async fn wait_for_stop() {
    while ADVERTISE.wait().await {}
}

async fn serve(conn: Connection, server: &'static Server) {
    info!("BLE connected");
    LINK.lock(|link| link.replace(Some(conn.clone())));
    let _ = gatt_server::run(&conn, server, |_| {}).await;
    LINK.lock(|link| link.replace(None));
    info!("BLE disconnected");
}

fn current_link() -> Option<Connection> {
    LINK.lock(|link| link.borrow().clone())
}

struct PeerBond {
    master_id: MasterId,
    key: EncryptionInfo,
}

/// Just-works bonding, kept in RAM only.
struct Bonder {
    peers: RefCell<Vec<PeerBond, MAX_BONDS>>,
}

impl Bonder {
    fn new() -> Self {
        Self {
            peers: RefCell::new(Vec::new()),
        }
    }
}

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        IoCapabilities::None
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        true
    }

    fn on_bonded(
        &self,
        _conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        _peer_id: IdentityKey,
    ) {
        let mut peers = self.peers.borrow_mut();
        if let Some(existing) = peers.iter_mut().find(|p| p.master_id == master_id) {
            existing.key = key;
            return;
        }

        if peers.is_full() {
            peers.remove(0);
        }

        let _ = peers.push(PeerBond { master_id, key });
        info!("Bonded, {} peers stored", peers.len());
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.peers
            .borrow()
            .iter()
            .find_map(|p| (p.master_id == master_id).then_some(p.key))
    }

    fn on_security_update(&self, _conn: &Connection, mode: SecurityMode) {
        info!("BLE security mode updated: {}", mode);
    }
}

fn bonder() -> &'static Bonder {
    static BONDER: StaticCell<Bonder> = StaticCell::new();
    BONDER.init(Bonder::new())
}

/// The state machine's view of the link.
pub struct BleSession {
    server: &'static Server,
    gesture: CenterTapGesture,
}

impl BleSession {
    pub fn new(server: &'static Server, gesture: CenterTapGesture) -> Self {
        Self { server, gesture }
    }

    fn notify(&self, conn: &Connection, handle: u16, report: &[u8]) -> Result<(), Error> {
        gatt_server::notify_value(conn, handle, report).map_err(|e| {
            warn!("Send ble report error: {}", e);
            match e {
                NotifyValueError::Disconnected => Error::Ble(BleError::NotConnected),
                NotifyValueError::Raw(_) => Error::Ble(BleError::NotifyFailed),
            }
        })
    }

    async fn send_center_tap(&self, conn: &Connection) -> Result<(), Error> {
        for step in self.gesture.reports() {
            self.notify(conn, self.server.hid.mouse, &step.report.to_bytes())?;
            if step.ends_move {
                Timer::after_millis(self.gesture.move_interval_ms as u64).await;
            }
        }
        Ok(())
    }
}

impl Session for BleSession {
    async fn start_advertising(&mut self) -> Result<(), Error> {
        ADVERTISE.signal(true);
        Ok(())
    }

    async fn stop_advertising(&mut self) {
        ADVERTISE.signal(false);
    }

    fn is_connected(&self) -> bool {
        LINK.lock(|link| link.borrow().is_some())
    }

    async fn disconnect_all(&mut self) {
        ADVERTISE.signal(false);
        if let Some(conn) = current_link() {
            info!("BLE disconnect");
            let _ = conn.disconnect();
        }
    }

    async fn send_key(&mut self, command: Command) -> Result<(), Error> {
        let conn = current_link().ok_or(Error::Ble(BleError::NotConnected))?;

        if let Some(usage) = command.consumer_usage() {
            let hid = self.server.hid;
            self.notify(&conn, hid.consumer, &ConsumerReport::new(usage).to_bytes())?;
            Timer::after_millis(KEY_RELEASE_MS).await;
            self.notify(&conn, hid.consumer, &ConsumerReport::release().to_bytes())
        } else if command == Command::CenterTap {
            self.send_center_tap(&conn).await
        } else {
            Ok(())
        }
    }

    async fn set_battery_level(&mut self, percent: u8) {
        let battery = &self.server.battery;
        if let Err(e) = battery.battery_level_set(&percent) {
            error!("Battery value set error: {}", e);
        }
        if let Some(conn) = current_link() {
            if let Err(e) = battery.battery_level_notify(&conn, &percent) {
                debug!("Battery value notify error: {}", e);
            }
        }
    }
}
