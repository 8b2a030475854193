//! Raw HCI channel to a local Bluetooth controller.
//!
//! Brings the adapter up, opens an `AF_BLUETOOTH`/`BTPROTO_HCI` raw socket,
//! narrows its filter to event packets and drives LE scanning and
//! advertising with plain HCI command packets. Commands are queued by the
//! kernel against the controller's command credits, so nothing here waits
//! for Command Complete; those events arrive on the same socket and are
//! skipped by the decoder.

use std::io::{self, Read, Write};
use std::mem;
use std::os::fd::AsRawFd;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use static_assertions::assert_eq_size;
use tokio::io::unix::AsyncFd;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use blechat_core::wire::{AdvertisingData, HCI_EVENT_PKT};
use blechat_core::Radio;

// ── Kernel constants ──────────────────────────────────────────────────────────

const BTPROTO_HCI: libc::c_int = 1;
const HCI_CHANNEL_RAW: u16 = 0;
const SOL_HCI: libc::c_int = 0;
const HCI_FILTER: libc::c_int = 2;
/// `_IOW('H', 201, int)`
const HCIDEVUP: libc::c_ulong = 0x4004_48c9;

const HCI_COMMAND_PKT: u8 = 0x01;
const OGF_LE_CTL: u16 = 0x08;

const OCF_LE_SET_ADVERTISING_PARAMETERS: u16 = 0x0006;
const OCF_LE_SET_ADVERTISING_DATA: u16 = 0x0008;
const OCF_LE_SET_ADVERTISE_ENABLE: u16 = 0x000A;
const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;

/// Largest HCI event: header plus 255 parameter bytes.
pub const HCI_MAX_EVENT_SIZE: usize = 260;

// ── Wire structs ──────────────────────────────────────────────────────────────

#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

/// `struct hci_filter` as exchanged through `SOL_HCI`/`HCI_FILTER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct HciFilter {
    pub type_mask: u32,
    pub event_mask: [u32; 2],
    pub opcode: u16,
    _pad: u16,
}

assert_eq_size!(HciFilter, [u8; 16]);

impl HciFilter {
    /// Event packets only, every event code.
    pub fn all_events() -> Self {
        Self {
            type_mask: 1 << HCI_EVENT_PKT,
            event_mask: [u32::MAX; 2],
            opcode: 0,
            _pad: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
struct LeScanParameters {
    scan_type: u8,
    interval: [u8; 2],
    window: [u8; 2],
    own_address_type: u8,
    filter_policy: u8,
}

assert_eq_size!(LeScanParameters, [u8; 7]);

#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
struct LeScanEnable {
    enable: u8,
    filter_duplicates: u8,
}

#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
struct LeAdvertisingParameters {
    min_interval: [u8; 2],
    max_interval: [u8; 2],
    advertising_type: u8,
    own_address_type: u8,
    direct_address_type: u8,
    direct_address: [u8; 6],
    channel_map: u8,
    filter_policy: u8,
}

assert_eq_size!(LeAdvertisingParameters, [u8; 15]);

const SCAN_PARAMETERS: LeScanParameters = LeScanParameters {
    scan_type: 0x01,
    interval: 0x0010u16.to_le_bytes(),
    window: 0x0010u16.to_le_bytes(),
    own_address_type: 0x00,
    filter_policy: 0x00,
};

const ADVERTISING_PARAMETERS: LeAdvertisingParameters = LeAdvertisingParameters {
    min_interval: 0x00A0u16.to_le_bytes(),
    max_interval: 0x0140u16.to_le_bytes(),
    // ADV_NONCONN_IND
    advertising_type: 0x03,
    own_address_type: 0x00,
    direct_address_type: 0x00,
    direct_address: [0; 6],
    // 37, 38 and 39
    channel_map: 0x07,
    filter_policy: 0x00,
};

/// HCI command packet: type, little-endian opcode, length, parameters.
pub fn command_packet(ocf: u16, params: &[u8]) -> Vec<u8> {
    let opcode = (OGF_LE_CTL << 10) | ocf;
    let mut packet = Vec::with_capacity(4 + params.len());
    packet.push(HCI_COMMAND_PKT);
    packet.extend_from_slice(&opcode.to_le_bytes());
    packet.push(params.len() as u8);
    packet.extend_from_slice(params);
    packet
}

// ── Device ────────────────────────────────────────────────────────────────────

pub struct HciDevice {
    dev_id: u16,
    socket: AsyncFd<Socket>,
    saved_filter: Option<HciFilter>,
}

impl HciDevice {
    /// Bring `hciN` up, open its raw channel and start scanning.
    ///
    /// Must be called from within the tokio runtime.
    pub fn open(dev_id: u16) -> Result<Self> {
        power_up(dev_id).with_context(|| format!("can't bring up hci{dev_id}"))?;

        let socket = open_raw(dev_id).with_context(|| format!("could not open hci{dev_id}"))?;
        let mut device = Self {
            dev_id,
            socket: AsyncFd::new(socket).context("register HCI socket with the reactor")?,
            saved_filter: None,
        };

        device
            .send_command(OCF_LE_SET_SCAN_PARAMETERS, SCAN_PARAMETERS.as_bytes())
            .context("set scan parameters failed")?;
        device
            .set_scan_enable(true)
            .context("enable scan failed")?;

        let saved = device.filter().context("HCI filter save failed")?;
        device.saved_filter = Some(saved);
        device
            .set_filter(&HciFilter::all_events())
            .context("HCI filter set failed")?;

        if let Err(e) = device.set_advertise_enable(false) {
            tracing::trace!(error = %e, "advertise disable at startup failed");
        }

        tracing::info!(dev = dev_id, "hci channel open, scanning");
        Ok(device)
    }

    pub fn dev_id(&self) -> u16 {
        self.dev_id
    }

    /// Wait for the next HCI event and copy it into `buf`.
    ///
    /// Cancel safe.
    pub async fn read_event(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.socket.readable().await?;
            match guard.try_io(|inner| (&*inner.get_ref()).read(buf)) {
                Ok(Ok(0)) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "socket closed")),
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    /// Put the old filter back and stop scanning and advertising.
    fn restore(&mut self) {
        if let Some(saved) = self.saved_filter.take() {
            if let Err(e) = self.set_filter(&saved) {
                tracing::debug!(error = %e, "HCI filter restore failed");
            }
        }
        if let Err(e) = self.set_scan_enable(false) {
            tracing::debug!(error = %e, "scan disable failed");
        }
        if let Err(e) = self.set_advertise_enable(false) {
            tracing::debug!(error = %e, "advertise disable failed");
        }
    }

    fn set_scan_enable(&mut self, enable: bool) -> io::Result<()> {
        let params = LeScanEnable {
            enable: enable.into(),
            filter_duplicates: 0x01,
        };
        self.send_command(OCF_LE_SET_SCAN_ENABLE, params.as_bytes())
    }

    fn send_command(&mut self, ocf: u16, params: &[u8]) -> io::Result<()> {
        let packet = command_packet(ocf, params);
        tracing::trace!(packet = %hex::encode_upper(&packet), "hci command out");
        let written = (&*self.socket.get_ref()).write(&packet)?;
        if written != packet.len() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "short HCI command write"));
        }
        Ok(())
    }

    fn filter(&self) -> io::Result<HciFilter> {
        let mut filter = HciFilter::new_zeroed();
        let mut len = mem::size_of::<HciFilter>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                self.socket.as_raw_fd(),
                SOL_HCI,
                HCI_FILTER,
                filter.as_bytes_mut().as_mut_ptr().cast(),
                &mut len,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(filter)
    }

    fn set_filter(&self, filter: &HciFilter) -> io::Result<()> {
        let bytes = filter.as_bytes();
        let rc = unsafe {
            libc::setsockopt(
                self.socket.as_raw_fd(),
                SOL_HCI,
                HCI_FILTER,
                bytes.as_ptr().cast(),
                bytes.len() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Radio for HciDevice {
    fn set_advertise_enable(&mut self, enable: bool) -> io::Result<()> {
        self.send_command(OCF_LE_SET_ADVERTISE_ENABLE, &[u8::from(enable)])
    }

    fn set_advertising_parameters(&mut self) -> io::Result<()> {
        self.send_command(OCF_LE_SET_ADVERTISING_PARAMETERS, ADVERTISING_PARAMETERS.as_bytes())
    }

    fn set_advertising_data(&mut self, frame: &AdvertisingData) -> io::Result<()> {
        self.send_command(OCF_LE_SET_ADVERTISING_DATA, frame.as_bytes())
    }
}

impl Drop for HciDevice {
    fn drop(&mut self) {
        self.restore();
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn raw_hci_socket() -> io::Result<Socket> {
    Socket::new(
        Domain::from(libc::AF_BLUETOOTH),
        Type::from(libc::SOCK_RAW | libc::SOCK_CLOEXEC),
        Some(Protocol::from(BTPROTO_HCI)),
    )
}

/// `HCIDEVUP` on a throwaway control socket. Already up is fine.
fn power_up(dev_id: u16) -> io::Result<()> {
    let ctl = raw_hci_socket()?;
    let rc = unsafe { libc::ioctl(ctl.as_raw_fd(), HCIDEVUP as _, libc::c_int::from(dev_id)) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EALREADY) {
            return Err(err);
        }
        tracing::debug!(dev = dev_id, "adapter already up");
    }
    Ok(())
}

fn open_raw(dev_id: u16) -> io::Result<Socket> {
    let socket = raw_hci_socket()?;
    let addr = SockaddrHci {
        hci_family: libc::AF_BLUETOOTH as libc::sa_family_t,
        hci_dev: dev_id,
        hci_channel: HCI_CHANNEL_RAW,
    };
    let rc = unsafe {
        libc::bind(
            socket.as_raw_fd(),
            (&addr as *const SockaddrHci).cast(),
            mem::size_of::<SockaddrHci>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    socket.set_nonblocking(true)?;
    Ok(socket)
}
