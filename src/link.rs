// src/link.rs

//! # Command Link
//!
//! Inbound side of the wireless link to the remote. Datagrams arrive in the
//! radio receive callback, outside of the control loop, and are validated
//! there before anything reaches the flight core:
//!
//! - datagrams from any device but the paired remote are dropped,
//! - a 20 byte datagram is a setpoint: four little-endian `f32` stick
//!   axes `left_x, left_y, right_x, right_y`, an arm flag byte and three
//!   bytes of padding,
//! - a 1 byte datagram is a menu navigation code,
//! - any other length is dropped.
//!
//! The latest setpoint is handed to the control loop through a single slot
//! guarded by a critical section. Menu events go through a small lock-free
//! queue.

use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;
use heapless::mpmc::Q8;
use log::{debug, warn};
use thiserror::Error;

use crate::time::Instant;

/// Length of a setpoint datagram.
pub const SETPOINT_PACKET_LEN: usize = 20;

/// Length of a menu code datagram.
pub const MENU_PACKET_LEN: usize = 1;

const ARM_FLAG_OFFSET: usize = 16;

/// Radio address of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 6]);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Operator command, axes already clamped to their ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatorSetpoint {
    /// Roll stick, `[-1, 1]`.
    pub roll_power: f32,
    /// Pitch stick, `[-1, 1]`.
    pub pitch_power: f32,
    /// Yaw stick, `[-1, 1]`.
    pub yaw_power: f32,
    /// Throttle, `[0, 1]`.
    pub thrust: f32,
    /// Arm switch.
    pub armed: bool,
}

impl OperatorSetpoint {
    /// Sticks centered, throttle closed, disarmed.
    pub const ZERO: Self = Self {
        roll_power: 0.0,
        pitch_power: 0.0,
        yaw_power: 0.0,
        thrust: 0.0,
        armed: false,
    };
}

impl Default for OperatorSetpoint {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Navigation event for the on-board menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEvent {
    /// Redraw the current page.
    Refresh,
    /// Activate the focused field.
    Click,
    /// Increase the focused value.
    Increment,
    /// Decrease the focused value.
    Decrement,
    /// Focus the previous field.
    PreviousField,
    /// Focus the next field.
    NextField,
}

impl MenuEvent {
    /// Decodes a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x10 => Some(MenuEvent::Refresh),
            0x20 => Some(MenuEvent::Click),
            0x30 => Some(MenuEvent::Increment),
            0x31 => Some(MenuEvent::Decrement),
            0x40 => Some(MenuEvent::PreviousField),
            0x41 => Some(MenuEvent::NextField),
            _ => None,
        }
    }

    /// Wire code of the event.
    pub fn code(self) -> u8 {
        match self {
            MenuEvent::Refresh => 0x10,
            MenuEvent::Click => 0x20,
            MenuEvent::Increment => 0x30,
            MenuEvent::Decrement => 0x31,
            MenuEvent::PreviousField => 0x40,
            MenuEvent::NextField => 0x41,
        }
    }
}

/// A validated datagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    /// Stick and arm switch state.
    Setpoint(OperatorSetpoint),
    /// Menu navigation.
    Menu(MenuEvent),
}

/// Reason a datagram was dropped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// The sender is not the paired remote.
    #[error("message from unknown device")]
    UnknownSender,
    /// The length matches no known datagram.
    #[error("invalid packet size ({0} B)")]
    InvalidLength(usize),
    /// The menu code is not assigned.
    #[error("invalid menu code: {0:#04x}")]
    UnknownMenuCode(u8),
    /// A stick axis is NaN or infinite.
    #[error("non-finite stick value")]
    NonFinite,
}

fn read_axis(payload: &[u8], index: usize) -> Result<f32, PacketError> {
    let offset = index * 4;
    let bytes: [u8; 4] = payload
        .get(offset..offset + 4)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(PacketError::InvalidLength(payload.len()))?;
    let value = f32::from_le_bytes(bytes);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PacketError::NonFinite)
    }
}

/// Validates a datagram by its exact length and decodes it.
pub fn decode_packet(payload: &[u8]) -> Result<Packet, PacketError> {
    match payload.len() {
        SETPOINT_PACKET_LEN => {
            let left_x = read_axis(payload, 0)?;
            let left_y = read_axis(payload, 1)?;
            let right_x = read_axis(payload, 2)?;
            let right_y = read_axis(payload, 3)?;

            Ok(Packet::Setpoint(OperatorSetpoint {
                roll_power: right_x.clamp(-1.0, 1.0),
                pitch_power: right_y.clamp(-1.0, 1.0),
                yaw_power: left_x.clamp(-1.0, 1.0),
                thrust: left_y.clamp(0.0, 1.0),
                armed: payload[ARM_FLAG_OFFSET] != 0,
            }))
        }
        MENU_PACKET_LEN => MenuEvent::from_code(payload[0])
            .map(Packet::Menu)
            .ok_or(PacketError::UnknownMenuCode(payload[0])),
        len => Err(PacketError::InvalidLength(len)),
    }
}

/// Latest setpoint with its arrival time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandSnapshot {
    /// Last accepted setpoint.
    pub setpoint: OperatorSetpoint,
    /// Arrival of the last accepted setpoint, `None` before the first.
    pub received_at: Option<Instant>,
    /// Incremented, wrapping, on every accepted setpoint.
    pub sequence: u32,
}

impl CommandSnapshot {
    /// Nothing received yet.
    pub const EMPTY: Self = Self {
        setpoint: OperatorSetpoint::ZERO,
        received_at: None,
        sequence: 0,
    };
}

/// Shared between the radio receive callback and the control loop.
///
/// Built in a `static`:
///
/// ```ignore
/// static LINK: CommandLink = CommandLink::new(PeerId([0x78, 0x1c, 0x3c, 0xa4, 0x96, 0xdc]));
/// ```
pub struct CommandLink {
    peer: PeerId,
    latest: Mutex<Cell<CommandSnapshot>>,
    menu_events: Q8<MenuEvent>,
}

impl CommandLink {
    /// Creates a link accepting datagrams from `peer` only.
    pub const fn new(peer: PeerId) -> Self {
        Self {
            peer,
            latest: Mutex::new(Cell::new(CommandSnapshot::EMPTY)),
            menu_events: Q8::new(),
        }
    }

    /// The paired remote.
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Receive callback entry point.
    ///
    /// Invalid datagrams are logged and dropped; the error is returned for
    /// the caller's bookkeeping only.
    pub fn on_receive(
        &self,
        sender: &PeerId,
        payload: &[u8],
        now: Instant,
    ) -> Result<(), PacketError> {
        if *sender != self.peer {
            warn!("got message from unknown device {}", sender);
            return Err(PacketError::UnknownSender);
        }

        let packet = decode_packet(payload).inspect_err(|e| warn!("{}", e))?;
        match packet {
            Packet::Setpoint(setpoint) => {
                critical_section::with(|cs| {
                    let cell = self.latest.borrow(cs);
                    let previous = cell.get();
                    cell.set(CommandSnapshot {
                        setpoint,
                        received_at: Some(now),
                        sequence: previous.sequence.wrapping_add(1),
                    });
                });
            }
            Packet::Menu(event) => {
                debug!("menu event {:?}", event);
                self.push_menu_event(event);
            }
        }
        Ok(())
    }

    /// Copy of the latest setpoint.
    pub fn snapshot(&self) -> CommandSnapshot {
        critical_section::with(|cs| self.latest.borrow(cs).get())
    }

    /// Queues a menu event. Returns `false` when the queue is full and the
    /// event was dropped.
    pub fn push_menu_event(&self, event: MenuEvent) -> bool {
        if self.menu_events.enqueue(event).is_err() {
            warn!("menu event queue full, dropping {:?}", event);
            return false;
        }
        true
    }

    /// Oldest pending menu event.
    pub fn next_menu_event(&self) -> Option<MenuEvent> {
        self.menu_events.dequeue()
    }
}
