// src/menu.rs

//! # Menu Bridge
//!
//! Glue between the command link and the on-board text menu. The menu
//! itself lives outside of the flight core behind the [`Menu`] trait; the
//! bridge feeds it the navigation events queued by the link and sends the
//! rendered page back to the remote. Frames are sent once, link loss is
//! handled by the arming timeout alone.

use log::{debug, error, warn};

use crate::error::{Error, Peripheral};
use crate::hal::Transport;
use crate::link::{CommandLink, MenuEvent};

/// On-board menu.
pub trait Menu {
    /// Applies one navigation event. Returns whether the page must be
    /// redrawn.
    fn handle(&mut self, event: MenuEvent) -> bool;

    /// Renders the current page.
    fn render(&mut self) -> &[u8];
}

/// Drains menu events and sends redraws to the remote.
pub struct MenuBridge<'a, T, M> {
    link: &'a CommandLink,
    transport: T,
    menu: M,
}

impl<'a, T: Transport, M: Menu> MenuBridge<'a, T, M> {
    /// Creates a bridge talking to the peer of `link`.
    pub fn new(link: &'a CommandLink, transport: T, menu: M) -> Self {
        Self {
            link,
            transport,
            menu,
        }
    }

    /// Brings the radio up. Failure is fatal.
    pub fn start(&mut self) -> Result<(), Error> {
        debug!("radio init, peer {}", self.link.peer());
        self.transport.init(self.link.peer()).map_err(|e| {
            error!("radio init failed: {:?}", e);
            Error::PeripheralInit(Peripheral::Radio)
        })?;
        debug!("radio init success");
        Ok(())
    }

    /// Handles every pending event and sends one frame if any of them asked
    /// for a redraw. Returns whether a frame was sent.
    pub fn pump(&mut self) -> bool {
        let mut redraw = false;
        while let Some(event) = self.link.next_menu_event() {
            redraw |= self.menu.handle(event);
        }
        if !redraw {
            return false;
        }

        let frame = self.menu.render();
        if let Err(e) = self.transport.send(self.link.peer(), frame) {
            warn!("menu frame send failed: {:?}", e);
        }
        true
    }

    /// The menu.
    pub fn menu(&self) -> &M {
        &self.menu
    }

    /// The menu, mutably.
    pub fn menu_mut(&mut self) -> &mut M {
        &mut self.menu
    }
}
