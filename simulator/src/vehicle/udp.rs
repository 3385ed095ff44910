use anyhow::Context;
use obstaclecore::interface::{
    MavlinkFramer, ObstacleDistanceMessage, VehicleCommand, VehicleLink, VehicleState,
};
use obstaclecore::LinkError;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{Mutex, PoisonError};

// MAVLink ids this companion computer claims on the wire.
const COMPANION_SYSTEM_ID: u8 = 1;
const COMPANION_COMPONENT_ID: u8 = 196;

/// Parses `udp:host:port` (or plain `host:port`) into a socket address.
pub fn parse_udp_target(target: &str) -> anyhow::Result<SocketAddr> {
    let address = target.strip_prefix("udp:").unwrap_or(target);
    address
        .to_socket_addrs()
        .with_context(|| format!("resolving MAVLink mirror target {}", target))?
        .next()
        .with_context(|| format!("no address for MAVLink mirror target {}", target))
}

/// Link decorator that also frames every telemetry message as MAVLink v2 and
/// sends it to a ground station over UDP.
pub struct UdpMirror<L> {
    inner: L,
    socket: UdpSocket,
    target: SocketAddr,
    framer: Mutex<MavlinkFramer>,
}

impl<L: VehicleLink> UdpMirror<L> {
    pub fn connect(inner: L, target: SocketAddr) -> std::io::Result<Self> {
        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        Ok(Self {
            inner,
            socket,
            target,
            framer: Mutex::new(MavlinkFramer::new(COMPANION_SYSTEM_ID, COMPANION_COMPONENT_ID)),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl<L: VehicleLink> VehicleLink for UdpMirror<L> {
    fn send(&self, message: &ObstacleDistanceMessage) -> Result<(), LinkError> {
        self.inner.send(message)?;
        let frame = self
            .framer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frame(message);
        self.socket.send_to(&frame, self.target)?;
        Ok(())
    }

    fn read_state(&self) -> Result<VehicleState, LinkError> {
        self.inner.read_state()
    }

    fn command(&self, command: VehicleCommand) -> Result<(), LinkError> {
        self.inner.command(command)
    }
}
