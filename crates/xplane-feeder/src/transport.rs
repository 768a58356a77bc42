/// Outbound datagram transport. Fire and forget: nothing is ever read back from the simulator.
use std::{io, net::SocketAddr};

use tokio::net::UdpSocket;
use tracing::{info, trace};

use crate::{
    protocol::veh1::{Veh1, PACKET_LEN},
    sample::ConvertedSample,
    Error, FeedResult,
};

/// Anything that can write one whole datagram.
#[allow(async_fn_in_trait)]
pub trait Transmitter {
    /// Write `bytes` as a single datagram, returning the number of bytes written.
    async fn send_datagram(&self, bytes: &[u8]) -> io::Result<usize>;
}

impl Transmitter for UdpSocket {
    async fn send_datagram(&self, bytes: &[u8]) -> io::Result<usize> {
        self.send(bytes).await
    }
}

/// Open a UDP socket on `bind` with `dest` as its fixed peer. Failing to set the socket up is a
/// startup configuration error, not a transmit error.
pub async fn connect(bind: SocketAddr, dest: SocketAddr) -> FeedResult<UdpSocket> {
    let setup_err = |e: io::Error| Error::Config(format!("socket {bind} -> {dest}: {e}"));
    let socket = UdpSocket::bind(bind).await.map_err(setup_err)?;
    socket.connect(dest).await.map_err(setup_err)?;
    info!("sending VEH1 from {} to {}", socket.local_addr()?, dest);
    Ok(socket)
}

/// Encode `sample` as a `VEH1` packet and send it as exactly one datagram.
pub async fn encode_and_send<T: Transmitter>(
    transport: &T,
    sample: &ConvertedSample,
) -> FeedResult<()> {
    let packet = Veh1::from(sample).encode();
    let sent = transport.send_datagram(&packet).await?;
    if sent != PACKET_LEN {
        return Err(Error::Transmit(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short datagram write: {sent} of {PACKET_LEN} bytes"),
        )));
    }
    trace!("sent {:02x?}", packet);
    Ok(())
}
