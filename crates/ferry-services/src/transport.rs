//! Transport — the datagram socket the receiver reads from and acks through.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// A connectionless datagram endpoint.
///
/// The futures are `Send` so a receiver over any implementation can be
/// moved onto a spawned task.
pub trait DatagramSocket: Send + Sync {
    /// Wait for the next datagram and copy it into `buf`.
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;

    /// Send one datagram to `target`.
    fn send_to(&self, buf: &[u8], target: SocketAddr)
        -> impl Future<Output = io::Result<usize>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl DatagramSocket for UdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}
