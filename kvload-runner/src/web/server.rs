use std::net::SocketAddr;

use anyhow::Result;
use tokio::net::{TcpListener, TcpSocket};

/// Pending connections queued before the endpoint refuses new ones.
const BACKLOG: u32 = 1024;

/// Binds the metrics endpoint to `addr`.
///
/// Port `0` picks a free port. The bound address is logged and available through
/// [`TcpListener::local_addr`].
pub fn listen(addr: SocketAddr) -> Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
    socket.set_reuseport(true)?;
    socket.bind(addr)?;

    let listener = socket.listen(BACKLOG)?;
    tracing::info!(addr = %listener.local_addr()?, "metrics endpoint listening");

    Ok(listener)
}
