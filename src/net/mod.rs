mod buffered;
mod socket;
mod tls;

pub(crate) use buffered::BufferedSocket;
pub use socket::Socket;
pub(crate) use socket::{connect_tcp, connect_socket};
pub use tls::{TlsUpgrade, TlsUpgraded};
pub(crate) use tls::maybe_upgrade;
