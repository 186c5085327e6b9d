//! ferry-services — the I/O around the reassembly engine: the UDP
//! transport loop, output storage and receive statistics.

pub mod receiver;
pub mod stats;
pub mod storage;
pub mod transport;

pub use receiver::{bind_socket, Receiver, ReceiverSettings, RunSummary};
pub use stats::ReceiverStats;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use transport::DatagramSocket;
