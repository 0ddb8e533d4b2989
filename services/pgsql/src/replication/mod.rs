pub mod ack;
pub mod poller;
pub mod slot;

pub use ack::AckManager;
pub use poller::{PollerOptions, SlotPoller};
pub use slot::SlotManager;
