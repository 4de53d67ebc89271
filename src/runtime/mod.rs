pub mod workers;

pub use workers::{start_workers, RemoteChannels, RemoteEndpoints, WorkerLink};
