//! Remote workers and the channels connecting them to the control task.
//!
//! Each worker owns a blocking remote endpoint and runs on its own thread
//! with its own executor, so network round-trips never run on the control
//! thread. The control task talks to them only through [`RemoteChannels`].

use crate::controller::RemoteLink;
use crate::remote::{CommandFetchError, CommandSource, Publish};
use crate::types::{AlertRecord, RemoteCommand, TelemetryRecord, ALERT_QUEUE_DEPTH};
use embassy_executor::{Executor, Spawner};
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, TrySendError},
};
use embassy_time::{with_timeout, Duration};
use log::{debug, info, warn};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// TLS handshakes on the ESP32 need a generous stack.
const WORKER_STACK_SIZE: usize = 16 * 1024;

pub type CommandRequestChannel = Channel<CriticalSectionRawMutex, (), 1>;
pub type CommandReplyChannel =
    Channel<CriticalSectionRawMutex, Result<RemoteCommand, CommandFetchError>, 1>;
pub type TelemetryChannel = Channel<CriticalSectionRawMutex, TelemetryRecord, 1>;
pub type AlertChannel = Channel<CriticalSectionRawMutex, AlertRecord, ALERT_QUEUE_DEPTH>;

pub struct RemoteChannels {
    pub command_request: CommandRequestChannel,
    pub command_reply: CommandReplyChannel,
    pub telemetry: TelemetryChannel,
    pub alerts: AlertChannel,
}

impl RemoteChannels {
    pub fn new() -> Self {
        Self {
            command_request: Channel::new(),
            command_reply: Channel::new(),
            telemetry: Channel::new(),
            alerts: Channel::new(),
        }
    }
}

impl Default for RemoteChannels {
    fn default() -> Self {
        Self::new()
    }
}

/// [`RemoteLink`] backed by the worker channels.
pub struct WorkerLink {
    channels: Arc<RemoteChannels>,
    command_timeout: Option<Duration>,
}

impl WorkerLink {
    pub fn new(channels: Arc<RemoteChannels>, command_timeout_secs: Option<u64>) -> Self {
        Self {
            channels,
            command_timeout: command_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl RemoteLink for WorkerLink {
    async fn request_commands(&mut self) -> Result<(), CommandFetchError> {
        // The previous request is always consumed before its reply arrives,
        // so a full slot means the worker has stopped.
        self.channels
            .command_request
            .try_send(())
            .map_err(|_| CommandFetchError::WorkerGone)
    }

    async fn receive_commands(&mut self) -> Result<RemoteCommand, CommandFetchError> {
        let reply = self.channels.command_reply.receive();
        match self.command_timeout {
            Some(timeout) => with_timeout(timeout, reply)
                .await
                .map_err(|_| CommandFetchError::Timeout)?,
            None => reply.await,
        }
    }

    fn publish_telemetry(&mut self, record: TelemetryRecord) {
        if self.channels.telemetry.try_send(record).is_err() {
            warn!("Telemetry worker busy; dropping this cycle's record");
        }
    }

    fn publish_alert(&mut self, record: AlertRecord) {
        if let Err(TrySendError::Full(record)) = self.channels.alerts.try_send(record) {
            warn!("Alert queue full; dropping alert: {}", record.message);
        }
    }
}

#[embassy_executor::task]
async fn command_worker(channels: Arc<RemoteChannels>, mut source: Box<dyn CommandSource>) {
    info!("Command worker started");
    loop {
        channels.command_request.receive().await;
        debug!("Command request received");
        let reply = source.fetch_commands();
        if let Err(e) = &reply {
            warn!("Command fetch failed: {}", e);
        }
        channels.command_reply.send(reply).await;
    }
}

#[embassy_executor::task]
async fn telemetry_worker(
    channels: Arc<RemoteChannels>,
    mut sink: Box<dyn Publish<TelemetryRecord>>,
) {
    info!("Telemetry worker started");
    loop {
        let record = channels.telemetry.receive().await;
        if let Err(e) = sink.publish(&record) {
            warn!("Telemetry publish failed: {}", e);
        }
    }
}

#[embassy_executor::task]
async fn alert_worker(channels: Arc<RemoteChannels>, mut sink: Box<dyn Publish<AlertRecord>>) {
    info!("Alert worker started");
    loop {
        let record = channels.alerts.receive().await;
        if let Err(e) = sink.publish(&record) {
            warn!("Alert publish failed ({}): {}", e, record.message);
        }
    }
}

/// The endpoints each worker owns.
pub struct RemoteEndpoints {
    pub commands: Box<dyn CommandSource>,
    pub telemetry: Box<dyn Publish<TelemetryRecord>>,
    pub alerts: Box<dyn Publish<AlertRecord>>,
}

/// Starts the three workers and returns the control task's side of the
/// link. The threads run for the life of the process.
pub fn start_workers(
    endpoints: RemoteEndpoints,
    command_timeout_secs: Option<u64>,
) -> io::Result<(WorkerLink, Vec<JoinHandle<()>>)> {
    let channels = Arc::new(RemoteChannels::new());
    let RemoteEndpoints {
        commands,
        telemetry,
        alerts,
    } = endpoints;

    let handles = vec![
        spawn_worker("commands", {
            let channels = Arc::clone(&channels);
            move |spawner| spawner.must_spawn(command_worker(channels, commands))
        })?,
        spawn_worker("telemetry", {
            let channels = Arc::clone(&channels);
            move |spawner| spawner.must_spawn(telemetry_worker(channels, telemetry))
        })?,
        spawn_worker("alerts", {
            let channels = Arc::clone(&channels);
            move |spawner| spawner.must_spawn(alert_worker(channels, alerts))
        })?,
    ];

    Ok((WorkerLink::new(channels, command_timeout_secs), handles))
}

fn spawn_worker<F>(name: &str, init: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce(Spawner) + Send + 'static,
{
    thread::Builder::new()
        .name(format!("remote-{}", name))
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || {
            let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
            executor.run(init)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::PublishError;
    use embassy_futures::block_on;
    use std::sync::mpsc;

    fn command(target: f32) -> RemoteCommand {
        RemoteCommand {
            target_temperature: target,
            jets: false,
            light: true,
            cold_blower: false,
            hot_blower: false,
        }
    }

    fn telemetry() -> TelemetryRecord {
        TelemetryRecord {
            temperature: 101.0,
            heater_on: false,
            jets: false,
            light: false,
            cold_blower: false,
            hot_blower: false,
            status_message: String::new(),
            heat_rate: 0.0,
            tripped: None,
        }
    }

    #[test]
    fn test_request_reply_rendezvous() {
        let channels = Arc::new(RemoteChannels::new());
        let mut link = WorkerLink::new(Arc::clone(&channels), None);

        block_on(link.request_commands()).unwrap();
        assert!(channels.command_request.try_receive().is_ok());
        channels.command_reply.try_send(Ok(command(100.0))).unwrap();
        assert_eq!(block_on(link.receive_commands()).unwrap(), command(100.0));
    }

    #[test]
    fn test_unconsumed_request_means_worker_gone() {
        let channels = Arc::new(RemoteChannels::new());
        let mut link = WorkerLink::new(Arc::clone(&channels), None);
        block_on(link.request_commands()).unwrap();
        assert_eq!(
            block_on(link.request_commands()),
            Err(CommandFetchError::WorkerGone)
        );
    }

    #[test]
    fn test_fetch_error_is_forwarded() {
        let channels = Arc::new(RemoteChannels::new());
        let mut link = WorkerLink::new(Arc::clone(&channels), None);
        channels
            .command_reply
            .try_send(Err(CommandFetchError::RateLimited))
            .unwrap();
        assert_eq!(
            block_on(link.receive_commands()),
            Err(CommandFetchError::RateLimited)
        );
    }

    #[test]
    fn test_busy_telemetry_worker_drops_record() {
        let channels = Arc::new(RemoteChannels::new());
        let mut link = WorkerLink::new(Arc::clone(&channels), None);
        link.publish_telemetry(telemetry());
        link.publish_telemetry(telemetry());
        assert!(channels.telemetry.try_receive().is_ok());
        assert!(channels.telemetry.try_receive().is_err());
    }

    #[test]
    fn test_alerts_queue_up_to_depth() {
        let channels = Arc::new(RemoteChannels::new());
        let mut link = WorkerLink::new(Arc::clone(&channels), None);
        for i in 0..ALERT_QUEUE_DEPTH + 2 {
            link.publish_alert(AlertRecord::new(format!("alert {}", i)));
        }
        let mut received = 0;
        while channels.alerts.try_receive().is_ok() {
            received += 1;
        }
        assert_eq!(received, ALERT_QUEUE_DEPTH);
    }

    struct CountingSource(u32);

    impl CommandSource for CountingSource {
        fn fetch_commands(&mut self) -> Result<RemoteCommand, CommandFetchError> {
            self.0 += 1;
            Ok(command(90.0 + self.0 as f32))
        }
    }

    struct ChannelSink<R>(mpsc::Sender<R>);

    impl<R: Clone + Send> Publish<R> for ChannelSink<R> {
        fn publish(&mut self, record: &R) -> Result<(), PublishError> {
            self.0
                .send(record.clone())
                .map_err(|e| PublishError::Transport(e.to_string()))
        }
    }

    #[test]
    fn test_workers_serve_the_link() {
        let (telemetry_tx, telemetry_rx) = mpsc::channel();
        let (alert_tx, alert_rx) = mpsc::channel();
        let endpoints = RemoteEndpoints {
            commands: Box::new(CountingSource(0)),
            telemetry: Box::new(ChannelSink(telemetry_tx)),
            alerts: Box::new(ChannelSink(alert_tx)),
        };
        let (mut link, handles) = start_workers(endpoints, Some(5)).unwrap();
        assert_eq!(handles.len(), 3);

        for expected in [91.0, 92.0] {
            block_on(link.request_commands()).unwrap();
            let received = block_on(link.receive_commands()).unwrap();
            assert_eq!(received.target_temperature, expected);
        }

        link.publish_telemetry(telemetry());
        link.publish_alert(AlertRecord::new("Heating too slowly"));
        let timeout = std::time::Duration::from_secs(5);
        assert_eq!(telemetry_rx.recv_timeout(timeout).unwrap(), telemetry());
        assert_eq!(
            alert_rx.recv_timeout(timeout).unwrap().message,
            "Heating too slowly"
        );
    }
}
