use std::future::Future;

use rumqttc::{AsyncClient, Event, Packet, QoS};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pathstore_store::DocumentStore;

use crate::command::{Command, LOAD_FILTER, SAVE_FILTER};
use crate::config::MqttConfig;
use crate::error::MqttResult;
use crate::feed::{DataEvent, DataFeed, DataStream};

const REQUEST_CAPACITY: usize = 64;

/// A publish waiting for the command worker.
#[derive(Debug)]
struct Incoming {
    topic: String,
    payload: Vec<u8>,
}

/// Connects a broker to a [`DocumentStore`].
///
/// `save/<path>` and `load/<path>` publishes become store calls; each result
/// goes into the bridge's [`DataFeed`] and from there to `data/<path>`.
#[derive(Clone, Debug)]
pub struct MqttBridge {
    config: MqttConfig,
    store: DocumentStore,
    feed: DataFeed,
}

impl MqttBridge {
    pub fn new(config: MqttConfig, store: DocumentStore) -> Self {
        let feed = DataFeed::new(config.channel_capacity);
        Self {
            config,
            store,
            feed,
        }
    }

    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    pub fn feed(&self) -> &DataFeed {
        &self.feed
    }

    /// Run `command` against the store.
    pub async fn dispatch(&self, command: Command) -> MqttResult<DataEvent> {
        match command {
            Command::Save { path, data } => {
                self.store.save(&path, &data).await?;
                Ok(DataEvent::new(path, data))
            }
            Command::Load { path } => {
                let data = self.store.load(&path, None).await?;
                Ok(DataEvent::new(path, data))
            }
        }
    }

    /// Handle one incoming publish and broadcast its result.
    ///
    /// Failures are logged and yield `None`; nothing is broadcast for them.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> Option<DataEvent> {
        let command = match Command::parse(topic, payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(%topic, error = %e, "skipping mqtt message");
                return None;
            }
        };
        debug!(%topic, path = command.path(), "mqtt command");

        match self.dispatch(command).await {
            Ok(event) => {
                self.feed.publish(event.clone());
                Some(event)
            }
            Err(e) => {
                warn!(%topic, error = %e, "mqtt command failed");
                None
            }
        }
    }

    /// Run incoming publishes one at a time, in the order they were queued.
    fn spawn_worker(&self) -> (mpsc::Sender<Incoming>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Incoming>(REQUEST_CAPACITY);
        let bridge = self.clone();
        let worker = tokio::spawn(async move {
            while let Some(incoming) = rx.recv().await {
                bridge.handle_message(&incoming.topic, &incoming.payload).await;
            }
        });
        (tx, worker)
    }

    /// Poll the broker until `shutdown` resolves.
    ///
    /// Subscriptions are renewed on every ConnAck. Publishes are handled by a
    /// single worker in arrival order. Connection errors pause for
    /// `reconnect_delay` before polling resumes.
    pub async fn run_until<F>(self, shutdown: F) -> MqttResult<()>
    where
        F: Future<Output = ()>,
    {
        let (client, mut eventloop) = AsyncClient::new(self.config.options(), REQUEST_CAPACITY);
        let forwarder = tokio::spawn(forward(client.clone(), self.feed.subscribe()));
        let (queue, worker) = self.spawn_worker();
        let delay = self.config.reconnect_delay();
        tokio::pin!(shutdown);

        info!(host = %self.config.host, port = self.config.port, "mqtt bridge starting");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                polled = eventloop.poll() => match polled {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(host = %self.config.host, "mqtt connected");
                        if let Err(e) = subscribe(&client) {
                            warn!(error = %e, "mqtt subscribe failed");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let incoming = Incoming {
                            topic: publish.topic,
                            payload: publish.payload.to_vec(),
                        };
                        if queue.send(incoming).await.is_err() {
                            warn!("mqtt command worker stopped");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, retry_in = ?delay, "mqtt connection error");
                        tokio::select! {
                            _ = &mut shutdown => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                },
            }
        }

        drop(queue);
        if let Err(e) = worker.await {
            warn!(error = %e, "mqtt command worker failed");
        }
        forwarder.abort();
        if let Err(e) = client.try_disconnect() {
            debug!(error = %e, "mqtt disconnect not queued");
        }
        info!("mqtt bridge stopped");
        Ok(())
    }
}

fn subscribe(client: &AsyncClient) -> MqttResult<()> {
    for filter in [LOAD_FILTER, SAVE_FILTER] {
        client.try_subscribe(filter, QoS::AtLeastOnce)?;
        debug!(%filter, "subscribed");
    }
    Ok(())
}

/// Publish every feed event to its `data/<path>` topic.
async fn forward(client: AsyncClient, mut events: DataStream) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "mqtt forwarder lagged behind the data feed");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(path = %event.path, error = %e, "unserializable data event");
                continue;
            }
        };
        if let Err(e) = client
            .publish(event.topic(), QoS::AtLeastOnce, false, payload)
            .await
        {
            warn!(path = %event.path, error = %e, "mqtt publish failed");
        }
    }
}
