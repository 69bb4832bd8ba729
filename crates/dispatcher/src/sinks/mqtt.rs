//! MqttSink - publishes each record to `{prefix}/{topic}/{tag}`

use std::time::Duration;

use contracts::{ContractError, DataSink, MeasurementRecord, MqttConfig};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Pending requests buffered by the client
const REQUEST_CAPACITY: usize = 64;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Sink that publishes to an MQTT broker
///
/// QoS 0, payload is the value as text. The connection is driven by a
/// background event loop task that reconnects on error.
pub struct MqttSink {
    name: String,
    client: AsyncClient,
    event_loop: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl MqttSink {
    /// Create the client and start its event loop
    ///
    /// Must be called inside a tokio runtime. Connecting happens in the
    /// background, so an unreachable broker is only reported by the log.
    pub fn new(name: impl Into<String>, config: &MqttConfig) -> Self {
        let name = name.into();
        let mut options = MqttOptions::new(&config.client_id, &config.server, config.port);
        options.set_keep_alive(KEEP_ALIVE);
        if !config.user.is_empty() {
            options.set_credentials(&config.user, &config.password);
        }

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drive_event_loop(
            event_loop,
            name.clone(),
            cancel.clone(),
        ));

        info!(
            sink = %name,
            server = %config.server,
            port = config.port,
            client_id = %config.client_id,
            "MqttSink created"
        );

        Self {
            name,
            client,
            event_loop: Some(handle),
            cancel,
        }
    }
}

#[instrument(name = "mqtt_event_loop", skip(event_loop, cancel), fields(sink = %name))]
async fn drive_event_loop(mut event_loop: EventLoop, name: String, cancel: CancellationToken) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = event_loop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(code = ?ack.code, "Connected to MQTT broker");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "MQTT connection error, reconnecting");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }
    debug!("MQTT event loop stopped");
}

impl DataSink for MqttSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, record: &MeasurementRecord) -> Result<(), ContractError> {
        let topic = record.topic_path();
        let payload = record.value.to_string();

        self.client
            .try_publish(topic.as_str(), QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| {
                warn!(sink = %self.name, topic = %topic, message = %payload, "Unable to publish");
                ContractError::sink_write(&self.name, e.to_string())
            })?;

        debug!(sink = %self.name, topic = %topic, value = %payload, "Published");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // QoS 0 has nothing to acknowledge
        Ok(())
    }

    #[instrument(name = "mqtt_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        let Some(mut handle) = self.event_loop.take() else {
            return Ok(());
        };

        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "Disconnect request not queued");
        }
        if tokio::time::timeout(DISCONNECT_GRACE, &mut handle).await.is_err() {
            self.cancel.cancel();
            let _ = handle.await;
        }

        info!(sink = %self.name, "MqttSink closed");
        Ok(())
    }
}
