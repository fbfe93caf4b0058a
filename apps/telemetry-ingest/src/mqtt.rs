use crate::config::Config;
use crate::event::parse_telemetry_payload;
use crate::handler::IngestionHandler;
use anyhow::Result;
use chrono::Utc;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::time::{sleep, Duration};

pub async fn run_listener(config: Config, handler: IngestionHandler) -> Result<()> {
    let telemetry_filter = format!("{}/+/telemetry", config.mqtt_topic_prefix);
    loop {
        let mut mqttoptions = MqttOptions::new(
            config.mqtt_client_id.clone(),
            config.mqtt_host.clone(),
            config.mqtt_port,
        );
        mqttoptions.set_keep_alive(config.mqtt_keepalive());
        // Acks are withheld until both stores confirm the event; unacked
        // QoS 1 publishes are redelivered when the session resumes.
        mqttoptions.set_manual_acks(true);
        mqttoptions.set_clean_session(false);
        if let Some(username) = &config.mqtt_username {
            mqttoptions.set_credentials(
                username.clone(),
                config.mqtt_password.clone().unwrap_or_default(),
            );
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 32);

        match client
            .subscribe(telemetry_filter.clone(), QoS::AtLeastOnce)
            .await
        {
            Ok(_) => {
                tracing::info!(topic=%telemetry_filter, "subscribed to telemetry feed");
            }
            Err(err) => {
                tracing::warn!(error=%err, "failed to subscribe to MQTT; retrying");
                sleep(Duration::from_secs(2)).await;
                continue;
            }
        }

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    let received_at = Utc::now();
                    let mut payload = publish.payload.to_vec();

                    match parse_telemetry_payload(
                        &config.mqtt_topic_prefix,
                        &publish.topic,
                        &mut payload,
                        received_at,
                    ) {
                        Ok(Some(event)) => match handler.handle(&event).await {
                            Ok(outcome) => {
                                tracing::debug!(device=%event.device_id, ?outcome, "event settled");
                                if let Err(err) = client.ack(&publish).await {
                                    tracing::warn!(error=%err, "failed to ack publish");
                                }
                            }
                            Err(err) => {
                                // Left unacked so the broker delivers it again.
                                tracing::warn!(
                                    error=%err,
                                    device=%event.device_id,
                                    "store write failed; leaving event for redelivery"
                                );
                            }
                        },
                        Ok(None) => {
                            if let Err(err) = client.ack(&publish).await {
                                tracing::warn!(error=%err, "failed to ack publish");
                            }
                        }
                        Err(err) => {
                            tracing::warn!(error=%err, topic=%publish.topic, "failed to decode telemetry payload");
                            if let Err(err) = client.ack(&publish).await {
                                tracing::warn!(error=%err, "failed to ack publish");
                            }
                        }
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error=%err, "MQTT connection dropped; reconnecting");
                    break;
                }
            }
        }

        sleep(Duration::from_secs(1)).await;
    }
}
