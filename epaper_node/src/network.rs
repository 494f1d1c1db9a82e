// ===============================================================================
// WIFI AND MQTT
// ===============================================================================
// Both links are brought up lazily by the scheduler's retry loop and torn down
// before deep sleep. Nothing here blocks beyond a single attempt.
// ===============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use embedded_svc::mqtt::client::{Details, QoS};
use epaper_node_core::hal::{MessageChannel, Network};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_hal::modem::Modem;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::*;

use crate::secrets::{MqttConfig, WiFiConfig};

/// Wi-Fi station, configured once and started on the first connect.
pub struct WifiNetwork {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl WifiNetwork {
    pub fn new(
        modem: impl Peripheral<P = Modem> + 'static,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        credentials: &WiFiConfig,
    ) -> anyhow::Result<Self> {
        let mut wifi =
            BlockingWifi::wrap(EspWifi::new(modem, sys_loop.clone(), Some(nvs))?, sys_loop)?;

        let wifi_config = Configuration::Client(ClientConfiguration {
            ssid: credentials
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("Wi-Fi SSID is too long"))?,
            password: credentials
                .password
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("Wi-Fi password is too long"))?,
            auth_method: if credentials.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });
        wifi.set_configuration(&wifi_config)?;

        Ok(Self { wifi })
    }
}

impl Network for WifiNetwork {
    fn connect(&mut self) -> anyhow::Result<()> {
        if !self.wifi.is_started()? {
            info!("Starting WiFi...");
            self.wifi.start()?;
        }
        if !self.wifi.is_connected()? {
            self.wifi.connect().context("WiFi association failed")?;
        }
        self.wifi.wait_netif_up().context("No IP address")?;
        Ok(())
    }

    fn disconnect(&mut self) -> anyhow::Result<()> {
        if self.wifi.is_connected()? {
            self.wifi.disconnect()?;
        }
        if self.wifi.is_started()? {
            self.wifi.stop()?;
        }
        info!("WiFi stopped");
        Ok(())
    }
}

/// Subscription to the content topic.
///
/// The MQTT client runs its own IDF task. Its callback only flips the
/// connection flag and forwards payloads of our topic into a queue that
/// `poll` drains.
pub struct MqttChannel {
    config: MqttConfig,
    client: Option<EspMqttClient<'static>>,
    connected: Arc<AtomicBool>,
    subscribed: bool,
    sender: Sender<Vec<u8>>,
    receiver: Receiver<Vec<u8>>,
}

impl MqttChannel {
    pub fn new(config: &MqttConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            config: config.clone(),
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
            subscribed: false,
            sender,
            receiver,
        }
    }

    fn start_client(&mut self) -> anyhow::Result<EspMqttClient<'static>> {
        info!("Initializing MQTT client for {}...", self.config.broker_url);

        let mqtt_config = MqttClientConfiguration {
            client_id: Some(self.config.client_id.as_str()),
            username: Some(self.config.mqtt_user.as_str()),
            password: Some(self.config.mqtt_pw.as_str()),
            ..Default::default()
        };

        let connected = self.connected.clone();
        let sender = self.sender.clone();
        let topic = self.config.topic.clone();
        let client = EspMqttClient::new_cb(&self.config.broker_url, &mqtt_config, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    info!("MQTT Connected to broker");
                    connected.store(true, Ordering::SeqCst);
                }
                EventPayload::Disconnected => {
                    info!("MQTT disconnected from broker");
                    connected.store(false, Ordering::SeqCst);
                }
                EventPayload::Subscribed(msg_id) => {
                    info!("MQTT subscription confirmed (ID: {})", msg_id);
                }
                EventPayload::Received {
                    topic: t,
                    data,
                    details,
                    ..
                } => match details {
                    // only the first fragment carries the topic
                    Details::Complete | Details::InitialChunk(_) => {
                        if t == Some(topic.as_str()) {
                            debug!("MQTT payload: {} bytes", data.len());
                            let _ = sender.send(data.to_vec());
                        }
                    }
                    Details::SubsequentChunk(_) => {
                        debug!("MQTT continuation fragment dropped: {} bytes", data.len());
                    }
                },
                EventPayload::Error(e) => {
                    error!("MQTT error: {:?}", e);
                }
                _ => {}
            }
        })?;
        Ok(client)
    }
}

impl MessageChannel for MqttChannel {
    fn connect(&mut self) -> anyhow::Result<()> {
        if self.client.is_none() {
            self.client = Some(self.start_client()?);
            self.subscribed = false;
        }

        if !self.connected.load(Ordering::SeqCst) {
            bail!("MQTT broker not connected yet");
        }

        if !self.subscribed {
            let client = self
                .client
                .as_mut()
                .ok_or_else(|| anyhow!("MQTT client missing"))?;
            client.subscribe(&self.config.topic, QoS::AtLeastOnce)?;
            info!("Subscribed to topic: {}", self.config.topic);
            self.subscribed = true;
        }
        Ok(())
    }

    fn poll(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        // the sender lives in self, so the queue never disconnects
        Ok(self.receiver.try_recv().ok())
    }

    fn disconnect(&mut self) -> anyhow::Result<()> {
        if self.client.take().is_some() {
            info!("MQTT client stopped");
        }
        self.connected.store(false, Ordering::SeqCst);
        self.subscribed = false;
        Ok(())
    }
}
