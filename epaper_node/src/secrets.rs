use serde::Deserialize;

// Read secrets directly from file at compile time
pub const SECRETS_TOML: &str = include_str!("../../secrets.toml");

/// Defines the structure for the secrets.
///
/// The `[node]` table in the same file is read by
/// `epaper_node_core::NodeConfig::from_toml_document`.
#[derive(Deserialize, Debug, Clone)]
pub struct Secrets {
    /// Wi-Fi configuration.
    pub wifi: WiFiConfig,
    /// MQTT configuration.
    pub mqtt: MqttConfig,
}

/// Defines the structure for the Wi-Fi configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct WiFiConfig {
    /// The SSID of the Wi-Fi network.
    pub ssid: String,
    /// The password of the Wi-Fi network.
    pub password: String,
}

/// Defines the structure for the MQTT configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct MqttConfig {
    /// The URL of the MQTT broker.
    pub broker_url: String,
    /// The username for the MQTT broker.
    pub mqtt_user: String,
    /// The password for the MQTT broker.
    pub mqtt_pw: String,
    /// The topic carrying the display content.
    pub topic: String,
    /// The client id presented to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

fn default_client_id() -> String {
    "epaper-node".to_string()
}

impl Secrets {
    /// Loads the secrets that were embedded at compile time.
    pub fn load() -> anyhow::Result<Self> {
        let secrets: Secrets = toml::from_str(SECRETS_TOML)
            .map_err(|e| anyhow::anyhow!("Error parsing secrets.toml: {}", e))?;
        Ok(secrets)
    }
}
