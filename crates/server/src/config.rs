//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// A configuration value that cannot be used.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{section}.min_{field} ({min}) is greater than {section}.max_{field} ({max})")]
    InvertedRange {
        section: &'static str,
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub border: BorderConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub food: FoodConfig,
    #[serde(default)]
    pub virus: VirusConfig,
    #[serde(default)]
    pub eject: EjectConfig,
}

impl Config {
    /// Load configuration from `config.toml`, writing the defaults there if
    /// the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml(&contents)?
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            default_config
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Reject ranges whose minimum exceeds their maximum.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn range(section: &'static str, field: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
            if min > max {
                Err(ConfigError::InvertedRange { section, field, min, max })
            } else {
                Ok(())
            }
        }

        let s = &self.server;
        range(
            "server",
            "supported_protocol",
            s.min_supported_protocol as f64,
            s.max_supported_protocol as f64,
        )?;
        range("player", "size", self.player.min_size, self.player.max_size)?;
        range("food", "size", self.food.min_size, self.food.max_size)?;
        range("food", "amount", self.food.min_amount as f64, self.food.max_amount as f64)?;
        range("virus", "size", self.virus.min_size, self.virus.max_size)?;
        range("virus", "amount", self.virus.min_amount as f64, self.virus.max_amount as f64)?;

        if self.border.width <= 0.0 || self.border.height <= 0.0 {
            return Err(ConfigError::NotPositive("border"));
        }
        if s.tick_interval_ms == 0 {
            return Err(ConfigError::NotPositive("server.tick_interval_ms"));
        }
        if self.player.view_box_width <= 0.0 || self.player.view_box_height <= 0.0 {
            return Err(ConfigError::NotPositive("player.view_box"));
        }
        Ok(())
    }
}

/// Server networking and general settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Connections per IP limit.
    #[serde(default = "default_ip_limit")]
    pub ip_limit: usize,
    /// Game type sent in SetBorder (0 = FFA).
    #[serde(default)]
    pub game_type: u32,
    /// Server name shown to clients.
    #[serde(default = "default_name")]
    pub name: String,
    /// Tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Lowest protocol version a client may request.
    #[serde(default = "default_min_protocol")]
    pub min_supported_protocol: u32,
    /// Highest protocol version a client may request.
    #[serde(default = "default_max_protocol")]
    pub max_supported_protocol: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            max_connections: default_max_connections(),
            ip_limit: default_ip_limit(),
            game_type: 0,
            name: default_name(),
            tick_interval_ms: default_tick_interval(),
            min_supported_protocol: default_min_protocol(),
            max_supported_protocol: default_max_protocol(),
        }
    }
}

fn default_port() -> u16 {
    443
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_max_connections() -> usize {
    100
}
fn default_ip_limit() -> usize {
    4
}
fn default_name() -> String {
    "Petri".to_string()
}
fn default_tick_interval() -> u64 {
    40
}
fn default_min_protocol() -> u32 {
    4
}
fn default_max_protocol() -> u32 {
    18
}

/// World border configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BorderConfig {
    #[serde(default = "default_border_size")]
    pub width: f64,
    #[serde(default = "default_border_size")]
    pub height: f64,
}

impl Default for BorderConfig {
    fn default() -> Self {
        Self {
            width: default_border_size(),
            height: default_border_size(),
        }
    }
}

fn default_border_size() -> f64 {
    14142.0
}

/// Player configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_start_size")]
    pub start_size: f64,
    #[serde(default = "default_player_min_size")]
    pub min_size: f64,
    #[serde(default = "default_player_max_size")]
    pub max_size: f64,
    #[serde(default = "default_player_min_split")]
    pub min_split_size: f64,
    #[serde(default = "default_player_min_eject")]
    pub min_eject_size: f64,
    #[serde(default = "default_player_max_cells")]
    pub max_cells: usize,
    #[serde(default = "default_player_speed")]
    pub speed: f64,
    #[serde(default = "default_player_decay_rate")]
    pub decay_rate: f64,
    #[serde(default = "default_player_merge_time")]
    pub merge_time: f64,
    #[serde(default = "default_player_split_speed")]
    pub split_speed: f64,
    /// Fraction of mass lost on every split.
    #[serde(default)]
    pub split_loss: f64,
    /// Size ratio needed to eat a virus or another player's cell.
    #[serde(default = "default_player_eat_mult")]
    pub eat_mult: f64,
    /// Fraction of the prey's mass the eater gains.
    #[serde(default = "default_player_absorb_fraction")]
    pub absorb_fraction: f64,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    #[serde(default = "default_view_box_width")]
    pub view_box_width: f64,
    #[serde(default = "default_view_box_height")]
    pub view_box_height: f64,
    #[serde(default = "default_min_view_box_scale")]
    pub min_view_box_scale: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            start_size: default_player_start_size(),
            min_size: default_player_min_size(),
            max_size: default_player_max_size(),
            min_split_size: default_player_min_split(),
            min_eject_size: default_player_min_eject(),
            max_cells: default_player_max_cells(),
            speed: default_player_speed(),
            decay_rate: default_player_decay_rate(),
            merge_time: default_player_merge_time(),
            split_speed: default_player_split_speed(),
            split_loss: 0.0,
            eat_mult: default_player_eat_mult(),
            absorb_fraction: default_player_absorb_fraction(),
            max_name_length: default_max_name_length(),
            view_box_width: default_view_box_width(),
            view_box_height: default_view_box_height(),
            min_view_box_scale: default_min_view_box_scale(),
        }
    }
}

fn default_player_start_size() -> f64 {
    31.6227766
}
fn default_player_min_size() -> f64 {
    31.6227766
}
fn default_player_max_size() -> f64 {
    1500.0
}
fn default_player_min_split() -> f64 {
    59.16079783
}
fn default_player_min_eject() -> f64 {
    59.16079783
}
fn default_player_max_cells() -> usize {
    16
}
fn default_player_speed() -> f64 {
    30.0
}
fn default_player_decay_rate() -> f64 {
    0.002
}
fn default_player_merge_time() -> f64 {
    30.0
}
fn default_player_split_speed() -> f64 {
    780.0
}
fn default_player_eat_mult() -> f64 {
    1.15
}
fn default_player_absorb_fraction() -> f64 {
    1.0
}
fn default_max_name_length() -> usize {
    15
}
fn default_view_box_width() -> f64 {
    1920.0
}
fn default_view_box_height() -> f64 {
    1080.0
}
fn default_min_view_box_scale() -> f64 {
    0.15
}

/// Food configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FoodConfig {
    #[serde(default = "default_food_size")]
    pub min_size: f64,
    #[serde(default = "default_food_size")]
    pub max_size: f64,
    #[serde(default = "default_food_min_amount")]
    pub min_amount: usize,
    #[serde(default = "default_food_max_amount")]
    pub max_amount: usize,
    #[serde(default = "default_food_spawn_amount")]
    pub spawn_amount: usize,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            min_size: default_food_size(),
            max_size: default_food_size(),
            min_amount: default_food_min_amount(),
            max_amount: default_food_max_amount(),
            spawn_amount: default_food_spawn_amount(),
        }
    }
}

fn default_food_size() -> f64 {
    10.0
}
fn default_food_min_amount() -> usize {
    1000
}
fn default_food_max_amount() -> usize {
    2000
}
fn default_food_spawn_amount() -> usize {
    30
}

/// Virus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VirusConfig {
    #[serde(default = "default_virus_min_size")]
    pub min_size: f64,
    #[serde(default = "default_virus_max_size")]
    pub max_size: f64,
    #[serde(default = "default_virus_min_amount")]
    pub min_amount: usize,
    #[serde(default = "default_virus_max_amount")]
    pub max_amount: usize,
    /// Boost given to a virus shot out of a fed one.
    #[serde(default = "default_virus_eject_speed")]
    pub eject_speed: f64,
    /// Viruses shot when a fed virus overflows.
    #[serde(default = "default_virus_split_count")]
    pub split_count: usize,
    /// Maximum total cells a player can have after a virus pop.
    #[serde(default = "default_virus_max_cells")]
    pub max_cells: usize,
    /// Minimum mass per fragment when a virus pops a player.
    #[serde(default = "default_virus_split_div")]
    pub split_div: f64,
}

impl Default for VirusConfig {
    fn default() -> Self {
        Self {
            min_size: default_virus_min_size(),
            max_size: default_virus_max_size(),
            min_amount: default_virus_min_amount(),
            max_amount: default_virus_max_amount(),
            eject_speed: default_virus_eject_speed(),
            split_count: default_virus_split_count(),
            max_cells: default_virus_max_cells(),
            split_div: default_virus_split_div(),
        }
    }
}

fn default_virus_min_size() -> f64 {
    100.0
}
fn default_virus_max_size() -> f64 {
    141.421356
}
fn default_virus_min_amount() -> usize {
    50
}
fn default_virus_max_amount() -> usize {
    100
}
fn default_virus_eject_speed() -> f64 {
    780.0
}
fn default_virus_split_count() -> usize {
    1
}
fn default_virus_max_cells() -> usize {
    16
}
fn default_virus_split_div() -> f64 {
    36.0
}

/// Ejected mass configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EjectConfig {
    #[serde(default = "default_eject_size")]
    pub size: f64,
    #[serde(default = "default_eject_size_loss")]
    pub size_loss: f64,
    #[serde(default = "default_eject_speed")]
    pub speed: f64,
    /// Minimum ticks between two ejects of the same player.
    #[serde(default = "default_eject_cooldown")]
    pub cooldown: u32,
}

impl Default for EjectConfig {
    fn default() -> Self {
        Self {
            size: default_eject_size(),
            size_loss: default_eject_size_loss(),
            speed: default_eject_speed(),
            cooldown: default_eject_cooldown(),
        }
    }
}

fn default_eject_size() -> f64 {
    36.056
}
fn default_eject_size_loss() -> f64 {
    41.231
}
fn default_eject_speed() -> f64 {
    780.0
}
fn default_eject_cooldown() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.min_supported_protocol, 4);
        assert_eq!(config.server.max_supported_protocol, 18);
        assert_eq!(config.player.max_name_length, 15);
        assert_eq!(config.player.max_cells, 16);
        assert_eq!(config.player.view_box_width, 1920.0);
        assert_eq!(config.player.view_box_height, 1080.0);
        assert_eq!(config.player.min_view_box_scale, 0.15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000
            max_supported_protocol = 11

            [player]
            absorb_fraction = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.max_supported_protocol, 11);
        assert_eq!(config.server.min_supported_protocol, 4);
        assert_eq!(config.player.absorb_fraction, 0.5);
        assert_eq!(config.food.min_amount, 1000);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back = Config::from_toml(&text).unwrap();
        assert_eq!(back.server.name, "Petri");
        assert_eq!(back.virus.split_count, 1);
    }

    #[test]
    fn test_inverted_ranges_are_rejected() {
        let mut config = Config::default();
        config.server.min_supported_protocol = 12;
        config.server.max_supported_protocol = 6;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedRange {
                field: "supported_protocol",
                ..
            })
        ));

        let mut config = Config::default();
        config.virus.min_size = 200.0;
        assert!(config.validate().is_err());
    }
}
