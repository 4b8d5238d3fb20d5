use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::inner::conf::dto::central_configuration::CentralConfigurationDto;
use crate::inner::error::CentralError;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = r###"BLE central: scans, connects and reads characteristics
"###
)]
pub(crate) struct AppConf {
    /// A YAML file with timeouts and device classes.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Default request timeout, overrides the one from the config file
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) default_timeout: Option<Duration>,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    pub(crate) metrics_listen_address: Option<SocketAddr>,

    /// Drop idle metrics after this time
    #[arg(long, value_parser = humantime::parse_duration, default_value = "60s")]
    pub(crate) metrics_idle_timeout: Duration,

    #[command(subcommand)]
    pub(crate) command: CentralCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CentralCommand {
    /// Scan for peripherals and print their advertisements
    Scan {
        /// Only report peripherals advertising one of these services
        #[arg(long)]
        service: Vec<Uuid>,

        /// Scan window
        #[arg(long, value_parser = humantime::parse_duration)]
        duration: Option<Duration>,
    },
    /// Connect to a peripheral, read one characteristic and disconnect
    Read {
        #[arg(long)]
        peripheral: String,

        #[arg(long)]
        service: Uuid,

        #[arg(long)]
        characteristic: Uuid,

        /// How long to scan for the peripheral before connecting
        #[arg(long, value_parser = humantime::parse_duration)]
        duration: Option<Duration>,
    },
}

impl TryFrom<&AppConf> for CentralConfigurationDto {
    type Error = CentralError;

    fn try_from(value: &AppConf) -> Result<Self, Self::Error> {
        let mut config = match &value.config {
            Some(path) => {
                let config = std::fs::read_to_string(path)?;
                serde_yaml::from_str::<CentralConfigurationDto>(&config)?
            }
            None => CentralConfigurationDto::default(),
        };
        if let Some(default_timeout) = value.default_timeout {
            config.default_timeout = default_timeout;
        }
        Ok(config)
    }
}
