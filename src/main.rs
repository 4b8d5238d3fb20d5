use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::init::{init_prometheus, init_tracing};
use crate::inner::central::Central;
use crate::inner::conf::cmd_args::{AppConf, CentralCommand};
use crate::inner::conf::dto::central_configuration::CentralConfigurationDto;
use crate::inner::error::CentralError;
use crate::inner::model::advertisement::Advertisement;
use crate::inner::model::fqcn::Fqcn;
use crate::inner::model::peripheral_id::PeripheralId;
use crate::inner::model::response::Response;
use crate::inner::radio::btleplug_radio::BtleplugRadio;
use crate::inner::request::Abruption;

mod init;
mod inner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let app_conf = AppConf::parse();
    let configuration = Arc::new(CentralConfigurationDto::try_from(&app_conf)?);
    if let Some(listen_address) = app_conf.metrics_listen_address {
        init_prometheus(app_conf.metrics_idle_timeout, listen_address)?;
    }

    let (radio, events) = BtleplugRadio::init().await?;
    let (central, dispatcher) = Central::new(radio, configuration);

    let mut join_set: JoinSet<anyhow::Result<()>> = JoinSet::new();
    join_set.spawn(async move {
        dispatcher.dispatch_all(events).await?;
        Ok(())
    });

    let notifications = central.subscribe().await;
    join_set.spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            info!(?notification, "Central notification");
        }
        Ok(())
    });

    let result = run(&central, app_conf.command).await;
    if let Err(error) = &result {
        warn!(%error, "Command failed");
    }
    join_set.abort_all();

    result
}

async fn run(central: &Central, command: CentralCommand) -> anyhow::Result<()> {
    match command {
        CentralCommand::Scan { service, duration } => {
            let services = (!service.is_empty()).then_some(service);
            for advertisement in scan(central, services, duration).await? {
                info!(%advertisement, "Found peripheral");
            }
            Ok(())
        }
        CentralCommand::Read {
            peripheral,
            service,
            characteristic,
            duration,
        } => {
            let peripheral = PeripheralId::from(peripheral.to_uppercase());
            scan(central, None, duration).await?;
            let Some(device) = central.device(&peripheral).await? else {
                bail!("Peripheral {peripheral} was not discovered");
            };
            info!(%device, "Connecting");

            let value = read(central, Fqcn::new(peripheral.clone(), service, characteristic)).await;

            let disconnected = central
                .wait_for(|central, continuation| central.disconnect(peripheral.clone(), None, continuation))
                .await;
            if let Err(error) = disconnected {
                warn!(%error, "Failed to disconnect");
            }

            let value: String = value?.iter().map(|byte| format!("{byte:02x}")).collect();
            info!(%value, "Read characteristic");
            Ok(())
        }
    }
}

async fn scan(
    central: &Central,
    services: Option<Vec<Uuid>>,
    duration: Option<Duration>,
) -> anyhow::Result<Vec<Advertisement>> {
    let response = central
        .wait_for(|central, continuation| central.scan(services, duration, continuation))
        .await?;
    match response {
        Some(Response::Advertisements(advertisements)) => Ok(advertisements),
        other => Err(anyhow!("Unexpected scan response: {other:?}")),
    }
}

async fn read(central: &Central, fqcn: Fqcn) -> anyhow::Result<Vec<u8>> {
    let peripheral = fqcn.peripheral.clone();
    let abruption: Abruption = Box::new(|error: CentralError| warn!(%error, "Connection dropped"));
    central
        .wait_for(|central, continuation| {
            central.connect(peripheral.clone(), Some(abruption), None, continuation)
        })
        .await?;

    central
        .wait_for(|central, continuation| {
            central.discover_services(peripheral.clone(), Some(vec![fqcn.service]), None, continuation)
        })
        .await?;
    central
        .wait_for(|central, continuation| {
            central.discover_characteristics(
                peripheral.clone(),
                fqcn.service,
                Some(vec![fqcn.characteristic]),
                None,
                continuation,
            )
        })
        .await?;

    match central
        .wait_for(|central, continuation| central.read(fqcn.clone(), None, continuation))
        .await?
    {
        Some(Response::Value(value)) => Ok(value),
        other => Err(anyhow!("Unexpected read response: {other:?}")),
    }
}
