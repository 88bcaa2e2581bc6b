//! Command handlers for the iLink CLI

use std::sync::Arc;
use std::time::Duration;

use ilink_ble::{BtleplugProvider, Session};
use ilink_core::{DeviceConfig, LogicalState, Preset, Rgb, StateUpdate};
use ilink_runtime::{LightCoordinator, LoggingRegistry, UpdateOutcome};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// How long `status` waits for the light to answer
const STATUS_WAIT: Duration = Duration::from_secs(5);

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Devices => Self::handle_devices_command(&config),
            Commands::Config => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
            ref command => {
                let device = config.resolve_device(cli.device.as_deref())?;
                let coordinator = Self::open(device, &config, cli.listen).await?;
                let result = Self::handle_light_command(&coordinator, command).await;
                coordinator.shutdown().await;
                result
            }
        }
    }

    fn handle_devices_command(config: &AppConfig) -> Result<()> {
        if config.devices.is_empty() {
            println!("No lights configured");
            return Ok(());
        }
        for device in &config.devices {
            println!(
                "{}  {}  (poll {}s, fast {}s)",
                device.address, device.name, device.scan_interval, device.scan_interval_fast
            );
        }
        Ok(())
    }

    /// Build the session and coordinator for one light
    async fn open(
        device: DeviceConfig,
        config: &AppConfig,
        listen_secs: u64,
    ) -> Result<Arc<LightCoordinator>> {
        let provider = BtleplugProvider::new().await?;
        if listen_secs > 0 {
            info!("Listening for {} for {}s", device.address, listen_secs);
            provider.listen(Duration::from_secs(listen_secs)).await?;
        }

        let session = Session::new(device.address, Arc::new(provider), config.session.clone());
        Ok(LightCoordinator::new(
            device,
            session,
            Arc::new(LoggingRegistry),
            config.coordinator.clone(),
        ))
    }

    async fn handle_light_command(
        coordinator: &Arc<LightCoordinator>,
        command: &Commands,
    ) -> Result<()> {
        match command {
            Commands::Status => Self::handle_status_command(coordinator).await,
            Commands::Watch => Self::handle_watch_command(coordinator).await,
            Commands::Preset { name } => {
                let preset: Preset = name.parse().map_err(CliError::InvalidArgument)?;
                for outcome in coordinator.apply_preset(preset).await? {
                    Self::settle(coordinator, outcome).await;
                }
                Self::print_state(&coordinator.state())
            }
            Commands::Set { key, value } => {
                match coordinator.update_key(key, value).await? {
                    UpdateOutcome::NotHandled => {
                        return Err(CliError::InvalidArgument(format!("unknown key: {key}")))
                    }
                    outcome => Self::settle(coordinator, outcome).await,
                }
                Self::print_state(&coordinator.state())
            }
            other => {
                let update = Self::update_for(other)?;
                let outcome = coordinator.update_state(update).await?;
                Self::settle(coordinator, outcome).await;
                Self::print_state(&coordinator.state())
            }
        }
    }

    /// Translate a direct command into a state update
    fn update_for(command: &Commands) -> Result<StateUpdate> {
        let update = match *command {
            Commands::On => StateUpdate::Power(true),
            Commands::Off => StateUpdate::Power(false),
            Commands::Brightness { value } => StateUpdate::Brightness(value),
            Commands::Temp { kelvin } => StateUpdate::ColorTemp(kelvin),
            Commands::Rgb { r, g, b } => StateUpdate::Rgb(Rgb::from_channels(r, g, b)?),
            Commands::Scene { id } => StateUpdate::Scene(id),
            _ => {
                return Err(CliError::InvalidArgument(format!(
                    "{command:?} is not a state change"
                )))
            }
        };
        Ok(update)
    }

    /// Wait until a deferred update has been written
    async fn settle(coordinator: &LightCoordinator, outcome: UpdateOutcome) {
        if outcome != UpdateOutcome::Deferred {
            return;
        }
        debug!("Update deferred, waiting for the link to free up");
        while coordinator.pending_update().is_some() {
            sleep(Duration::from_millis(100)).await;
        }
    }

    async fn handle_status_command(coordinator: &LightCoordinator) -> Result<()> {
        let mut state_rx = coordinator.subscribe();
        state_rx.borrow_and_update();
        coordinator.refresh().await;

        if coordinator.session().last_status().is_none()
            && timeout(STATUS_WAIT, state_rx.changed()).await.is_err()
        {
            warn!("No status received from {}", coordinator.address());
        }

        Self::print_state(&coordinator.state())
    }

    async fn handle_watch_command(coordinator: &Arc<LightCoordinator>) -> Result<()> {
        let mut state_rx = coordinator.subscribe();
        coordinator.start();
        info!(
            "Watching {} every {:?}, press Ctrl-C to stop",
            coordinator.address(),
            coordinator.poll_interval()
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *state_rx.borrow_and_update();
                    Self::print_state(&state)?;
                }
            }
        }
        Ok(())
    }

    fn print_state(state: &LogicalState) -> Result<()> {
        println!("{}", serde_json::to_string(state)?);
        Ok(())
    }
}
