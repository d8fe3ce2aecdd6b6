//! SUMO process management behind the [`SimulationBackend`] trait.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use super::client::TraciConnection;
use super::traci::{
    TraciError, CMD_GET_SIM_VARIABLE, CMD_GET_TL_VARIABLE, CMD_GET_VEHICLE_VARIABLE,
    CMD_SET_TL_VARIABLE, ID_LIST, TL_RED_YELLOW_GREEN_STATE, VAR_POSITION, VAR_TIME, VAR_TYPE,
};
use crate::config::SumoSettings;
use crate::domain::Position;
use crate::infrastructure::error::{ErrorCode, SimResult, SimulationError};
use crate::infrastructure::traits::SimulationBackend;

/// How long SUMO may take to exit on its own after a clean close.
const EXIT_GRACE: Duration = Duration::from_secs(5);
const EXIT_POLL: Duration = Duration::from_millis(50);

struct Session {
    child: Child,
    conn: TraciConnection,
}

/// Launches `sumo` with a TraCI port and talks to it over TCP.
pub struct SumoIntegration {
    settings: SumoSettings,
    config_path: PathBuf,
    session: Option<Session>,
}

impl std::fmt::Debug for SumoIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SumoIntegration")
            .field("config_path", &self.config_path)
            .field("running", &self.is_running())
            .finish()
    }
}

impl SumoIntegration {
    /// Resolve the SUMO configuration file.
    ///
    /// Unless `bypass_config_check` is set, the config directory and the file
    /// inside it must exist.
    pub fn new(settings: &SumoSettings) -> SimResult<Self> {
        let config_path = if settings.bypass_config_check {
            PathBuf::from(&settings.config_file)
        } else {
            let dir = &settings.config_dir;
            if !dir.is_dir() {
                return Err(SimulationError::new(
                    ErrorCode::InvalidFilePath,
                    format!(
                        "SUMO config directory not found. Expected at: {}",
                        dir.display()
                    ),
                ));
            }
            let path = dir.join(&settings.config_file);
            if !path.is_file() {
                return Err(SimulationError::new(
                    ErrorCode::InvalidFilePath,
                    format!("SUMO config file not found: {}", path.display()),
                ));
            }
            path
        };
        debug!("using SUMO config {}", config_path.display());

        Ok(Self {
            settings: settings.clone(),
            config_path,
            session: None,
        })
    }

    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }

    fn session(&mut self, action: &str) -> SimResult<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| SimulationError::not_running(action))
    }

    fn conn(&mut self, action: &str) -> SimResult<&mut TraciConnection> {
        self.session(action).map(|s| &mut s.conn)
    }

    fn spawn(&self) -> SimResult<Child> {
        let mut command = Command::new(&self.settings.binary);
        command
            .arg("-c")
            .arg(&self.config_path)
            .arg("--remote-port")
            .arg(self.settings.port.to_string())
            .args(&self.settings.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        debug!("spawning {:?}", command);

        command.spawn().map_err(|e| {
            SimulationError::with_source(
                ErrorCode::Unknown,
                format!("Failed to start SUMO binary '{}'", self.settings.binary),
                e,
            )
        })
    }
}

fn traci_failure(code: ErrorCode, action: &str, e: TraciError) -> SimulationError {
    SimulationError::with_source(code, format!("Failed to {}", action), e)
}

/// Wait up to `grace` for the process to exit, then kill it.
fn reap(child: &mut Child, grace: Duration) {
    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("SUMO exited with {}", status);
                return;
            }
            Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL),
            Ok(None) => break,
            Err(e) => {
                warn!("failed to poll SUMO process: {}", e);
                break;
            }
        }
    }
    debug!("killing SUMO process {}", child.id());
    if let Err(e) = child.kill() {
        warn!("failed to kill SUMO process: {}", e);
    }
    if let Err(e) = child.wait() {
        warn!("failed to wait for SUMO process: {}", e);
    }
}

impl SimulationBackend for SumoIntegration {
    #[instrument(level = "debug", skip(self))]
    fn start(&mut self) -> SimResult<()> {
        if self.session.is_some() {
            return Err(SimulationError::new(
                ErrorCode::AlreadyRunning,
                "SUMO simulation already running.",
            ));
        }

        let mut child = self.spawn()?;
        let delay = Duration::from_millis(self.settings.retry_delay_ms);
        let mut conn = match TraciConnection::connect(
            &self.settings.address(),
            self.settings.connect_retries,
            delay,
        ) {
            Ok(conn) => conn,
            Err(e) => {
                reap(&mut child, Duration::ZERO);
                return Err(traci_failure(ErrorCode::Unknown, "connect to SUMO", e));
            }
        };

        match conn.version() {
            Ok((api, identifier)) => info!("connected to {} (TraCI API {})", identifier, api),
            Err(e) => warn!("could not query TraCI version: {}", e),
        }

        self.session = Some(Session { child, conn });
        Ok(())
    }

    fn step(&mut self) -> SimResult<()> {
        self.conn("step simulation")?
            .simulation_step()
            .map_err(|e| traci_failure(ErrorCode::Unknown, "step simulation", e))
    }

    #[instrument(level = "debug", skip(self))]
    fn stop(&mut self) -> SimResult<()> {
        let Some(Session { mut child, conn }) = self.session.take() else {
            return Err(SimulationError::not_running("stop simulation"));
        };

        let closed = conn.close();
        // a broken connection gets no grace period
        let grace = if closed.is_ok() {
            EXIT_GRACE
        } else {
            Duration::ZERO
        };
        reap(&mut child, grace);
        closed.map_err(|e| traci_failure(ErrorCode::Unknown, "close SUMO connection", e))?;
        info!("SUMO simulation stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.session.is_some()
    }

    fn simulation_time(&mut self) -> SimResult<f64> {
        self.conn("get simulation time")?
            .get_double(CMD_GET_SIM_VARIABLE, VAR_TIME, "")
            .map_err(|e| traci_failure(ErrorCode::Unknown, "get simulation time", e))
    }

    fn vehicle_ids(&mut self) -> SimResult<Vec<String>> {
        self.conn("get vehicle IDs")?
            .get_string_list(CMD_GET_VEHICLE_VARIABLE, ID_LIST)
            .map_err(|e| traci_failure(ErrorCode::Unknown, "get vehicle IDs", e))
    }

    fn vehicle_position(&mut self, vehicle_id: &str) -> SimResult<Position> {
        self.conn("get vehicle position")?
            .get_position(CMD_GET_VEHICLE_VARIABLE, VAR_POSITION, vehicle_id)
            .map_err(|e| traci_failure(ErrorCode::Unknown, "get vehicle position", e))
    }

    fn vehicle_type(&mut self, vehicle_id: &str) -> SimResult<String> {
        self.conn("get vehicle type")?
            .get_string(CMD_GET_VEHICLE_VARIABLE, VAR_TYPE, vehicle_id)
            .map_err(|e| traci_failure(ErrorCode::ParsingError, "get vehicle type", e))
    }

    fn traffic_light_ids(&mut self) -> SimResult<Vec<String>> {
        self.conn("get traffic light IDs")?
            .get_string_list(CMD_GET_TL_VARIABLE, ID_LIST)
            .map_err(|e| traci_failure(ErrorCode::Unknown, "get traffic light IDs", e))
    }

    fn traffic_light_state(&mut self, traffic_light_id: &str) -> SimResult<String> {
        self.conn("get traffic light state")?
            .get_string(CMD_GET_TL_VARIABLE, TL_RED_YELLOW_GREEN_STATE, traffic_light_id)
            .map_err(|e| traci_failure(ErrorCode::Unknown, "get traffic light state", e))
    }

    fn set_traffic_light_state(&mut self, traffic_light_id: &str, state: &str) -> SimResult<()> {
        self.conn("set traffic light state")?
            .set_string(
                CMD_SET_TL_VARIABLE,
                TL_RED_YELLOW_GREEN_STATE,
                traffic_light_id,
                state,
            )
            .map_err(|e| traci_failure(ErrorCode::Unknown, "set traffic light state", e))
    }
}

impl Drop for SumoIntegration {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(e) = self.stop() {
                warn!("error stopping SUMO on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bypass_uses_config_file_verbatim() {
        let settings = SumoSettings {
            bypass_config_check: true,
            config_file: "/nonexistent/sim.sumocfg".into(),
            ..SumoSettings::default()
        };
        let sumo = SumoIntegration::new(&settings).unwrap();
        assert_eq!(
            sumo.config_path(),
            std::path::Path::new("/nonexistent/sim.sumocfg")
        );
        assert!(!sumo.is_running());
    }

    #[test]
    fn test_traci_failure_keeps_cause_out_of_message() {
        let cause = TraciError::UnexpectedCommand {
            expected: 0x02,
            found: 0x7f,
        };
        let err = traci_failure(ErrorCode::Unknown, "step simulation", cause);

        assert_eq!(err.message(), "Failed to step simulation");
        assert_eq!(err.to_string(), "Failed to step simulation [Code: 0]");
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("unexpected command 0x7f"));
    }
}
