//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::exitcode;
use crate::infrastructure::{ErrorCode, InfraError, SimulationError};

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// Input was read but failed validation
    #[error("{0}")]
    Data(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

impl From<SimulationError> for CliError {
    fn from(e: SimulationError) -> Self {
        CliError::Infra(InfraError::Simulation(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

fn simulation_exit_code(e: &SimulationError) -> i32 {
    match e.code() {
        ErrorCode::InvalidFilePath => exitcode::NOINPUT,
        ErrorCode::ParsingError => exitcode::DATAERR,
        _ => exitcode::UNAVAILABLE,
    }
}

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) => exitcode::USAGE,
            CliError::Data(_) => exitcode::DATAERR,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => exitcode::IOERR,
                InfraError::Simulation(e) => simulation_exit_code(e),
                InfraError::Application(e) => match e {
                    ApplicationError::Config { .. } => exitcode::CONFIG,
                    ApplicationError::Domain(_) | ApplicationError::NetworkParse { .. } => {
                        exitcode::DATAERR
                    }
                    ApplicationError::Simulation(e) => simulation_exit_code(e),
                    ApplicationError::OperationFailed { .. } => exitcode::IOERR,
                },
            },
        }
    }
}
