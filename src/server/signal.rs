//! Termination signal handling

use crate::{CmdLogError, Result};
use tokio::signal::unix::{signal, Signal, SignalKind};

/// SIGINT and SIGTERM listeners, registered up front so a registration
/// failure is caught before the server starts.
pub struct TerminationSignals {
    interrupt: Signal,
    terminate: Signal,
}

impl TerminationSignals {
    /// Install handlers for SIGINT and SIGTERM
    pub fn register() -> Result<Self> {
        let interrupt = signal(SignalKind::interrupt())
            .map_err(|e| CmdLogError::Setup(format!("Failed to register SIGINT: {}", e)))?;
        let terminate = signal(SignalKind::terminate())
            .map_err(|e| CmdLogError::Setup(format!("Failed to register SIGTERM: {}", e)))?;
        Ok(Self {
            interrupt,
            terminate,
        })
    }

    /// Wait for either signal and return its name
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register() {
        assert!(TerminationSignals::register().is_ok());
    }
}
