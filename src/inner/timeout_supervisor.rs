use std::time::Duration;

use tracing::{debug, warn};

use crate::inner::radio::{CommandExecutor, RadioCommand};
use crate::inner::registry::{Expiry, RequestRegistry};
use crate::inner::request::{RequestId, RequestKind};

/// Arms one deadline per request. The deadline action is queued on the command executor,
/// so it is ordered after the command that was issued for the same request.
#[derive(Clone)]
pub(crate) struct TimeoutSupervisor {
    commands: CommandExecutor,
    registry: RequestRegistry,
}

impl TimeoutSupervisor {
    pub(crate) fn new(commands: CommandExecutor, registry: RequestRegistry) -> Self {
        Self { commands, registry }
    }

    pub(crate) fn arm(&self, kind: RequestKind, id: RequestId, timeout: Duration) {
        let supervisor = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let registry = supervisor.registry.clone();
            let commands = supervisor.commands.clone();
            let queued = supervisor.commands.execute(move |_| {
                let _ = registry.execute(move |registries| match registries.expire(kind, id) {
                    Expiry::Absent => debug!(%kind, %id, "Deadline reached for a resolved request"),
                    Expiry::TimedOut => {}
                    Expiry::ScanCompleted { remaining: 0 } => {
                        let _ = commands.issue(RadioCommand::StopScan);
                    }
                    Expiry::ScanCompleted { remaining } => debug!(remaining, "Scanning continues"),
                });
            });
            if queued.is_err() {
                warn!(%kind, %id, "Deadline dropped: command executor is closed");
            }
        });
    }
}
