//! Application service: routing of backend commands to their handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use burrow_common::{CommandEnvelope, CommandKind};
use tracing::{debug, info, warn};

use crate::application::ports::CommandHandler;
use crate::domain::CommandError;

/// Maps each [`CommandKind`] to at most one handler.
#[derive(Clone, Default)]
pub struct CommandDispatcher {
    handlers: HashMap<CommandKind, Arc<dyn CommandHandler>>,
}

impl CommandDispatcher {
    /// Dispatcher with no handlers registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with a logging no-op handler for every known kind.
    #[must_use]
    pub fn with_default_handlers() -> Self {
        let mut dispatcher = Self::new();
        for kind in CommandKind::ALL {
            dispatcher.register(kind, Arc::new(LogOnlyHandler));
        }
        dispatcher
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: CommandKind, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Route one envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownKind`] for kinds outside the fixed set,
    /// [`CommandError::Unhandled`] when no handler is registered, or the
    /// handler's own error.
    pub async fn dispatch(&self, envelope: &CommandEnvelope) -> Result<(), CommandError> {
        let kind = envelope
            .command_kind()
            .map_err(|e| CommandError::UnknownKind(e.0))?;
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| CommandError::Unhandled(kind.to_string()))?;
        debug!(%kind, "dispatching command");
        handler.handle(envelope).await
    }

    /// Dispatch and log the outcome. Errors never escape.
    pub async fn dispatch_logged(&self, envelope: &CommandEnvelope) {
        match self.dispatch(envelope).await {
            Ok(()) => {}
            Err(CommandError::UnknownKind(kind)) => {
                warn!(%kind, "dropping command of unknown kind");
            }
            Err(e) => warn!(kind = %envelope.kind, error = %e, "command failed"),
        }
    }
}

/// Default handler: records the command and does nothing else.
struct LogOnlyHandler;

#[async_trait]
impl CommandHandler for LogOnlyHandler {
    async fn handle(&self, envelope: &CommandEnvelope) -> Result<(), CommandError> {
        info!(
            kind = %envelope.kind,
            payload_keys = envelope.payload.len(),
            "received command"
        );
        Ok(())
    }
}
