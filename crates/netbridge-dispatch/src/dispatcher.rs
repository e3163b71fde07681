//! Command Dispatcher
//!
//! A static, ordered table of `(name, usage, handler)` records. Lookup is
//! a linear exact-match scan; names are checked for uniqueness once, when
//! the dispatcher is built.

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::commands;
use crate::context::BridgeContext;
use crate::conversion::Args;
use crate::error::{BridgeError, BridgeResult};
use crate::value::HostValue;

/// Signature of a command implementation
pub type Handler = fn(&mut BridgeContext, Args<'_>) -> BridgeResult<Vec<HostValue>>;

/// One entry of the command table.
#[derive(Clone, Copy)]
pub struct Command {
    /// Name the host calls the command by
    pub name: &'static str,
    /// Usage line reported on misuse
    pub usage: &'static str,
    /// Implementation
    pub handler: Handler,
}

impl Command {
    /// Create a table entry
    pub const fn new(name: &'static str, usage: &'static str, handler: Handler) -> Self {
        Self {
            name,
            usage,
            handler,
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .finish()
    }
}

/// Routes named calls to their handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    commands: Vec<Command>,
}

impl Dispatcher {
    /// Dispatcher over the built-in command table
    pub fn new() -> BridgeResult<Self> {
        Self::with_commands(commands::COMMANDS.to_vec())
    }

    /// Dispatcher over a custom table; fails on duplicate names
    pub fn with_commands(commands: Vec<Command>) -> BridgeResult<Self> {
        let mut seen = FxHashSet::default();
        for command in &commands {
            if !seen.insert(command.name) {
                return Err(BridgeError::DuplicateCommand {
                    name: command.name.to_string(),
                });
            }
        }
        Ok(Self { commands })
    }

    /// Registered commands in table order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Find a command by exact name
    pub fn lookup(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|command| command.name == name)
    }

    /// Run a command
    pub fn dispatch(
        &self,
        ctx: &mut BridgeContext,
        name: &str,
        args: &[HostValue],
    ) -> BridgeResult<Vec<HostValue>> {
        let command = self.lookup(name).ok_or_else(|| {
            debug!(command = name, "unknown command");
            BridgeError::unknown_command(name)
        })?;
        debug!(command = name, args = args.len(), "dispatch");

        (command.handler)(ctx, Args::new(command.usage, args)).map_err(|err| {
            warn!(command = name, error = %err, "command failed");
            err
        })
    }
}
