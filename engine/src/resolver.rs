//! Command resolution
//!
//! Maps free text like `/emoji laugh` to a directly runnable command. The
//! registry is immutable once built; a reload swaps in a whole new one.

use std::sync::{Arc, PoisonError, RwLock};

use lancea_model::ResolvedCommand;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Alias that matches any text when nothing more specific does
pub const WILDCARD_ALIAS: &str = "*";

/// Id of the command that lists the registry itself
pub const COMMANDS_ID: &str = "commands";

/// One entry in the command registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSpec {
    pub id: String,
    pub provider_id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CommandSpec {
    pub fn new(id: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider_id: provider_id.into(),
            aliases: Vec::new(),
            intent: None,
            description: None,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// First alias that is not the wildcard, used when inserting the command
    pub fn primary_alias(&self) -> Option<&str> {
        self.aliases
            .iter()
            .map(String::as_str)
            .find(|a| !a.is_empty() && *a != WILDCARD_ALIAS)
    }

    fn is_wildcard(&self) -> bool {
        self.aliases.iter().any(|a| a == WILDCARD_ALIAS)
    }

    fn resolved(&self, reason: &str, argument: &str) -> ResolvedCommand {
        ResolvedCommand {
            matched: true,
            provider_id: Some(self.provider_id.clone()),
            command_id: Some(self.id.clone()),
            intent: self.intent.clone(),
            reason: Some(reason.to_string()),
            argument: (!argument.is_empty()).then(|| argument.to_string()),
        }
    }
}

/// Ordered set of commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRegistry {
    commands: Vec<CommandSpec>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the built-in `commands` entry
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            CommandSpec::new(COMMANDS_ID, COMMANDS_ID)
                .with_aliases(["/commands", "/cmd"])
                .with_description("List available commands"),
        );
        registry
    }

    /// Add a command; an existing command with the same id is replaced in place
    pub fn register(&mut self, spec: CommandSpec) {
        debug!(command_id = %spec.id, aliases = ?spec.aliases, "CommandRegistry::register: called");
        match self.commands.iter_mut().find(|c| c.id == spec.id) {
            Some(existing) => *existing = spec,
            None => self.commands.push(spec),
        }
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    pub fn get(&self, command_id: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|c| c.id == command_id)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Resolve free text to a command
    ///
    /// The longest alias that prefixes the trimmed text wins, so partial input
    /// like `/emo` already resolves while the user types. Ties go to the
    /// command registered first.
    pub fn resolve(&self, text: &str) -> ResolvedCommand {
        let trimmed = text.trim();
        debug!(text = %trimmed, "CommandRegistry::resolve: called");

        let mut best: Option<(&CommandSpec, &str)> = None;
        for spec in &self.commands {
            for alias in &spec.aliases {
                if alias.is_empty() || alias == WILDCARD_ALIAS || !trimmed.starts_with(alias.as_str()) {
                    continue;
                }
                if best.is_none_or(|(_, b)| alias.len() > b.len()) {
                    best = Some((spec, alias));
                }
            }
        }

        if let Some((spec, alias)) = best {
            let argument = trimmed[alias.len()..].trim_start();
            debug!(command_id = %spec.id, %alias, "CommandRegistry::resolve: alias matched");
            return spec.resolved("slash-command", argument);
        }

        if let Some(spec) = self.commands.iter().find(|c| c.is_wildcard()) {
            debug!(command_id = %spec.id, "CommandRegistry::resolve: wildcard matched");
            return spec.resolved("wildcard", trimmed);
        }

        debug!("CommandRegistry::resolve: no match");
        ResolvedCommand::none()
    }
}

/// Shared, swappable handle to the current registry
#[derive(Debug)]
pub struct CommandResolver {
    registry: RwLock<Arc<CommandRegistry>>,
}

impl CommandResolver {
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            registry: RwLock::new(Arc::new(registry)),
        }
    }

    pub fn resolve(&self, text: &str) -> ResolvedCommand {
        self.snapshot().resolve(text)
    }

    /// The registry in effect right now
    pub fn snapshot(&self) -> Arc<CommandRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Swap in a new registry; resolutions already running keep the old one
    pub fn replace(&self, registry: CommandRegistry) {
        debug!(commands = registry.len(), "CommandResolver::replace: called");
        *self.registry.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(registry);
    }
}

impl Default for CommandResolver {
    fn default() -> Self {
        Self::new(CommandRegistry::with_builtins())
    }
}
