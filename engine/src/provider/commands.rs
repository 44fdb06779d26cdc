//! Built-in provider that searches the command registry

use std::sync::Arc;

use async_trait::async_trait;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use lancea_model::{Outcome, Preview, ResultItem};
use serde_json::json;
use tracing::debug;

use super::{BatchSink, Capabilities, Provider, ProviderError, Query};
use crate::resolver::{COMMANDS_ID, CommandResolver, CommandSpec};

/// Action that returns the text to put in the input box
pub const SELECT_ACTION: &str = "select";

const KEY_PREFIX: &str = "commands:";

/// Lists registered commands, fuzzy-filtered by the query
pub struct CommandsProvider {
    resolver: Arc<CommandResolver>,
    matcher: SkimMatcherV2,
}

impl CommandsProvider {
    pub fn new(resolver: Arc<CommandResolver>) -> Self {
        Self {
            resolver,
            matcher: SkimMatcherV2::default(),
        }
    }

    pub fn key_for(command_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, command_id)
    }

    fn lookup(&self, key: &str) -> Result<CommandSpec, ProviderError> {
        let unknown = || ProviderError::UnknownKey { key: key.to_string() };
        let id = key.strip_prefix(KEY_PREFIX).ok_or_else(unknown)?;
        self.resolver.snapshot().get(id).cloned().ok_or_else(unknown)
    }

    /// Text to filter by; `/commands foo` filters by `foo`
    fn filter_text(&self, text: &str) -> String {
        let resolved = self.resolver.resolve(text);
        if resolved.command_id.as_deref() == Some(COMMANDS_ID) && resolved.reason.as_deref() == Some("slash-command") {
            return resolved.argument.unwrap_or_default().to_lowercase();
        }
        text.trim().to_lowercase()
    }

    fn score(&self, spec: &CommandSpec, filter: &str) -> Option<i64> {
        if filter.is_empty() {
            return Some(0);
        }

        let id_score = self.matcher.fuzzy_match(&spec.id.to_lowercase(), filter);
        let alias_score = spec
            .aliases
            .iter()
            .filter_map(|a| self.matcher.fuzzy_match(&a.to_lowercase(), filter))
            .max();
        let desc_score = spec
            .description
            .as_ref()
            .and_then(|d| self.matcher.fuzzy_match(&d.to_lowercase(), filter))
            .map(|s| s / 2);

        let best = [id_score, alias_score, desc_score].into_iter().flatten().max()?;
        let prefix_boost = if spec.id.to_lowercase().starts_with(filter) { 100 } else { 0 };
        Some(best + prefix_boost)
    }

    fn item(spec: &CommandSpec, score: i64) -> ResultItem {
        let title = spec.primary_alias().unwrap_or(&spec.id).to_string();
        let subtitle = spec
            .description
            .clone()
            .unwrap_or_else(|| format!("{} provider", spec.provider_id));
        ResultItem::new(COMMANDS_ID, Self::key_for(&spec.id), title)
            .with_subtitle(subtitle)
            .with_score(score as f32)
            .with_display(json!({
                "commandId": spec.id,
                "providerId": spec.provider_id,
                "aliases": spec.aliases,
            }))
    }
}

#[async_trait]
impl Provider for CommandsProvider {
    fn id(&self) -> &str {
        COMMANDS_ID
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    async fn search(&self, query: &Query, sink: BatchSink) -> Result<(), ProviderError> {
        let filter = self.filter_text(&query.text);
        debug!(epoch = %query.epoch, %filter, "CommandsProvider::search: called");

        let registry = self.resolver.snapshot();
        let mut scored: Vec<(&CommandSpec, i64)> = registry
            .commands()
            .iter()
            .filter_map(|spec| self.score(spec, &filter).map(|s| (spec, s)))
            .collect();
        // Stable sort keeps registration order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        let items = scored.into_iter().map(|(spec, score)| Self::item(spec, score)).collect();
        sink.reset(items).await?;
        Ok(())
    }

    async fn preview(&self, key: &str) -> Result<Preview, ProviderError> {
        debug!(%key, "CommandsProvider::preview: called");
        let spec = self.lookup(key)?;
        Ok(Preview::card(json!({
            "title": spec.primary_alias().unwrap_or(&spec.id),
            "commandId": spec.id,
            "providerId": spec.provider_id,
            "aliases": spec.aliases,
            "intent": spec.intent,
            "description": spec.description,
        })))
    }

    async fn execute(&self, action: &str, key: &str) -> Result<Outcome, ProviderError> {
        debug!(%action, %key, "CommandsProvider::execute: called");
        let spec = self.lookup(key)?;
        if action != SELECT_ACTION {
            return Err(ProviderError::UnknownAction {
                action: action.to_string(),
            });
        }
        let insert = spec.primary_alias().map(|a| format!("{} ", a)).unwrap_or_default();
        Ok(Outcome::ok_with(json!({
            "insertText": insert,
            "commandId": spec.id,
            "providerId": spec.provider_id,
        })))
    }
}
