//! Preference state machine.
//!
//! Menu selections arrive as opaque callback keys. They are parsed into a
//! closed [`MenuEvent`] set and applied by [`PreferenceMachine::apply`],
//! which returns a [`MenuOutcome`] the transport renders.

use crate::manager::{ConversationStats, SessionManager};
use crate::preferences::Preferences;
use parley_ai::{Persona, Provider};
use parley_core::UserId;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const PERSONA_PREFIX: &str = "prompt_";
const PROVIDER_PREFIX: &str = "ai_";

/// A user's menu selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEvent {
    SelectProvider(Provider),
    SelectPersona(Persona),
    NewChat,
    ViewStats,
    ClearHistory,
    ShowMainMenu,
    ShowPersonaMenu,
    Help,
    /// A key outside the known set, kept for logging.
    Unrecognized(String),
}

impl MenuEvent {
    /// Parses a callback key.
    #[must_use]
    pub fn parse(key: &str) -> Self {
        match key {
            "new_chat" => return Self::NewChat,
            "stats" => return Self::ViewStats,
            "clear_history" => return Self::ClearHistory,
            "back_main" => return Self::ShowMainMenu,
            "change_prompt" => return Self::ShowPersonaMenu,
            "help" => return Self::Help,
            _ => {}
        }

        if let Some(name) = key.strip_prefix(PROVIDER_PREFIX)
            && let Ok(provider) = name.parse()
        {
            return Self::SelectProvider(provider);
        }
        if let Some(name) = key.strip_prefix(PERSONA_PREFIX)
            && let Ok(persona) = name.parse()
        {
            return Self::SelectPersona(persona);
        }

        Self::Unrecognized(key.to_string())
    }

    /// Returns the callback key this event parses from.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::SelectProvider(provider) => format!("{PROVIDER_PREFIX}{provider}"),
            Self::SelectPersona(persona) => format!("{PERSONA_PREFIX}{persona}"),
            Self::NewChat => "new_chat".to_string(),
            Self::ViewStats => "stats".to_string(),
            Self::ClearHistory => "clear_history".to_string(),
            Self::ShowMainMenu => "back_main".to_string(),
            Self::ShowPersonaMenu => "change_prompt".to_string(),
            Self::Help => "help".to_string(),
            Self::Unrecognized(key) => key.clone(),
        }
    }
}

/// The result of applying a [`MenuEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum MenuOutcome {
    ProviderSelected { provider: Provider, persisted: bool },
    PersonaSelected { persona: Persona, persisted: bool },
    SessionReset { provider: Provider },
    Stats {
        stats: ConversationStats,
        preferences: Preferences,
    },
    HistoryCleared { success: bool },
    MainMenu,
    PersonaMenu,
    Help,
    /// The event was not understood; nothing changed.
    Ignored { key: String },
}

/// Applies menu events to a user's preferences and session.
#[derive(Debug, Clone)]
pub struct PreferenceMachine {
    manager: Arc<SessionManager>,
}

impl PreferenceMachine {
    #[must_use]
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn apply(&self, user_id: UserId, event: MenuEvent) -> MenuOutcome {
        match event {
            MenuEvent::SelectProvider(provider) => {
                let persisted = self
                    .manager
                    .update_preferences(user_id, |p| p.provider = provider)
                    .await
                    .inspect_err(|e| warn!(error = %e, "Failed to save provider"))
                    .is_ok();
                info!(provider = %provider, persisted, "Provider selected");
                MenuOutcome::ProviderSelected {
                    provider,
                    persisted,
                }
            }
            MenuEvent::SelectPersona(persona) => {
                let persisted = self
                    .manager
                    .update_preferences(user_id, |p| p.persona = persona)
                    .await
                    .inspect_err(|e| warn!(error = %e, "Failed to save persona"))
                    .is_ok();
                info!(persona = %persona, persisted, "Persona selected");
                MenuOutcome::PersonaSelected { persona, persisted }
            }
            MenuEvent::NewChat => {
                self.manager.reset_session(user_id).await;
                let provider = self.manager.preferences(user_id).await.provider;
                MenuOutcome::SessionReset { provider }
            }
            MenuEvent::ViewStats => MenuOutcome::Stats {
                stats: self.manager.stats(user_id).await,
                preferences: self.manager.preferences(user_id).await,
            },
            MenuEvent::ClearHistory => MenuOutcome::HistoryCleared {
                success: self.manager.clear_history(user_id).await,
            },
            MenuEvent::ShowMainMenu => MenuOutcome::MainMenu,
            MenuEvent::ShowPersonaMenu => MenuOutcome::PersonaMenu,
            MenuEvent::Help => MenuOutcome::Help,
            MenuEvent::Unrecognized(key) => {
                warn!(key = %key, "Ignoring unrecognized menu key");
                MenuOutcome::Ignored { key }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ConversationConfig;
    use crate::manager::testing::ScriptedAdapter;
    use crate::store::{HistoryStore, InMemoryStore, SettingsStore};
    use parley_ai::ProviderRegistry;

    fn machine() -> (PreferenceMachine, Arc<SessionManager>, Arc<InMemoryStore>, Arc<ScriptedAdapter>) {
        let store = Arc::new(InMemoryStore::new());
        let perplexity = Arc::new(ScriptedAdapter::new(Provider::Perplexity));
        let registry = ProviderRegistry::new()
            .with(Arc::new(ScriptedAdapter::new(Provider::OpenAi)))
            .with(perplexity.clone());
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            store.clone(),
            registry,
            ConversationConfig::default(),
        ));
        (
            PreferenceMachine::new(Arc::clone(&manager)),
            manager,
            store,
            perplexity,
        )
    }

    #[test]
    fn parse_known_keys() {
        assert_eq!(
            MenuEvent::parse("ai_perplexity"),
            MenuEvent::SelectProvider(Provider::Perplexity)
        );
        assert_eq!(
            MenuEvent::parse("prompt_teacher"),
            MenuEvent::SelectPersona(Persona::Teacher)
        );
        assert_eq!(MenuEvent::parse("new_chat"), MenuEvent::NewChat);
        assert_eq!(MenuEvent::parse("change_prompt"), MenuEvent::ShowPersonaMenu);
    }

    #[test]
    fn parse_unknown_keys() {
        assert_eq!(
            MenuEvent::parse("prompt_pirate"),
            MenuEvent::Unrecognized("prompt_pirate".to_string())
        );
        assert_eq!(
            MenuEvent::parse("ai_claude"),
            MenuEvent::Unrecognized("ai_claude".to_string())
        );
    }

    #[test]
    fn keys_parse_back() {
        let events = [
            MenuEvent::SelectProvider(Provider::OpenAi),
            MenuEvent::SelectPersona(Persona::Creative),
            MenuEvent::ViewStats,
            MenuEvent::ClearHistory,
            MenuEvent::ShowMainMenu,
            MenuEvent::Help,
        ];
        for event in events {
            assert_eq!(MenuEvent::parse(&event.key()), event);
        }
    }

    #[tokio::test]
    async fn select_provider_then_converse_uses_it() {
        let (machine, manager, _store, perplexity) = machine();
        let user = UserId::new(1);

        let outcome = machine
            .apply(user, MenuEvent::SelectProvider(Provider::Perplexity))
            .await;
        assert_eq!(
            outcome,
            MenuOutcome::ProviderSelected {
                provider: Provider::Perplexity,
                persisted: true
            }
        );

        let reply = manager.converse(user, "Hi").await.unwrap();
        assert_eq!(reply.provider, Provider::Perplexity);
        assert_eq!(perplexity.call_count(), 1);
    }

    #[tokio::test]
    async fn select_persona_persists() {
        let (machine, manager, _store, _) = machine();
        let user = UserId::new(1);

        machine
            .apply(user, MenuEvent::SelectPersona(Persona::Casual))
            .await;

        assert_eq!(manager.preferences(user).await.persona, Persona::Casual);
    }

    #[tokio::test]
    async fn unrecognized_key_changes_nothing() {
        let (machine, manager, store, _) = machine();
        let user = UserId::new(1);
        manager.ensure_session(user, None).await;

        let outcome = machine
            .apply(user, MenuEvent::parse("prompt_pirate"))
            .await;

        assert_eq!(
            outcome,
            MenuOutcome::Ignored {
                key: "prompt_pirate".to_string()
            }
        );
        assert_eq!(
            store.preferences(user).await.unwrap(),
            Some(Preferences::default())
        );
    }

    #[tokio::test]
    async fn new_chat_resets_window_only() {
        let (machine, manager, store, _) = machine();
        let user = UserId::new(1);
        manager.converse(user, "Hi").await.unwrap();

        let outcome = machine.apply(user, MenuEvent::NewChat).await;

        assert_eq!(
            outcome,
            MenuOutcome::SessionReset {
                provider: Provider::OpenAi
            }
        );
        assert!(manager.session(user).unwrap().is_empty());
        assert_eq!(store.count_turns().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stats_and_clear_history() {
        let (machine, manager, _store, _) = machine();
        let user = UserId::new(1);
        manager.converse(user, "Hi").await.unwrap();

        let MenuOutcome::Stats { stats, preferences } =
            machine.apply(user, MenuEvent::ViewStats).await
        else {
            panic!("expected stats outcome");
        };
        assert_eq!(stats.total_turns, 1);
        assert_eq!(preferences, Preferences::default());

        assert_eq!(
            machine.apply(user, MenuEvent::ClearHistory).await,
            MenuOutcome::HistoryCleared { success: true }
        );
        assert_eq!(manager.stats(user).await.total_turns, 0);
    }
}
