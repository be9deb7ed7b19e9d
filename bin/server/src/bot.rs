//! Event dispatcher.
//!
//! Turns inbound [`UserEvent`]s into session-manager and menu calls, and
//! renders the results as outbound messages. Every event is handled to
//! completion; transport failures are logged, never propagated to the
//! caller.

use crate::error::TransportError;
use crate::event::{Command, Sender, UserEvent};
use crate::outbound::{Button, Delivery, Keyboard, SendMessage, Transport, deliver_reply};
use parley_ai::{Persona, Provider};
use parley_conversation::{
    ConversationStats, MenuEvent, MenuOutcome, Preferences, PreferenceMachine, SessionManager,
};
use parley_core::{ChatId, MessageId};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Dispatches user events for one bot.
pub struct Bot {
    manager: Arc<SessionManager>,
    menu: PreferenceMachine,
    transport: Arc<dyn Transport>,
    delivery: Delivery,
}

fn provider_label(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "🧠 OpenAI",
        Provider::Perplexity => "🔍 Perplexity",
    }
}

fn persona_label(persona: Persona) -> String {
    let icon = match persona {
        Persona::Assistant => "🤖",
        Persona::Creative => "🎨",
        Persona::Technical => "⚙️",
        Persona::Casual => "😊",
        Persona::Teacher => "👨‍🏫",
    };
    format!("{icon} {}", persona.label())
}

fn back_button() -> Button {
    Button::new("🔙 Back", MenuEvent::ShowMainMenu.key())
}

fn main_keyboard() -> Keyboard {
    Keyboard::new(vec![
        vec![
            Button::new(
                provider_label(Provider::OpenAi),
                MenuEvent::SelectProvider(Provider::OpenAi).key(),
            ),
            Button::new(
                provider_label(Provider::Perplexity),
                MenuEvent::SelectProvider(Provider::Perplexity).key(),
            ),
        ],
        vec![
            Button::new("💭 New chat", MenuEvent::NewChat.key()),
            Button::new("📊 Statistics", MenuEvent::ViewStats.key()),
        ],
        vec![
            Button::new("🎭 Persona", MenuEvent::ShowPersonaMenu.key()),
            Button::new("🗑️ Clear history", MenuEvent::ClearHistory.key()),
        ],
        vec![Button::new("ℹ️ Help", MenuEvent::Help.key())],
    ])
}

fn persona_keyboard() -> Keyboard {
    let mut buttons: Vec<Button> = Persona::ALL
        .into_iter()
        .map(|persona| {
            Button::new(
                persona_label(persona),
                MenuEvent::SelectPersona(persona).key(),
            )
        })
        .collect();
    buttons.push(back_button());
    Keyboard::new(buttons.chunks(2).map(<[Button]>::to_vec).collect())
}

fn back_keyboard() -> Keyboard {
    Keyboard::new(vec![vec![back_button()]])
}

/// Shown under every reply: start over, or hand the next message to the
/// other provider.
fn quick_keyboard(current: Provider) -> Keyboard {
    Keyboard::new(vec![vec![
        Button::new("💭 New chat", MenuEvent::NewChat.key()),
        Button::new(
            "🔄 Switch AI",
            MenuEvent::SelectProvider(current.other()).key(),
        ),
    ]])
}

fn welcome_text(user: &Sender) -> String {
    let name = user.profile.display_name().unwrap_or("there");
    format!(
        "🤖 Welcome, {name}!\n\n\
         🧠 OpenAI is good for creative tasks.\n\
         🔍 Perplexity is good for current information.\n\n\
         Pick a provider below, or just ask a question."
    )
}

const HELP_TEXT: &str = "ℹ️ How to use this bot\n\n\
    Send any message and the selected AI will answer it. The last few \
    exchanges are remembered as context.\n\n\
    Commands:\n\
    /start: main menu\n\
    /new: start a new chat\n\
    /openai: switch to OpenAI\n\
    /perplexity: switch to Perplexity\n\
    /help: this message";

fn stats_text(user: &Sender, stats: &ConversationStats, prefs: &Preferences) -> String {
    let name = user.profile.display_name().unwrap_or("unknown");
    let count = |provider: Provider| stats.per_provider.get(&provider).copied().unwrap_or(0);
    let first = stats
        .first_turn_at
        .map_or_else(|| "no data".to_string(), |at| at.format("%Y-%m-%d").to_string());
    format!(
        "📊 Your statistics\n\n\
         👤 User: {name}\n\
         💬 Total messages: {total}\n\
         🧠 OpenAI: {openai}\n\
         🔍 Perplexity: {perplexity}\n\
         📅 First message: {first}\n\n\
         Current provider: {provider}\n\
         Current persona: {persona}",
        total = stats.total_turns,
        openai = count(Provider::OpenAi),
        perplexity = count(Provider::Perplexity),
        provider = prefs.provider.display_name(),
        persona = prefs.persona.label(),
    )
}

impl Bot {
    #[must_use]
    pub fn new(
        manager: Arc<SessionManager>,
        transport: Arc<dyn Transport>,
        delivery: Delivery,
    ) -> Self {
        Self {
            menu: PreferenceMachine::new(Arc::clone(&manager)),
            manager,
            transport,
            delivery,
        }
    }

    /// Returns the session manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Handles one event to completion.
    #[instrument(skip(self, event), fields(user_id = %event.user_id(), chat_id = %event.chat_id()))]
    pub async fn handle(&self, event: UserEvent) {
        let result = match event {
            UserEvent::TextMessage {
                user,
                chat_id,
                text,
                message_id,
            } => self.on_text(&user, chat_id, &text, message_id).await,
            UserEvent::Command {
                user,
                chat_id,
                command,
                ..
            } => self.on_command(&user, chat_id, command).await,
            UserEvent::MenuSelection {
                user,
                chat_id,
                key,
                message_id,
                callback_id,
            } => {
                self.on_menu(&user, chat_id, &key, message_id, &callback_id)
                    .await
            }
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to deliver response");
        }
    }

    async fn on_text(
        &self,
        user: &Sender,
        chat_id: ChatId,
        text: &str,
        message_id: MessageId,
    ) -> parley_core::Result<(), TransportError> {
        if let Err(e) = self.transport.typing(chat_id).await {
            warn!(error = %e, "Failed to send typing action");
        }

        let provider = self.manager.preferences(user.id).await.provider;
        let placeholder = self
            .transport
            .send(&SendMessage::new(
                chat_id,
                format!("{} is working on your request... ⏳", provider_label(provider)),
            ))
            .await?;

        let result = self.manager.converse(user.id, text).await;

        if let Err(e) = self.transport.delete(chat_id, placeholder).await {
            warn!(error = %e, "Failed to delete placeholder");
        }

        match result {
            Ok(reply) => {
                deliver_reply(
                    self.transport.as_ref(),
                    chat_id,
                    &reply.content,
                    Some(message_id),
                    self.delivery,
                )
                .await?;
                if let Some(usage) = reply.usage {
                    self.transport
                        .send(
                            &SendMessage::new(
                                chat_id,
                                format!("📊 Tokens used: {}", usage.total()),
                            )
                            .with_keyboard(quick_keyboard(reply.provider)),
                        )
                        .await?;
                }
            }
            Err(e) => {
                let text = format!(
                    "❌ {} error:\n\n{}\n\nTry rephrasing the question, switching the AI or \
                     starting a new chat.",
                    provider_label(e.provider),
                    e.message()
                );
                self.transport
                    .send(
                        &SendMessage::new(chat_id, text)
                            .reply_to(message_id)
                            .with_keyboard(quick_keyboard(e.provider)),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn on_command(
        &self,
        user: &Sender,
        chat_id: ChatId,
        command: Command,
    ) -> parley_core::Result<(), TransportError> {
        let message = match command {
            Command::Start => {
                self.manager
                    .ensure_session(user.id, Some(&user.profile))
                    .await;
                SendMessage::new(chat_id, welcome_text(user)).with_keyboard(main_keyboard())
            }
            Command::New => {
                self.manager.reset_session(user.id).await;
                SendMessage::new(chat_id, "💭 New chat started. Earlier messages are forgotten.")
            }
            Command::UseProvider(provider) => {
                let outcome = self
                    .menu
                    .apply(user.id, MenuEvent::SelectProvider(provider))
                    .await;
                let (text, _) = self.render(user, outcome);
                SendMessage::new(chat_id, text)
            }
            Command::Help => SendMessage::new(chat_id, HELP_TEXT).with_keyboard(back_keyboard()),
            Command::Unknown(name) => {
                info!(command = %name, "Unknown command");
                SendMessage::new(chat_id, "Unknown command. Send /help for the list.")
            }
        };

        self.transport.send(&message).await?;
        Ok(())
    }

    async fn on_menu(
        &self,
        user: &Sender,
        chat_id: ChatId,
        key: &str,
        message_id: Option<MessageId>,
        callback_id: &str,
    ) -> parley_core::Result<(), TransportError> {
        if let Err(e) = self.transport.answer_callback(callback_id).await {
            warn!(error = %e, "Failed to answer callback");
        }

        let outcome = self.menu.apply(user.id, MenuEvent::parse(key)).await;
        if matches!(outcome, MenuOutcome::Ignored { .. }) {
            return Ok(());
        }

        let (text, keyboard) = self.render(user, outcome);
        self.transport
            .send(
                &SendMessage::new(chat_id, text)
                    .replacing(message_id)
                    .with_keyboard(keyboard),
            )
            .await?;
        Ok(())
    }

    fn render(&self, user: &Sender, outcome: MenuOutcome) -> (String, Keyboard) {
        match outcome {
            MenuOutcome::ProviderSelected {
                provider,
                persisted,
            } => {
                let mut text = format!("✅ Switched to {}.", provider_label(provider));
                if !persisted {
                    text.push_str("\n\n⚠️ The choice could not be saved and may not stick.");
                }
                if !self.manager.providers().contains(provider) {
                    text.push_str("\n\n⚠️ This provider is not configured on this server.");
                }
                (text, back_keyboard())
            }
            MenuOutcome::PersonaSelected { persona, persisted } => {
                let mut text = format!(
                    "✅ Persona: {}\n\n{}",
                    persona_label(persona),
                    persona.system_prompt()
                );
                if !persisted {
                    text.push_str("\n\n⚠️ The choice could not be saved and may not stick.");
                }
                let keyboard = Keyboard::new(vec![
                    vec![Button::new(
                        "🔄 Change persona",
                        MenuEvent::ShowPersonaMenu.key(),
                    )],
                    vec![back_button()],
                ]);
                (text, keyboard)
            }
            MenuOutcome::SessionReset { provider } => (
                format!(
                    "💭 New chat started with {}. Earlier messages are forgotten.",
                    provider_label(provider)
                ),
                back_keyboard(),
            ),
            MenuOutcome::Stats { stats, preferences } => {
                (stats_text(user, &stats, &preferences), back_keyboard())
            }
            MenuOutcome::HistoryCleared { success: true } => (
                "🗑️ History cleared. All your stored messages were deleted.".to_string(),
                back_keyboard(),
            ),
            MenuOutcome::HistoryCleared { success: false } => (
                "❌ Could not clear history. Please try again later.".to_string(),
                back_keyboard(),
            ),
            MenuOutcome::MainMenu => (welcome_text(user), main_keyboard()),
            MenuOutcome::PersonaMenu => (
                "🎭 Choose how the AI should talk to you:".to_string(),
                persona_keyboard(),
            ),
            MenuOutcome::Help => (HELP_TEXT.to_string(), back_keyboard()),
            MenuOutcome::Ignored { .. } => (String::new(), Keyboard::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::testing::{RecordingTransport, Sent};
    use async_trait::async_trait;
    use parley_ai::{
        ChatMessage, Completion, CompletionParams, ProviderAdapter, ProviderError,
        ProviderErrorKind, ProviderRegistry, TokenUsage,
    };
    use parley_conversation::{ConversationConfig, HistoryStore, InMemoryStore, UserProfile};
    use parley_core::UserId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct EchoAdapter {
        provider: Provider,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderAdapter for EchoAdapter {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _params: &CompletionParams,
        ) -> Result<Completion, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(Completion {
                content: format!("echo: {last}"),
                usage: Some(TokenUsage {
                    input_tokens: 3,
                    output_tokens: 4,
                }),
            })
        }

        fn provider(&self) -> Provider {
            self.provider
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    struct BrokenAdapter;

    #[async_trait]
    impl ProviderAdapter for BrokenAdapter {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _params: &CompletionParams,
        ) -> Result<Completion, ProviderError> {
            Err(ProviderError::new(
                Provider::Perplexity,
                ProviderErrorKind::Status(401),
                "Invalid API key",
            ))
        }

        fn provider(&self) -> Provider {
            Provider::Perplexity
        }

        fn model(&self) -> &str {
            "broken"
        }
    }

    struct Fixture {
        bot: Bot,
        transport: Arc<RecordingTransport>,
        store: Arc<InMemoryStore>,
        openai: Arc<EchoAdapter>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let openai = Arc::new(EchoAdapter {
            provider: Provider::OpenAi,
            calls: AtomicUsize::new(0),
        });
        let registry = ProviderRegistry::new()
            .with(openai.clone())
            .with(Arc::new(BrokenAdapter));
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            store.clone(),
            registry,
            ConversationConfig::default(),
        ));
        let transport = Arc::new(RecordingTransport::default());
        let bot = Bot::new(
            manager,
            transport.clone(),
            Delivery {
                chunk_size: 4000,
                delay: Duration::from_millis(1),
            },
        );
        Fixture {
            bot,
            transport,
            store,
            openai,
        }
    }

    fn ada() -> Sender {
        Sender {
            id: UserId::new(42),
            profile: UserProfile {
                first_name: Some("Ada".to_string()),
                ..UserProfile::default()
            },
        }
    }

    fn text(body: &str) -> UserEvent {
        UserEvent::TextMessage {
            user: ada(),
            chat_id: ChatId::new(42),
            text: body.to_string(),
            message_id: MessageId::new(7),
        }
    }

    fn press(key: &str) -> UserEvent {
        UserEvent::MenuSelection {
            user: ada(),
            chat_id: ChatId::new(42),
            key: key.to_string(),
            message_id: Some(MessageId::new(3)),
            callback_id: "cb".to_string(),
        }
    }

    #[tokio::test]
    async fn text_message_full_flow() {
        let f = fixture();

        f.bot.handle(text("Hello")).await;

        let sent = f.transport.sent();
        assert_eq!(sent[0], Sent::Typing(ChatId::new(42)));
        let Sent::Message(placeholder) = &sent[1] else {
            panic!("expected placeholder");
        };
        assert!(placeholder.text.contains("OpenAI"));
        assert!(matches!(sent[2], Sent::Deleted(_)));

        let messages = f.transport.messages();
        let reply = &messages[1];
        assert_eq!(reply.text, "echo: Hello");
        assert_eq!(reply.reply_to, Some(MessageId::new(7)));

        let usage = &messages[2];
        assert_eq!(usage.text, "📊 Tokens used: 7");
        let keys: Vec<&str> = usage.keyboard.as_ref().unwrap().rows[0]
            .iter()
            .map(|b| b.key.as_str())
            .collect();
        assert_eq!(keys, vec!["new_chat", "ai_perplexity"]);

        assert_eq!(f.store.count_turns().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn provider_failure_is_reported() {
        let f = fixture();
        f.bot.handle(press("ai_perplexity")).await;

        f.bot.handle(text("Hello")).await;

        let messages = f.transport.messages();
        let error = messages.last().unwrap();
        assert!(error.text.contains("Invalid API key"));
        assert_eq!(error.reply_to, Some(MessageId::new(7)));
        assert_eq!(
            error.keyboard.as_ref().unwrap().rows[0][1].key,
            "ai_openai"
        );
        assert_eq!(f.store.count_turns().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn commands_never_reach_a_provider() {
        let f = fixture();

        for command in [Command::Start, Command::New, Command::Help, Command::Unknown("x".into())] {
            f.bot
                .handle(UserEvent::Command {
                    user: ada(),
                    chat_id: ChatId::new(42),
                    command,
                    message_id: MessageId::new(1),
                })
                .await;
        }

        assert_eq!(f.openai.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.transport.messages().len(), 4);
        assert!(f.transport.messages()[0].text.contains("Ada"));
    }

    #[tokio::test]
    async fn menu_selection_edits_in_place() {
        let f = fixture();

        f.bot.handle(press("prompt_teacher")).await;

        let sent = f.transport.sent();
        assert_eq!(sent[0], Sent::Answered("cb".to_string()));
        let Sent::Message(edit) = &sent[1] else {
            panic!("expected edit");
        };
        assert_eq!(edit.replace_message_id, Some(MessageId::new(3)));
        assert!(edit.text.contains(Persona::Teacher.system_prompt()));
        assert_eq!(
            f.bot.manager().preferences(UserId::new(42)).await.persona,
            Persona::Teacher
        );
    }

    #[tokio::test]
    async fn unrecognized_key_is_only_answered() {
        let f = fixture();

        f.bot.handle(press("prompt_pirate")).await;

        assert_eq!(f.transport.sent(), vec![Sent::Answered("cb".to_string())]);
    }

    #[tokio::test]
    async fn stats_screen_counts_turns() {
        let f = fixture();
        f.bot.handle(text("one")).await;
        f.bot.handle(text("two")).await;

        f.bot.handle(press("stats")).await;

        let stats = f.transport.messages().pop().unwrap();
        assert!(stats.text.contains("Total messages: 2"));
        assert!(stats.text.contains("OpenAI: 2"));
    }

    #[test]
    fn persona_keyboard_lists_every_persona() {
        let keyboard = persona_keyboard();
        let keys: Vec<String> = keyboard
            .rows
            .iter()
            .flatten()
            .map(|b| b.key.clone())
            .collect();
        for persona in Persona::ALL {
            assert!(keys.contains(&MenuEvent::SelectPersona(persona).key()));
        }
        assert_eq!(keys.last().map(String::as_str), Some("back_main"));
    }
}
