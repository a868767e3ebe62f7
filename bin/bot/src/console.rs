//! Console front end: stdin lines in, stdout lines out.
//!
//! Each input line is `channel: text`. Text starting with `/` is a command:
//!
//! - `/reset`, `/always`, `/stop`
//! - `/remind <text>`
//! - `/playtime <user> [days]`
//! - `/playing <user> [game]` reports a presence change; without a game the
//!   user stopped playing

use crate::error::InputError;
use async_trait::async_trait;
use sidekick_conversation::{ChatGateway, GatewayError, Interaction, Member};
use sidekick_core::{ConversationKey, UserId};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_PLAYTIME_DAYS: u32 = 7;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A chat message.
    Message {
        key: ConversationKey,
        text: String,
        mentioned: bool,
    },
    /// A slash command.
    Interaction {
        key: ConversationKey,
        interaction: Interaction,
    },
    /// A user started or stopped playing.
    Presence { user: UserId, game: Option<String> },
}

impl Inbound {
    /// Parses `channel: text`; `bot_name` prefixed with `@` counts as a
    /// mention.
    ///
    /// # Errors
    ///
    /// Returns an error for lines without a channel and for malformed
    /// commands.
    pub fn parse(line: &str, bot_name: &str) -> Result<Self, InputError> {
        let (channel, text) = line.split_once(':').ok_or(InputError::MissingChannel)?;
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(InputError::EmptyChannel);
        }
        let key = ConversationKey::new(channel);
        let text = text.trim();

        if let Some(command) = text.strip_prefix('/') {
            return parse_command(key, command);
        }

        let mention = format!("@{}", bot_name.to_lowercase());
        Ok(Self::Message {
            key,
            mentioned: text.to_lowercase().contains(&mention),
            text: text.to_string(),
        })
    }
}

fn parse_command(key: ConversationKey, command: &str) -> Result<Inbound, InputError> {
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, rest)| (name, rest.trim()));
    let interaction = |interaction: Interaction| -> Result<Inbound, InputError> {
        Ok(Inbound::Interaction {
            key: key.clone(),
            interaction,
        })
    };
    let missing = |argument: &str| InputError::MissingArgument {
        command: name.to_string(),
        argument: argument.to_string(),
    };

    match name {
        "reset" => interaction(Interaction::Reset),
        "always" => interaction(Interaction::ToggleAlwaysRespond),
        "stop" => interaction(Interaction::Stop),
        "remind" if rest.is_empty() => Err(missing("a reminder")),
        "remind" => interaction(Interaction::Remind {
            text: rest.to_string(),
        }),
        "playtime" => {
            let mut args = rest.split_whitespace();
            let user = args.next().ok_or_else(|| missing("a user"))?;
            let days = match args.next() {
                Some(value) => value.parse().map_err(|_| InputError::InvalidNumber {
                    command: name.to_string(),
                    value: value.to_string(),
                })?,
                None => DEFAULT_PLAYTIME_DAYS,
            };
            interaction(Interaction::Playtime {
                user: UserId::new(user),
                days,
            })
        }
        "playing" => {
            let (user, game) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, ""), |(user, game)| (user, game.trim()));
            if user.is_empty() {
                return Err(missing("a user"));
            }
            Ok(Inbound::Presence {
                user: UserId::new(user),
                game: (!game.is_empty()).then(|| game.to_string()),
            })
        }
        other => Err(InputError::UnknownCommand {
            command: other.to_string(),
        }),
    }
}

/// [`ChatGateway`] that writes `[channel] text` lines.
pub struct ConsoleGateway<W> {
    out: Mutex<W>,
    max_message_chars: usize,
}

impl<W> ConsoleGateway<W> {
    /// Creates a gateway writing to `out`.
    #[must_use]
    pub fn new(out: W, max_message_chars: usize) -> Self {
        Self {
            out: Mutex::new(out),
            max_message_chars,
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> ConsoleGateway<W> {
    async fn write_line(&self, key: &ConversationKey, text: &str) -> Result<(), GatewayError> {
        let line = format!("[{key}] {text}\n");
        let mut out = self.out.lock().await;
        let written = async {
            out.write_all(line.as_bytes()).await?;
            out.flush().await
        };
        written.await.map_err(|e| GatewayError::DeliveryFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ChatGateway for ConsoleGateway<W> {
    async fn post_message(&self, key: &ConversationKey, text: &str) -> Result<(), GatewayError> {
        self.write_line(key, text).await
    }

    async fn indicate_activity(&self, key: &ConversationKey) -> Result<(), GatewayError> {
        debug!(key = %key, "assistant is typing");
        Ok(())
    }

    async fn lookup_member(&self, user: &UserId) -> Result<Option<Member>, GatewayError> {
        Ok(Some(Member {
            id: user.clone(),
            display_name: user.to_string(),
        }))
    }

    fn max_message_chars(&self) -> usize {
        self.max_message_chars
    }
}

impl<W> std::fmt::Debug for ConsoleGateway<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleGateway")
            .field("max_message_chars", &self.max_message_chars)
            .finish_non_exhaustive()
    }
}
