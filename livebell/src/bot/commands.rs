//! Chat commands and their replies.

use std::sync::Arc;

use tracing::{debug, error};

use crate::subscription::{AddOutcome, ChannelName, RemoveOutcome, SubscriptionService};

const WELCOME: &str = "👋 Welcome! Use /add <channel> to follow a Twitch channel.\n\
Use /list to see your channels.\n\
Use /remove <channel> to stop following one.\n\
Example: /add auronplay";

const STORAGE_FAILURE: &str = "⚠️ Something went wrong, please try again later.";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Add(String),
    Remove(String),
    List,
    /// A known command with the wrong number of arguments.
    Usage(&'static str),
}

impl Command {
    /// Parse a message text.
    ///
    /// Returns `None` for plain text, unknown commands and commands
    /// addressed to a different bot (`/add@otherbot`).
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let args: Vec<&str> = parts.collect();

        let name = match head.split_once('@') {
            Some((name, target)) => {
                if bot_username.is_some_and(|me| !target.eq_ignore_ascii_case(me)) {
                    return None;
                }
                name
            }
            None => head,
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "list" => Command::List,
            "add" => match args.as_slice() {
                [channel] => Command::Add((*channel).to_string()),
                _ => Command::Usage("❌ Usage: /add <channel>"),
            },
            "remove" => match args.as_slice() {
                [channel] => Command::Remove((*channel).to_string()),
                _ => Command::Usage("❌ Usage: /remove <channel>"),
            },
            _ => return None,
        };
        Some(command)
    }
}

/// Turns commands into subscription changes and reply texts.
pub struct CommandHandler {
    subscriptions: Arc<SubscriptionService>,
}

impl CommandHandler {
    pub fn new(subscriptions: Arc<SubscriptionService>) -> Self {
        Self { subscriptions }
    }

    /// Execute `command` for `subscriber` and return the reply.
    pub async fn handle(&self, subscriber: &str, command: &Command) -> String {
        debug!(subscriber = %subscriber, command = ?command, "Handling command");

        match command {
            Command::Start | Command::Help => WELCOME.to_string(),
            Command::Usage(usage) => (*usage).to_string(),
            Command::Add(raw) => {
                let Ok(channel) = ChannelName::parse(raw) else {
                    return format!("❌ Invalid channel name: {raw}");
                };
                match self.subscriptions.add(subscriber, &channel).await {
                    Ok(AddOutcome::Added) => format!("✅ Channel added: {channel}"),
                    Ok(AddOutcome::AlreadySubscribed) => {
                        "⚠️ You are already following that channel.".to_string()
                    }
                    Err(e) => {
                        error!(subscriber = %subscriber, channel = %channel, error = %e, "Failed to add subscription");
                        STORAGE_FAILURE.to_string()
                    }
                }
            }
            Command::Remove(raw) => {
                let Ok(channel) = ChannelName::parse(raw) else {
                    return "⚠️ You are not following that channel.".to_string();
                };
                match self.subscriptions.remove(subscriber, &channel).await {
                    Ok(RemoveOutcome::Removed) => format!("🗑️ Channel removed: {channel}"),
                    Ok(RemoveOutcome::NotSubscribed) => {
                        "⚠️ You are not following that channel.".to_string()
                    }
                    Err(e) => {
                        error!(subscriber = %subscriber, channel = %channel, error = %e, "Failed to remove subscription");
                        STORAGE_FAILURE.to_string()
                    }
                }
            }
            Command::List => match self.subscriptions.list(subscriber).await {
                Ok(channels) if channels.is_empty() => {
                    "❗ You are not following any channel.\nUse /add <channel> to get started."
                        .to_string()
                }
                Ok(channels) => {
                    let lines: Vec<String> = channels.iter().map(|c| format!("- {c}")).collect();
                    format!("📺 Channels you are following:\n{}", lines.join("\n"))
                }
                Err(e) => {
                    error!(subscriber = %subscriber, error = %e, "Failed to list subscriptions");
                    STORAGE_FAILURE.to_string()
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::MemoryStore;

    fn handler() -> CommandHandler {
        CommandHandler::new(Arc::new(SubscriptionService::new(Arc::new(
            MemoryStore::new(),
        ))))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", None), Some(Command::Start));
        assert_eq!(Command::parse("/help", None), Some(Command::Help));
        assert_eq!(Command::parse("/list", None), Some(Command::List));
        assert_eq!(
            Command::parse("/add Foo", None),
            Some(Command::Add("Foo".to_string()))
        );
        assert_eq!(
            Command::parse("  /remove   bar  ", None),
            Some(Command::Remove("bar".to_string()))
        );
    }

    #[test]
    fn test_parse_wrong_arity() {
        assert!(matches!(Command::parse("/add", None), Some(Command::Usage(_))));
        assert!(matches!(
            Command::parse("/remove a b", None),
            Some(Command::Usage(_))
        ));
    }

    #[test]
    fn test_parse_ignores_non_commands() {
        assert_eq!(Command::parse("hello", None), None);
        assert_eq!(Command::parse("", None), None);
        assert_eq!(Command::parse("/unknown", None), None);
    }

    #[test]
    fn test_parse_bot_mention() {
        assert_eq!(
            Command::parse("/add@LiveBellBot foo", Some("livebellbot")),
            Some(Command::Add("foo".to_string()))
        );
        assert_eq!(Command::parse("/add@otherbot foo", Some("livebellbot")), None);
        assert_eq!(
            Command::parse("/list@anybot", None),
            Some(Command::List)
        );
    }

    #[tokio::test]
    async fn test_add_remove_list_flow() {
        let handler = handler();

        let reply = handler.handle("100", &Command::List).await;
        assert!(reply.contains("not following any channel"));

        let reply = handler.handle("100", &Command::Add("Foo".into())).await;
        assert_eq!(reply, "✅ Channel added: foo");

        let reply = handler.handle("100", &Command::Add("foo".into())).await;
        assert_eq!(reply, "⚠️ You are already following that channel.");

        handler.handle("100", &Command::Add("twitch.tv/bar".into())).await;
        let reply = handler.handle("100", &Command::List).await;
        assert_eq!(reply, "📺 Channels you are following:\n- bar\n- foo");

        let reply = handler.handle("100", &Command::Remove("foo".into())).await;
        assert_eq!(reply, "🗑️ Channel removed: foo");

        let reply = handler.handle("100", &Command::Remove("foo".into())).await;
        assert_eq!(reply, "⚠️ You are not following that channel.");
    }

    #[tokio::test]
    async fn test_invalid_channel_name() {
        let handler = handler();
        let reply = handler.handle("100", &Command::Add("not a/name!".into())).await;
        assert!(reply.starts_with("❌ Invalid channel name"));
        assert!(handler.handle("100", &Command::List).await.contains("not following"));
    }
}
