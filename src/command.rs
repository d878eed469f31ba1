//! Commands that wait for the relay to confirm them.
//!
//! A command is sent as chat text (`/ban user`) and then raced against a
//! deadline and a set of confirmation events. The relay answers most
//! moderation commands with a NOTICE whose `msg-id` names the outcome, so
//! confirmations are usually channel-scoped notice keys such as
//! `BAN_SUCCESS/#channel`.
//!
//! ```no_run
//! # async fn demo(conn: tmi_chat::Connection) -> tmi_chat::Result<()> {
//! use std::time::Duration;
//! use tmi_chat::{CommandOptions, Confirmation, EventKey};
//!
//! let options = CommandOptions::new()
//!     .with_timeout(Duration::from_secs(2))
//!     .confirm(Confirmation::new(EventKey::channel("SLOW_ON", "#chan")));
//! conn.issue_command("#chan", "slow", &["30"], options).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::iter;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::connection::{Connection, SendOptions};
use crate::decode::UNRECOGNIZED_COMMAND;
use crate::error::{ChatError, Result};
use crate::event::EventKey;
use crate::message::Message;
use crate::util::normalize_channel;

/// Decides the outcome once a confirmation event arrived: `Ok` resolves,
/// `Err(reason)` rejects. Receives the message, the command name and its
/// arguments.
pub type Predicate =
    Arc<dyn Fn(&Message, &str, &[String]) -> std::result::Result<(), String> + Send + Sync>;

/// Picks which deliveries on a key count at all; the rest are skipped.
pub type Filter = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// One event a pending command is waiting for.
#[derive(Clone)]
pub struct Confirmation {
    pub key: EventKey,
    filter: Option<Filter>,
    predicate: Option<Predicate>,
}

impl fmt::Debug for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Confirmation")
            .field("key", &self.key)
            .field("filtered", &self.filter.is_some())
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl Confirmation {
    /// Resolve on any delivery of `key`.
    pub fn new(key: impl Into<EventKey>) -> Self {
        Self {
            key: key.into(),
            filter: None,
            predicate: None,
        }
    }

    /// Resolve or reject according to `predicate`.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Message, &str, &[String]) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Only consider deliveries `filter` accepts.
    pub fn matching<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Reject whenever `key` fires; the reason is the notice id, or the
    /// event name when there is none.
    pub fn rejection(key: impl Into<EventKey>) -> Self {
        Self::new(key).with_predicate(|msg, _, _| {
            let reason = msg
                .msg_id()
                .map(str::to_string)
                .unwrap_or_else(|| msg.event.to_ascii_lowercase());
            Err(reason)
        })
    }

    fn accepts(&self, msg: Option<&Message>) -> bool {
        match (&self.filter, msg) {
            (Some(filter), Some(msg)) => filter(msg),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    fn check(&self, msg: Option<&Message>, command: &str, args: &[String]) -> std::result::Result<(), String> {
        match (&self.predicate, msg) {
            (Some(predicate), Some(msg)) => predicate(msg, command, args),
            _ => Ok(()),
        }
    }
}

/// Options for [`Connection::issue_command`].
#[derive(Clone, Debug, Default)]
pub struct CommandOptions {
    /// Deadline after the command is written. `None` or zero uses the
    /// connection's command timeout when confirmations are awaited.
    pub timeout: Option<Duration>,
    /// Checked in order; the first one matching a delivery decides.
    pub confirmations: Vec<Confirmation>,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn confirm(mut self, confirmation: Confirmation) -> Self {
        self.confirmations.push(confirmation);
        self
    }
}

impl Connection {
    /// Send `/<command> <args>` to `channel` and wait for its outcome.
    ///
    /// - no timeout and no confirmations: resolves with `None` once sent;
    /// - an unrecognized-command notice for the channel rejects with
    ///   [`ChatError::UnrecognizedCommand`];
    /// - the first confirmation matching a delivery resolves with its
    ///   message, or rejects with [`ChatError::CommandRejected`] if its
    ///   predicate says so;
    /// - otherwise the deadline rejects with [`ChatError::Timeout`], also
    ///   when a timeout was given without any confirmations.
    pub async fn issue_command(
        &self,
        channel: &str,
        command: &str,
        args: &[&str],
        options: CommandOptions,
    ) -> Result<Option<Arc<Message>>> {
        let channel = normalize_channel(channel);
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let mut text = format!("/{}", command);
        for arg in &args {
            text.push(' ');
            text.push_str(arg);
        }
        let sent = self.say(&channel, &text);
        self.await_confirmation(&channel, command, &args, sent, options)
            .await
    }

    pub(crate) async fn await_confirmation<F>(
        &self,
        channel: &str,
        command: &str,
        args: &[String],
        sent: F,
        options: CommandOptions,
    ) -> Result<Option<Arc<Message>>>
    where
        F: Future<Output = Result<()>>,
    {
        let CommandOptions {
            timeout,
            confirmations,
        } = options;
        let timeout = timeout.filter(|t| !t.is_zero());
        if timeout.is_none() && confirmations.is_empty() {
            sent.await?;
            return Ok(None);
        }

        // listen before sending so a fast answer is not missed
        let unrecognized = EventKey::channel(UNRECOGNIZED_COMMAND, channel);
        let keys = confirmations
            .iter()
            .map(|c| c.key.clone())
            .chain(iter::once(unrecognized.clone()));
        let mut subscription = self.subscribe_many(keys);
        sent.await?;

        let deadline = timeout.unwrap_or(self.options().command_timeout);
        let outcome = tokio::time::timeout(deadline, async {
            while let Some(delivery) = subscription.recv().await {
                if delivery.key == unrecognized {
                    return Err(ChatError::UnrecognizedCommand {
                        command: command.to_string(),
                    });
                }
                let msg = delivery.event.message().cloned();
                let Some(confirmation) = confirmations
                    .iter()
                    .find(|c| c.key == delivery.key && c.accepts(msg.as_deref()))
                else {
                    continue;
                };
                return match confirmation.check(msg.as_deref(), command, args) {
                    Ok(()) => Ok(msg),
                    Err(reason) => Err(ChatError::CommandRejected {
                        command: command.to_string(),
                        reason,
                    }),
                };
            }
            Err(ChatError::Disconnected)
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                debug!(command, channel, ?deadline, "command not confirmed in time");
                Err(ChatError::Timeout {
                    command: command.to_string(),
                })
            }
        }
    }

    /// Join `channel`; resolves when the relay echoes our own JOIN.
    pub async fn join(&self, channel: &str) -> Result<Option<Arc<Message>>> {
        let channel = normalize_channel(channel);
        let own = self.username().to_string();
        let options = CommandOptions {
            timeout: Some(self.options().join_timeout),
            confirmations: vec![
                Confirmation::new(EventKey::channel("JOIN", &channel))
                    .matching(move |msg| msg.username.as_deref() == Some(own.as_str())),
                Confirmation::rejection(EventKey::channel("MSG_CHANNEL_SUSPENDED", &channel)),
                Confirmation::rejection(EventKey::channel("MSG_BANNED", &channel)),
            ],
        };
        let sent = self.send(format!("JOIN {}", channel), SendOptions::default());
        self.await_confirmation(&channel, "join", &[], sent, options)
            .await
    }

    /// Leave `channel`; resolves when the relay echoes our own PART.
    pub async fn part(&self, channel: &str) -> Result<Option<Arc<Message>>> {
        let channel = normalize_channel(channel);
        let own = self.username().to_string();
        let options = CommandOptions {
            timeout: None,
            confirmations: vec![Confirmation::new(EventKey::channel("PART", &channel))
                .matching(move |msg| msg.username.as_deref() == Some(own.as_str()))],
        };
        let sent = self.send(format!("PART {}", channel), SendOptions::default());
        self.await_confirmation(&channel, "part", &[], sent, options)
            .await
    }

    pub async fn ban(&self, channel: &str, user: &str, reason: Option<&str>) -> Result<Option<Arc<Message>>> {
        let mut args = vec![user];
        args.extend(reason);
        let options = outcome(
            channel,
            "BAN_SUCCESS",
            &["ALREADY_BANNED", "BAD_BAN_SELF", "BAD_BAN_BROADCASTER", "BAD_BAN_MOD", "BAD_BAN_ADMIN", "BAD_BAN_STAFF", "BAD_BAN_GLOBAL_MOD", "NO_PERMISSION"],
        );
        self.issue_command(channel, "ban", &args, options).await
    }

    pub async fn unban(&self, channel: &str, user: &str) -> Result<Option<Arc<Message>>> {
        let options = outcome(channel, "UNBAN_SUCCESS", &["BAD_UNBAN_NO_BAN", "NO_PERMISSION"]);
        self.issue_command(channel, "unban", &[user], options).await
    }

    /// Time `user` out for `seconds`.
    pub async fn timeout(
        &self,
        channel: &str,
        user: &str,
        seconds: u64,
        reason: Option<&str>,
    ) -> Result<Option<Arc<Message>>> {
        let seconds = seconds.to_string();
        let mut args = vec![user, seconds.as_str()];
        args.extend(reason);
        let options = outcome(
            channel,
            "TIMEOUT_SUCCESS",
            &["BAD_TIMEOUT_SELF", "BAD_TIMEOUT_BROADCASTER", "BAD_TIMEOUT_MOD", "BAD_TIMEOUT_ADMIN", "BAD_TIMEOUT_STAFF", "BAD_TIMEOUT_GLOBAL_MOD", "BAD_TIMEOUT_DURATION", "NO_PERMISSION"],
        );
        self.issue_command(channel, "timeout", &args, options).await
    }

    /// Clear the channel's chat history.
    pub async fn clear(&self, channel: &str) -> Result<Option<Arc<Message>>> {
        let options = outcome(channel, "CLEARCHAT", &["NO_PERMISSION"]);
        self.issue_command(channel, "clear", &[], options).await
    }

    /// Slow mode with `seconds` between messages.
    pub async fn slow(&self, channel: &str, seconds: u64) -> Result<Option<Arc<Message>>> {
        let seconds = seconds.to_string();
        let options = outcome(channel, "SLOW_ON", &["NO_PERMISSION"]);
        self.issue_command(channel, "slow", &[seconds.as_str()], options)
            .await
    }

    pub async fn slow_off(&self, channel: &str) -> Result<Option<Arc<Message>>> {
        let options = outcome(channel, "SLOW_OFF", &["NO_PERMISSION"]);
        self.issue_command(channel, "slowoff", &[], options).await
    }

    pub async fn emote_only(&self, channel: &str) -> Result<Option<Arc<Message>>> {
        let options = outcome(channel, "EMOTE_ONLY_ON", &["ALREADY_EMOTE_ONLY_ON", "NO_PERMISSION"]);
        self.issue_command(channel, "emoteonly", &[], options).await
    }

    pub async fn emote_only_off(&self, channel: &str) -> Result<Option<Arc<Message>>> {
        let options = outcome(channel, "EMOTE_ONLY_OFF", &["ALREADY_EMOTE_ONLY_OFF", "NO_PERMISSION"]);
        self.issue_command(channel, "emoteonlyoff", &[], options)
            .await
    }
}

/// One success key and a list of rejection keys, all scoped to `channel`.
fn outcome(channel: &str, success: &str, failures: &[&str]) -> CommandOptions {
    let mut options = CommandOptions::new().confirm(Confirmation::new(EventKey::channel(success, channel)));
    for failure in failures {
        options = options.confirm(Confirmation::rejection(EventKey::channel(failure, channel)));
    }
    options
}
