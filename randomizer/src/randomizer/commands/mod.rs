use crate::randomizer::connectors::discord;
use crate::randomizer::connectors::discord::{MemberFilter, ServerMember};
use crate::randomizer::ledger;
use crate::randomizer::ledger::{SelectionMode, SelectionRecord};
use crate::randomizer::selection::Selection;
use thiserror::Error;

pub mod history;
pub mod pick;

pub(crate) const NOT_IN_VOICE_CHANNEL_MESSAGE: &str =
    "❌ You are not in a voice channel! Join one and try again.";
pub(crate) const EMPTY_POOL_MESSAGE: &str = "❌ No members match this selection!";
pub(crate) const EMPTY_HISTORY_MESSAGE: &str = "📭 Nobody has been picked in this channel yet.";
pub(crate) const RESET_MESSAGE: &str = "🧹 History reset. Everyone is eligible again.";
pub(crate) const AUTO_RESET_NOTICE: &str =
    "🔄 Everyone has been picked! History was reset automatically.\n\n";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Discord error: {0}")]
    DiscordError(#[from] discord::Error),
    #[error("Selection history error: {0}")]
    LedgerError(#[from] ledger::Error),
}

/// Colour scheme of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Selection,
    Continuation,
    Info,
    Warning,
}

/// A message to the user, rendered as an embed by the Discord connector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    pub title: String,
    pub description: String,
    pub footer: Option<String>,
    pub thumbnail: Option<String>,
    pub tone: Tone,
    /// Attach a "Next" button re-rolling in this voice channel.
    pub next_button: Option<u64>,
    /// Only the invoking user sees the reply.
    pub ephemeral: bool,
}

impl Reply {
    pub fn warning(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tone: Tone::Warning,
            ..Default::default()
        }
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            ephemeral: true,
            ..Self::warning(description)
        }
    }

    pub fn info(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tone: Tone::Info,
            ..Default::default()
        }
    }
}

/// Formats a successful draw.
pub(crate) fn selection_reply(
    title: String,
    tone: Tone,
    selection: &Selection<ServerMember>,
) -> Reply {
    let notice = if selection.reset_performed {
        AUTO_RESET_NOTICE
    } else {
        ""
    };
    let (description, thumbnail) = match selection.members.as_slice() {
        [member] => (
            format!(
                "{}## 🎯 {}\n\n**{}**",
                notice,
                member.mention,
                member.display_name()
            ),
            member.avatar_url.clone(),
        ),
        members => (
            format!(
                "{}{}",
                notice,
                members
                    .iter()
                    .enumerate()
                    .map(|(i, member)| format!(
                        "{}. {} (**{}**)",
                        i + 1,
                        member.mention,
                        member.display_name()
                    ))
                    .collect::<Vec<String>>()
                    .join("\n")
            ),
            None,
        ),
    };
    Reply {
        title,
        description,
        footer: Some(format!(
            "Members left: {} of {}",
            selection.remaining, selection.pool_size
        )),
        thumbnail,
        tone,
        next_button: None,
        ephemeral: false,
    }
}

pub(crate) fn describe_filter(filter: MemberFilter) -> String {
    match filter {
        MemberFilter::All => "the whole server".to_string(),
        MemberFilter::Online => "online members".to_string(),
        MemberFilter::Role(id) => format!("<@&{}>", id),
        MemberFilter::Voice(id) => format!("<#{}>", id),
    }
}

pub(crate) fn describe_mode(mode: &SelectionMode) -> String {
    match mode {
        SelectionMode::All => "🌐 everyone".to_string(),
        SelectionMode::Online => "🟢 online".to_string(),
        SelectionMode::Voice(id) => format!("🔊 <#{}>", id),
        SelectionMode::Role(id) => format!("🏷️ <@&{}>", id),
        SelectionMode::Unknown(tag) if tag.is_empty() => "❔".to_string(),
        SelectionMode::Unknown(tag) => tag.clone(),
    }
}

/// One line per record, newest first.
pub(crate) fn history_lines(records: &[SelectionRecord]) -> String {
    records
        .iter()
        .rev()
        .map(|record| {
            format!(
                "`{}` {} → {}",
                record.timestamp.format("%Y-%m-%d %H:%M"),
                describe_mode(&record.mode),
                record
                    .selected
                    .iter()
                    .map(|id| format!("<@{}>", id))
                    .collect::<Vec<String>>()
                    .join(", ")
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}
