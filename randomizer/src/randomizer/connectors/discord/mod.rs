//! Discord connectivity module for the member randomizer.
//!
//! This module provides abstractions for interacting with Discord, including:
//! - Error types for Discord connectivity issues
//! - The trait the command services use to read rosters and send replies
//! - Data structures for representing server members and voice channels
//!
//! The command services only ever talk to the `DiscordConnector` trait, so they
//! can be exercised with the generated mock. The concrete Serenity-backed
//! connectors live in the `serenity` submodule.

use crate::randomizer::commands::Reply;
use crate::randomizer::ledger::{ScopeKey, SelectionMode};
use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

pub(crate) mod serenity;
pub(crate) mod server_member;

pub use server_member::ServerMember;

/// Errors that can occur during Discord connectivity operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The command was not executed in a server channel
    #[error("Not in a server channel")]
    NotInServerChannel,
    /// Unable to find the specified Discord channel
    #[error("Cannot find channel")]
    CannotFindChannel,
    /// Unable to read the member list of the server
    #[error("Cannot find members")]
    CannotFindMembers,
    /// Failed to send a reply message
    #[error("Cannot send reply")]
    CannotSendReply,
    /// Failed to retrieve the guild (server) information
    #[error("Cannot get guild")]
    CannotGetGuild,
    /// Unable to find the specified role
    #[error("Cannot find role")]
    CannotFindRole,
}

/// Which members of the server make up the candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberFilter {
    All,
    /// Members whose presence is online, idle or do-not-disturb
    Online,
    /// Members holding the role with this ID
    Role(u64),
    /// Members currently connected to the voice channel with this ID
    Voice(u64),
}

impl From<MemberFilter> for SelectionMode {
    fn from(filter: MemberFilter) -> Self {
        match filter {
            MemberFilter::All => SelectionMode::All,
            MemberFilter::Online => SelectionMode::Online,
            MemberFilter::Role(id) => SelectionMode::Role(id),
            MemberFilter::Voice(id) => SelectionMode::Voice(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannel {
    pub(crate) id: u64,
    pub(crate) name: String,
}

/// Trait for abstracting Discord server interactions.
///
/// Rosters are read live on every call; nothing is cached on this side.
#[automock]
#[async_trait]
pub trait DiscordConnector {
    /// The server and text channel the interaction happened in.
    async fn scope(&self) -> Result<ScopeKey, Error>;
    /// Retrieves the members matching `filter`, bots included.
    async fn get_members(&self, filter: MemberFilter) -> Result<Vec<ServerMember>, Error>;
    /// The voice channel the invoking user is connected to, if any.
    async fn get_author_voice_channel(&self) -> Result<Option<VoiceChannel>, Error>;
    /// Looks up a voice channel of the current server by its ID.
    async fn get_voice_channel(&self, channel_id: u64) -> Result<VoiceChannel, Error>;
    /// Sends a reply to the person that triggered the interaction
    async fn send_reply(&self, reply: &Reply) -> Result<(), Error>;
}
