//! Serenity-based implementation of Discord connectivity.
//!
//! Rosters come from the gateway cache, which needs the `GUILD_MEMBERS`,
//! `GUILD_PRESENCES` and `GUILD_VOICE_STATES` intents. Two connectors are provided:
//! one for slash commands and one for presses of the "Next" button.

use crate::randomizer::commands::{Reply, Tone};
use crate::randomizer::config::NEXT_BUTTON_LABEL;
use crate::randomizer::config::RandomizerConfig;
use crate::randomizer::connectors::discord::Error::{
    CannotFindChannel, CannotFindMembers, CannotFindRole, CannotGetGuild, CannotSendReply,
    NotInServerChannel,
};
use crate::randomizer::connectors::discord::{
    DiscordConnector, Error, MemberFilter, ServerMember, VoiceChannel,
};
use crate::randomizer::connectors::file::JsonFileHistoryStore;
use crate::randomizer::ledger::{ScopeKey, SelectionLedger};
use async_trait::async_trait;
use log::info;
use poise::serenity_prelude as serenity;

const NEXT_BUTTON_PREFIX: &str = "randomizer-next";

/// State shared by every command and button handler.
pub struct Data {
    pub ledger: SelectionLedger<JsonFileHistoryStore>,
    pub config: RandomizerConfig,
}

/// Type alias for Poise command context
pub type Context<'a> = poise::Context<'a, Data, anyhow::Error>;

/// Discord connector for slash command invocations.
pub struct SerenityDiscordConnector<'a> {
    context: Context<'a>,
}

impl<'a> SerenityDiscordConnector<'a> {
    /// Creates a new SerenityDiscordConnector instance.
    ///
    /// # Arguments
    ///
    /// * `context` - Poise command context for Discord interactions
    pub fn new(context: Context<'a>) -> Self {
        Self { context }
    }

    fn guild_id(&self) -> Result<serenity::GuildId, Error> {
        self.context.guild_id().ok_or(NotInServerChannel)
    }

    fn cache(&self) -> &serenity::Cache {
        &self.context.serenity_context().cache
    }
}

#[async_trait]
impl DiscordConnector for SerenityDiscordConnector<'_> {
    async fn scope(&self) -> Result<ScopeKey, Error> {
        let guild_id = self.guild_id()?;
        Ok(ScopeKey::new(guild_id.get(), self.context.channel_id().get()))
    }

    async fn get_members(&self, filter: MemberFilter) -> Result<Vec<ServerMember>, Error> {
        members_from_cache(self.cache(), self.guild_id()?, filter)
    }

    async fn get_author_voice_channel(&self) -> Result<Option<VoiceChannel>, Error> {
        voice_channel_of(self.cache(), self.guild_id()?, self.context.author().id)
    }

    async fn get_voice_channel(&self, channel_id: u64) -> Result<VoiceChannel, Error> {
        voice_channel_by_id(self.cache(), self.guild_id()?, channel_id)
    }

    async fn send_reply(&self, reply: &Reply) -> Result<(), Error> {
        let mut message = poise::CreateReply::default()
            .embed(render_embed(reply))
            .ephemeral(reply.ephemeral);
        if let Some(channel_id) = reply.next_button {
            message = message.components(vec![next_button_row(channel_id)]);
        }
        let Ok(_) = self.context.send(message).await else {
            return Err(CannotSendReply);
        };
        Ok(())
    }
}

/// Discord connector for presses of the "Next" button.
pub struct ComponentDiscordConnector<'a> {
    context: &'a serenity::Context,
    interaction: &'a serenity::ComponentInteraction,
}

impl<'a> ComponentDiscordConnector<'a> {
    pub fn new(
        context: &'a serenity::Context,
        interaction: &'a serenity::ComponentInteraction,
    ) -> Self {
        Self {
            context,
            interaction,
        }
    }

    fn guild_id(&self) -> Result<serenity::GuildId, Error> {
        self.interaction.guild_id.ok_or(NotInServerChannel)
    }

    /// Tells the presser, and only them, that the button is no longer active.
    pub async fn send_expired_notice(&self) -> Result<(), Error> {
        let message = serenity::CreateInteractionResponseMessage::new()
            .content("⌛ This button has expired. Use `/random` to start again.")
            .ephemeral(true);
        self.respond(message).await
    }

    async fn respond(
        &self,
        message: serenity::CreateInteractionResponseMessage,
    ) -> Result<(), Error> {
        let Ok(_) = self
            .interaction
            .create_response(
                self.context,
                serenity::CreateInteractionResponse::Message(message),
            )
            .await
        else {
            return Err(CannotSendReply);
        };
        Ok(())
    }
}

#[async_trait]
impl DiscordConnector for ComponentDiscordConnector<'_> {
    async fn scope(&self) -> Result<ScopeKey, Error> {
        let guild_id = self.guild_id()?;
        Ok(ScopeKey::new(
            guild_id.get(),
            self.interaction.channel_id.get(),
        ))
    }

    async fn get_members(&self, filter: MemberFilter) -> Result<Vec<ServerMember>, Error> {
        members_from_cache(&self.context.cache, self.guild_id()?, filter)
    }

    async fn get_author_voice_channel(&self) -> Result<Option<VoiceChannel>, Error> {
        voice_channel_of(&self.context.cache, self.guild_id()?, self.interaction.user.id)
    }

    async fn get_voice_channel(&self, channel_id: u64) -> Result<VoiceChannel, Error> {
        voice_channel_by_id(&self.context.cache, self.guild_id()?, channel_id)
    }

    async fn send_reply(&self, reply: &Reply) -> Result<(), Error> {
        let mut message = serenity::CreateInteractionResponseMessage::new()
            .embed(render_embed(reply))
            .ephemeral(reply.ephemeral);
        if let Some(channel_id) = reply.next_button {
            message = message.components(vec![next_button_row(channel_id)]);
        }
        self.respond(message).await
    }
}

/// The custom id carried by a "Next" button: which voice channel to re-roll in
/// and when the button was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextButton {
    pub channel_id: u64,
    pub issued_at: i64,
}

impl NextButton {
    pub fn new(channel_id: u64, issued_at: i64) -> Self {
        Self {
            channel_id,
            issued_at,
        }
    }

    pub fn custom_id(&self) -> String {
        format!(
            "{}:{}:{}",
            NEXT_BUTTON_PREFIX, self.channel_id, self.issued_at
        )
    }

    /// Returns `None` for custom ids that don't belong to a "Next" button.
    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.split(':');
        if parts.next()? != NEXT_BUTTON_PREFIX {
            return None;
        }
        let channel_id = parts.next()?.parse().ok()?;
        let issued_at = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(channel_id, issued_at))
    }

    pub fn is_expired(&self, now: i64, timeout_secs: u64) -> bool {
        now.saturating_sub(self.issued_at) > i64::try_from(timeout_secs).unwrap_or(i64::MAX)
    }
}

/// Asks the gateway for the members of `guild` the cache is missing.
///
/// Large servers only ship online and voice-connected members with GUILD_CREATE.
pub fn request_missing_members(ctx: &serenity::Context, guild: &serenity::Guild) {
    if !roster_is_incomplete(guild.member_count, guild.members.len()) {
        return;
    }
    info!(
        "Requesting members of {}: {} of {} cached",
        guild.id,
        guild.members.len(),
        guild.member_count
    );
    ctx.shard.chunk_guild(guild.id, None, false, serenity::ChunkGuildFilter::None, None);
}

fn roster_is_incomplete(member_count: u64, cached: usize) -> bool {
    u64::try_from(cached).is_ok_and(|cached| cached < member_count)
}

fn next_button_row(channel_id: u64) -> serenity::CreateActionRow {
    let button = NextButton::new(channel_id, chrono::Utc::now().timestamp());
    serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(button.custom_id())
            .label(NEXT_BUTTON_LABEL)
            .style(serenity::ButtonStyle::Primary),
    ])
}

fn render_embed(reply: &Reply) -> serenity::CreateEmbed {
    let colour = match reply.tone {
        Tone::Selection => serenity::Colour::PURPLE,
        Tone::Continuation => serenity::Colour::BLUE,
        Tone::Info => serenity::Colour::DARK_GREEN,
        Tone::Warning => serenity::Colour::ORANGE,
    };
    let mut embed = serenity::CreateEmbed::new()
        .description(reply.description.clone())
        .colour(colour)
        .timestamp(serenity::Timestamp::now());
    if !reply.title.is_empty() {
        embed = embed.title(reply.title.clone());
    }
    if let Some(thumbnail) = &reply.thumbnail {
        embed = embed.thumbnail(thumbnail.clone());
    }
    if let Some(footer) = &reply.footer {
        embed = embed.footer(serenity::CreateEmbedFooter::new(footer.clone()));
    }
    embed
}

fn members_from_cache(
    cache: &serenity::Cache,
    guild_id: serenity::GuildId,
    filter: MemberFilter,
) -> Result<Vec<ServerMember>, Error> {
    let Some(guild) = cache.guild(guild_id) else {
        return Err(CannotGetGuild);
    };
    if let MemberFilter::Role(role_id) = filter {
        if !guild.roles.contains_key(&serenity::RoleId::new(role_id)) {
            return Err(CannotFindRole);
        }
    }
    if guild.members.is_empty() {
        return Err(CannotFindMembers);
    }

    let mut members: Vec<ServerMember> = guild
        .members
        .values()
        .filter(|member| match filter {
            MemberFilter::All => true,
            MemberFilter::Online => guild
                .presences
                .get(&member.user.id)
                .is_some_and(|presence| is_online(presence.status)),
            MemberFilter::Role(role_id) => member.roles.contains(&serenity::RoleId::new(role_id)),
            MemberFilter::Voice(channel_id) => guild
                .voice_states
                .get(&member.user.id)
                .and_then(|state| state.channel_id)
                .is_some_and(|id| id.get() == channel_id),
        })
        .map(ServerMember::from)
        .collect();
    members.sort_by_key(|member| member.id);
    info!("Found {} members matching {:?}", members.len(), filter);
    Ok(members)
}

fn is_online(status: serenity::OnlineStatus) -> bool {
    matches!(
        status,
        serenity::OnlineStatus::Online
            | serenity::OnlineStatus::Idle
            | serenity::OnlineStatus::DoNotDisturb
    )
}

fn voice_channel_of(
    cache: &serenity::Cache,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
) -> Result<Option<VoiceChannel>, Error> {
    let Some(guild) = cache.guild(guild_id) else {
        return Err(CannotGetGuild);
    };
    let Some(channel_id) = guild
        .voice_states
        .get(&user_id)
        .and_then(|state| state.channel_id)
    else {
        return Ok(None);
    };
    let Some(channel) = guild.channels.get(&channel_id) else {
        return Err(CannotFindChannel);
    };
    Ok(Some(VoiceChannel {
        id: channel_id.get(),
        name: channel.name.clone(),
    }))
}

fn voice_channel_by_id(
    cache: &serenity::Cache,
    guild_id: serenity::GuildId,
    channel_id: u64,
) -> Result<VoiceChannel, Error> {
    let Some(guild) = cache.guild(guild_id) else {
        return Err(CannotGetGuild);
    };
    let Some(channel) = guild.channels.get(&serenity::ChannelId::new(channel_id)) else {
        return Err(CannotFindChannel);
    };
    Ok(VoiceChannel {
        id: channel_id,
        name: channel.name.clone(),
    })
}

impl From<&serenity::Member> for ServerMember {
    fn from(member: &serenity::Member) -> Self {
        ServerMember {
            id: member.user.id.get(),
            nick_name: member.nick.clone(),
            user_name: member.user.name.clone(),
            is_bot: member.user.bot,
            mention: <serenity::UserId as serenity::Mentionable>::mention(&member.user.id)
                .to_string(),
            avatar_url: Some(member.face()),
        }
    }
}
