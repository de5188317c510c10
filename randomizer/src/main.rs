mod randomizer;

use self::randomizer::commands::history::DEFAULT_HISTORY_DISPLAY;
use self::randomizer::config::{COMMAND_FAILED_MESSAGE, Config};
use self::randomizer::connectors::discord::MemberFilter;
use self::randomizer::connectors::discord::serenity::{
    ComponentDiscordConnector, Context, Data, NextButton, SerenityDiscordConnector,
    request_missing_members,
};
use self::randomizer::connectors::file::JsonFileHistoryStore;
use self::randomizer::ledger::SelectionLedger;
use crate::randomizer::{Randomizer, RandomizerImpl};
use anyhow::Context as _;
use log::{LevelFilter, debug, error, info};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Logger, Root};
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::FullEvent;

/// Ping command to test bot availability
#[poise::command(slash_command)]
async fn ping(ctx: Context<'_>) -> anyhow::Result<()> {
    ctx.say("Pong!").await?;
    Ok(())
}

/// Show this menu
#[poise::command(slash_command)]
pub async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"] command: Option<String>,
) -> anyhow::Result<()> {
    let config = poise::builtins::HelpConfiguration {
        extra_text_at_bottom: "\
Picked members are remembered per channel and not picked again until the history is reset.
The \"Next\" button stays active for a few minutes after each pick.",
        ..Default::default()
    };
    poise::builtins::help(ctx, command.as_deref(), config).await?;
    Ok(())
}

/// Pick a random member of your voice channel
///
/// Nobody is picked twice until everyone in the channel had a turn.
/// Then the history starts over on its own. A "Next" button lets you keep picking.
#[poise::command(slash_command, guild_only)]
async fn random(ctx: Context<'_>) -> anyhow::Result<()> {
    let connector = SerenityDiscordConnector::new(ctx);
    let randomizer = RandomizerImpl::new(&ctx.data().ledger, &connector);
    randomizer.random_voice().await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
enum PickScope {
    #[name = "Everyone"]
    All,
    #[name = "Online members"]
    Online,
    #[name = "Members with a role"]
    Role,
}

/// Pick random members of this server without repeats
///
/// Once everyone matching the selection was picked, use /reset to start over.
#[poise::command(slash_command, guild_only)]
async fn pick(
    ctx: Context<'_>,
    #[description = "Who to pick from"] scope: Option<PickScope>,
    #[description = "Only pick members with this role"] role: Option<serenity::Role>,
    #[description = "How many members to pick"]
    #[min = 1]
    #[max = 25]
    count: Option<u32>,
) -> anyhow::Result<()> {
    let filter = match (scope, role) {
        (_, Some(role)) => MemberFilter::Role(role.id.get()),
        (Some(PickScope::Online), None) => MemberFilter::Online,
        (Some(PickScope::Role), None) => {
            ctx.say("❌ Choose a role to pick from.").await?;
            return Ok(());
        }
        (Some(PickScope::All) | None, None) => MemberFilter::All,
    };
    let connector = SerenityDiscordConnector::new(ctx);
    let randomizer = RandomizerImpl::new(&ctx.data().ledger, &connector);
    randomizer.pick(filter, count.unwrap_or(1) as usize).await?;
    Ok(())
}

/// Show who was picked recently in this channel
#[poise::command(slash_command, guild_only)]
async fn history(
    ctx: Context<'_>,
    #[description = "How many selections to show"]
    #[min = 1]
    #[max = 25]
    limit: Option<u32>,
) -> anyhow::Result<()> {
    let connector = SerenityDiscordConnector::new(ctx);
    let randomizer = RandomizerImpl::new(&ctx.data().ledger, &connector);
    let limit = limit.map_or(DEFAULT_HISTORY_DISPLAY, |limit| limit as usize);
    randomizer.history(limit).await?;
    Ok(())
}

/// Make everyone eligible again in this channel
#[poise::command(slash_command, guild_only)]
async fn reset(ctx: Context<'_>) -> anyhow::Result<()> {
    let connector = SerenityDiscordConnector::new(ctx);
    let randomizer = RandomizerImpl::new(&ctx.data().ledger, &connector);
    randomizer.reset().await?;
    Ok(())
}

/// Re-rolls when a "Next" button is pressed
async fn on_component(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> anyhow::Result<()> {
    let Some(button) = NextButton::parse(&interaction.data.custom_id) else {
        debug!("Ignoring component {}", interaction.data.custom_id);
        return Ok(());
    };
    let connector = ComponentDiscordConnector::new(ctx, interaction);
    let now = chrono::Utc::now().timestamp();
    if button.is_expired(now, data.config.next_button_timeout_secs) {
        connector.send_expired_notice().await?;
        return Ok(());
    }
    let randomizer = RandomizerImpl::new(&data.ledger, &connector);
    randomizer.next(button.channel_id).await?;
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, anyhow::Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command '{}' failed: {:?}", ctx.command().name, error);
            if let Err(e) = ctx.say(COMMAND_FAILED_MESSAGE).await {
                error!("Cannot report failure to the user: {}", e);
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!("Failed to handle {}: {:?}", event.snake_case_name(), error);
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

fn init_logging() -> anyhow::Result<()> {
    let stdout = ConsoleAppender::builder().build();
    let config = log4rs::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .logger(Logger::builder().build("randomizer", LevelFilter::Info))
        .build(Root::builder().appender("stdout").build(LevelFilter::Warn))?;
    log4rs::init_config(config)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let config = Config::new()?.randomizer;
    let token = std::env::var("DISCORD_BOT_TOKEN").context("missing DISCORD_BOT_TOKEN")?;
    let ledger = SelectionLedger::open(
        JsonFileHistoryStore::new(&config.history_path),
        config.history_limit,
    )?;
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_PRESENCES
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let framework = poise::Framework::<Data, anyhow::Error>::builder()
        .options(poise::FrameworkOptions {
            commands: vec![help(), ping(), random(), pick(), history(), reset()],
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    match event {
                        FullEvent::InteractionCreate {
                            interaction: serenity::Interaction::Component(component),
                        } => {
                            on_component(ctx, component, data).await?;
                        }
                        FullEvent::GuildCreate { guild, .. } => {
                            request_missing_members(ctx, guild);
                        }
                        _ => debug!("Unhandled event: {:?}", event.snake_case_name()),
                    }
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Logged in as {} in {} servers", ready.user.name, ready.guilds.len());
                Ok(Data { ledger, config })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    client.start().await?;
    Ok(())
}
