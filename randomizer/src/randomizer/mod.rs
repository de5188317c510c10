pub(crate) mod commands;
pub(crate) mod config;
pub(crate) mod connectors;
pub(crate) mod ledger;
pub(crate) mod selection;

use async_trait::async_trait;
use commands::history::{HistoryService, HistoryServiceImpl};
use commands::pick::{Origin, PickService, PickServiceImpl};
use commands::{Error, NOT_IN_VOICE_CHANNEL_MESSAGE, Reply};
use connectors::discord::{DiscordConnector, MemberFilter};
use connectors::file::HistoryStore;
use ledger::SelectionLedger;
use log::error;
use self::config::COMMAND_FAILED_MESSAGE;

#[async_trait]
pub trait Randomizer {
    /// Picks a member of the caller's voice channel and offers a "Next" button.
    async fn random_voice(&self) -> Result<(), Error>;
    /// Re-rolls in a voice channel after the "Next" button was pressed.
    ///
    /// Failures are also reported to the presser, since there is no command error hook.
    async fn next(&self, voice_channel_id: u64) -> Result<(), Error>;
    async fn pick(&self, filter: MemberFilter, count: usize) -> Result<(), Error>;
    async fn history(&self, limit: usize) -> Result<(), Error>;
    async fn reset(&self) -> Result<(), Error>;
}

pub struct RandomizerImpl<'a, STORE: HistoryStore, DISCORD: DiscordConnector> {
    ledger: &'a SelectionLedger<STORE>,
    discord_connector: &'a DISCORD,
}

impl<'a, STORE: HistoryStore, DISCORD: DiscordConnector> RandomizerImpl<'a, STORE, DISCORD> {
    pub fn new(ledger: &'a SelectionLedger<STORE>, discord_connector: &'a DISCORD) -> Self {
        Self {
            ledger,
            discord_connector,
        }
    }
}

#[async_trait]
impl<'a, STORE: HistoryStore + Send + Sync, DISCORD: DiscordConnector + Send + Sync> Randomizer
    for RandomizerImpl<'a, STORE, DISCORD>
{
    async fn random_voice(&self) -> Result<(), Error> {
        let Some(channel) = self.discord_connector.get_author_voice_channel().await? else {
            self.discord_connector
                .send_reply(&Reply::warning(NOT_IN_VOICE_CHANNEL_MESSAGE))
                .await?;
            return Ok(());
        };
        let pick_service = PickServiceImpl::new(self.ledger, self.discord_connector);
        pick_service.pick_in_voice(&channel, Origin::Command).await
    }

    async fn next(&self, voice_channel_id: u64) -> Result<(), Error> {
        let result = match self
            .discord_connector
            .get_voice_channel(voice_channel_id)
            .await
        {
            Ok(channel) => {
                let pick_service = PickServiceImpl::new(self.ledger, self.discord_connector);
                pick_service.pick_in_voice(&channel, Origin::NextButton).await
            }
            Err(err) => Err(err.into()),
        };
        if let Err(err) = &result {
            error!("Next pick in channel {} failed: {}", voice_channel_id, err);
            if let Err(e) = self
                .discord_connector
                .send_reply(&Reply::failure(COMMAND_FAILED_MESSAGE))
                .await
            {
                error!("Cannot report failure to the user: {}", e);
            }
        }
        result
    }

    async fn pick(&self, filter: MemberFilter, count: usize) -> Result<(), Error> {
        let pick_service = PickServiceImpl::new(self.ledger, self.discord_connector);
        pick_service.pick(filter, count).await
    }

    async fn history(&self, limit: usize) -> Result<(), Error> {
        let history_service = HistoryServiceImpl::new(self.ledger, self.discord_connector);
        history_service.show(limit).await
    }

    async fn reset(&self) -> Result<(), Error> {
        let history_service = HistoryServiceImpl::new(self.ledger, self.discord_connector);
        history_service.reset().await
    }
}
