use crate::randomizer::commands::{
    EMPTY_HISTORY_MESSAGE, Error, RESET_MESSAGE, Reply, Tone, history_lines,
};
use crate::randomizer::connectors::discord::DiscordConnector;
use crate::randomizer::connectors::file::HistoryStore;
use crate::randomizer::ledger::SelectionLedger;
use async_trait::async_trait;
use log::info;

pub const DEFAULT_HISTORY_DISPLAY: usize = 10;
pub const MAX_HISTORY_DISPLAY: usize = 25;

#[async_trait]
pub trait HistoryService {
    async fn show(&self, limit: usize) -> Result<(), Error>;
    async fn reset(&self) -> Result<(), Error>;
}

pub struct HistoryServiceImpl<'a, STORE: HistoryStore, DISCORD: DiscordConnector> {
    ledger: &'a SelectionLedger<STORE>,
    discord_connector: &'a DISCORD,
}

impl<'a, STORE: HistoryStore, DISCORD: DiscordConnector> HistoryServiceImpl<'a, STORE, DISCORD> {
    pub fn new(ledger: &'a SelectionLedger<STORE>, discord_connector: &'a DISCORD) -> Self {
        Self {
            ledger,
            discord_connector,
        }
    }
}

#[async_trait]
impl<'a, STORE, DISCORD> HistoryService for HistoryServiceImpl<'a, STORE, DISCORD>
where
    STORE: HistoryStore + Send + Sync,
    DISCORD: DiscordConnector + Send + Sync,
{
    async fn show(&self, limit: usize) -> Result<(), Error> {
        let scope = self.discord_connector.scope().await?;
        let records = self
            .ledger
            .recent(scope, limit.clamp(1, MAX_HISTORY_DISPLAY))?;
        let total = self.ledger.selection_count(scope)?;

        let reply = if records.is_empty() {
            Reply::info(EMPTY_HISTORY_MESSAGE)
        } else {
            Reply {
                title: "📜 Selection history".to_string(),
                description: history_lines(&records),
                footer: Some(format!(
                    "Showing {} of {} selections",
                    records.len(),
                    total
                )),
                tone: Tone::Info,
                ..Default::default()
            }
        };
        self.discord_connector.send_reply(&reply).await?;
        Ok(())
    }

    async fn reset(&self) -> Result<(), Error> {
        let scope = self.discord_connector.scope().await?;
        self.ledger.reset(scope)?;
        info!("History of scope {} reset on request", scope);
        self.discord_connector
            .send_reply(&Reply::info(RESET_MESSAGE))
            .await?;
        Ok(())
    }
}
