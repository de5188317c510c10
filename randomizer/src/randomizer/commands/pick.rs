use crate::randomizer::commands::{
    EMPTY_POOL_MESSAGE, Error, Reply, Tone, describe_filter, selection_reply,
};
use crate::randomizer::connectors::discord::{
    DiscordConnector, MemberFilter, ServerMember, VoiceChannel,
};
use crate::randomizer::connectors::file::HistoryStore;
use crate::randomizer::ledger::{self, ScopeKey, SelectionLedger, SelectionMode};
use crate::randomizer::selection::{self, Candidate, Draw, ExhaustionPolicy, Selection};
use async_trait::async_trait;
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Mutex, PoisonError};

/// Where a continuous voice pick was triggered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Command,
    NextButton,
}

#[async_trait]
pub trait PickService {
    /// One-off pick; an exhausted pool is reported and left for an explicit reset.
    async fn pick(&self, filter: MemberFilter, count: usize) -> Result<(), Error>;
    /// Picks one member of `channel`, starting over silently once everyone had a turn.
    async fn pick_in_voice(&self, channel: &VoiceChannel, origin: Origin) -> Result<(), Error>;
}

pub struct PickServiceImpl<'a, STORE: HistoryStore, DISCORD: DiscordConnector> {
    ledger: &'a SelectionLedger<STORE>,
    discord_connector: &'a DISCORD,
    rng: Mutex<StdRng>,
}

impl<'a, STORE: HistoryStore, DISCORD: DiscordConnector> PickServiceImpl<'a, STORE, DISCORD> {
    pub fn new(ledger: &'a SelectionLedger<STORE>, discord_connector: &'a DISCORD) -> Self {
        Self::with_rng(ledger, discord_connector, StdRng::from_os_rng())
    }

    pub fn with_rng(
        ledger: &'a SelectionLedger<STORE>,
        discord_connector: &'a DISCORD,
        rng: StdRng,
    ) -> Self {
        Self {
            ledger,
            discord_connector,
            rng: Mutex::new(rng),
        }
    }

    fn draw(
        &self,
        pool: &[ServerMember],
        used: &[String],
        count: usize,
        policy: ExhaustionPolicy,
    ) -> Draw<ServerMember> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        selection::draw(pool, used, count, policy, &mut *rng)
    }

    fn commit(
        &self,
        scope: ScopeKey,
        mode: SelectionMode,
        selection: &Selection<ServerMember>,
    ) -> Result<(), ledger::Error> {
        let ids: Vec<String> = selection
            .members
            .iter()
            .map(Candidate::candidate_id)
            .collect();
        if selection.reset_performed {
            self.ledger.reset_and_record(scope, mode, &ids)?;
        } else {
            self.ledger.record(scope, mode, &ids)?;
        }
        info!("Picked {:?} in scope {}", ids, scope);
        Ok(())
    }

    async fn candidates(&self, filter: MemberFilter) -> Result<Vec<ServerMember>, Error> {
        let members = self.discord_connector.get_members(filter).await?;
        Ok(members.into_iter().filter(|member| !member.is_bot).collect())
    }
}

#[async_trait]
impl<'a, STORE, DISCORD> PickService for PickServiceImpl<'a, STORE, DISCORD>
where
    STORE: HistoryStore + Send + Sync,
    DISCORD: DiscordConnector + Send + Sync,
{
    async fn pick(&self, filter: MemberFilter, count: usize) -> Result<(), Error> {
        let scope = self.discord_connector.scope().await?;
        let pool = self.candidates(filter).await?;
        let used = self.ledger.used_members(scope)?;

        let reply = match self.draw(&pool, &used, count, ExhaustionPolicy::RequireReset) {
            Draw::EmptyPool => Reply::warning(EMPTY_POOL_MESSAGE),
            Draw::Exhausted { pool_size } => Reply::warning(format!(
                "⛔ All {} members have already been picked. Use `/reset` to start over.",
                pool_size
            )),
            Draw::Selected(selection) => {
                self.commit(scope, filter.into(), &selection)?;
                selection_reply(
                    format!("🎲 Random pick from {}", describe_filter(filter)),
                    Tone::Selection,
                    &selection,
                )
            }
        };
        self.discord_connector.send_reply(&reply).await?;
        Ok(())
    }

    async fn pick_in_voice(&self, channel: &VoiceChannel, origin: Origin) -> Result<(), Error> {
        let scope = self.discord_connector.scope().await?;
        let pool = self.candidates(MemberFilter::Voice(channel.id)).await?;
        let used = self.ledger.used_members(scope)?;

        let reply = match self.draw(&pool, &used, 1, ExhaustionPolicy::AutoReset) {
            Draw::Selected(selection) => {
                self.commit(scope, SelectionMode::Voice(channel.id), &selection)?;
                let (title, tone) = match origin {
                    Origin::Command => (
                        format!("🎲 Random pick from 🔊 {}", channel.name),
                        Tone::Selection,
                    ),
                    Origin::NextButton => ("🎲 Next member".to_string(), Tone::Continuation),
                };
                Reply {
                    next_button: Some(channel.id),
                    ..selection_reply(title, tone, &selection)
                }
            }
            Draw::EmptyPool | Draw::Exhausted { .. } => {
                Reply::warning(format!("❌ There is nobody in **{}**!", channel.name))
            }
        };
        self.discord_connector.send_reply(&reply).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomizer::commands::AUTO_RESET_NOTICE;
    use crate::randomizer::connectors::discord::MockDiscordConnector;
    use crate::randomizer::connectors::discord::server_member::ServerMemberBuilder;
    use crate::randomizer::connectors::file::MockHistoryStore;
    use crate::randomizer::ledger::{DEFAULT_HISTORY_LIMIT, HistoryDocument, LedgerEntry};
    use mockall::predicate::*;
    use std::collections::HashSet;

    const SCOPE: ScopeKey = ScopeKey {
        server_id: 1,
        channel_id: 2,
    };

    fn ledger() -> SelectionLedger<MockHistoryStore> {
        let mut store = MockHistoryStore::new();
        store
            .expect_load()
            .returning(|| Ok(HistoryDocument::new()));
        store.expect_save().returning(|_| Ok(()));
        SelectionLedger::open(store, DEFAULT_HISTORY_LIMIT).unwrap()
    }

    fn members(ids: &[u64]) -> Vec<ServerMember> {
        ids.iter()
            .map(|id| {
                ServerMemberBuilder::new()
                    .id(*id)
                    .user_name(format!("user{}", id))
                    .build()
            })
            .collect()
    }

    fn general() -> VoiceChannel {
        VoiceChannel {
            id: 77,
            name: "General".to_string(),
        }
    }

    fn connector_with_pool(filter: MemberFilter, pool: Vec<ServerMember>) -> MockDiscordConnector {
        let mut mock_discord = MockDiscordConnector::new();
        mock_discord.expect_scope().returning(|| Ok(SCOPE));
        mock_discord
            .expect_get_members()
            .with(eq(filter))
            .returning(move |_| Ok(pool.clone()));
        mock_discord
    }

    fn used(ledger: &SelectionLedger<MockHistoryStore>) -> HashSet<String> {
        ledger.used_members(SCOPE).unwrap().into_iter().collect()
    }

    #[tokio::test]
    async fn explicit_mode_reports_exhaustion_without_touching_history() {
        // Arrange
        let ledger = ledger();
        let mut mock_discord = connector_with_pool(MemberFilter::All, members(&[1, 2, 3]));
        mock_discord
            .expect_send_reply()
            .withf(|reply| reply.tone == Tone::Selection)
            .times(3)
            .returning(|_| Ok(()));
        mock_discord
            .expect_send_reply()
            .with(eq(Reply::warning(
                "⛔ All 3 members have already been picked. Use `/reset` to start over.",
            )))
            .times(1)
            .returning(|_| Ok(()));
        let service = PickServiceImpl::with_rng(&ledger, &mock_discord, StdRng::seed_from_u64(1));

        // Act
        for _ in 0..3 {
            service.pick(MemberFilter::All, 1).await.unwrap();
        }
        let result = service.pick(MemberFilter::All, 1).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(
            used(&ledger),
            HashSet::from(["1".to_string(), "2".to_string(), "3".to_string()])
        );
        assert_eq!(ledger.selection_count(SCOPE).unwrap(), 3);
    }

    #[tokio::test]
    async fn continuous_mode_resets_and_draws_from_full_pool() {
        // Arrange
        let ledger = ledger();
        let mut mock_discord = connector_with_pool(MemberFilter::Voice(77), members(&[1, 2, 3]));
        mock_discord
            .expect_send_reply()
            .withf(|reply| !reply.description.starts_with(AUTO_RESET_NOTICE))
            .times(3)
            .returning(|_| Ok(()));
        mock_discord
            .expect_send_reply()
            .withf(|reply| {
                reply.description.starts_with(AUTO_RESET_NOTICE)
                    && reply.next_button == Some(77)
                    && reply.footer.as_deref() == Some("Members left: 2 of 3")
            })
            .times(1)
            .returning(|_| Ok(()));
        let service = PickServiceImpl::with_rng(&ledger, &mock_discord, StdRng::seed_from_u64(2));

        // Act
        for _ in 0..4 {
            service
                .pick_in_voice(&general(), Origin::NextButton)
                .await
                .unwrap();
        }

        // Assert
        assert_eq!(used(&ledger).len(), 1, "only the post-reset pick is used");
        assert_eq!(ledger.selection_count(SCOPE).unwrap(), 4);
    }

    #[tokio::test]
    async fn pick_never_repeats_a_used_member() {
        // Arrange
        let ledger = ledger();
        ledger
            .record(SCOPE, SelectionMode::All, &["1".to_string(), "2".to_string()])
            .unwrap();
        let mut mock_discord = connector_with_pool(MemberFilter::All, members(&[1, 2, 3]));
        mock_discord
            .expect_send_reply()
            .withf(|reply| reply.description.contains("<@3>"))
            .times(1)
            .returning(|_| Ok(()));
        let service = PickServiceImpl::new(&ledger, &mock_discord);

        // Act
        let result = service.pick(MemberFilter::All, 1).await;

        // Assert
        assert!(result.is_ok());
        let records = ledger.recent(SCOPE, 1).unwrap();
        assert_eq!(records[0].selected, vec!["3".to_string()]);
        assert_eq!(records[0].mode, SelectionMode::All);
    }

    #[tokio::test]
    async fn pick_filters_out_bots() {
        // Arrange
        let ledger = ledger();
        let pool = vec![
            ServerMemberBuilder::new().id(10).user_name("Human").build(),
            ServerMemberBuilder::new()
                .id(11)
                .user_name("Robot")
                .is_bot(true)
                .build(),
        ];
        let mut mock_discord = connector_with_pool(MemberFilter::Online, pool);
        mock_discord
            .expect_send_reply()
            .withf(|reply| {
                reply.description.contains("Human") && !reply.description.contains("Robot")
            })
            .times(1)
            .returning(|_| Ok(()));
        let service = PickServiceImpl::new(&ledger, &mock_discord);

        // Act
        service.pick(MemberFilter::Online, 5).await.unwrap();

        // Assert
        assert_eq!(used(&ledger), HashSet::from(["10".to_string()]));
    }

    #[tokio::test]
    async fn pick_with_count_records_a_single_multi_member_selection() {
        // Arrange
        let ledger = ledger();
        let mut mock_discord = connector_with_pool(MemberFilter::Role(8), members(&[1, 2, 3, 4]));
        mock_discord
            .expect_send_reply()
            .withf(|reply| {
                reply.title == "🎲 Random pick from <@&8>"
                    && reply.footer.as_deref() == Some("Members left: 1 of 4")
            })
            .times(1)
            .returning(|_| Ok(()));
        let service = PickServiceImpl::new(&ledger, &mock_discord);

        // Act
        service.pick(MemberFilter::Role(8), 3).await.unwrap();

        // Assert
        let records = ledger.recent(SCOPE, 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].selected.len(), 3);
        assert_eq!(records[0].mode, SelectionMode::Role(8));
    }

    #[tokio::test]
    async fn empty_pool_is_reported_without_mutation() {
        // Arrange
        let ledger = ledger();
        let mut mock_discord = connector_with_pool(MemberFilter::Online, Vec::new());
        mock_discord
            .expect_send_reply()
            .with(eq(Reply::warning(EMPTY_POOL_MESSAGE)))
            .times(1)
            .returning(|_| Ok(()));
        let service = PickServiceImpl::new(&ledger, &mock_discord);

        // Act
        service.pick(MemberFilter::Online, 1).await.unwrap();

        // Assert
        assert_eq!(ledger.selection_count(SCOPE).unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_voice_channel_is_reported() {
        // Arrange
        let ledger = ledger();
        let mut mock_discord = connector_with_pool(MemberFilter::Voice(77), Vec::new());
        mock_discord
            .expect_send_reply()
            .with(eq(Reply::warning("❌ There is nobody in **General**!")))
            .times(1)
            .returning(|_| Ok(()));
        let service = PickServiceImpl::new(&ledger, &mock_discord);

        // Act
        let result = service.pick_in_voice(&general(), Origin::Command).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(ledger.selection_count(SCOPE).unwrap(), 0);
    }

    #[tokio::test]
    async fn voice_pick_from_command_carries_channel_title_and_next_button() {
        // Arrange
        let ledger = ledger();
        let mut mock_discord = connector_with_pool(MemberFilter::Voice(77), members(&[4]));
        mock_discord
            .expect_send_reply()
            .with(eq(Reply {
                title: "🎲 Random pick from 🔊 General".to_string(),
                description: "## 🎯 <@4>\n\n**user4**".to_string(),
                footer: Some("Members left: 0 of 1".to_string()),
                thumbnail: None,
                tone: Tone::Selection,
                next_button: Some(77),
                ephemeral: false,
            }))
            .times(1)
            .returning(|_| Ok(()));
        let service = PickServiceImpl::new(&ledger, &mock_discord);

        // Act
        let result = service.pick_in_voice(&general(), Origin::Command).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(
            ledger.recent(SCOPE, 1).unwrap()[0].mode,
            SelectionMode::Voice(77)
        );
    }

    #[tokio::test]
    async fn storage_failure_is_propagated_and_nothing_is_announced() {
        // Arrange
        let mut store = MockHistoryStore::new();
        store
            .expect_load()
            .returning(|| Ok(HistoryDocument::new()));
        store.expect_save().returning(|_| {
            Err(crate::randomizer::connectors::file::Error::Io(
                std::io::Error::other("read-only file system"),
            ))
        });
        let ledger = SelectionLedger::open(store, DEFAULT_HISTORY_LIMIT).unwrap();
        let mock_discord = connector_with_pool(MemberFilter::All, members(&[1]));
        let service = PickServiceImpl::new(&ledger, &mock_discord);

        // Act
        let result = service.pick(MemberFilter::All, 1).await;

        // Assert
        assert!(matches!(result, Err(Error::LedgerError(_))));
    }

    #[tokio::test]
    async fn failed_save_after_exhaustion_keeps_used_members() {
        // Arrange
        let mut store = MockHistoryStore::new();
        store.expect_load().returning(|| {
            let mut document = HistoryDocument::new();
            document.insert(
                SCOPE.to_string(),
                LedgerEntry {
                    selections: Vec::new(),
                    used_members: vec!["1".to_string()],
                },
            );
            Ok(document)
        });
        store.expect_save().times(1).returning(|_| {
            Err(crate::randomizer::connectors::file::Error::Io(
                std::io::Error::other("disk full"),
            ))
        });
        let ledger = SelectionLedger::open(store, DEFAULT_HISTORY_LIMIT).unwrap();
        let mock_discord = connector_with_pool(MemberFilter::Voice(77), members(&[1]));
        let service = PickServiceImpl::new(&ledger, &mock_discord);

        // Act
        let result = service.pick_in_voice(&general(), Origin::NextButton).await;

        // Assert
        assert!(matches!(result, Err(Error::LedgerError(_))));
        assert_eq!(ledger.used_members(SCOPE).unwrap(), vec!["1".to_string()]);
        assert_eq!(ledger.selection_count(SCOPE).unwrap(), 0);
    }

    #[tokio::test]
    async fn scope_error_is_propagated() {
        // Arrange
        let ledger = ledger();
        let mut mock_discord = MockDiscordConnector::new();
        mock_discord.expect_scope().returning(|| {
            Err(crate::randomizer::connectors::discord::Error::NotInServerChannel)
        });
        let service = PickServiceImpl::new(&ledger, &mock_discord);

        // Act
        let result = service.pick(MemberFilter::All, 1).await;

        // Assert
        assert!(matches!(result, Err(Error::DiscordError(_))));
    }
}
