//! The table manager: starts dealers, opponents, and proxy sessions for
//! matches and forwards the human player's actions.
//!
//! One `TableManager` lives for the whole worker process and is shared by
//! every job worker. The [`MatchRegistry`] it owns is the only record of what
//! is running; see the registry module for how concurrent requests are
//! serialized per match.

mod dispatch;

pub use dispatch::RequestCode;

use crate::alert::{AlertSink, TracingAlertSink, WebhookAlertSink};
use crate::config::Settings;
use crate::dealer::{AcpcDealerLauncher, DealerArguments, DealerInfo, DealerLauncher};
use crate::error::{Result, TableError};
use crate::game::{GameDefinition, PokerAction};
use crate::models::{MatchId, MatchRecord};
use crate::notify::{ActionNotifier, Publisher, RedisPublisher};
use crate::process::{OsProcessLauncher, OsProcessProbe, ProcessLauncher, ProcessProbe};
use crate::proxy::{
    ConnectionInfo, DealerConnector, ProxySession, SessionConfig, StateListener,
    TcpDealerConnector,
};
use crate::registry::MatchRegistry;
use crate::roster::RosterLoader;
use crate::store::{JsonMatchStore, MatchStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Orchestrates the processes and sessions behind each match.
pub struct TableManager {
    settings: Settings,
    store: Arc<dyn MatchStore>,
    process_launcher: Arc<dyn ProcessLauncher>,
    dealer_launcher: Arc<dyn DealerLauncher>,
    probe: Arc<dyn ProcessProbe>,
    connector: Arc<dyn DealerConnector>,
    listener: Arc<dyn StateListener>,
    alerts: Arc<dyn AlertSink>,
    roster: RosterLoader,
    registry: MatchRegistry,
}

/// Builds a [`TableManager`], defaulting every collaborator to its production
/// implementation configured from [`Settings`].
pub struct TableManagerBuilder {
    settings: Settings,
    store: Option<Arc<dyn MatchStore>>,
    process_launcher: Option<Arc<dyn ProcessLauncher>>,
    dealer_launcher: Option<Arc<dyn DealerLauncher>>,
    probe: Option<Arc<dyn ProcessProbe>>,
    connector: Option<Arc<dyn DealerConnector>>,
    publisher: Option<Arc<dyn Publisher>>,
    alerts: Option<Arc<dyn AlertSink>>,
}

impl TableManagerBuilder {
    pub fn store(mut self, store: Arc<dyn MatchStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn process_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.process_launcher = Some(launcher);
        self
    }

    pub fn dealer_launcher(mut self, launcher: Arc<dyn DealerLauncher>) -> Self {
        self.dealer_launcher = Some(launcher);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ProcessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn DealerConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn build(self) -> Result<TableManager> {
        let settings = self.settings;

        let publisher: Arc<dyn Publisher> = match self.publisher {
            Some(publisher) => publisher,
            None => Arc::new(RedisPublisher::open(&settings.message_server_url)?),
        };
        let alerts: Arc<dyn AlertSink> = match (self.alerts, &settings.alert_webhook) {
            (Some(alerts), _) => alerts,
            (None, Some(url)) => Arc::new(WebhookAlertSink::new(url.clone())?),
            (None, None) => Arc::new(TracingAlertSink),
        };

        Ok(TableManager {
            store: self.store.unwrap_or_else(|| {
                Arc::new(JsonMatchStore::new(
                    settings.match_store_directory.clone(),
                    settings.irrelevant_match_age(),
                ))
            }),
            process_launcher: self.process_launcher.unwrap_or_else(|| {
                Arc::new(OsProcessLauncher::new().with_log_dir(settings.bot_log_directory()))
            }),
            dealer_launcher: self
                .dealer_launcher
                .unwrap_or_else(|| Arc::new(AcpcDealerLauncher::new(&settings.dealer_program))),
            probe: self.probe.unwrap_or_else(|| Arc::new(OsProcessProbe)),
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(TcpDealerConnector)),
            listener: Arc::new(ActionNotifier::from_settings(publisher, &settings)),
            alerts,
            roster: RosterLoader::new(settings.bot_roster_file.clone()),
            registry: MatchRegistry::new(),
            settings,
        })
    }
}

impl TableManager {
    pub fn builder(settings: Settings) -> TableManagerBuilder {
        TableManagerBuilder {
            settings,
            store: None,
            process_launcher: None,
            dealer_launcher: None,
            probe: None,
            connector: None,
            publisher: None,
            alerts: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    pub fn roster(&self) -> &RosterLoader {
        &self.roster
    }

    /// Write runtime facts onto the stored match record and refresh `record`
    /// from it.
    ///
    /// The stored copy is re-read first, so fields saved by another request
    /// since `record` was loaded are kept. Callers hold the match's registry
    /// entry, which serializes writers for one match.
    async fn update_record(
        &self,
        record: &mut MatchRecord,
        apply: impl FnOnce(&mut MatchRecord) + Send,
    ) -> Result<()> {
        let mut current = self.store.load_match(&record.id).await?;
        apply(&mut current);
        self.store.save_match(&current).await?;
        *record = current;
        Ok(())
    }

    /// Drop registry entries whose dealer has died.
    fn sweep(&self) {
        let removed = self.registry.sweep(&*self.probe);
        if !removed.is_empty() {
            info!(count = removed.len(), matches = ?removed, "Reclaimed dead matches");
        }
    }

    /// Start the match's dealer unless a live one is already registered.
    ///
    /// Every call first sweeps the whole registry for dead dealers. The
    /// dealer's ports are saved on the match record before the entry is
    /// released, and copied onto `record` when the dealer was already running.
    pub async fn ensure_dealer_started(
        &self,
        record: &mut MatchRecord,
        options: BTreeMap<String, String>,
    ) -> Result<DealerInfo> {
        self.sweep();

        let mut entry = self.registry.lock_entry(&record.id).await;
        if let Some(dealer) = entry.dealer.clone() {
            if self.probe.is_alive(dealer.pid) {
                debug!(match_id = %record.id, pid = dealer.pid, "Dealer already running");
                if record.port_numbers.as_ref() != Some(&dealer.port_numbers) {
                    let ports = dealer.port_numbers.clone();
                    self.update_record(record, move |r| r.port_numbers = Some(ports))
                        .await?;
                }
                return Ok(dealer);
            }
            warn!(match_id = %record.id, pid = dealer.pid, "Dealer died; starting a new one");
            entry.dealer = None;
            entry.proxy = None;
        }

        let args = DealerArguments::from_record(record, options);
        let log_dir = self.settings.match_log_directory();
        let dealer = match self.dealer_launcher.start_dealer(&args, &log_dir).await {
            Ok(dealer) => dealer,
            Err(e) => {
                self.registry.retire(entry);
                return Err(e);
            }
        };
        entry.dealer = Some(dealer.clone());

        let ports = dealer.port_numbers.clone();
        self.update_record(record, move |r| r.port_numbers = Some(ports))
            .await?;
        drop(entry);
        Ok(dealer)
    }

    /// Command lines for the match's bots, in seat order.
    pub fn opponent_commands(&self, record: &MatchRecord) -> Result<Vec<Vec<String>>> {
        let roster = self.roster.roster();
        record
            .opponent_seats()
            .map(|(seat, name)| {
                let port = record.port_for_seat(seat)?;
                roster.command_for(name, &self.settings.dealer_host, port)
            })
            .collect()
    }

    /// Launch each command in order. The first failure stops the rest;
    /// processes already started keep running.
    pub async fn start_opponents(&self, commands: &[Vec<String>]) -> Result<Vec<u32>> {
        let mut pids = Vec::with_capacity(commands.len());
        for command in commands {
            let pid = self.process_launcher.spawn(command).await?;
            info!(pid, command = ?command, "Started opponent");
            pids.push(pid);
        }
        Ok(pids)
    }

    /// Open the human seat's proxy session unless one exists.
    ///
    /// The parsed game definition and the dealer's ports are saved on the
    /// match record first.
    pub async fn ensure_proxy_started(&self, record: &mut MatchRecord) -> Result<()> {
        let not_started = || TableError::DealerNotStarted {
            match_id: record.id.to_string(),
        };
        let Some(mut entry) = self.registry.lock_existing(&record.id).await else {
            return Err(not_started());
        };
        if entry.proxy.is_some() {
            debug!(match_id = %record.id, "Proxy already running");
            return Ok(());
        }
        let dealer = match &entry.dealer {
            Some(dealer) if self.probe.is_alive(dealer.pid) => dealer.clone(),
            _ => return Err(not_started()),
        };

        let game = GameDefinition::load(&record.game_definition_file).await?;
        let hash = game.to_hash()?;
        let ports = dealer.port_numbers.clone();
        self.update_record(record, move |r| {
            r.game_def_hash = Some(hash);
            r.port_numbers = Some(ports);
        })
        .await?;

        let seat_index = record.seat_index()?;
        let port = *dealer
            .port_numbers
            .get(seat_index)
            .ok_or_else(|| TableError::DealerOutput {
                match_name: record.name.clone(),
                message: format!("no port for seat {}", record.seat),
            })?;

        let config = SessionConfig {
            match_id: record.id.clone(),
            connection: ConnectionInfo {
                host: self.settings.dealer_host.clone(),
                port,
            },
            seat_index,
            game,
            player_names: record.player_names.clone(),
            number_of_hands: record.number_of_hands,
        };
        let session = ProxySession::start(config, &*self.connector, self.listener.clone()).await?;

        if session.match_ended() {
            info!(match_id = %record.id, "Match ended as the proxy started");
            self.registry.retire(entry);
        } else {
            info!(match_id = %record.id, port, "Proxy started");
            entry.proxy = Some(session);
        }
        Ok(())
    }

    /// Forward the human's action. Without a proxy session this does nothing.
    /// When the match is over afterwards the registry entry is removed.
    pub async fn play(&self, match_id: &MatchId, action: &PokerAction) -> Result<()> {
        let Some(mut entry) = self.registry.lock_existing(match_id).await else {
            info!(match_id = %match_id, "No running match; ignoring action");
            return Ok(());
        };
        let Some(session) = entry.proxy.as_mut() else {
            info!(match_id = %match_id, "No proxy session; ignoring action");
            return Ok(());
        };

        let result = session.play(action).await;
        debug!(
            match_id = %match_id,
            action = %action,
            state = session.last_state().map(|state| state.as_str()),
            "Action played"
        );
        if session.match_ended() {
            info!(match_id = %match_id, "Match ended");
            self.registry.retire(entry);
        }
        result
    }
}
