//! Shared fixtures for table manager integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use table_core::{
    AlertContext, AlertSink, DealerArguments, DealerInfo, DealerLauncher, ErrorCategory,
    JsonMatchStore, MatchId, MatchRecord, MatchStore, ProcessLauncher, ProcessProbe, Publisher,
    Result, Settings, TableError, TableManager,
};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

pub const HOLDEM_LIMIT_3P: &str = "\
GAMEDEF
limit
numPlayers = 3
numRounds = 4
blind = 5 10 0
raiseSize = 10 10 20 20
firstPlayer = 3 1 1 1
maxRaises = 3 4 4 4
numSuits = 4
numRanks = 13
numHoleCards = 2
numBoardCards = 0 3 1 1
END GAMEDEF
";

pub const ROSTER: &str = r#"{
    "bots": {
        "Tilt": {"runner": ["./tilt_bot", "--aggressive"]},
        "Chump": {"runner": ["./chump_bot"]}
    }
}"#;

/// Liveness answered from a set of PIDs the test controls.
#[derive(Default)]
pub struct FakeProbe {
    alive: Mutex<HashSet<u32>>,
}

impl FakeProbe {
    pub fn spawned(&self, pid: u32) {
        self.alive.lock().unwrap().insert(pid);
    }

    pub fn kill(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }
}

impl ProcessProbe for FakeProbe {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }
}

/// Records every command instead of running it.
#[derive(Default)]
pub struct FakeProcessLauncher {
    next_pid: AtomicU32,
    pub commands: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl ProcessLauncher for FakeProcessLauncher {
    async fn spawn(&self, command: &[String]) -> Result<u32> {
        if command.is_empty() {
            return Err(TableError::Launch {
                program: String::new(),
                message: "empty command".to_string(),
                source: None,
            });
        }
        self.commands.lock().unwrap().push(command.to_vec());
        Ok(5000 + self.next_pid.fetch_add(1, Ordering::SeqCst))
    }
}

/// One step of a scripted dealer conversation with the human seat.
#[derive(Debug, Clone)]
pub enum Step {
    /// Send a line to the player.
    Send(&'static str),
    /// Wait for the player's reply and record it.
    Reply,
}

/// Pretends to launch a dealer: binds a real port for the human seat and
/// plays a script to whoever connects to it.
pub struct FakeDealerLauncher {
    probe: Arc<FakeProbe>,
    human_seat: usize,
    script: Vec<Step>,
    delay: Duration,
    next_pid: AtomicU32,
    pub launches: AtomicUsize,
    pub connections: Arc<AtomicUsize>,
    pub received: Arc<Mutex<Vec<String>>>,
    pub last_args: Mutex<Option<DealerArguments>>,
    pub fail: bool,
}

impl FakeDealerLauncher {
    pub fn new(probe: Arc<FakeProbe>, human_seat: usize, script: Vec<Step>) -> Self {
        Self {
            probe,
            human_seat,
            script,
            delay: Duration::ZERO,
            next_pid: AtomicU32::new(100),
            launches: AtomicUsize::new(0),
            connections: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
            last_args: Mutex::new(None),
            fail: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl DealerLauncher for FakeDealerLauncher {
    async fn start_dealer(&self, args: &DealerArguments, _log_dir: &Path) -> Result<DealerInfo> {
        tokio::time::sleep(self.delay).await;
        self.launches.fetch_add(1, Ordering::SeqCst);
        *self.last_args.lock().unwrap() = Some(args.clone());
        if self.fail {
            return Err(TableError::Launch {
                program: "dealer".to_string(),
                message: "no such file or directory".to_string(),
                source: None,
            });
        }

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let human_port = listener.local_addr()?.port();
        let port_numbers = (0..args.player_names.len())
            .map(|seat| {
                if seat == self.human_seat {
                    human_port
                } else {
                    20000 + seat as u16
                }
            })
            .collect();

        let script = self.script.clone();
        let connections = self.connections.clone();
        let received = self.received.clone();
        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            connections.fetch_add(1, Ordering::SeqCst);
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();

            if let Ok(Some(version)) = lines.next_line().await {
                received.lock().unwrap().push(version);
            }
            for step in script {
                match step {
                    Step::Send(line) => {
                        let wire = format!("{}\r\n", line);
                        if write_half.write_all(wire.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                    Step::Reply => match lines.next_line().await {
                        Ok(Some(reply)) => received.lock().unwrap().push(reply),
                        _ => return,
                    },
                }
            }
        });

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.probe.spawned(pid);
        Ok(DealerInfo { pid, port_numbers })
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingPublisher {
    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let payload: serde_json::Value = serde_json::from_str(message)?;
        self.published
            .lock()
            .unwrap()
            .push((channel.to_string(), payload));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    pub alerts: Mutex<Vec<(ErrorCategory, String, AlertContext)>>,
}

impl RecordingAlerts {
    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message, _)| message.clone())
            .collect()
    }
}

#[async_trait]
impl AlertSink for RecordingAlerts {
    async fn notify(&self, error: &TableError, context: &AlertContext) {
        self.alerts
            .lock()
            .unwrap()
            .push((error.category(), error.to_string(), context.clone()));
    }
}

/// A table manager wired to fakes, with its files in a temp directory.
pub struct Table {
    pub dir: TempDir,
    pub manager: Arc<TableManager>,
    pub store: JsonMatchStore,
    pub probe: Arc<FakeProbe>,
    pub processes: Arc<FakeProcessLauncher>,
    pub dealer: Arc<FakeDealerLauncher>,
    pub publisher: Arc<RecordingPublisher>,
    pub alerts: Arc<RecordingAlerts>,
}

impl Table {
    pub async fn new(script: Vec<Step>) -> Self {
        Self::with_dealer(|probe| FakeDealerLauncher::new(probe, 0, script)).await
    }

    pub async fn with_dealer(
        make_dealer: impl FnOnce(Arc<FakeProbe>) -> FakeDealerLauncher,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("holdem.limit.3p.game"), HOLDEM_LIMIT_3P).unwrap();
        std::fs::write(dir.path().join("bots.json"), ROSTER).unwrap();

        let settings = Settings {
            log_directory: dir.path().join("log"),
            match_store_directory: dir.path().join("matches"),
            bot_roster_file: dir.path().join("bots.json"),
            ..Settings::default()
        };
        let store = JsonMatchStore::new(
            settings.match_store_directory.clone(),
            settings.irrelevant_match_age(),
        );

        let probe = Arc::new(FakeProbe::default());
        let processes = Arc::new(FakeProcessLauncher::default());
        let dealer = Arc::new(make_dealer(probe.clone()));
        let publisher = Arc::new(RecordingPublisher::default());
        let alerts = Arc::new(RecordingAlerts::default());

        let manager = TableManager::builder(settings)
            .store(Arc::new(store.clone()))
            .process_launcher(processes.clone())
            .dealer_launcher(dealer.clone())
            .probe(probe.clone())
            .publisher(publisher.clone())
            .alerts(alerts.clone())
            .build()
            .unwrap();

        let table = Self {
            dir,
            manager: Arc::new(manager),
            store,
            probe,
            processes,
            dealer,
            publisher,
            alerts,
        };
        table.store.save_match(&table.record("m1")).await.unwrap();
        table
    }

    pub fn game_file(&self) -> PathBuf {
        self.dir.path().join("holdem.limit.3p.game")
    }

    /// Ten-hand, three-seat match with the human in seat 1.
    pub fn record(&self, id: &str) -> MatchRecord {
        MatchRecord {
            id: MatchId::new(id),
            name: format!("match-{}", id),
            game_definition_file: self.game_file(),
            number_of_hands: 10,
            random_seed: 42,
            player_names: vec!["Human".into(), "Tilt".into(), "Chump".into()],
            seat: 1,
            port_numbers: None,
            game_def_hash: None,
            updated_at: chrono::Utc::now(),
        }
    }

    pub async fn load(&self, id: &str) -> MatchRecord {
        self.store.load_match(&MatchId::new(id)).await.unwrap()
    }

    pub async fn handle(&self, request: &str, id: &str, params: serde_json::Value) {
        let params = match params {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        self.manager
            .handle(request, &MatchId::new(id), params)
            .await;
    }

    pub async fn has_proxy(&self, id: &str) -> bool {
        match self
            .manager
            .registry()
            .lock_existing(&MatchId::new(id))
            .await
        {
            Some(entry) => entry.proxy.is_some(),
            None => false,
        }
    }
}

/// The human's first decision of hand 0, then a fold that ends the
/// connection.
pub fn fold_script() -> Vec<Step> {
    vec![
        Step::Send("MATCHSTATE:0:0::Ah2c||"),
        Step::Send("MATCHSTATE:0:0:c:Ah2c||"),
        Step::Reply,
        Step::Send("MATCHSTATE:0:0:cf:Ah2c||"),
        Step::Send("MATCHSTATE:0:0:cfc:Ah2c||"),
    ]
}
