//! Orchestrator runs over scripted sessions

use async_trait::async_trait;
use bytes::BytesMut;
use dlms_client::testing::{ScriptHandle, ScriptedCodec, ScriptedTransport};
use dlms_client::{ClientSettings, ExchangeEngine, ExchangePolicy, MediaSettings, Session};
use dlms_core::DlmsResult;
use dlms_loadtest::{Orchestrator, Outcome, RunConfig};
use dlms_transport::{ExchangeLock, ReceiveParams, Transport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const OK: [u8; 3] = [0x03, 0x00, 0x00];
const REFUSED: [u8; 3] = [0x03, 0x0E, 0x00];
const VALUE: [u8; 4] = [0x04, 0x00, 0x00, 0x01];

fn base() -> ClientSettings {
    ClientSettings::builder().tcp("10.0.0.5", 55555).build().unwrap()
}

fn port_of(settings: &ClientSettings) -> u16 {
    match &settings.media {
        MediaSettings::Tcp(tcp) => tcp.port,
        MediaSettings::Serial { .. } => 0,
    }
}

fn engine() -> ExchangeEngine {
    ExchangeEngine::new(ExchangePolicy {
        max_attempts: 2,
        wait_time: Duration::from_secs(1),
        min_read_count: 5,
    })
}

/// Association, the three default reads and the release
fn script_happy_path(script: &ScriptHandle) {
    script.push_reply(vec![OK.to_vec()]);
    for _ in 0..3 {
        script.push_reply(vec![VALUE.to_vec()]);
    }
    script.push_reply(vec![OK.to_vec()]);
}

fn scripted_session(script_for: impl FnOnce(&ScriptHandle)) -> (Session, ScriptHandle) {
    let transport = ScriptedTransport::disconnected();
    let handle = transport.handle();
    script_for(&handle);
    let session = Session::new(Box::new(transport), Box::new(ScriptedCodec::new()), engine());
    (session, handle)
}

/// Transport counting how many sessions hold an open connection at once
#[derive(Debug)]
struct CountingTransport {
    inner: ScriptedTransport,
    current: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for CountingTransport {
    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn open(&mut self) -> DlmsResult<()> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.inner.open().await
    }

    async fn close(&mut self) -> DlmsResult<()> {
        self.current.fetch_sub(1, Ordering::SeqCst);
        self.inner.close().await
    }

    async fn send(&mut self, data: &[u8]) -> DlmsResult<()> {
        self.inner.send(data).await
    }

    async fn receive(&mut self, params: &ReceiveParams, reply: &mut BytesMut) -> DlmsResult<bool> {
        self.inner.receive(params, reply).await
    }

    fn exchange_lock(&self) -> ExchangeLock {
        self.inner.exchange_lock()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_bound_holds() {
    let current = Arc::new(AtomicUsize::new(0));
    let max = Arc::new(AtomicUsize::new(0));
    let factory = {
        let current = current.clone();
        let max = max.clone();
        move |_: &ClientSettings| -> DlmsResult<Session> {
            let inner = ScriptedTransport::disconnected();
            script_happy_path(&inner.handle());
            let transport = CountingTransport {
                inner,
                current: current.clone(),
                max: max.clone(),
            };
            Ok(Session::new(Box::new(transport), Box::new(ScriptedCodec::new()), engine()))
        }
    };

    let config = RunConfig::new(base(), 10).with_concurrency(2);
    let report = Orchestrator::with_factory(config, factory).run().await;

    assert!(report.covers(10));
    assert_eq!(report.succeeded(), 10);
    // Reached, never exceeded
    assert_eq!(max.load(Ordering::SeqCst), 2);
    assert_eq!(current.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refused_association_stays_in_its_session() {
    let scripts: Arc<Mutex<HashMap<u16, ScriptHandle>>> = Arc::default();
    let factory = {
        let scripts = scripts.clone();
        move |settings: &ClientSettings| -> DlmsResult<Session> {
            let port = port_of(settings);
            let (session, handle) = scripted_session(|script| {
                if port == 55556 {
                    script.push_reply(vec![REFUSED.to_vec()]);
                } else {
                    script_happy_path(script);
                }
            });
            scripts.lock().unwrap().insert(port, handle);
            Ok(session)
        }
    };

    let report = Orchestrator::with_factory(RunConfig::new(base(), 3), factory)
        .run()
        .await;

    assert!(report.covers(3));
    assert_eq!(report.records[0].outcome, Outcome::Ok);
    assert_eq!(report.records[2].outcome, Outcome::Ok);
    assert_eq!(report.records[1].endpoint, "10.0.0.5:55556");
    match &report.records[1].outcome {
        Outcome::Error(message) => {
            assert!(message.contains("0x0E"), "{}", message);
            assert!(message.contains("10.0.0.5:55556"), "{}", message);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let scripts = scripts.lock().unwrap();
    // Only the association request: no reads and no release after the refusal
    assert_eq!(scripts[&55556].sent(), vec![vec![0xA5]]);
    assert_eq!(scripts[&55556].close_count(), 1);
    assert_eq!(scripts[&55555].sent().len(), 5);
    assert_eq!(scripts[&55557].sent().last(), Some(&vec![0x62]));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let created = Arc::new(AtomicUsize::new(0));
    let factory = {
        let created = created.clone();
        move |_: &ClientSettings| -> DlmsResult<Session> {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(scripted_session(script_happy_path).0)
        }
    };

    let orchestrator = Orchestrator::with_factory(RunConfig::new(base(), 4), factory);
    orchestrator.cancellation_token().cancel();
    let report = orchestrator.run().await;

    assert!(report.covers(4));
    assert_eq!(report.cancelled(), 4);
    assert_eq!(created.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_spares_the_running_session() {
    let token: Arc<OnceLock<CancellationToken>> = Arc::default();
    let factory = {
        let token = token.clone();
        move |_: &ClientSettings| -> DlmsResult<Session> {
            if let Some(token) = token.get() {
                token.cancel();
            }
            Ok(scripted_session(script_happy_path).0)
        }
    };

    let config = RunConfig::new(base(), 3).with_concurrency(1);
    let orchestrator = Orchestrator::with_factory(config, factory);
    token.set(orchestrator.cancellation_token()).unwrap();
    let report = orchestrator.run().await;

    assert!(report.covers(3));
    assert_eq!(report.records[0].outcome, Outcome::Ok);
    assert_eq!(report.records[1].outcome, Outcome::Cancelled);
    assert_eq!(report.records[2].outcome, Outcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_session_is_reported() {
    let factory = |settings: &ClientSettings| -> DlmsResult<Session> {
        if port_of(settings) == 55555 {
            panic!("factory exploded");
        }
        Ok(scripted_session(script_happy_path).0)
    };

    let report = Orchestrator::with_factory(RunConfig::new(base(), 2), factory)
        .run()
        .await;

    assert!(report.covers(2));
    match &report.records[0].outcome {
        Outcome::Error(message) => assert!(message.contains("panicked: factory exploded"), "{}", message),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(report.records[1].outcome, Outcome::Ok);
}

#[tokio::test(start_paused = true)]
async fn test_warm_up_runs_a_session_first() {
    let scripts: Arc<Mutex<Vec<ScriptHandle>>> = Arc::default();
    let factory = {
        let scripts = scripts.clone();
        move |_: &ClientSettings| -> DlmsResult<Session> {
            let (session, handle) = scripted_session(script_happy_path);
            scripts.lock().unwrap().push(handle);
            Ok(session)
        }
    };

    let config = RunConfig::new(base(), 2).with_warm_up(true);
    let report = Orchestrator::with_factory(config, factory).run().await;

    assert_eq!(report.succeeded(), 2);
    let scripts = scripts.lock().unwrap();
    assert_eq!(scripts.len(), 4);
    // Warm-up sessions associate and release without reading
    let warm_ups = scripts.iter().filter(|s| s.sent().len() == 2).count();
    assert_eq!(warm_ups, 2);
    assert!(scripts.iter().all(|s| s.close_count() == 1));
}

#[tokio::test]
async fn test_serial_base_hosts_one_session() {
    let base = ClientSettings::builder().serial("/dev/ttyUSB0", 9600).build().unwrap();
    let factory = |_: &ClientSettings| -> DlmsResult<Session> { Ok(scripted_session(script_happy_path).0) };

    let report = Orchestrator::with_factory(RunConfig::new(base, 2), factory)
        .run()
        .await;

    assert!(report.covers(2));
    assert_eq!(report.records[0].outcome, Outcome::Ok);
    assert_eq!(report.records[1].endpoint, "/dev/ttyUSB0#1");
    assert!(matches!(report.records[1].outcome, Outcome::Error(_)));
}

#[tokio::test]
async fn test_invalid_config_fails_every_record() {
    let factory = |_: &ClientSettings| -> DlmsResult<Session> { Ok(scripted_session(script_happy_path).0) };
    let config = RunConfig::new(base(), 3).with_concurrency(0);

    let report = Orchestrator::with_factory(config, factory).run().await;

    assert!(report.covers(3));
    assert_eq!(report.failed(), 3);
}

#[tokio::test]
async fn test_empty_run() {
    let report = Orchestrator::new(RunConfig::new(base(), 0)).run().await;
    assert!(report.is_empty());
}
