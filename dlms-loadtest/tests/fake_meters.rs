//! A run against fake meters on consecutive local ports

use dlms_client::testing::{FakeMeter, FakeMeterBehavior};
use dlms_client::{ClientSettings, ExchangePolicy, InterfaceType};
use dlms_loadtest::{Orchestrator, Outcome, RunConfig};
use std::time::Duration;

fn base(port: u16) -> ClientSettings {
    ClientSettings::builder()
        .tcp("127.0.0.1", port)
        .interface(InterfaceType::Wrapper)
        .exchange_policy(ExchangePolicy {
            max_attempts: 2,
            wait_time: Duration::from_secs(2),
            min_read_count: 5,
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_run_over_tcp_with_one_refusing_meter() {
    let refusing = FakeMeterBehavior {
        refuse_association: Some(0x0E),
        ..FakeMeterBehavior::default()
    };
    let meters = FakeMeter::start_consecutive(&[
        FakeMeterBehavior::default(),
        refusing,
        FakeMeterBehavior {
            block_size: Some(8),
            ..FakeMeterBehavior::default()
        },
    ])
    .await
    .unwrap();
    let first_port = meters[0].port();

    let config = RunConfig::new(base(first_port), 3).with_concurrency(2);
    let report = Orchestrator::new(config).run().await;

    assert!(report.covers(3), "{}", report);
    assert_eq!(report.records[0].outcome, Outcome::Ok, "{}", report);
    assert_eq!(report.records[2].outcome, Outcome::Ok, "{}", report);
    match &report.records[1].outcome {
        Outcome::Error(message) => assert!(message.contains("0x0E"), "{}", message),
        other => panic!("unexpected outcome {:?}", other),
    }

    // Warm-up AARQ and RLRQ, then AARQ, register scaler/unit, register value, clock, RLRQ
    assert_eq!(
        meters[0].requests(),
        vec![0x60, 0x62, 0x60, 0xC0, 0xC0, 0xC0, 0x62]
    );
    // Refused during warm-up: nothing after the AARQ
    assert_eq!(meters[1].requests(), vec![0x60]);
}
