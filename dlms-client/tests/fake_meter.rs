//! Sessions against a fake meter on a local TCP port

use dlms_client::testing::{FakeMeter, FakeMeterBehavior};
use dlms_client::{ClientSettings, ExchangePolicy, InterfaceType, Session, SessionState};
use dlms_core::{CosemDateTime, CosemObject, DataObject, DlmsError, ObisCode};
use dlms_security::AuthenticationMechanism;
use std::time::Duration;

fn policy() -> ExchangePolicy {
    ExchangePolicy {
        max_attempts: 2,
        wait_time: Duration::from_secs(2),
        min_read_count: 5,
    }
}

fn settings(port: u16) -> ClientSettings {
    ClientSettings::builder()
        .tcp("127.0.0.1", port)
        .interface(InterfaceType::Wrapper)
        .exchange_policy(policy())
        .build()
        .unwrap()
}

fn energy() -> CosemObject {
    CosemObject::register(ObisCode::new(1, 0, 1, 8, 0, 255))
}

fn clock() -> CosemObject {
    CosemObject::clock(ObisCode::new(0, 0, 1, 0, 0, 255))
}

#[tokio::test]
async fn test_register_and_clock_reads() {
    let meter = FakeMeter::start(FakeMeterBehavior::default()).await.unwrap();
    let mut session = Session::from_settings(&settings(meter.port())).unwrap();

    session.open().await.unwrap();
    session.initialize_connection().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    let mut register = energy();
    session.read(&mut register, 3).await.unwrap();
    let value = session.read(&mut register, 2).await.unwrap();
    assert_eq!(value, DataObject::Unsigned32(12345));
    let scaler_unit = register.scaler_unit().unwrap().unwrap();
    assert_eq!(scaler_unit.scaler, -2);
    assert!((scaler_unit.scale_value(12345.0) - 123.45).abs() < 1e-9);

    let mut clock = clock();
    let time = session.read(&mut clock, 2).await.unwrap();
    let time = CosemDateTime::from_data(&time).unwrap();
    assert_eq!(time.year(), 2024);
    assert_eq!(time.minute(), 30);

    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    // AARQ, three GETs, RLRQ
    assert_eq!(meter.requests(), vec![0x60, 0xC0, 0xC0, 0xC0, 0x62]);
}

#[tokio::test]
async fn test_block_transfer() {
    let meter = FakeMeter::start(FakeMeterBehavior {
        block_size: Some(4),
        ..FakeMeterBehavior::default()
    })
    .await
    .unwrap();
    let mut session = Session::from_settings(&settings(meter.port())).unwrap();
    session.open().await.unwrap();
    session.initialize_connection().await.unwrap();

    let mut clock = clock();
    let value = session.read(&mut clock, 2).await.unwrap();
    assert_eq!(value.as_octet_string().unwrap().len(), 12);
    // 14 encoded bytes in blocks of 4
    assert_eq!(meter.requests().iter().filter(|&&t| t == 0xC0).count(), 4);
    session.close().await;
}

#[tokio::test]
async fn test_hls_sha256_association() {
    let meter = FakeMeter::start(FakeMeterBehavior {
        hls_secret: Some(b"0123456789ABCDEF".to_vec()),
        ..FakeMeterBehavior::default()
    })
    .await
    .unwrap();
    let mut settings = settings(meter.port());
    settings.authentication = AuthenticationMechanism::HighSha256;
    settings.password = b"0123456789ABCDEF".to_vec();

    let mut session = Session::from_settings(&settings).unwrap();
    session.open().await.unwrap();
    session.initialize_connection().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(meter.requests(), vec![0x60, 0xC3]);

    let mut register = energy();
    assert_eq!(
        session.read(&mut register, 2).await.unwrap(),
        DataObject::Unsigned32(12345)
    );
    session.close().await;
}

#[tokio::test]
async fn test_hls_with_wrong_secret_is_refused() {
    let meter = FakeMeter::start(FakeMeterBehavior {
        hls_secret: Some(b"0123456789ABCDEF".to_vec()),
        ..FakeMeterBehavior::default()
    })
    .await
    .unwrap();
    let mut settings = settings(meter.port());
    settings.authentication = AuthenticationMechanism::HighSha256;
    settings.password = b"not the secret".to_vec();

    let mut session = Session::from_settings(&settings).unwrap();
    session.open().await.unwrap();
    let err = session.initialize_connection().await.unwrap_err();
    assert_eq!(err.error_code(), Some(3));
    assert_eq!(session.state(), SessionState::Faulted);
    session.close().await;
}

#[tokio::test]
async fn test_refused_association() {
    let meter = FakeMeter::start(FakeMeterBehavior {
        refuse_association: Some(0x0E),
        ..FakeMeterBehavior::default()
    })
    .await
    .unwrap();
    let mut session = Session::from_settings(&settings(meter.port())).unwrap();
    session.open().await.unwrap();

    let err = session.initialize_connection().await.unwrap_err();
    assert!(matches!(err, DlmsError::ErrorCode(0x0E)));
    assert!(err.to_string().contains("0x0E"));
    assert_eq!(session.state(), SessionState::Faulted);

    let mut register = energy();
    assert!(session.read(&mut register, 2).await.is_err());
    session.close().await;
    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(meter.requests(), vec![0x60]);
}

#[tokio::test]
async fn test_unknown_object_reports_access_result() {
    let meter = FakeMeter::start(FakeMeterBehavior::default()).await.unwrap();
    let mut session = Session::from_settings(&settings(meter.port())).unwrap();
    session.open().await.unwrap();
    session.initialize_connection().await.unwrap();

    let mut unknown = CosemObject::new(1, ObisCode::new(0, 0, 96, 1, 0, 255));
    let err = session.read(&mut unknown, 2).await.unwrap_err();
    assert_eq!(err.error_code(), Some(4));
    session.close().await;
}
