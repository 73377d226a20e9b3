//! Test doubles for the exchange engine, sessions and load runs
//!
//! - [`ScriptedTransport`]: replays canned reply chunks, one script entry per send
//! - [`ScriptedCodec`]: a minimal length-prefixed protocol
//! - [`FakeMeter`]: a wrapper-framed DLMS server on a local TCP port

use crate::codec::{Continuation, ProtocolCodec, Reply};
use async_trait::async_trait;
use bytes::BytesMut;
use dlms_application::pdu::{tag, DataBlockResult};
use dlms_application::{ActionResponse, GetDataResult, GetResponse, InitiateResponse, InvokeIdAndPriority};
use dlms_application::Conformance;
use dlms_asn1::{AAREApdu, AcseServiceUser, AxdrDecoder, AxdrEncoder, BerReader, RLREApdu};
use dlms_asn1::iso_acse::DIAGNOSTIC_AUTHENTICATION_REQUIRED;
use dlms_core::cosem::class_id;
use dlms_core::{CosemDateTime, DataObject, DlmsError, DlmsResult, ObisCode, ObjectIdentity};
use dlms_security::{generate_challenge, ChallengeContext, ChallengeResponder, HlsSha256};
use dlms_session::{FrameStatus, WrapperFraming, WrapperHeader, WRAPPER_HEADER_LENGTH};
use dlms_transport::{ExchangeLock, ReceiveParams, Transport};
use log::debug;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Vec<Vec<u8>>>,
    current: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    min_counts: Vec<usize>,
    opens: usize,
    closes: usize,
}

/// Inspection handle of a [`ScriptedTransport`], usable after it was boxed
#[derive(Debug, Clone)]
pub struct ScriptHandle(Arc<Mutex<Script>>);

impl ScriptHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queue the chunks delivered after the next unanswered send
    pub fn push_reply(&self, chunks: Vec<Vec<u8>>) {
        self.lock().replies.push_back(chunks);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// `min_count` of every receive call, in order
    pub fn min_counts(&self) -> Vec<usize> {
        self.lock().min_counts.clone()
    }

    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }
}

/// Transport replaying scripted replies
///
/// Every send consumes the next script entry; its chunks are then handed
/// out one per receive call. Once they are exhausted a receive waits for
/// its full budget and reports a timeout.
#[derive(Debug)]
pub struct ScriptedTransport {
    open: bool,
    fail_open: bool,
    script: ScriptHandle,
    lock: ExchangeLock,
}

impl ScriptedTransport {
    /// Already open transport
    pub fn connected() -> Self {
        Self {
            open: true,
            fail_open: false,
            script: ScriptHandle(Arc::new(Mutex::new(Script::default()))),
            lock: ExchangeLock::new(),
        }
    }

    /// Transport that still has to be opened
    pub fn disconnected() -> Self {
        Self {
            open: false,
            ..Self::connected()
        }
    }

    /// Transport whose `open` fails with a connection error
    pub fn unreachable() -> Self {
        Self {
            fail_open: true,
            ..Self::disconnected()
        }
    }

    pub fn handle(&self) -> ScriptHandle {
        self.script.clone()
    }

    pub fn push_reply(&self, chunks: Vec<Vec<u8>>) {
        self.script.push_reply(chunks);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.script.sent()
    }

    pub fn min_counts(&self) -> Vec<usize> {
        self.script.min_counts()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> DlmsResult<()> {
        self.script.lock().opens += 1;
        if self.fail_open {
            return Err(DlmsError::Connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "scripted meter refused the connection",
            )));
        }
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> DlmsResult<()> {
        self.script.lock().closes += 1;
        self.open = false;
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> DlmsResult<()> {
        if !self.open {
            return Err(DlmsError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "scripted transport is closed",
            )));
        }
        let mut script = self.script.lock();
        script.sent.push(data.to_vec());
        let next = script.replies.pop_front().unwrap_or_default();
        script.current = next.into();
        Ok(())
    }

    async fn receive(&mut self, params: &ReceiveParams, reply: &mut BytesMut) -> DlmsResult<bool> {
        let chunk = {
            let mut script = self.script.lock();
            script.min_counts.push(params.min_count);
            script.current.pop_front()
        };
        match chunk {
            Some(chunk) => {
                reply.extend_from_slice(&chunk);
                Ok(true)
            }
            None => {
                tokio::time::sleep(params.wait_time).await;
                Ok(false)
            }
        }
    }

    fn exchange_lock(&self) -> ExchangeLock {
        self.lock.clone()
    }

    fn describe(&self) -> String {
        "scripted://meter".to_string()
    }
}

/// Codec for a toy protocol
///
/// A reply frame is `[length, error_code, more, x]`: `length` counts the
/// whole frame, `x` is the block number when `more` is set and otherwise
/// the value, read as `Unsigned8`. Requests are fixed marker bytes.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCodec {
    link: bool,
    authentication: bool,
    association_frames: u8,
    resets: Arc<AtomicUsize>,
    association_replies: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ScriptedCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send a link request `[0x4C]` before associating and `[0x53]` to disconnect
    pub fn with_link(mut self) -> Self {
        self.link = true;
        self
    }

    /// Ask for an authentication pass `[0xAD]`; the reply value 1 accepts it
    pub fn with_authentication(mut self) -> Self {
        self.authentication = true;
        self
    }

    /// Split the association request into `[0xA5, 1]` .. `[0xA5, count]`
    pub fn with_association_frames(mut self, count: u8) -> Self {
        self.association_frames = count;
        self
    }

    /// Frames handed to `parse_association_reply`, shared between clones
    pub fn association_replies(&self) -> Vec<Vec<u8>> {
        self.association_replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of `reset` calls, shared between clones
    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl ProtocolCodec for ScriptedCodec {
    fn receive_params(&self, wait_time: Duration, min_count: usize) -> ReceiveParams {
        ReceiveParams::counted(min_count, wait_time)
    }

    fn build_link_request(&mut self) -> DlmsResult<Option<Vec<u8>>> {
        Ok(self.link.then(|| vec![0x4C]))
    }

    fn parse_link_reply(&mut self, _reply: &Reply) -> DlmsResult<()> {
        Ok(())
    }

    fn build_association_requests(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        if self.association_frames > 1 {
            return Ok((1..=self.association_frames).map(|i| vec![0xA5, i]).collect());
        }
        Ok(vec![vec![0xA5]])
    }

    fn parse_association_reply(&mut self, reply: &Reply) -> DlmsResult<()> {
        self.association_replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(reply.frame.clone());
        Ok(())
    }

    fn requires_authentication(&self) -> bool {
        self.authentication
    }

    fn build_authentication_requests(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        Ok(vec![vec![0xAD]])
    }

    fn parse_authentication_reply(&mut self, reply: &Reply) -> DlmsResult<()> {
        match reply.value {
            Some(DataObject::Unsigned8(1)) => Ok(()),
            _ => Err(DlmsError::AuthenticationFailed(
                "scripted meter rejected the challenge".to_string(),
            )),
        }
    }

    fn build_read_request(&mut self, _object: &ObjectIdentity, attribute: u8) -> DlmsResult<Vec<Vec<u8>>> {
        Ok(vec![vec![0xAE, attribute]])
    }

    fn build_continuation(&mut self, continuation: &Continuation) -> DlmsResult<Vec<u8>> {
        Ok(match continuation {
            Continuation::LinkSegment => vec![0xC1],
            Continuation::DataBlock(block) => vec![0xC0, *block as u8],
        })
    }

    fn try_assemble_frame(&self, data: &[u8]) -> DlmsResult<FrameStatus> {
        let Some(&length) = data.first() else {
            return Ok(FrameStatus::Incomplete { missing: 1 });
        };
        let length = usize::from(length);
        if length < 3 {
            return Err(DlmsError::FrameInvalid(format!("frame length {}", length)));
        }
        Ok(if data.len() >= length {
            FrameStatus::Complete
        } else {
            FrameStatus::Incomplete {
                missing: length - data.len(),
            }
        })
    }

    fn parse_reply(&mut self, frame: &[u8]) -> DlmsResult<Reply> {
        let length = frame.first().map_or(0, |&l| usize::from(l));
        let frame = frame
            .get(..length)
            .ok_or_else(|| DlmsError::FrameInvalid("truncated frame".to_string()))?;
        let mut reply = Reply::new(frame.to_vec());
        reply.payload = frame[1..].to_vec();
        reply.error_code = frame[1];
        if frame[2] != 0 {
            let block = frame.get(3).copied().unwrap_or_default();
            reply.continuation = Some(Continuation::DataBlock(u32::from(block)));
        } else if let Some(&value) = frame.get(3) {
            reply.value = Some(DataObject::Unsigned8(value));
        }
        Ok(reply)
    }

    fn build_release_request(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        Ok(vec![vec![0x62]])
    }

    fn build_disconnect_request(&mut self) -> DlmsResult<Option<Vec<u8>>> {
        Ok(self.link.then(|| vec![0x53]))
    }

    fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// How a [`FakeMeter`] behaves
#[derive(Debug, Clone, Default)]
pub struct FakeMeterBehavior {
    /// Refuse every association with this diagnostic
    pub refuse_association: Option<u8>,
    /// Split GET answers into blocks of at most this many bytes
    pub block_size: Option<usize>,
    /// Require HLS SHA-256 with this shared secret
    pub hls_secret: Option<Vec<u8>>,
}

const METER_SYSTEM_TITLE: &[u8; 8] = b"FAKEMETR";

/// Wrapper-framed DLMS meter on 127.0.0.1
///
/// Serves a register `1.0.1.8.0.255` (value 12345 Wh, scaler -2) and a
/// clock on any logical name. Stops when dropped.
#[derive(Debug)]
pub struct FakeMeter {
    address: SocketAddr,
    requests: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl FakeMeter {
    /// Start a meter on an ephemeral port
    pub async fn start(behavior: FakeMeterBehavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self::serve(listener, behavior))
    }

    /// Start a meter on `port`
    pub async fn start_on(port: u16, behavior: FakeMeterBehavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        Ok(Self::serve(listener, behavior))
    }

    /// Start one meter per behavior on consecutive ports
    pub async fn start_consecutive(behaviors: &[FakeMeterBehavior]) -> std::io::Result<Vec<Self>> {
        let Some((first_behavior, rest)) = behaviors.split_first() else {
            return Ok(Vec::new());
        };
        let mut last_error = None;
        for _ in 0..16 {
            let first = Self::start(first_behavior.clone()).await?;
            let base = first.port();
            let mut meters = vec![first];
            for (offset, behavior) in rest.iter().enumerate() {
                let Some(port) = u16::try_from(offset + 1).ok().and_then(|o| base.checked_add(o)) else {
                    break;
                };
                match Self::start_on(port, behavior.clone()).await {
                    Ok(meter) => meters.push(meter),
                    Err(e) => {
                        last_error = Some(e);
                        break;
                    }
                }
            }
            if meters.len() == behaviors.len() {
                return Ok(meters);
            }
        }
        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "no consecutive ports free")
        }))
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    /// Tag of every APDU received so far, across connections
    pub fn requests(&self) -> Vec<u8> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    fn serve(listener: TcpListener, behavior: FakeMeterBehavior) -> Self {
        let address = listener
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 0)));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                debug!("fake meter {}: connection from {}", address, peer);
                let behavior = behavior.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    if let Err(e) = MeterConnection::new(behavior, seen).run(stream).await {
                        debug!("fake meter connection ended: {}", e);
                    }
                });
            }
        });
        Self {
            address,
            requests,
            task,
        }
    }
}

impl Drop for FakeMeter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct MeterConnection {
    behavior: FakeMeterBehavior,
    seen: Arc<Mutex<Vec<u8>>>,
    client_system_title: Vec<u8>,
    ctos: Vec<u8>,
    stoc: Vec<u8>,
    pending_blocks: VecDeque<Vec<u8>>,
    block_number: u32,
}

impl MeterConnection {
    fn new(behavior: FakeMeterBehavior, seen: Arc<Mutex<Vec<u8>>>) -> Self {
        Self {
            behavior,
            seen,
            client_system_title: Vec::new(),
            ctos: Vec::new(),
            stoc: Vec::new(),
            pending_blocks: VecDeque::new(),
            block_number: 0,
        }
    }

    async fn run(mut self, mut stream: TcpStream) -> DlmsResult<()> {
        loop {
            let mut header = [0u8; WRAPPER_HEADER_LENGTH];
            if stream.read_exact(&mut header).await.is_err() {
                return Ok(());
            }
            let header = WrapperHeader::decode(&header)?;
            let mut apdu = vec![0u8; usize::from(header.payload_length())];
            stream.read_exact(&mut apdu).await?;

            let Some(&apdu_tag) = apdu.first() else {
                continue;
            };
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(apdu_tag);
            }

            let answer = match apdu_tag {
                0x60 => self.associate(&apdu)?,
                tag::GET_REQUEST => self.get(&apdu)?,
                tag::ACTION_REQUEST => self.action(&apdu)?,
                0x62 => RLREApdu { reason: Some(0) }.encode(),
                other => {
                    return Err(DlmsError::Protocol(format!(
                        "fake meter does not serve APDU 0x{:02X}",
                        other
                    )));
                }
            };

            let framing = WrapperFraming::new(header.destination_wport(), header.source_wport());
            stream.write_all(&framing.wrap(&answer)?).await?;
        }
    }

    fn associate(&mut self, apdu: &[u8]) -> DlmsResult<Vec<u8>> {
        let mut application_context = 1;
        let mut outer = BerReader::new(apdu);
        let body = outer.expect(0x60)?;
        let mut fields = BerReader::new(body);
        while let Some((field, content)) = fields.next_tlv()? {
            match field {
                0xA1 => application_context = content.last().copied().unwrap_or(1),
                0xA6 => self.client_system_title = BerReader::new(content).expect(0x04)?.to_vec(),
                0xAC => self.ctos = BerReader::new(content).expect(0x80)?.to_vec(),
                _ => {}
            }
        }

        let initiate = InitiateResponse {
            negotiated_quality_of_service: None,
            negotiated_dlms_version_number: 6,
            negotiated_conformance: Conformance::from_bits(0x00501F),
            server_max_receive_pdu_size: 1024,
            vaa_name: 0x0007,
        };
        let mut aare = AAREApdu {
            application_context,
            diagnostic_source: Some(AcseServiceUser::User),
            user_information: Some(initiate.encode()),
            ..AAREApdu::default()
        };

        if let Some(diagnostic) = self.behavior.refuse_association {
            aare.result = 1;
            aare.diagnostic = diagnostic;
            aare.user_information = None;
        } else if self.behavior.hls_secret.is_some() {
            self.stoc = generate_challenge();
            aare.diagnostic = DIAGNOSTIC_AUTHENTICATION_REQUIRED;
            aare.responding_ap_title = Some(METER_SYSTEM_TITLE.to_vec());
            aare.mechanism_id = Some(7);
            aare.responding_authentication_value = Some(self.stoc.clone());
        }
        Ok(aare.encode())
    }

    fn get(&mut self, apdu: &[u8]) -> DlmsResult<Vec<u8>> {
        let mut decoder = AxdrDecoder::new(&apdu[1..]);
        let request_type = decoder.decode_u8()?;
        let invoke = InvokeIdAndPriority::from_u8(decoder.decode_u8()?);

        if request_type == 0x02 {
            let acknowledged = decoder.decode_u32()?;
            if acknowledged != self.block_number {
                return Ok(block_response(invoke, true, acknowledged, DataBlockResult::DataAccessResult(2)));
            }
            let Some(raw) = self.pending_blocks.pop_front() else {
                return Ok(block_response(invoke, true, acknowledged, DataBlockResult::DataAccessResult(2)));
            };
            self.block_number += 1;
            return Ok(block_response(
                invoke,
                self.pending_blocks.is_empty(),
                self.block_number,
                DataBlockResult::RawData(raw),
            ));
        }

        let class = decoder.decode_u16()?;
        let obis = ObisCode::from_bytes(decoder.read_bytes(6)?)?;
        let attribute = decoder.decode_u8()?;
        let Some(value) = attribute_value(class, obis, attribute) else {
            return Ok(GetResponse::Normal {
                invoke_id_and_priority: invoke,
                result: GetDataResult::DataAccessResult(4),
            }
            .encode());
        };

        let mut encoder = AxdrEncoder::new();
        encoder.encode_data_object(&value);
        let encoded = encoder.into_bytes();
        match self.behavior.block_size {
            Some(size) if size > 0 && encoded.len() > size => {
                self.pending_blocks = encoded.chunks(size).map(<[u8]>::to_vec).collect();
                self.block_number = 1;
                let first = self.pending_blocks.pop_front().unwrap_or_default();
                Ok(block_response(invoke, false, 1, DataBlockResult::RawData(first)))
            }
            _ => Ok(GetResponse::Normal {
                invoke_id_and_priority: invoke,
                result: GetDataResult::Data(value),
            }
            .encode()),
        }
    }

    fn action(&mut self, apdu: &[u8]) -> DlmsResult<Vec<u8>> {
        let mut decoder = AxdrDecoder::new(&apdu[1..]);
        let _request_type = decoder.decode_u8()?;
        let invoke = InvokeIdAndPriority::from_u8(decoder.decode_u8()?);
        let class = decoder.decode_u16()?;
        let _obis = decoder.read_bytes(6)?;
        let method = decoder.decode_u8()?;
        let parameters = if decoder.decode_u8()? != 0 {
            Some(decoder.decode_data_object()?)
        } else {
            None
        };

        let refused = ActionResponse {
            invoke_id_and_priority: invoke,
            result: 3,
            return_parameters: None,
        };
        let (Some(secret), Some(DataObject::OctetString(response))) =
            (self.behavior.hls_secret.as_deref(), parameters)
        else {
            return Ok(refused.encode());
        };
        if class != class_id::ASSOCIATION_LN || method != 1 {
            return Ok(refused.encode());
        }

        let mut responder = HlsSha256::new(secret);
        let meter_view = ChallengeContext {
            client_system_title: METER_SYSTEM_TITLE,
            server_system_title: &self.client_system_title,
            ctos: &self.stoc,
            stoc: &self.ctos,
        };
        if responder.verify_server_response(&meter_view, &response).is_err() {
            return Ok(refused.encode());
        }
        let answer = responder.client_response(&meter_view)?;
        Ok(ActionResponse {
            invoke_id_and_priority: invoke,
            result: 0,
            return_parameters: Some(GetDataResult::Data(DataObject::OctetString(answer))),
        }
        .encode())
    }
}

fn block_response(invoke: InvokeIdAndPriority, last_block: bool, block_number: u32, result: DataBlockResult) -> Vec<u8> {
    GetResponse::WithDataBlock {
        invoke_id_and_priority: invoke,
        last_block,
        block_number,
        result,
    }
    .encode()
}

fn attribute_value(class: u16, obis: ObisCode, attribute: u8) -> Option<DataObject> {
    if attribute == 1 {
        return Some(DataObject::OctetString(obis.as_bytes().to_vec()));
    }
    match (class, attribute) {
        (class_id::REGISTER, 2) if obis == ObisCode::new(1, 0, 1, 8, 0, 255) => {
            Some(DataObject::Unsigned32(12345))
        }
        (class_id::REGISTER, 3) if obis == ObisCode::new(1, 0, 1, 8, 0, 255) => {
            Some(DataObject::Structure(vec![
                DataObject::Integer8(-2),
                DataObject::Enumerate(30),
            ]))
        }
        (class_id::CLOCK, 2) => Some(DataObject::OctetString(
            CosemDateTime::new(2024, 3, 15, 12, 30, 0).encode(),
        )),
        _ => None,
    }
}
