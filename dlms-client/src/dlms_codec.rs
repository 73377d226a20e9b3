//! DLMS/COSEM implementation of [`ProtocolCodec`]
//!
//! Combines the link framing (HDLC or wrapper), the ACSE association, the
//! authentication mechanism and the xDLMS services into the frames the
//! session sends, and turns reply frames back into values.

use crate::codec::{Continuation, ProtocolCodec, Reply};
use crate::settings::{ClientSettings, InterfaceType, Referencing, ServiceClass};
use dlms_application::pdu::{tag, ConfirmedServiceError, ExceptionResponse, InitiateResponse};
use dlms_application::{
    ActionResponse, ActionService, Conformance, CosemAttributeDescriptor, CosemMethodDescriptor,
    GetDataResult, GetOutcome, GetResponse, GetService, InitiateRequest, ReadResponse, ReadService,
    ShortName,
};
use dlms_asn1::iso_acse::{
    CONTEXT_LN_NO_CIPHERING, CONTEXT_SN_NO_CIPHERING, DIAGNOSTIC_AUTHENTICATION_REQUIRED,
};
use dlms_asn1::{AAREApdu, AARQApdu, RLRQApdu};
use dlms_core::cosem::class_id;
use dlms_core::{DataObject, DlmsError, DlmsResult, ObisCode, ObjectIdentity};
use dlms_security::{
    generate_challenge, AuthenticationMechanism, ChallengeContext, ChallengeResponder, HlsGmac,
    HlsSha256,
};
use dlms_session::{
    frame_status, FrameStatus, HdlcAddress, HdlcLink, LinkPayload, WrapperFraming, FLAG,
};
use dlms_transport::ReceiveParams;
use log::debug;
use std::time::Duration;

/// `reply_to_HLS_authentication` method of the association LN object
const REPLY_TO_HLS_AUTHENTICATION: i8 = 1;

#[derive(Debug)]
enum Framing {
    Hdlc(HdlcLink),
    Wrapper(WrapperFraming),
}

/// Codec for one DLMS/COSEM association
#[derive(Debug)]
pub struct DlmsCodec {
    framing: Framing,
    referencing: Referencing,
    mechanism: AuthenticationMechanism,
    password: Vec<u8>,
    system_title: Vec<u8>,
    responder: Option<Box<dyn ChallengeResponder>>,
    max_receive_pdu_size: u16,
    get: GetService,
    read: ReadService,
    action: ActionService,
    /// APDU bytes of HDLC segments received so far
    segments: Vec<u8>,
    ctos: Vec<u8>,
    stoc: Option<Vec<u8>>,
    server_system_title: Vec<u8>,
    authentication_pending: bool,
    negotiated: Option<InitiateResponse>,
}

impl DlmsCodec {
    /// Create a codec for the endpoint described by `settings`
    ///
    /// # Errors
    ///
    /// `InvalidData` for an inconsistent configuration, e.g. HLS with short
    /// name referencing or HDLC addresses out of range.
    pub fn new(settings: &ClientSettings) -> DlmsResult<Self> {
        settings.validate()?;

        let framing = match settings.interface_type {
            InterfaceType::Hdlc => Framing::Hdlc(HdlcLink::new(
                HdlcAddress::new(settings.client_address)?,
                HdlcAddress::new_with_physical(
                    settings.server_address,
                    settings.server_physical_address,
                )?,
            )),
            InterfaceType::Wrapper => Framing::Wrapper(WrapperFraming::new(
                settings.client_address,
                settings.server_address,
            )),
        };

        let responder: Option<Box<dyn ChallengeResponder>> = match settings.authentication {
            AuthenticationMechanism::HighSha256 => Some(Box::new(HlsSha256::new(&settings.password))),
            AuthenticationMechanism::HighGmac => {
                let keys = settings.gmac.as_ref().ok_or_else(|| {
                    DlmsError::InvalidData("HLS GMAC requires keys".to_string())
                })?;
                Some(Box::new(HlsGmac::new(
                    &keys.block_cipher_key,
                    &keys.authentication_key,
                    keys.invocation_counter,
                )?))
            }
            AuthenticationMechanism::None | AuthenticationMechanism::Low => None,
        };

        let confirmed = settings.service_class == ServiceClass::Confirmed;
        Ok(Self {
            framing,
            referencing: settings.referencing,
            mechanism: settings.authentication,
            password: settings.password.clone(),
            system_title: settings.system_title.clone(),
            responder,
            max_receive_pdu_size: settings.max_receive_pdu_size,
            get: GetService::new(confirmed),
            read: ReadService::new(),
            action: ActionService::new(confirmed),
            segments: Vec::new(),
            ctos: Vec::new(),
            stoc: None,
            server_system_title: Vec::new(),
            authentication_pending: false,
            negotiated: None,
        })
    }

    /// Conformance granted by the server, once associated
    pub fn negotiated_conformance(&self) -> Option<Conformance> {
        self.negotiated.as_ref().map(|n| n.negotiated_conformance)
    }

    /// Largest APDU the server accepts, once associated
    pub fn server_max_pdu_size(&self) -> Option<u16> {
        self.negotiated.as_ref().map(|n| n.server_max_receive_pdu_size)
    }

    fn frame_apdu(&mut self, apdu: &[u8]) -> DlmsResult<Vec<Vec<u8>>> {
        self.segments.clear();
        match &mut self.framing {
            Framing::Hdlc(link) => link.information_frames(apdu),
            Framing::Wrapper(wrapper) => Ok(vec![wrapper.wrap(apdu)?]),
        }
    }

    fn single_frame(&mut self, apdu: &[u8]) -> DlmsResult<Vec<u8>> {
        let mut frames = self.frame_apdu(apdu)?;
        if frames.len() != 1 {
            return Err(DlmsError::InvalidData(format!(
                "Continuation request needs {} frames",
                frames.len()
            )));
        }
        Ok(frames.remove(0))
    }

    fn challenge_context(&self) -> DlmsResult<ChallengeContext<'_>> {
        let stoc = self.stoc.as_deref().ok_or_else(|| {
            DlmsError::AuthenticationFailed("No server challenge received".to_string())
        })?;
        Ok(ChallengeContext {
            client_system_title: &self.system_title,
            server_system_title: &self.server_system_title,
            ctos: &self.ctos,
            stoc,
        })
    }

    fn parse_apdu(&mut self, apdu: Vec<u8>, mut reply: Reply) -> DlmsResult<Reply> {
        let Some(&apdu_tag) = apdu.first() else {
            return Ok(reply);
        };

        match apdu_tag {
            tag::AARE => {
                let aare = AAREApdu::decode(&apdu)?;
                if !aare.is_accepted() {
                    reply.error_code = if aare.diagnostic != 0 {
                        aare.diagnostic
                    } else {
                        aare.result
                    };
                } else if let Some(info) = &aare.user_information {
                    if info.first() == Some(&tag::CONFIRMED_SERVICE_ERROR) {
                        reply.error_code = confirmed_service_error_code(info)?;
                    }
                }
            }
            tag::RLRE => {}
            tag::GET_RESPONSE => {
                let response = GetResponse::decode(&apdu)?;
                let outcome = self.get.process_response(&response)?;
                apply_outcome(&mut reply, outcome);
            }
            tag::READ_RESPONSE => {
                let response = ReadResponse::decode(&apdu)?;
                let outcome = self.read.process_response(&response)?;
                apply_outcome(&mut reply, outcome);
            }
            tag::ACTION_RESPONSE => {
                let response = ActionResponse::decode(&apdu)?;
                if response.result != 0 {
                    reply.error_code = response.result;
                } else {
                    match response.return_parameters {
                        Some(GetDataResult::Data(data)) => reply.value = Some(data),
                        Some(GetDataResult::DataAccessResult(code)) => reply.error_code = code,
                        None => {}
                    }
                }
            }
            tag::EXCEPTION_RESPONSE => {
                reply.error_code = ExceptionResponse::decode(&apdu)?.error_code();
            }
            tag::CONFIRMED_SERVICE_ERROR => {
                reply.error_code = confirmed_service_error_code(&apdu)?;
            }
            other => {
                return Err(DlmsError::Protocol(format!(
                    "Unexpected APDU tag 0x{:02X}",
                    other
                )));
            }
        }

        reply.payload = apdu;
        Ok(reply)
    }
}

fn apply_outcome(reply: &mut Reply, outcome: GetOutcome) {
    match outcome {
        GetOutcome::Complete(value) => reply.value = Some(value),
        GetOutcome::NextBlock(block) => reply.continuation = Some(Continuation::DataBlock(block)),
        GetOutcome::Failed(0) => reply.value = Some(DataObject::Null),
        GetOutcome::Failed(code) => reply.error_code = code,
    }
}

fn confirmed_service_error_code(apdu: &[u8]) -> DlmsResult<u8> {
    let error = ConfirmedServiceError::decode(apdu)?;
    Ok(if error.value != 0 {
        error.value
    } else {
        tag::CONFIRMED_SERVICE_ERROR
    })
}

impl ProtocolCodec for DlmsCodec {
    fn receive_params(&self, wait_time: Duration, min_count: usize) -> ReceiveParams {
        match self.framing {
            Framing::Hdlc(_) => ReceiveParams::terminated(FLAG, wait_time),
            Framing::Wrapper(_) => ReceiveParams::counted(min_count, wait_time),
        }
    }

    fn build_link_request(&mut self) -> DlmsResult<Option<Vec<u8>>> {
        self.segments.clear();
        match &mut self.framing {
            Framing::Hdlc(link) => link.snrm().map(Some),
            Framing::Wrapper(_) => Ok(None),
        }
    }

    fn parse_link_reply(&mut self, reply: &Reply) -> DlmsResult<()> {
        match &mut self.framing {
            Framing::Hdlc(link) => {
                link.accept_ua(&reply.frame)?;
                debug!("HDLC link parameters: {:?}", link.parameters());
                Ok(())
            }
            Framing::Wrapper(_) => Ok(()),
        }
    }

    fn build_association_requests(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        let (context, conformance) = match self.referencing {
            Referencing::LogicalName => (CONTEXT_LN_NO_CIPHERING, Conformance::LN_CLIENT),
            Referencing::ShortName => (CONTEXT_SN_NO_CIPHERING, Conformance::SN_CLIENT),
        };
        let initiate = InitiateRequest::new(conformance, self.max_receive_pdu_size).encode();
        let mut aarq = AARQApdu::new(context, initiate);

        self.authentication_pending = false;
        self.stoc = None;
        self.server_system_title.clear();
        match self.mechanism {
            AuthenticationMechanism::None => self.ctos.clear(),
            AuthenticationMechanism::Low => {
                self.ctos.clear();
                aarq.mechanism_id = Some(self.mechanism.id());
                aarq.calling_authentication_value = Some(self.password.clone());
            }
            AuthenticationMechanism::HighGmac | AuthenticationMechanism::HighSha256 => {
                self.ctos = generate_challenge();
                aarq.calling_ap_title = Some(self.system_title.clone());
                aarq.mechanism_id = Some(self.mechanism.id());
                aarq.calling_authentication_value = Some(self.ctos.clone());
            }
        }

        self.frame_apdu(&aarq.encode())
    }

    fn parse_association_reply(&mut self, reply: &Reply) -> DlmsResult<()> {
        let aare = AAREApdu::decode(&reply.payload)?;
        if !aare.is_accepted() {
            return Err(DlmsError::ErrorCode(if aare.diagnostic != 0 {
                aare.diagnostic
            } else {
                aare.result
            }));
        }

        if let Some(info) = &aare.user_information {
            let initiate = InitiateResponse::decode(info)?;
            debug!(
                "Association accepted: conformance {:06X}, server max PDU {}",
                initiate.negotiated_conformance.bits(),
                initiate.server_max_receive_pdu_size
            );
            self.negotiated = Some(initiate);
        }

        self.authentication_pending = self.mechanism.is_high_level()
            && aare.diagnostic == DIAGNOSTIC_AUTHENTICATION_REQUIRED;
        if self.authentication_pending {
            self.stoc = Some(aare.responding_authentication_value.ok_or_else(|| {
                DlmsError::AuthenticationFailed("Server did not send a challenge".to_string())
            })?);
            self.server_system_title = aare.responding_ap_title.ok_or_else(|| {
                DlmsError::AuthenticationFailed("Server did not send its system title".to_string())
            })?;
        }
        Ok(())
    }

    fn requires_authentication(&self) -> bool {
        self.authentication_pending
    }

    fn build_authentication_requests(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        let stoc = self.stoc.as_deref().ok_or_else(|| {
            DlmsError::AuthenticationFailed("No server challenge received".to_string())
        })?;
        let responder = self.responder.as_mut().ok_or_else(|| {
            DlmsError::InvalidData(format!(
                "Mechanism {:?} has no challenge response",
                self.mechanism
            ))
        })?;
        let ctx = ChallengeContext {
            client_system_title: &self.system_title,
            server_system_title: &self.server_system_title,
            ctos: &self.ctos,
            stoc,
        };
        let response = responder.client_response(&ctx)?;

        let request = self.action.create_normal_request(
            CosemMethodDescriptor::new(
                class_id::ASSOCIATION_LN,
                ObisCode::ASSOCIATION_LN,
                REPLY_TO_HLS_AUTHENTICATION,
            ),
            Some(DataObject::OctetString(response)),
        )?;
        self.frame_apdu(&request.encode())
    }

    fn parse_authentication_reply(&mut self, reply: &Reply) -> DlmsResult<()> {
        let response = match &reply.value {
            Some(DataObject::OctetString(bytes)) => bytes.as_slice(),
            Some(other) => {
                return Err(DlmsError::AuthenticationFailed(format!(
                    "Server response has type {:?}",
                    other.get_type()
                )));
            }
            None => {
                return Err(DlmsError::AuthenticationFailed(
                    "Server did not answer the client challenge".to_string(),
                ));
            }
        };
        let responder = self.responder.as_ref().ok_or_else(|| {
            DlmsError::InvalidData("No authentication in progress".to_string())
        })?;
        responder.verify_server_response(&self.challenge_context()?, response)?;
        self.authentication_pending = false;
        Ok(())
    }

    fn build_read_request(&mut self, object: &ObjectIdentity, attribute: u8) -> DlmsResult<Vec<Vec<u8>>> {
        let apdu = match self.referencing {
            Referencing::LogicalName => {
                let attribute_id = i8::try_from(attribute).map_err(|_| {
                    DlmsError::InvalidData(format!("Attribute index {} out of range", attribute))
                })?;
                self.get
                    .normal_request(CosemAttributeDescriptor::new(
                        object.class_id,
                        object.logical_name,
                        attribute_id,
                    ))?
                    .encode()
            }
            Referencing::ShortName => {
                let base = object.short_name.ok_or_else(|| {
                    DlmsError::InvalidData(format!(
                        "Object {} has no short name",
                        object.logical_name
                    ))
                })?;
                self.read
                    .read_request(ShortName::new(base).attribute(attribute))
                    .encode()
            }
        };
        self.frame_apdu(&apdu)
    }

    fn build_continuation(&mut self, continuation: &Continuation) -> DlmsResult<Vec<u8>> {
        match continuation {
            Continuation::LinkSegment => match &self.framing {
                Framing::Hdlc(link) => link.receive_ready(),
                Framing::Wrapper(_) => Err(DlmsError::Protocol(
                    "Wrapper framing has no link segments".to_string(),
                )),
            },
            Continuation::DataBlock(block) => {
                let apdu = match self.referencing {
                    Referencing::LogicalName => self.get.next_request(*block).encode(),
                    Referencing::ShortName => {
                        let block = u16::try_from(*block).map_err(|_| {
                            DlmsError::Protocol(format!("Block number {} exceeds u16", block))
                        })?;
                        self.read.next_request(block).encode()
                    }
                };
                self.single_frame(&apdu)
            }
        }
    }

    fn try_assemble_frame(&self, data: &[u8]) -> DlmsResult<FrameStatus> {
        match self.framing {
            Framing::Hdlc(_) => frame_status(data),
            Framing::Wrapper(_) => WrapperFraming::frame_status(data),
        }
    }

    fn parse_reply(&mut self, frame: &[u8]) -> DlmsResult<Reply> {
        let reply = Reply::new(frame.to_vec());
        let apdu = match &mut self.framing {
            Framing::Hdlc(link) => match link.accept(frame)? {
                LinkPayload::Data { payload, more } => {
                    self.segments.extend_from_slice(&payload);
                    if more {
                        return Ok(Reply {
                            continuation: Some(Continuation::LinkSegment),
                            ..reply
                        });
                    }
                    std::mem::take(&mut self.segments)
                }
                LinkPayload::Acknowledged | LinkPayload::Disconnected => return Ok(reply),
            },
            Framing::Wrapper(wrapper) => wrapper.unwrap(frame)?,
        };
        self.parse_apdu(apdu, reply)
    }

    fn build_release_request(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        self.frame_apdu(&RLRQApdu.encode())
    }

    fn build_disconnect_request(&mut self) -> DlmsResult<Option<Vec<u8>>> {
        match &self.framing {
            Framing::Hdlc(link) => link.disc().map(Some),
            Framing::Wrapper(_) => Ok(None),
        }
    }

    fn reset(&mut self) {
        if let Framing::Hdlc(link) = &mut self.framing {
            link.reset();
        }
        self.get.reset();
        self.read.reset();
        self.segments.clear();
        self.ctos.clear();
        self.stoc = None;
        self.server_system_title.clear();
        self.authentication_pending = false;
        self.negotiated = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_application::pdu::DataBlockResult;
    use dlms_application::InvokeIdAndPriority;
    use dlms_asn1::AcseServiceUser;
    use dlms_session::hdlc::frame::control;
    use dlms_session::{HdlcFrame, HdlcParameters, LLC_RESPONSE};

    fn wrapper_settings() -> ClientSettings {
        ClientSettings::builder()
            .interface(InterfaceType::Wrapper)
            .client_address(0x10)
            .server_address(0x01, 0)
            .build()
            .unwrap()
    }

    fn wrap_server(apdu: &[u8]) -> Vec<u8> {
        // Server to client: source and destination swapped
        WrapperFraming::new(0x01, 0x10).wrap(apdu).unwrap()
    }

    fn accepted_aare() -> AAREApdu {
        AAREApdu {
            application_context: CONTEXT_LN_NO_CIPHERING,
            result: 0,
            diagnostic: 0,
            diagnostic_source: Some(AcseServiceUser::User),
            user_information: Some(
                InitiateResponse {
                    negotiated_quality_of_service: None,
                    negotiated_dlms_version_number: 6,
                    negotiated_conformance: Conformance::from_bits(0x00501F),
                    server_max_receive_pdu_size: 500,
                    vaa_name: 0x0007,
                }
                .encode(),
            ),
            ..AAREApdu::default()
        }
    }

    #[test]
    fn test_wrapper_association_and_read() {
        let mut codec = DlmsCodec::new(&wrapper_settings()).unwrap();
        assert_eq!(codec.build_link_request().unwrap(), None);

        let frames = codec.build_association_requests().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..8], &[0x00, 0x01, 0x00, 0x10, 0x00, 0x01, 0x00, (frames[0].len() - 8) as u8]);
        assert_eq!(frames[0][8], 0x60);

        let reply = codec.parse_reply(&wrap_server(&accepted_aare().encode())).unwrap();
        assert_eq!(reply.error_code, 0);
        codec.parse_association_reply(&reply).unwrap();
        assert!(!codec.requires_authentication());
        assert_eq!(codec.server_max_pdu_size(), Some(500));

        let register = ObjectIdentity {
            class_id: class_id::REGISTER,
            logical_name: ObisCode::new(1, 0, 1, 8, 0, 255),
            short_name: None,
        };
        let frames = codec.build_read_request(&register, 2).unwrap();
        assert_eq!(
            &frames[0][8..],
            &[0xC0, 0x01, 0xC1, 0x00, 0x03, 0x01, 0x00, 0x01, 0x08, 0x00, 0xFF, 0x02, 0x00]
        );

        let reply = codec
            .parse_reply(&wrap_server(&[0xC4, 0x01, 0xC1, 0x00, 0x06, 0x00, 0x00, 0x30, 0x39]))
            .unwrap();
        assert_eq!(reply.value, Some(DataObject::Unsigned32(12345)));
        assert_eq!(reply.continuation, None);
    }

    #[test]
    fn test_rejected_association_reports_diagnostic() {
        let mut codec = DlmsCodec::new(&wrapper_settings()).unwrap();
        codec.build_association_requests().unwrap();
        let aare = AAREApdu {
            result: 1,
            diagnostic: 0x0E,
            ..accepted_aare()
        };
        let reply = codec.parse_reply(&wrap_server(&aare.encode())).unwrap();
        assert_eq!(reply.error_code, 0x0E);
        assert!(matches!(
            codec.parse_association_reply(&reply),
            Err(DlmsError::ErrorCode(0x0E))
        ));
    }

    #[test]
    fn test_block_transfer_continuation() {
        let mut codec = DlmsCodec::new(&wrapper_settings()).unwrap();
        let clock = ObjectIdentity {
            class_id: class_id::CLOCK,
            logical_name: ObisCode::new(0, 0, 1, 0, 0, 255),
            short_name: None,
        };
        codec.build_read_request(&clock, 2).unwrap();
        let invoke = InvokeIdAndPriority::from_u8(0xC1);

        let first = GetResponse::WithDataBlock {
            invoke_id_and_priority: invoke,
            last_block: false,
            block_number: 1,
            result: DataBlockResult::RawData(vec![0x12]),
        };
        let reply = codec.parse_reply(&wrap_server(&first.encode())).unwrap();
        assert_eq!(reply.continuation, Some(Continuation::DataBlock(1)));
        assert_eq!(reply.value, None);

        let next = codec.build_continuation(&Continuation::DataBlock(1)).unwrap();
        assert_eq!(&next[8..], &[0xC0, 0x02, 0xC1, 0x00, 0x00, 0x00, 0x01]);

        let last = GetResponse::WithDataBlock {
            invoke_id_and_priority: invoke,
            last_block: true,
            block_number: 2,
            result: DataBlockResult::RawData(vec![0x00, 0xE6]),
        };
        let reply = codec.parse_reply(&wrap_server(&last.encode())).unwrap();
        assert_eq!(reply.value, Some(DataObject::Unsigned16(230)));
        assert_eq!(reply.continuation, None);
    }

    #[test]
    fn test_exception_response_is_an_error_code() {
        let mut codec = DlmsCodec::new(&wrapper_settings()).unwrap();
        let reply = codec.parse_reply(&wrap_server(&[0xD8, 0x01, 0x02])).unwrap();
        assert_eq!(reply.error_code, 0x02);
    }

    #[test]
    fn test_short_name_read() {
        let settings = ClientSettings::builder()
            .interface(InterfaceType::Wrapper)
            .referencing(Referencing::ShortName)
            .build()
            .unwrap();
        let mut codec = DlmsCodec::new(&settings).unwrap();

        let frames = codec.build_association_requests().unwrap();
        // SN application context name ends in 2
        assert!(frames[0].windows(7).any(|w| w == [0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x02]));

        let register = ObjectIdentity {
            class_id: class_id::REGISTER,
            logical_name: ObisCode::new(1, 0, 1, 8, 0, 255),
            short_name: Some(0x2BC0),
        };
        let frames = codec.build_read_request(&register, 2).unwrap();
        assert_eq!(&frames[0][8..], &[0x05, 0x01, 0x02, 0x2B, 0xC8]);

        let reply = codec
            .parse_reply(&wrap_server(&[0x0C, 0x01, 0x00, 0x12, 0x00, 0xE6]))
            .unwrap();
        assert_eq!(reply.value, Some(DataObject::Unsigned16(230)));

        let missing = ObjectIdentity {
            short_name: None,
            ..register
        };
        assert!(codec.build_read_request(&missing, 2).is_err());
    }

    #[test]
    fn test_hls_sha256_round() {
        let settings = ClientSettings::builder()
            .interface(InterfaceType::Wrapper)
            .authentication(AuthenticationMechanism::HighSha256)
            .password(b"secret")
            .system_title(b"CLIENTST")
            .build()
            .unwrap();
        let mut codec = DlmsCodec::new(&settings).unwrap();
        codec.build_association_requests().unwrap();
        let ctos = codec.ctos.clone();
        assert_eq!(ctos.len(), 16);

        let stoc = vec![0x53; 16];
        let aare = AAREApdu {
            diagnostic: DIAGNOSTIC_AUTHENTICATION_REQUIRED,
            responding_ap_title: Some(b"SERVERST".to_vec()),
            mechanism_id: Some(7),
            responding_authentication_value: Some(stoc.clone()),
            ..accepted_aare()
        };
        let reply = codec.parse_reply(&wrap_server(&aare.encode())).unwrap();
        assert_eq!(reply.error_code, 0);
        codec.parse_association_reply(&reply).unwrap();
        assert!(codec.requires_authentication());

        let frames = codec.build_authentication_requests().unwrap();
        assert_eq!(&frames[0][8..19], &[0xC3, 0x01, 0xC1, 0x00, 0x0F, 0x00, 0x00, 0x28, 0x00, 0x00, 0xFF]);

        // Server side: its own view of the same exchange
        let mut server = HlsSha256::new(b"secret");
        let server_view = ChallengeContext {
            client_system_title: b"SERVERST",
            server_system_title: b"CLIENTST",
            ctos: &stoc,
            stoc: &ctos,
        };
        let f_ctos = server.client_response(&server_view).unwrap();
        let mut action = vec![0xC7, 0x01, 0xC1, 0x00, 0x01, 0x00, 0x09, 0x20];
        action.extend_from_slice(&f_ctos);
        let reply = codec.parse_reply(&wrap_server(&action)).unwrap();
        codec.parse_authentication_reply(&reply).unwrap();
        assert!(!codec.requires_authentication());

        // A tampered answer is refused
        codec.authentication_pending = true;
        let mut tampered = action.clone();
        tampered[10] ^= 0xFF;
        let reply = codec.parse_reply(&wrap_server(&tampered)).unwrap();
        assert!(matches!(
            codec.parse_authentication_reply(&reply),
            Err(DlmsError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_hls_with_short_names_is_rejected_at_construction() {
        let settings = ClientSettings {
            referencing: Referencing::ShortName,
            authentication: AuthenticationMechanism::HighSha256,
            password: b"secret".to_vec(),
            ..ClientSettings::default()
        };
        assert!(DlmsCodec::new(&settings).is_err());
    }

    fn hdlc_codec() -> DlmsCodec {
        DlmsCodec::new(&ClientSettings::default()).unwrap()
    }

    fn server_frame(control: u8, info: Vec<u8>, segmented: bool) -> Vec<u8> {
        HdlcFrame::new(HdlcAddress::new(0x10).unwrap(), HdlcAddress::new(0x01).unwrap(), control)
            .with_information(info, segmented)
            .encode()
            .unwrap()
    }

    #[test]
    fn test_hdlc_link_and_segmented_reply() {
        let mut codec = hdlc_codec();
        let snrm = codec.build_link_request().unwrap().unwrap();
        assert_eq!(snrm[0], FLAG);
        assert_eq!(
            codec.receive_params(Duration::from_secs(1), 5).terminator,
            Some(FLAG)
        );

        let ua = server_frame(control::UA, HdlcParameters::default().encode_ua(), false);
        assert_eq!(codec.try_assemble_frame(&ua).unwrap(), FrameStatus::Complete);
        let reply = codec.parse_reply(&ua).unwrap();
        codec.parse_link_reply(&reply).unwrap();

        let register = ObjectIdentity {
            class_id: class_id::REGISTER,
            logical_name: ObisCode::new(1, 0, 1, 8, 0, 255),
            short_name: None,
        };
        codec.build_read_request(&register, 2).unwrap();

        let mut first = LLC_RESPONSE.to_vec();
        first.extend_from_slice(&[0xC4, 0x01, 0xC1, 0x00, 0x06]);
        let reply = codec
            .parse_reply(&server_frame(control::information(0, 1), first, true))
            .unwrap();
        assert_eq!(reply.continuation, Some(Continuation::LinkSegment));

        let rr = codec.build_continuation(&Continuation::LinkSegment).unwrap();
        assert_eq!(HdlcFrame::decode(&rr).unwrap().control, control::receive_ready(1));

        let reply = codec
            .parse_reply(&server_frame(control::information(1, 1), vec![0x00, 0x00, 0x30, 0x39], false))
            .unwrap();
        assert_eq!(reply.value, Some(DataObject::Unsigned32(12345)));

        let disc = codec.build_disconnect_request().unwrap().unwrap();
        assert_eq!(HdlcFrame::decode(&disc).unwrap().control, control::DISC);
    }

    #[test]
    fn test_hdlc_dm_refuses_link() {
        let mut codec = hdlc_codec();
        codec.build_link_request().unwrap();
        let dm = server_frame(control::DM, Vec::new(), false);
        let reply = codec.parse_reply(&dm).unwrap();
        assert!(codec.parse_link_reply(&reply).is_err());
    }
}
