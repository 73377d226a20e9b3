//! PDU (Protocol Data Unit) handling for DLMS/COSEM application layer
//!
//! xDLMS APDUs exchanged inside an association, encoded with A-XDR:
//! - **Initiate**: carried in the AARQ/AARE user information
//! - **Get/Action**: attribute reads and the HLS reply method
//! - **Exception / Confirmed-Service-Error**: error reporting

use dlms_asn1::{AxdrDecoder, AxdrEncoder};
use dlms_core::{DataObject, DlmsError, DlmsResult, ObisCode};

/// DLMS protocol version number proposed in InitiateRequest
pub const DLMS_VERSION_6: u8 = 6;

/// Maximum PDU size for DLMS/COSEM communication
pub const MAX_PDU_SIZE: u16 = 65535;

/// APDU tags
pub mod tag {
    pub const INITIATE_REQUEST: u8 = 0x01;
    pub const READ_REQUEST: u8 = 0x05;
    pub const INITIATE_RESPONSE: u8 = 0x08;
    pub const READ_RESPONSE: u8 = 0x0C;
    pub const CONFIRMED_SERVICE_ERROR: u8 = 0x0E;
    pub const AARE: u8 = 0x61;
    pub const RLRE: u8 = 0x63;
    pub const GET_REQUEST: u8 = 0xC0;
    pub const ACTION_REQUEST: u8 = 0xC3;
    pub const GET_RESPONSE: u8 = 0xC4;
    pub const ACTION_RESPONSE: u8 = 0xC7;
    pub const EXCEPTION_RESPONSE: u8 = 0xD8;
}

/// Application tag `[APPLICATION 31]` in front of the conformance bit string
const CONFORMANCE_TAG: [u8; 2] = [0x5F, 0x1F];

/// Conformance block: 24 feature bits, bit 0 is the most significant bit
/// of the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Conformance(u32);

impl Conformance {
    /// Features a logical name client proposes: attribute 0 with get,
    /// priority management, block transfer with get, get, selective access,
    /// action, multiple references
    pub const LN_CLIENT: Conformance = Conformance(0x00_7E_1F);
    /// Features a short name client proposes: read, write, unconfirmed
    /// write, multiple references, information report, parameterized access
    pub const SN_CLIENT: Conformance = Conformance(0x1C_03_20);

    pub const BLOCK_TRANSFER_WITH_GET_OR_READ: u32 = 1 << (23 - 11);
    pub const ACTION: u32 = 1 << (23 - 23);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits & 0x00FF_FFFF)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    fn encode(&self, encoder: &mut AxdrEncoder) {
        encoder.encode_bytes(&CONFORMANCE_TAG);
        // Length 4: one byte of unused bits, three bytes of flags
        encoder.encode_u8(0x04);
        encoder.encode_u8(0x00);
        encoder.encode_bytes(&self.0.to_be_bytes()[1..]);
    }

    fn decode(decoder: &mut AxdrDecoder<'_>) -> DlmsResult<Self> {
        let tag = decoder.read_bytes(2)?;
        if tag != CONFORMANCE_TAG {
            return Err(DlmsError::InvalidData(format!(
                "Expected conformance tag 5F 1F, got {:02X?}",
                tag
            )));
        }
        let len = decoder.decode_u8()? as usize;
        let body = decoder.read_bytes(len)?;
        if len != 4 {
            return Err(DlmsError::InvalidData(format!(
                "Conformance must be 4 bytes, got {}",
                len
            )));
        }
        Ok(Self::from_bits(u32::from_be_bytes([0, body[1], body[2], body[3]])))
    }
}

/// Initiate Request PDU
///
/// Sent inside the AARQ user information field. Dedicated key and quality
/// of service are never used by this client and are encoded as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateRequest {
    pub proposed_dlms_version_number: u8,
    pub proposed_conformance: Conformance,
    pub client_max_receive_pdu_size: u16,
}

impl InitiateRequest {
    pub fn new(proposed_conformance: Conformance, client_max_receive_pdu_size: u16) -> Self {
        Self {
            proposed_dlms_version_number: DLMS_VERSION_6,
            proposed_conformance,
            client_max_receive_pdu_size,
        }
    }

    /// Encode to A-XDR format
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = AxdrEncoder::with_capacity(14);
        encoder.encode_u8(tag::INITIATE_REQUEST);
        // dedicated-key absent, response-allowed default (TRUE), QoS absent
        encoder.encode_bytes(&[0x00, 0x00, 0x00]);
        encoder.encode_u8(self.proposed_dlms_version_number);
        self.proposed_conformance.encode(&mut encoder);
        encoder.encode_u16(self.client_max_receive_pdu_size);
        encoder.into_bytes()
    }
}

/// Initiate Response PDU, carried in the AARE user information field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateResponse {
    pub negotiated_quality_of_service: Option<u8>,
    pub negotiated_dlms_version_number: u8,
    pub negotiated_conformance: Conformance,
    pub server_max_receive_pdu_size: u16,
    /// 0x0007 for logical name, 0xFA00 for short name referencing
    pub vaa_name: u16,
}

impl InitiateResponse {
    /// Decode from A-XDR format
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut decoder = AxdrDecoder::new(data);
        let pdu_tag = decoder.decode_u8()?;
        if pdu_tag != tag::INITIATE_RESPONSE {
            return Err(DlmsError::InvalidData(format!(
                "Expected InitiateResponse tag 0x08, got 0x{:02X}",
                pdu_tag
            )));
        }
        let negotiated_quality_of_service = match decoder.decode_u8()? {
            0x00 => None,
            _ => Some(decoder.decode_u8()?),
        };
        Ok(Self {
            negotiated_quality_of_service,
            negotiated_dlms_version_number: decoder.decode_u8()?,
            negotiated_conformance: Conformance::decode(&mut decoder)?,
            server_max_receive_pdu_size: decoder.decode_u16()?,
            vaa_name: decoder.decode_u16()?,
        })
    }

    /// Encode to A-XDR format
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = AxdrEncoder::with_capacity(16);
        encoder.encode_u8(tag::INITIATE_RESPONSE);
        match self.negotiated_quality_of_service {
            Some(qos) => encoder.encode_bytes(&[0x01, qos]),
            None => encoder.encode_u8(0x00),
        }
        encoder.encode_u8(self.negotiated_dlms_version_number);
        self.negotiated_conformance.encode(&mut encoder);
        encoder.encode_u16(self.server_max_receive_pdu_size);
        encoder.encode_u16(self.vaa_name);
        encoder.into_bytes()
    }
}

/// Invoke-Id-And-Priority byte
///
/// Bits 0-3 invoke id, bit 6 service class (1 = confirmed), bit 7 priority
/// (1 = high).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvokeIdAndPriority(u8);

impl InvokeIdAndPriority {
    /// # Errors
    ///
    /// Returns `InvalidData` if `invoke_id` does not fit four bits.
    pub fn new(invoke_id: u8, confirmed: bool, high_priority: bool) -> DlmsResult<Self> {
        if invoke_id > 0x0F {
            return Err(DlmsError::InvalidData(format!(
                "Invoke ID must be 0-15, got {}",
                invoke_id
            )));
        }
        let mut value = invoke_id;
        if confirmed {
            value |= 0x40;
        }
        if high_priority {
            value |= 0x80;
        }
        Ok(Self(value))
    }

    pub fn from_u8(value: u8) -> Self {
        Self(value)
    }

    pub fn invoke_id(&self) -> u8 {
        self.0 & 0x0F
    }

    pub fn is_confirmed(&self) -> bool {
        self.0 & 0x40 != 0
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// COSEM Attribute Descriptor (logical name referencing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CosemAttributeDescriptor {
    pub class_id: u16,
    pub instance_id: ObisCode,
    pub attribute_id: i8,
}

impl CosemAttributeDescriptor {
    pub fn new(class_id: u16, instance_id: ObisCode, attribute_id: i8) -> Self {
        Self {
            class_id,
            instance_id,
            attribute_id,
        }
    }

    fn encode(&self, encoder: &mut AxdrEncoder) {
        encoder.encode_u16(self.class_id);
        encoder.encode_bytes(self.instance_id.as_bytes());
        encoder.encode_u8(self.attribute_id as u8);
    }
}

/// COSEM Method Descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CosemMethodDescriptor {
    pub class_id: u16,
    pub instance_id: ObisCode,
    pub method_id: i8,
}

impl CosemMethodDescriptor {
    pub fn new(class_id: u16, instance_id: ObisCode, method_id: i8) -> Self {
        Self {
            class_id,
            instance_id,
            method_id,
        }
    }

    fn encode(&self, encoder: &mut AxdrEncoder) {
        encoder.encode_u16(self.class_id);
        encoder.encode_bytes(self.instance_id.as_bytes());
        encoder.encode_u8(self.method_id as u8);
    }
}

/// Get-Data-Result: either data or a data access error code
#[derive(Debug, Clone, PartialEq)]
pub enum GetDataResult {
    Data(DataObject),
    DataAccessResult(u8),
}

impl GetDataResult {
    fn decode(decoder: &mut AxdrDecoder<'_>) -> DlmsResult<Self> {
        match decoder.decode_u8()? {
            0x00 => Ok(GetDataResult::Data(decoder.decode_data_object()?)),
            0x01 => Ok(GetDataResult::DataAccessResult(decoder.decode_u8()?)),
            other => Err(DlmsError::InvalidData(format!(
                "Invalid Get-Data-Result choice: {}",
                other
            ))),
        }
    }

    fn encode(&self, encoder: &mut AxdrEncoder) {
        match self {
            GetDataResult::Data(data) => {
                encoder.encode_u8(0x00);
                encoder.encode_data_object(data);
            }
            GetDataResult::DataAccessResult(code) => {
                encoder.encode_u8(0x01);
                encoder.encode_u8(*code);
            }
        }
    }
}

/// GET Request PDU
#[derive(Debug, Clone, PartialEq)]
pub enum GetRequest {
    /// Read one attribute
    Normal {
        invoke_id_and_priority: InvokeIdAndPriority,
        cosem_attribute_descriptor: CosemAttributeDescriptor,
    },
    /// Ask for the block following `block_number`
    Next {
        invoke_id_and_priority: InvokeIdAndPriority,
        block_number: u32,
    },
}

impl GetRequest {
    pub fn invoke_id_and_priority(&self) -> InvokeIdAndPriority {
        match self {
            GetRequest::Normal {
                invoke_id_and_priority,
                ..
            }
            | GetRequest::Next {
                invoke_id_and_priority,
                ..
            } => *invoke_id_and_priority,
        }
    }

    /// Encode to A-XDR format
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = AxdrEncoder::with_capacity(16);
        encoder.encode_u8(tag::GET_REQUEST);
        match self {
            GetRequest::Normal {
                invoke_id_and_priority,
                cosem_attribute_descriptor,
            } => {
                encoder.encode_u8(0x01);
                encoder.encode_u8(invoke_id_and_priority.value());
                cosem_attribute_descriptor.encode(&mut encoder);
                // No selective access
                encoder.encode_u8(0x00);
            }
            GetRequest::Next {
                invoke_id_and_priority,
                block_number,
            } => {
                encoder.encode_u8(0x02);
                encoder.encode_u8(invoke_id_and_priority.value());
                encoder.encode_u32(*block_number);
            }
        }
        encoder.into_bytes()
    }
}

/// Result of one block of a GET-Response-With-Datablock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataBlockResult {
    /// Raw A-XDR fragment of the attribute value
    RawData(Vec<u8>),
    DataAccessResult(u8),
}

/// GET Response PDU
#[derive(Debug, Clone, PartialEq)]
pub enum GetResponse {
    Normal {
        invoke_id_and_priority: InvokeIdAndPriority,
        result: GetDataResult,
    },
    WithDataBlock {
        invoke_id_and_priority: InvokeIdAndPriority,
        last_block: bool,
        block_number: u32,
        result: DataBlockResult,
    },
}

impl GetResponse {
    /// Decode from A-XDR format
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` for a wrong tag, an unsupported response type
    /// (with-list) or truncated data.
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut decoder = AxdrDecoder::new(data);
        let pdu_tag = decoder.decode_u8()?;
        if pdu_tag != tag::GET_RESPONSE {
            return Err(DlmsError::InvalidData(format!(
                "Expected GetResponse tag 0xC4, got 0x{:02X}",
                pdu_tag
            )));
        }
        let response_type = decoder.decode_u8()?;
        let invoke_id_and_priority = InvokeIdAndPriority::from_u8(decoder.decode_u8()?);
        match response_type {
            0x01 => Ok(GetResponse::Normal {
                invoke_id_and_priority,
                result: GetDataResult::decode(&mut decoder)?,
            }),
            0x02 => {
                let last_block = decoder.decode_u8()? != 0;
                let block_number = decoder.decode_u32()?;
                let result = match decoder.decode_u8()? {
                    0x00 => DataBlockResult::RawData(decoder.decode_octet_string()?),
                    0x01 => DataBlockResult::DataAccessResult(decoder.decode_u8()?),
                    other => {
                        return Err(DlmsError::InvalidData(format!(
                            "Invalid DataBlock-G result choice: {}",
                            other
                        )));
                    }
                };
                Ok(GetResponse::WithDataBlock {
                    invoke_id_and_priority,
                    last_block,
                    block_number,
                    result,
                })
            }
            other => Err(DlmsError::InvalidData(format!(
                "Unsupported GetResponse type: {}",
                other
            ))),
        }
    }

    /// Encode to A-XDR format
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = AxdrEncoder::new();
        encoder.encode_u8(tag::GET_RESPONSE);
        match self {
            GetResponse::Normal {
                invoke_id_and_priority,
                result,
            } => {
                encoder.encode_u8(0x01);
                encoder.encode_u8(invoke_id_and_priority.value());
                result.encode(&mut encoder);
            }
            GetResponse::WithDataBlock {
                invoke_id_and_priority,
                last_block,
                block_number,
                result,
            } => {
                encoder.encode_u8(0x02);
                encoder.encode_u8(invoke_id_and_priority.value());
                encoder.encode_u8(u8::from(*last_block));
                encoder.encode_u32(*block_number);
                match result {
                    DataBlockResult::RawData(raw) => {
                        encoder.encode_u8(0x00);
                        encoder.encode_octet_string(raw);
                    }
                    DataBlockResult::DataAccessResult(code) => {
                        encoder.encode_u8(0x01);
                        encoder.encode_u8(*code);
                    }
                }
            }
        }
        encoder.into_bytes()
    }
}

/// ACTION Request PDU (normal)
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub invoke_id_and_priority: InvokeIdAndPriority,
    pub cosem_method_descriptor: CosemMethodDescriptor,
    pub method_invocation_parameters: Option<DataObject>,
}

impl ActionRequest {
    /// Encode to A-XDR format
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = AxdrEncoder::new();
        encoder.encode_u8(tag::ACTION_REQUEST);
        encoder.encode_u8(0x01);
        encoder.encode_u8(self.invoke_id_and_priority.value());
        self.cosem_method_descriptor.encode(&mut encoder);
        match &self.method_invocation_parameters {
            Some(parameters) => {
                encoder.encode_u8(0x01);
                encoder.encode_data_object(parameters);
            }
            None => encoder.encode_u8(0x00),
        }
        encoder.into_bytes()
    }
}

/// ACTION Response PDU (normal)
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub invoke_id_and_priority: InvokeIdAndPriority,
    /// Action-Result, 0 = success
    pub result: u8,
    pub return_parameters: Option<GetDataResult>,
}

impl ActionResponse {
    /// Decode from A-XDR format
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut decoder = AxdrDecoder::new(data);
        let pdu_tag = decoder.decode_u8()?;
        if pdu_tag != tag::ACTION_RESPONSE {
            return Err(DlmsError::InvalidData(format!(
                "Expected ActionResponse tag 0xC7, got 0x{:02X}",
                pdu_tag
            )));
        }
        let response_type = decoder.decode_u8()?;
        if response_type != 0x01 {
            return Err(DlmsError::InvalidData(format!(
                "Unsupported ActionResponse type: {}",
                response_type
            )));
        }
        let invoke_id_and_priority = InvokeIdAndPriority::from_u8(decoder.decode_u8()?);
        let result = decoder.decode_u8()?;
        let return_parameters = if decoder.remaining() > 0 && decoder.decode_u8()? != 0 {
            Some(GetDataResult::decode(&mut decoder)?)
        } else {
            None
        };
        Ok(Self {
            invoke_id_and_priority,
            result,
            return_parameters,
        })
    }

    /// Encode to A-XDR format
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = AxdrEncoder::new();
        encoder.encode_u8(tag::ACTION_RESPONSE);
        encoder.encode_u8(0x01);
        encoder.encode_u8(self.invoke_id_and_priority.value());
        encoder.encode_u8(self.result);
        match &self.return_parameters {
            Some(parameters) => {
                encoder.encode_u8(0x01);
                parameters.encode(&mut encoder);
            }
            None => encoder.encode_u8(0x00),
        }
        encoder.into_bytes()
    }
}

/// Exception-Response: the server could not process the APDU at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub state_error: u8,
    pub service_error: u8,
}

impl ExceptionResponse {
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut decoder = AxdrDecoder::new(data);
        let pdu_tag = decoder.decode_u8()?;
        if pdu_tag != tag::EXCEPTION_RESPONSE {
            return Err(DlmsError::InvalidData(format!(
                "Expected ExceptionResponse tag 0xD8, got 0x{:02X}",
                pdu_tag
            )));
        }
        Ok(Self {
            state_error: decoder.decode_u8()?,
            service_error: decoder.decode_u8()?,
        })
    }

    /// Code reported to the caller, never zero
    pub fn error_code(&self) -> u8 {
        match (self.service_error, self.state_error) {
            (0, 0) => tag::EXCEPTION_RESPONSE,
            (0, state) => state,
            (service, _) => service,
        }
    }
}

/// Confirmed-Service-Error, e.g. a rejected InitiateRequest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedServiceError {
    /// Service that failed (1 = initiate, 5 = read, ...)
    pub service: u8,
    /// Service-Error choice (6 = initiate, ...)
    pub error_type: u8,
    pub value: u8,
}

impl ConfirmedServiceError {
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut decoder = AxdrDecoder::new(data);
        let pdu_tag = decoder.decode_u8()?;
        if pdu_tag != tag::CONFIRMED_SERVICE_ERROR {
            return Err(DlmsError::InvalidData(format!(
                "Expected ConfirmedServiceError tag 0x0E, got 0x{:02X}",
                pdu_tag
            )));
        }
        Ok(Self {
            service: decoder.decode_u8()?,
            error_type: decoder.decode_u8()?,
            value: decoder.decode_u8()?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![
            tag::CONFIRMED_SERVICE_ERROR,
            self.service,
            self.error_type,
            self.value,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate_request_ln() {
        let request = InitiateRequest::new(Conformance::LN_CLIENT, 0xFFFF);
        assert_eq!(
            request.encode(),
            vec![
                0x01, 0x00, 0x00, 0x00, 0x06, 0x5F, 0x1F, 0x04, 0x00, 0x00, 0x7E, 0x1F, 0xFF, 0xFF
            ]
        );
    }

    #[test]
    fn test_initiate_response_decode() {
        let data = [
            0x08, 0x00, 0x06, 0x5F, 0x1F, 0x04, 0x00, 0x00, 0x50, 0x1F, 0x01, 0xF4, 0x00, 0x07,
        ];
        let response = InitiateResponse::decode(&data).unwrap();
        assert_eq!(response.negotiated_dlms_version_number, 6);
        assert_eq!(response.negotiated_conformance.bits(), 0x00501F);
        assert!(response.negotiated_conformance.contains(Conformance::BLOCK_TRANSFER_WITH_GET_OR_READ));
        assert_eq!(response.server_max_receive_pdu_size, 500);
        assert_eq!(response.vaa_name, 0x0007);
        assert_eq!(response.encode(), data.to_vec());
    }

    #[test]
    fn test_get_request_normal_and_next() {
        let invoke = InvokeIdAndPriority::new(1, true, true).unwrap();
        assert_eq!(invoke.value(), 0xC1);

        let normal = GetRequest::Normal {
            invoke_id_and_priority: invoke,
            cosem_attribute_descriptor: CosemAttributeDescriptor::new(
                3,
                ObisCode::new(1, 0, 1, 8, 0, 255),
                2,
            ),
        };
        assert_eq!(
            normal.encode(),
            vec![0xC0, 0x01, 0xC1, 0x00, 0x03, 0x01, 0x00, 0x01, 0x08, 0x00, 0xFF, 0x02, 0x00]
        );

        let next = GetRequest::Next {
            invoke_id_and_priority: invoke,
            block_number: 2,
        };
        assert_eq!(next.encode(), vec![0xC0, 0x02, 0xC1, 0x00, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_get_response_variants() {
        let normal = GetResponse::decode(&[0xC4, 0x01, 0xC1, 0x00, 0x06, 0x00, 0x00, 0x30, 0x39]).unwrap();
        assert_eq!(
            normal,
            GetResponse::Normal {
                invoke_id_and_priority: InvokeIdAndPriority::from_u8(0xC1),
                result: GetDataResult::Data(DataObject::Unsigned32(12345)),
            }
        );

        let denied = GetResponse::decode(&[0xC4, 0x01, 0xC1, 0x01, 0x03]).unwrap();
        assert!(matches!(
            denied,
            GetResponse::Normal {
                result: GetDataResult::DataAccessResult(3),
                ..
            }
        ));

        let block = GetResponse::decode(&[
            0xC4, 0x02, 0xC1, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x01, 0x02,
        ])
        .unwrap();
        assert_eq!(
            block,
            GetResponse::WithDataBlock {
                invoke_id_and_priority: InvokeIdAndPriority::from_u8(0xC1),
                last_block: false,
                block_number: 1,
                result: DataBlockResult::RawData(vec![0x01, 0x02]),
            }
        );

        assert!(GetResponse::decode(&[0xC4, 0x03, 0xC1]).is_err());
    }

    #[test]
    fn test_action_request_with_parameters() {
        let request = ActionRequest {
            invoke_id_and_priority: InvokeIdAndPriority::new(1, true, true).unwrap(),
            cosem_method_descriptor: CosemMethodDescriptor::new(15, ObisCode::ASSOCIATION_LN, 1),
            method_invocation_parameters: Some(DataObject::OctetString(vec![0xAA, 0xBB])),
        };
        assert_eq!(
            request.encode(),
            vec![
                0xC3, 0x01, 0xC1, 0x00, 0x0F, 0x00, 0x00, 0x28, 0x00, 0x00, 0xFF, 0x01, 0x01,
                0x09, 0x02, 0xAA, 0xBB
            ]
        );
    }

    #[test]
    fn test_action_response_decode() {
        let response =
            ActionResponse::decode(&[0xC7, 0x01, 0xC1, 0x00, 0x01, 0x00, 0x09, 0x01, 0x55]).unwrap();
        assert_eq!(response.result, 0);
        assert_eq!(
            response.return_parameters,
            Some(GetDataResult::Data(DataObject::OctetString(vec![0x55])))
        );

        let failed = ActionResponse::decode(&[0xC7, 0x01, 0xC1, 0x0B, 0x00]).unwrap();
        assert_eq!(failed.result, 0x0B);
        assert_eq!(failed.return_parameters, None);
    }

    #[test]
    fn test_error_pdus() {
        let exception = ExceptionResponse::decode(&[0xD8, 0x01, 0x02]).unwrap();
        assert_eq!(exception.error_code(), 2);

        let error = ConfirmedServiceError::decode(&[0x0E, 0x01, 0x06, 0x01]).unwrap();
        assert_eq!(error.service, 1);
        assert_eq!(error.encode(), vec![0x0E, 0x01, 0x06, 0x01]);
    }

    #[test]
    fn test_invoke_id_range() {
        assert!(InvokeIdAndPriority::new(16, true, true).is_err());
        let invoke = InvokeIdAndPriority::new(5, false, false).unwrap();
        assert_eq!(invoke.invoke_id(), 5);
        assert!(!invoke.is_confirmed());
    }
}
