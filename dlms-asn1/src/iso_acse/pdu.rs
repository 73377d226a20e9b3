//! AARQ, AARE, RLRQ and RLRE encoding and decoding
//!
//! Only the fields DLMS/COSEM uses are modelled. Unknown AARE fields are
//! skipped rather than rejected, meters commonly add implementation data.

use super::{APPLICATION_CONTEXT_PREFIX, MECHANISM_NAME_PREFIX};
use crate::ber::{self, BerReader};
use dlms_core::{DlmsError, DlmsResult};

const AARQ_TAG: u8 = 0x60;
const AARE_TAG: u8 = 0x61;
const RLRQ_TAG: u8 = 0x62;
const RLRE_TAG: u8 = 0x63;

const APPLICATION_CONTEXT_NAME: u8 = 0xA1;
const RESULT: u8 = 0xA2;
const RESULT_SOURCE_DIAGNOSTIC: u8 = 0xA3;
const RESPONDING_AP_TITLE: u8 = 0xA4;
const CALLING_AP_TITLE: u8 = 0xA6;
const RESPONDER_ACSE_REQUIREMENTS: u8 = 0x88;
const RESPONDING_MECHANISM_NAME: u8 = 0x89;
const SENDER_ACSE_REQUIREMENTS: u8 = 0x8A;
const MECHANISM_NAME: u8 = 0x8B;
const RESPONDING_AUTHENTICATION_VALUE: u8 = 0xAA;
const CALLING_AUTHENTICATION_VALUE: u8 = 0xAC;
const USER_INFORMATION: u8 = 0xBE;
const CHARSTRING: u8 = 0x80;
const RELEASE_REASON: u8 = 0x80;

/// Association request
///
/// Carries the application context, optional authentication material and the
/// A-XDR encoded xDLMS InitiateRequest as user information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AARQApdu {
    /// Last arc of the application context name (1 = LN, 2 = SN)
    pub application_context: u8,
    /// Client system title, sent for HLS mechanisms
    pub calling_ap_title: Option<Vec<u8>>,
    /// Last arc of the authentication mechanism name
    pub mechanism_id: Option<u8>,
    /// Password (LLS) or client challenge CtoS (HLS)
    pub calling_authentication_value: Option<Vec<u8>>,
    /// Encoded InitiateRequest
    pub user_information: Vec<u8>,
}

impl AARQApdu {
    pub fn new(application_context: u8, user_information: Vec<u8>) -> Self {
        Self {
            application_context,
            calling_ap_title: None,
            mechanism_id: None,
            calling_authentication_value: None,
            user_information,
        }
    }

    /// Encode AARQ to BER format
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = Vec::with_capacity(64 + self.user_information.len());

        ber::encode_tlv(
            APPLICATION_CONTEXT_NAME,
            &oid(&APPLICATION_CONTEXT_PREFIX, self.application_context),
            &mut fields,
        );
        if let Some(title) = &self.calling_ap_title {
            ber::encode_tlv(CALLING_AP_TITLE, &ber::tlv(ber::OCTET_STRING, title), &mut fields);
        }
        if let Some(mechanism_id) = self.mechanism_id {
            // Bit string with one unused bit: authentication functional unit
            ber::encode_tlv(SENDER_ACSE_REQUIREMENTS, &[0x07, 0x80], &mut fields);
            let mut name = MECHANISM_NAME_PREFIX.to_vec();
            name.push(mechanism_id);
            ber::encode_tlv(MECHANISM_NAME, &name, &mut fields);
        }
        if let Some(value) = &self.calling_authentication_value {
            ber::encode_tlv(
                CALLING_AUTHENTICATION_VALUE,
                &ber::tlv(CHARSTRING, value),
                &mut fields,
            );
        }
        ber::encode_tlv(
            USER_INFORMATION,
            &ber::tlv(ber::OCTET_STRING, &self.user_information),
            &mut fields,
        );

        ber::tlv(AARQ_TAG, &fields)
    }
}

/// Source of an association diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcseServiceUser {
    User,
    Provider,
}

/// Association response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AAREApdu {
    /// Last arc of the application context name
    pub application_context: u8,
    /// 0 = accepted, 1 = rejected-permanent, 2 = rejected-transient
    pub result: u8,
    /// Diagnostic value and whether the service user or provider produced it
    pub diagnostic: u8,
    pub diagnostic_source: Option<AcseServiceUser>,
    /// Server system title
    pub responding_ap_title: Option<Vec<u8>>,
    pub mechanism_id: Option<u8>,
    /// Server challenge StoC
    pub responding_authentication_value: Option<Vec<u8>>,
    /// Encoded InitiateResponse or ConfirmedServiceError
    pub user_information: Option<Vec<u8>>,
}

impl AAREApdu {
    /// Decode an AARE
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` when the APDU tag is not AARE or a field is
    /// malformed.
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let body = BerReader::new(data).expect(AARE_TAG)?;
        let mut aare = AAREApdu::default();
        let mut reader = BerReader::new(body);

        while let Some((tag, value)) = reader.next_tlv()? {
            match tag {
                APPLICATION_CONTEXT_NAME => {
                    let name = BerReader::new(value).expect(ber::OBJECT_IDENTIFIER)?;
                    aare.application_context = last_arc(name, &APPLICATION_CONTEXT_PREFIX)?;
                }
                RESULT => aare.result = small_integer(BerReader::new(value).expect(ber::INTEGER)?)?,
                RESULT_SOURCE_DIAGNOSTIC => {
                    let (source, inner) = BerReader::new(value).next_tlv()?.ok_or_else(|| {
                        DlmsError::InvalidData("Empty result-source-diagnostic".to_string())
                    })?;
                    aare.diagnostic_source = Some(match source {
                        0xA1 => AcseServiceUser::User,
                        0xA2 => AcseServiceUser::Provider,
                        other => {
                            return Err(DlmsError::InvalidData(format!(
                                "Unknown diagnostic source 0x{:02X}",
                                other
                            )));
                        }
                    });
                    aare.diagnostic = small_integer(BerReader::new(inner).expect(ber::INTEGER)?)?;
                }
                RESPONDING_AP_TITLE => {
                    aare.responding_ap_title =
                        Some(BerReader::new(value).expect(ber::OCTET_STRING)?.to_vec());
                }
                RESPONDING_MECHANISM_NAME => {
                    aare.mechanism_id = Some(last_arc(value, &MECHANISM_NAME_PREFIX)?);
                }
                RESPONDING_AUTHENTICATION_VALUE => {
                    aare.responding_authentication_value =
                        Some(BerReader::new(value).expect(CHARSTRING)?.to_vec());
                }
                USER_INFORMATION => {
                    aare.user_information =
                        Some(BerReader::new(value).expect(ber::OCTET_STRING)?.to_vec());
                }
                _ => {}
            }
        }

        Ok(aare)
    }

    /// Whether the server accepted the association
    pub fn is_accepted(&self) -> bool {
        self.result == 0
    }

    /// Encode AARE to BER format
    ///
    /// Used by test doubles that play the server role.
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = Vec::with_capacity(64);
        ber::encode_tlv(
            APPLICATION_CONTEXT_NAME,
            &oid(&APPLICATION_CONTEXT_PREFIX, self.application_context),
            &mut fields,
        );
        ber::encode_tlv(RESULT, &[ber::INTEGER, 0x01, self.result], &mut fields);
        let source = match self.diagnostic_source.unwrap_or(AcseServiceUser::User) {
            AcseServiceUser::User => 0xA1,
            AcseServiceUser::Provider => 0xA2,
        };
        ber::encode_tlv(
            RESULT_SOURCE_DIAGNOSTIC,
            &ber::tlv(source, &[ber::INTEGER, 0x01, self.diagnostic]),
            &mut fields,
        );
        if let Some(title) = &self.responding_ap_title {
            ber::encode_tlv(RESPONDING_AP_TITLE, &ber::tlv(ber::OCTET_STRING, title), &mut fields);
        }
        if let Some(mechanism_id) = self.mechanism_id {
            ber::encode_tlv(RESPONDER_ACSE_REQUIREMENTS, &[0x07, 0x80], &mut fields);
            let mut name = MECHANISM_NAME_PREFIX.to_vec();
            name.push(mechanism_id);
            ber::encode_tlv(RESPONDING_MECHANISM_NAME, &name, &mut fields);
        }
        if let Some(value) = &self.responding_authentication_value {
            ber::encode_tlv(
                RESPONDING_AUTHENTICATION_VALUE,
                &ber::tlv(CHARSTRING, value),
                &mut fields,
            );
        }
        if let Some(info) = &self.user_information {
            ber::encode_tlv(USER_INFORMATION, &ber::tlv(ber::OCTET_STRING, info), &mut fields);
        }
        ber::tlv(AARE_TAG, &fields)
    }
}

/// Release request with reason `normal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RLRQApdu;

impl RLRQApdu {
    pub fn encode(&self) -> Vec<u8> {
        ber::tlv(RLRQ_TAG, &[RELEASE_REASON, 0x01, 0x00])
    }
}

/// Release response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RLREApdu {
    pub reason: Option<u8>,
}

impl RLREApdu {
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let body = BerReader::new(data).expect(RLRE_TAG)?;
        let mut reader = BerReader::new(body);
        let mut reason = None;
        while let Some((tag, value)) = reader.next_tlv()? {
            if tag == RELEASE_REASON {
                reason = value.first().copied();
            }
        }
        Ok(Self { reason })
    }

    pub fn encode(&self) -> Vec<u8> {
        match self.reason {
            Some(reason) => ber::tlv(RLRE_TAG, &[RELEASE_REASON, 0x01, reason]),
            None => vec![RLRE_TAG, 0x00],
        }
    }
}

fn oid(prefix: &[u8], last: u8) -> Vec<u8> {
    let mut name = prefix.to_vec();
    name.push(last);
    ber::tlv(ber::OBJECT_IDENTIFIER, &name)
}

fn last_arc(encoded: &[u8], prefix: &[u8]) -> DlmsResult<u8> {
    match encoded.split_last() {
        Some((last, head)) if head == prefix => Ok(*last),
        _ => Err(DlmsError::InvalidData(format!(
            "Unexpected object identifier {:02X?}",
            encoded
        ))),
    }
}

fn small_integer(value: &[u8]) -> DlmsResult<u8> {
    match value {
        [v] => Ok(*v),
        _ => Err(DlmsError::InvalidData(format!(
            "Expected one-byte INTEGER, got {} byte(s)",
            value.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso_acse::{CONTEXT_LN_NO_CIPHERING, DIAGNOSTIC_AUTHENTICATION_REQUIRED};

    #[test]
    fn test_aarq_without_authentication() {
        let aarq = AARQApdu::new(CONTEXT_LN_NO_CIPHERING, vec![0x01, 0x00]);
        assert_eq!(
            aarq.encode(),
            vec![
                0x60, 0x11, 0xA1, 0x09, 0x06, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01,
                0xBE, 0x04, 0x04, 0x02, 0x01, 0x00,
            ]
        );
    }

    #[test]
    fn test_aarq_with_low_level_security() {
        let mut aarq = AARQApdu::new(CONTEXT_LN_NO_CIPHERING, vec![0x01]);
        aarq.mechanism_id = Some(1);
        aarq.calling_authentication_value = Some(b"12345678".to_vec());
        let encoded = aarq.encode();

        let needle = [0x8B, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x02, 0x01];
        assert!(encoded.windows(needle.len()).any(|w| w == needle));
        let password = [0xAC, 0x0A, 0x80, 0x08, b'1', b'2'];
        assert!(encoded.windows(password.len()).any(|w| w == password));
        assert_eq!(encoded[1] as usize, encoded.len() - 2);
    }

    #[test]
    fn test_aare_decode_authentication_required() {
        let aare = AAREApdu {
            application_context: CONTEXT_LN_NO_CIPHERING,
            result: 0,
            diagnostic: DIAGNOSTIC_AUTHENTICATION_REQUIRED,
            diagnostic_source: Some(AcseServiceUser::User),
            responding_ap_title: Some(b"SRV00001".to_vec()),
            mechanism_id: Some(7),
            responding_authentication_value: Some(vec![0x11; 16]),
            user_information: Some(vec![0x08, 0x00]),
        };
        assert_eq!(AAREApdu::decode(&aare.encode()).unwrap(), aare);
    }

    #[test]
    fn test_aare_rejected() {
        let data = [
            0x61, 0x17, 0xA1, 0x09, 0x06, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01, 0xA2,
            0x03, 0x02, 0x01, 0x01, 0xA3, 0x05, 0xA2, 0x03, 0x02, 0x01, 0x02,
        ];
        let aare = AAREApdu::decode(&data).unwrap();
        assert!(!aare.is_accepted());
        assert_eq!(aare.diagnostic, 2);
        assert_eq!(aare.diagnostic_source, Some(AcseServiceUser::Provider));
    }

    #[test]
    fn test_release_pdus() {
        assert_eq!(RLRQApdu.encode(), vec![0x62, 0x03, 0x80, 0x01, 0x00]);
        let rlre = RLREApdu::decode(&[0x63, 0x03, 0x80, 0x01, 0x00]).unwrap();
        assert_eq!(rlre.reason, Some(0));
        assert!(RLREApdu::decode(&[0x61, 0x00]).is_err());
    }
}
