//! Authentication mechanisms for DLMS/COSEM associations
//!
//! - LLS (mechanism 1): the password travels in the AARQ, nothing else here
//! - HLS SHA-256 (mechanism 7)
//! - HLS GMAC (mechanism 5)
//!
//! HLS is a four pass exchange: client challenge CtoS in the AARQ, server
//! challenge StoC in the AARE, then f(StoC) from the client and f(CtoS)
//! from the server through the association object's `reply_to_HLS_authentication`.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes128Gcm, Key, Nonce,
};
use dlms_core::{DlmsError, DlmsResult};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of the client challenge CtoS
pub const CHALLENGE_LENGTH: usize = 16;

const GMAC_SECURITY_CONTROL: u8 = 0x10;
const GMAC_TAG_LENGTH: usize = 12;

/// Authentication level requested in the AARQ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthenticationMechanism {
    #[default]
    None,
    Low,
    HighGmac,
    HighSha256,
}

impl AuthenticationMechanism {
    /// Last arc of the mechanism name OID
    pub fn id(&self) -> u8 {
        match self {
            AuthenticationMechanism::None => 0,
            AuthenticationMechanism::Low => 1,
            AuthenticationMechanism::HighGmac => 5,
            AuthenticationMechanism::HighSha256 => 7,
        }
    }

    pub fn is_high_level(&self) -> bool {
        matches!(
            self,
            AuthenticationMechanism::HighGmac | AuthenticationMechanism::HighSha256
        )
    }
}

/// Random client challenge
pub fn generate_challenge() -> Vec<u8> {
    let mut challenge = vec![0u8; CHALLENGE_LENGTH];
    rand::thread_rng().fill_bytes(&mut challenge);
    challenge
}

/// Material both sides know once the AARE has been received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeContext<'a> {
    pub client_system_title: &'a [u8],
    pub server_system_title: &'a [u8],
    /// Client to server challenge, sent in the AARQ
    pub ctos: &'a [u8],
    /// Server to client challenge, received in the AARE
    pub stoc: &'a [u8],
}

/// Computes f(StoC) and checks the server's f(CtoS)
pub trait ChallengeResponder: Send + std::fmt::Debug {
    fn mechanism(&self) -> AuthenticationMechanism;

    /// Client's answer to the server challenge
    fn client_response(&mut self, ctx: &ChallengeContext<'_>) -> DlmsResult<Vec<u8>>;

    /// Check the server's answer to the client challenge
    ///
    /// # Errors
    ///
    /// `AuthenticationFailed` on mismatch.
    fn verify_server_response(&self, ctx: &ChallengeContext<'_>, response: &[u8]) -> DlmsResult<()>;
}

/// HLS with SHA-256 over the shared secret, system titles and challenges
#[derive(Clone)]
pub struct HlsSha256 {
    secret: Vec<u8>,
}

impl std::fmt::Debug for HlsSha256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HlsSha256").finish_non_exhaustive()
    }
}

impl HlsSha256 {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
        }
    }

    fn digest(&self, parts: [&[u8]; 4]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().to_vec()
    }
}

impl ChallengeResponder for HlsSha256 {
    fn mechanism(&self) -> AuthenticationMechanism {
        AuthenticationMechanism::HighSha256
    }

    fn client_response(&mut self, ctx: &ChallengeContext<'_>) -> DlmsResult<Vec<u8>> {
        Ok(self.digest([
            ctx.client_system_title,
            ctx.server_system_title,
            ctx.stoc,
            ctx.ctos,
        ]))
    }

    fn verify_server_response(&self, ctx: &ChallengeContext<'_>, response: &[u8]) -> DlmsResult<()> {
        let expected = self.digest([
            ctx.server_system_title,
            ctx.client_system_title,
            ctx.ctos,
            ctx.stoc,
        ]);
        if expected == response {
            Ok(())
        } else {
            Err(DlmsError::AuthenticationFailed(
                "Server response to the client challenge does not match".to_string(),
            ))
        }
    }
}

/// HLS with AES-GCM authentication tags
///
/// The response is `SC || FC || GMAC(SC || AK || challenge)` where the IV is
/// the sender's system title followed by the frame counter.
#[derive(Clone)]
pub struct HlsGmac {
    cipher: Aes128Gcm,
    authentication_key: Vec<u8>,
    frame_counter: u32,
}

impl std::fmt::Debug for HlsGmac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HlsGmac")
            .field("frame_counter", &self.frame_counter)
            .finish_non_exhaustive()
    }
}

impl HlsGmac {
    /// Create a GMAC context from the block cipher key and authentication key
    pub fn new(block_cipher_key: &[u8], authentication_key: &[u8], frame_counter: u32) -> DlmsResult<Self> {
        if block_cipher_key.len() != 16 {
            return Err(DlmsError::Security(format!(
                "Invalid AES-128 key length: expected 16 bytes, got {}",
                block_cipher_key.len()
            )));
        }
        let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(block_cipher_key));
        Ok(Self {
            cipher,
            authentication_key: authentication_key.to_vec(),
            frame_counter,
        })
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    /// Authentication tag for `challenge` as sent by `system_title` with `frame_counter`
    pub fn tag(&self, system_title: &[u8], frame_counter: u32, challenge: &[u8]) -> DlmsResult<Vec<u8>> {
        if system_title.len() != 8 {
            return Err(DlmsError::Security(format!(
                "System title must be 8 bytes, got {}",
                system_title.len()
            )));
        }
        let mut iv = [0u8; 12];
        iv[..8].copy_from_slice(system_title);
        iv[8..].copy_from_slice(&frame_counter.to_be_bytes());

        let mut aad = Vec::with_capacity(1 + self.authentication_key.len() + challenge.len());
        aad.push(GMAC_SECURITY_CONTROL);
        aad.extend_from_slice(&self.authentication_key);
        aad.extend_from_slice(challenge);

        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), &aad, &mut [])
            .map_err(|e| DlmsError::Security(format!("GMAC computation failed: {}", e)))?;
        Ok(tag[..GMAC_TAG_LENGTH].to_vec())
    }
}

impl ChallengeResponder for HlsGmac {
    fn mechanism(&self) -> AuthenticationMechanism {
        AuthenticationMechanism::HighGmac
    }

    fn client_response(&mut self, ctx: &ChallengeContext<'_>) -> DlmsResult<Vec<u8>> {
        let frame_counter = self.frame_counter;
        let tag = self.tag(ctx.client_system_title, frame_counter, ctx.stoc)?;
        self.frame_counter = self.frame_counter.wrapping_add(1);

        let mut response = Vec::with_capacity(5 + tag.len());
        response.push(GMAC_SECURITY_CONTROL);
        response.extend_from_slice(&frame_counter.to_be_bytes());
        response.extend_from_slice(&tag);
        Ok(response)
    }

    fn verify_server_response(&self, ctx: &ChallengeContext<'_>, response: &[u8]) -> DlmsResult<()> {
        if response.len() != 5 + GMAC_TAG_LENGTH || response[0] != GMAC_SECURITY_CONTROL {
            return Err(DlmsError::AuthenticationFailed(format!(
                "Malformed GMAC response of {} byte(s)",
                response.len()
            )));
        }
        let frame_counter = u32::from_be_bytes([response[1], response[2], response[3], response[4]]);
        let expected = self.tag(ctx.server_system_title, frame_counter, ctx.ctos)?;
        if expected == response[5..] {
            Ok(())
        } else {
            Err(DlmsError::AuthenticationFailed(
                "Server GMAC over the client challenge does not match".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_TITLE: &[u8] = b"CLIENTST";
    const SERVER_TITLE: &[u8] = b"SERVERST";

    fn context<'a>(ctos: &'a [u8], stoc: &'a [u8]) -> ChallengeContext<'a> {
        ChallengeContext {
            client_system_title: CLIENT_TITLE,
            server_system_title: SERVER_TITLE,
            ctos,
            stoc,
        }
    }

    #[test]
    fn test_mechanism_ids() {
        assert_eq!(AuthenticationMechanism::Low.id(), 1);
        assert_eq!(AuthenticationMechanism::HighGmac.id(), 5);
        assert_eq!(AuthenticationMechanism::HighSha256.id(), 7);
        assert!(!AuthenticationMechanism::Low.is_high_level());
    }

    #[test]
    fn test_sha256_client_response() {
        let ctos = [b'C'; 16];
        let stoc = [b'S'; 16];
        let mut hls = HlsSha256::new(b"secret");
        let response = hls.client_response(&context(&ctos, &stoc)).unwrap();
        assert_eq!(
            response,
            vec![
                0x8a, 0x14, 0x6d, 0x6a, 0x3a, 0xa9, 0x91, 0xc1, 0xd0, 0x45, 0x39, 0x41, 0x8f, 0x48,
                0x0d, 0x71, 0x07, 0xe5, 0xc1, 0xfb, 0x92, 0x8b, 0x8b, 0xe4, 0x6d, 0x50, 0xed, 0x4e,
                0x6c, 0xcf, 0x8a, 0x59,
            ]
        );
    }

    #[test]
    fn test_sha256_server_response_verification() {
        let ctos = [1u8; 16];
        let stoc = [2u8; 16];
        let ctx = context(&ctos, &stoc);
        let hls = HlsSha256::new(b"secret");
        let server_view = hls.digest([SERVER_TITLE, CLIENT_TITLE, &ctos, &stoc]);
        hls.verify_server_response(&ctx, &server_view).unwrap();

        let err = hls.verify_server_response(&ctx, &[0u8; 32]).unwrap_err();
        assert!(matches!(err, DlmsError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_gmac_tag_vector() {
        let key: Vec<u8> = (0x00..0x10).collect();
        let ak: Vec<u8> = (0xD0..0xE0).collect();
        let gmac = HlsGmac::new(&key, &ak, 0x01234567).unwrap();
        let title = [0x4D, 0x4D, 0x4D, 0x00, 0x00, 0xBC, 0x61, 0x4E];
        let tag = gmac.tag(&title, 0x01234567, b"P6wRJ21F").unwrap();
        assert_eq!(
            tag,
            vec![0x40, 0xC4, 0xED, 0x71, 0xE5, 0xED, 0x08, 0x6D, 0xB5, 0xC7, 0x76, 0x95]
        );
    }

    #[test]
    fn test_gmac_response_layout_and_counter() {
        let key = [0x11u8; 16];
        let mut client = HlsGmac::new(&key, &[0x22; 16], 7).unwrap();
        let ctos = [3u8; 16];
        let stoc = [4u8; 16];
        let ctx = context(&ctos, &stoc);

        let response = client.client_response(&ctx).unwrap();
        assert_eq!(response.len(), 17);
        assert_eq!(response[0], 0x10);
        assert_eq!(&response[1..5], &7u32.to_be_bytes());
        assert_eq!(client.frame_counter(), 8);

        let server_tag = client.tag(SERVER_TITLE, 99, &ctos).unwrap();
        let mut server_response = vec![0x10];
        server_response.extend_from_slice(&99u32.to_be_bytes());
        server_response.extend_from_slice(&server_tag);
        client.verify_server_response(&ctx, &server_response).unwrap();

        server_response[6] ^= 0x01;
        assert!(client.verify_server_response(&ctx, &server_response).is_err());
    }

    #[test]
    fn test_gmac_rejects_bad_key() {
        assert!(HlsGmac::new(&[0u8; 15], &[0u8; 16], 0).is_err());
    }

    #[test]
    fn test_generated_challenge_length() {
        assert_eq!(generate_challenge().len(), CHALLENGE_LENGTH);
    }
}
