//! Client side of an HDLC link: sequencing, segmentation and LLC headers

use crate::hdlc::address::HdlcAddress;
use crate::hdlc::frame::{control, FrameType, HdlcFrame, LLC_REQUEST, LLC_RESPONSE};
use crate::hdlc::parameters::HdlcParameters;
use dlms_core::{DlmsError, DlmsResult};

/// What an accepted server frame carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPayload {
    /// APDU bytes; `more` is set when further segments follow
    Data { payload: Vec<u8>, more: bool },
    /// RR acknowledging one of our segments
    Acknowledged,
    /// UA or DM after a disconnect request
    Disconnected,
}

/// HDLC link state for one client/server address pair
#[derive(Debug, Clone)]
pub struct HdlcLink {
    client: HdlcAddress,
    server: HdlcAddress,
    parameters: HdlcParameters,
    send_sequence: u8,
    receive_sequence: u8,
    awaiting_first_segment: bool,
}

impl HdlcLink {
    pub fn new(client: HdlcAddress, server: HdlcAddress) -> Self {
        Self {
            client,
            server,
            parameters: HdlcParameters::default(),
            send_sequence: 0,
            receive_sequence: 0,
            awaiting_first_segment: true,
        }
    }

    pub fn parameters(&self) -> &HdlcParameters {
        &self.parameters
    }

    pub fn client_address(&self) -> HdlcAddress {
        self.client
    }

    pub fn server_address(&self) -> HdlcAddress {
        self.server
    }

    /// Forget sequence numbers and negotiated parameters
    pub fn reset(&mut self) {
        self.parameters = HdlcParameters::default();
        self.send_sequence = 0;
        self.receive_sequence = 0;
        self.awaiting_first_segment = true;
    }

    fn frame(&self, control: u8) -> HdlcFrame {
        HdlcFrame::new(self.server, self.client, control)
    }

    /// Set Normal Response Mode request
    pub fn snrm(&mut self) -> DlmsResult<Vec<u8>> {
        self.reset();
        self.frame(control::SNRM).encode()
    }

    /// Apply the server's answer to SNRM
    ///
    /// # Errors
    ///
    /// `Protocol` if the server answered DM, `FrameInvalid` for anything
    /// other than UA.
    pub fn accept_ua(&mut self, data: &[u8]) -> DlmsResult<()> {
        let frame = self.decode(data)?;
        match frame.frame_type() {
            FrameType::UnnumberedAcknowledge => self.parameters.negotiate(&frame.information),
            FrameType::DisconnectMode => Err(DlmsError::Protocol(
                "Server refused the link with DM".to_string(),
            )),
            other => Err(DlmsError::FrameInvalid(format!(
                "Expected UA, got {:?}",
                other
            ))),
        }
    }

    /// Wrap an APDU into one or more I-frames
    ///
    /// Frames other than the last carry the segmentation bit; the server
    /// acknowledges each of them with RR.
    pub fn information_frames(&mut self, apdu: &[u8]) -> DlmsResult<Vec<Vec<u8>>> {
        let mut data = Vec::with_capacity(LLC_REQUEST.len() + apdu.len());
        data.extend_from_slice(&LLC_REQUEST);
        data.extend_from_slice(apdu);

        let max = (self.parameters.max_information_field_length_tx as usize).max(1);
        let count = data.len().div_ceil(max);
        let mut frames = Vec::with_capacity(count);
        for (i, chunk) in data.chunks(max).enumerate() {
            let control = control::information(self.send_sequence, self.receive_sequence);
            self.send_sequence = (self.send_sequence + 1) & 0x07;
            frames.push(
                self.frame(control)
                    .with_information(chunk.to_vec(), i + 1 < count)
                    .encode()?,
            );
        }
        self.awaiting_first_segment = true;
        Ok(frames)
    }

    /// RR asking the server for the next segment
    pub fn receive_ready(&self) -> DlmsResult<Vec<u8>> {
        self.frame(control::receive_ready(self.receive_sequence)).encode()
    }

    /// Disconnect request
    pub fn disc(&self) -> DlmsResult<Vec<u8>> {
        self.frame(control::DISC).encode()
    }

    /// Interpret a server frame received after SNRM
    pub fn accept(&mut self, data: &[u8]) -> DlmsResult<LinkPayload> {
        let frame = self.decode(data)?;
        match frame.frame_type() {
            FrameType::Information => {
                self.receive_sequence = (frame.send_sequence() + 1) & 0x07;
                let mut payload = frame.information;
                if self.awaiting_first_segment && payload.starts_with(&LLC_RESPONSE) {
                    payload.drain(..LLC_RESPONSE.len());
                }
                self.awaiting_first_segment = !frame.segmented;
                Ok(LinkPayload::Data {
                    payload,
                    more: frame.segmented,
                })
            }
            FrameType::ReceiveReady => Ok(LinkPayload::Acknowledged),
            FrameType::UnnumberedAcknowledge | FrameType::DisconnectMode => {
                Ok(LinkPayload::Disconnected)
            }
            FrameType::FrameReject => Err(DlmsError::Protocol(
                "Server rejected the frame (FRMR)".to_string(),
            )),
            other => Err(DlmsError::FrameInvalid(format!(
                "Unexpected HDLC frame {:?}",
                other
            ))),
        }
    }

    fn decode(&self, data: &[u8]) -> DlmsResult<HdlcFrame> {
        let frame = HdlcFrame::decode(data)?;
        if frame.destination.logical_id() != self.client.logical_id() {
            return Err(DlmsError::FrameInvalid(format!(
                "Frame addressed to client {}, expected {}",
                frame.destination, self.client
            )));
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> HdlcLink {
        HdlcLink::new(
            HdlcAddress::new(0x10).unwrap(),
            HdlcAddress::new_with_physical(1, 0).unwrap(),
        )
    }

    fn server_frame(link: &HdlcLink, control: u8, info: Vec<u8>, segmented: bool) -> Vec<u8> {
        HdlcFrame::new(link.client_address(), link.server_address(), control)
            .with_information(info, segmented)
            .encode()
            .unwrap()
    }

    #[test]
    fn test_snrm_ua_negotiation() {
        let mut link = link();
        link.snrm().unwrap();
        let granted = HdlcParameters {
            max_information_field_length_tx: 64,
            ..HdlcParameters::default()
        };
        let ua = server_frame(&link, control::UA, granted.encode_ua(), false);
        link.accept_ua(&ua).unwrap();
        assert_eq!(link.parameters().max_information_field_length_tx, 64);

        let dm = server_frame(&link, control::DM, Vec::new(), false);
        assert!(link.accept_ua(&dm).is_err());
    }

    #[test]
    fn test_long_apdu_is_segmented() {
        let mut link = link();
        let granted = HdlcParameters {
            max_information_field_length_tx: 32,
            ..HdlcParameters::default()
        };
        let ua = server_frame(&link, control::UA, granted.encode_ua(), false);
        link.accept_ua(&ua).unwrap();

        let frames = link.information_frames(&[0xAA; 70]).unwrap();
        assert_eq!(frames.len(), 3);
        let first = HdlcFrame::decode(&frames[0]).unwrap();
        assert!(first.segmented);
        assert!(first.information.starts_with(&LLC_REQUEST));
        let last = HdlcFrame::decode(&frames[2]).unwrap();
        assert!(!last.segmented);
        assert_eq!(last.send_sequence(), 2);
    }

    #[test]
    fn test_segmented_reply_strips_llc_once() {
        let mut link = link();
        link.information_frames(&[0xC0, 0x01]).unwrap();

        let mut first = LLC_RESPONSE.to_vec();
        first.extend_from_slice(&[0xC4, 0x01]);
        let reply = server_frame(&link, control::information(0, 1), first, true);
        assert_eq!(
            link.accept(&reply).unwrap(),
            LinkPayload::Data {
                payload: vec![0xC4, 0x01],
                more: true
            }
        );
        assert_eq!(link.receive_ready().unwrap()[5], control::receive_ready(1));

        let second = server_frame(&link, control::information(1, 1), vec![0xE6, 0xE7, 0x00], false);
        assert_eq!(
            link.accept(&second).unwrap(),
            LinkPayload::Data {
                payload: vec![0xE6, 0xE7, 0x00],
                more: false
            }
        );
    }

    #[test]
    fn test_rejects_frame_for_other_client() {
        let mut link = link();
        let other = HdlcFrame::new(
            HdlcAddress::new(0x20).unwrap(),
            link.server_address(),
            control::UA,
        )
        .encode()
        .unwrap();
        assert!(link.accept(&other).is_err());
    }
}
