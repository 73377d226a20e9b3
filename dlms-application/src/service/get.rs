//! GET Service implementation for DLMS/COSEM
//!
//! Builds GET requests with invoke ID management and folds the responses,
//! including GET-Response-With-Datablock sequences, into a single value.

use crate::pdu::{
    CosemAttributeDescriptor, DataBlockResult, GetDataResult, GetRequest, GetResponse,
    InvokeIdAndPriority,
};
use dlms_asn1::AxdrDecoder;
use dlms_core::{DataObject, DlmsError, DlmsResult};

/// What a GET response means for the caller
#[derive(Debug, Clone, PartialEq)]
pub enum GetOutcome {
    /// The attribute value is complete
    Complete(DataObject),
    /// More blocks follow; request the one after this block number
    NextBlock(u32),
    /// The server returned a data access error
    Failed(u8),
}

/// Collects raw A-XDR fragments of a value transferred in blocks
#[derive(Debug, Clone, Default)]
pub struct BlockAssembler {
    buffer: Vec<u8>,
    last_block: Option<u32>,
}

impl BlockAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the fragment of block `block_number`
    ///
    /// # Errors
    ///
    /// `Protocol` if the block does not follow the previous one.
    pub fn push(&mut self, block_number: u32, fragment: &[u8]) -> DlmsResult<()> {
        let expected = self.last_block.map_or(1, |last| last.wrapping_add(1));
        if block_number != expected {
            self.reset();
            return Err(DlmsError::Protocol(format!(
                "Received block {}, expected {}",
                block_number, expected
            )));
        }
        self.buffer.extend_from_slice(fragment);
        self.last_block = Some(block_number);
        Ok(())
    }

    /// Decode the assembled value and start over
    pub fn finish(&mut self) -> DlmsResult<DataObject> {
        let data = std::mem::take(&mut self.buffer);
        self.last_block = None;
        AxdrDecoder::new(&data).decode_data_object()
    }

    pub fn is_empty(&self) -> bool {
        self.last_block.is_none()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_block = None;
    }
}

/// GET Service for DLMS/COSEM
///
/// The invoke ID advances with every normal request and is reused for the
/// GET-Request-Next frames of the same read. It wraps around at 15.
#[derive(Debug, Clone)]
pub struct GetService {
    next_invoke_id: u8,
    current: InvokeIdAndPriority,
    confirmed: bool,
    blocks: BlockAssembler,
}

impl GetService {
    /// Create a new GET service for the given service class
    pub fn new(confirmed: bool) -> Self {
        Self {
            next_invoke_id: 1,
            current: InvokeIdAndPriority::from_u8(0),
            confirmed,
            blocks: BlockAssembler::new(),
        }
    }

    /// Get the next invoke ID and increment
    pub fn next_invoke_id(&mut self) -> u8 {
        let id = self.next_invoke_id;
        self.next_invoke_id = if self.next_invoke_id >= 0x0F {
            1
        } else {
            self.next_invoke_id + 1
        };
        id
    }

    /// Create a GET-Request-Normal for one attribute
    pub fn normal_request(&mut self, descriptor: CosemAttributeDescriptor) -> DlmsResult<GetRequest> {
        let invoke_id = self.next_invoke_id();
        self.current = InvokeIdAndPriority::new(invoke_id, self.confirmed, true)?;
        self.blocks.reset();
        Ok(GetRequest::Normal {
            invoke_id_and_priority: self.current,
            cosem_attribute_descriptor: descriptor,
        })
    }

    /// Create a GET-Request-Next acknowledging `block_number`
    pub fn next_request(&self, block_number: u32) -> GetRequest {
        GetRequest::Next {
            invoke_id_and_priority: self.current,
            block_number,
        }
    }

    /// Fold a response into the read in progress
    ///
    /// # Errors
    ///
    /// `Protocol` for an invoke ID that does not belong to the current
    /// request or blocks out of order; decoding errors for the assembled
    /// value.
    pub fn process_response(&mut self, response: &GetResponse) -> DlmsResult<GetOutcome> {
        let invoke = match response {
            GetResponse::Normal {
                invoke_id_and_priority,
                ..
            }
            | GetResponse::WithDataBlock {
                invoke_id_and_priority,
                ..
            } => *invoke_id_and_priority,
        };
        if invoke.invoke_id() != self.current.invoke_id() {
            return Err(DlmsError::Protocol(format!(
                "Response invoke ID {} does not match request {}",
                invoke.invoke_id(),
                self.current.invoke_id()
            )));
        }

        match response {
            GetResponse::Normal { result, .. } => Ok(match result {
                GetDataResult::Data(data) => GetOutcome::Complete(data.clone()),
                GetDataResult::DataAccessResult(code) => GetOutcome::Failed(*code),
            }),
            GetResponse::WithDataBlock {
                last_block,
                block_number,
                result,
                ..
            } => match result {
                DataBlockResult::DataAccessResult(code) => {
                    self.blocks.reset();
                    Ok(GetOutcome::Failed(*code))
                }
                DataBlockResult::RawData(raw) => {
                    self.blocks.push(*block_number, raw)?;
                    if *last_block {
                        Ok(GetOutcome::Complete(self.blocks.finish()?))
                    } else {
                        Ok(GetOutcome::NextBlock(*block_number))
                    }
                }
            },
        }
    }

    /// Drop any partially assembled value
    pub fn reset(&mut self) {
        self.blocks.reset();
    }
}
