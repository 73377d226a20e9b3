//! ACTION Service implementation for DLMS/COSEM
//!
//! Only normal requests are needed: the client invokes
//! `reply_to_HLS_authentication` on the association object.

use crate::pdu::{
    ActionRequest, ActionResponse, CosemMethodDescriptor, GetDataResult, InvokeIdAndPriority,
};
use dlms_core::{DataObject, DlmsError, DlmsResult};

/// ACTION Service for DLMS/COSEM
#[derive(Debug, Clone)]
pub struct ActionService {
    next_invoke_id: u8,
    confirmed: bool,
}

impl ActionService {
    pub fn new(confirmed: bool) -> Self {
        Self {
            next_invoke_id: 1,
            confirmed,
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

    /// Create a Normal ACTION request
    pub fn create_normal_request(
        &mut self,
        cosem_method_descriptor: CosemMethodDescriptor,
        method_invocation_parameters: Option<DataObject>,
    ) -> DlmsResult<ActionRequest> {
        let invoke_id = self.next_invoke_id();
        Ok(ActionRequest {
            invoke_id_and_priority: InvokeIdAndPriority::new(invoke_id, self.confirmed, true)?,
            cosem_method_descriptor,
            method_invocation_parameters,
        })
    }

    /// Extract the return data of a successful ACTION response
    ///
    /// Returns `Ok(None)` for success without data.
    ///
    /// # Errors
    ///
    /// `ErrorCode` with the action result or data access result when the
    /// method failed.
    pub fn process_response(response: &ActionResponse) -> DlmsResult<Option<DataObject>> {
        if response.result != 0 {
            return Err(DlmsError::ErrorCode(response.result));
        }
        match &response.return_parameters {
            None => Ok(None),
            Some(GetDataResult::Data(data)) => Ok(Some(data.clone())),
            Some(GetDataResult::DataAccessResult(code)) => Err(DlmsError::ErrorCode(*code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_core::ObisCode;

    #[test]
    fn test_hls_reply_request() {
        let mut service = ActionService::new(true);
        let request = service
            .create_normal_request(
                CosemMethodDescriptor::new(15, ObisCode::ASSOCIATION_LN, 1),
                Some(DataObject::OctetString(vec![0x01])),
            )
            .unwrap();
        assert_eq!(request.invoke_id_and_priority.value(), 0xC1);
        assert_eq!(&request.encode()[..3], &[0xC3, 0x01, 0xC1]);
    }

    #[test]
    fn test_process_response() {
        let invoke = InvokeIdAndPriority::from_u8(0xC1);
        let ok = ActionResponse {
            invoke_id_and_priority: invoke,
            result: 0,
            return_parameters: Some(GetDataResult::Data(DataObject::OctetString(vec![7]))),
        };
        assert_eq!(
            ActionService::process_response(&ok).unwrap(),
            Some(DataObject::OctetString(vec![7]))
        );

        let failed = ActionResponse {
            invoke_id_and_priority: invoke,
            result: 3,
            return_parameters: None,
        };
        assert!(matches!(
            ActionService::process_response(&failed),
            Err(DlmsError::ErrorCode(3))
        ));
    }
}
