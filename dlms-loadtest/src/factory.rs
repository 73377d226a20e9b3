//! Session construction

use dlms_client::{ClientSettings, Session};
use dlms_core::DlmsResult;

/// Builds the session for one endpoint
pub trait SessionFactory: Send + Sync {
    fn create(&self, endpoint: &ClientSettings) -> DlmsResult<Session>;
}

/// Transport and codec chosen by the endpoint settings
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSessionFactory;

impl SessionFactory for DefaultSessionFactory {
    fn create(&self, endpoint: &ClientSettings) -> DlmsResult<Session> {
        Session::from_settings(endpoint)
    }
}

impl<F> SessionFactory for F
where
    F: Fn(&ClientSettings) -> DlmsResult<Session> + Send + Sync,
{
    fn create(&self, endpoint: &ClientSettings) -> DlmsResult<Session> {
        self(endpoint)
    }
}
