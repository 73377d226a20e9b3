//! Concurrent DLMS/COSEM session driver
//!
//! Runs one session per endpoint, with endpoint `i` at the base port plus
//! `i`, at most `concurrency` at a time. Failures stay inside their session
//! and end up in the [`RunReport`].
//!
//! ```no_run
//! use dlms_client::ClientSettings;
//! use dlms_loadtest::{Orchestrator, RunConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let base = ClientSettings::builder().tcp("10.0.0.5", 55555).build()?;
//! let orchestrator = Orchestrator::new(RunConfig::new(base, 100).with_concurrency(10));
//! let interrupt = orchestrator.cancel_on_ctrl_c();
//! let report = orchestrator.run().await;
//! interrupt.abort();
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod endpoint;
pub mod factory;
pub mod orchestrator;
pub mod report;

pub use config::{default_reads, ReadSpec, RunConfig};
pub use endpoint::{derive_endpoint, endpoint_name};
pub use factory::{DefaultSessionFactory, SessionFactory};
pub use orchestrator::Orchestrator;
pub use report::{Outcome, ReportCollector, RunReport, SessionRecord};
