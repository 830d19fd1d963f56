pub mod analysis;
pub mod backend;
pub mod converter;
pub mod executor;
pub mod metrics;
pub mod reconciliation;
pub mod statement;
pub mod storage;

pub use analysis::{AnalysisClient, ExpectedPayment};
pub use backend::{AccessToken, BackendClient, Query};
pub use converter::{DocumentConverter, ProofKind, UploadedFile};
pub use reconciliation::{ReconciliationService, ReconciliationSettings};
pub use storage::{HostedStorage, LocalStorage, Storage};
