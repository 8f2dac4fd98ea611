//! Domain entities and pure business rules

pub mod conflict;
pub mod errors;
pub mod file;
pub mod newtypes;
pub mod session;
pub mod snapshot;

pub use conflict::{ConflictRecord, LocalContender};
pub use errors::{DomainError, OperationError};
pub use file::{CloudFile, DownloadStatus, FileVersion, UploadStatus};
pub use newtypes::{FileName, Fingerprint, IdentityToken, RemoteUrl, VersionId};
pub use session::{InFlightOperation, OperationKind, OperationState, SessionError, SyncSession};
pub use snapshot::{ChangeDetector, Delta, FileListSnapshot};
