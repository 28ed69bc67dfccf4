pub mod asset;
pub mod derive;
pub mod history;
pub mod orchestrator;
pub mod phase;
pub mod presets;
pub mod remote;
pub mod session;

pub use asset::ImageAsset;
pub use orchestrator::{
    DownloadArtifact, EditError, EditOrchestrator, EditOutcome, ResetOutcome,
    SharedEditOrchestrator, SubmitEdit, UndoOutcome, ValidationError,
};
pub use session::SessionSnapshot;
