pub mod config;
pub mod package;
pub mod run;
pub mod venv;
pub mod version;

pub use config::{LogConfig, Mirror, MirrorConfig, TelemetryMode};
pub use package::{NewsItem, PackageAtom, PackageRecord, PackageVersion, ProfileRecord};
pub use run::RunResult;
pub use venv::{VenvCreateRequest, VenvRecord};
pub use version::{CheckOutcome, ReleaseInfo, ToolVersion};
