// 虚拟环境：标记文件、发现与管理

pub mod discovery;
pub mod manager;
pub mod marker;

pub use discovery::{detect_toolchain, scan_project_roots, RegistryScanner};
pub use manager::VenvManager;
pub use marker::{parse_marker, VenvMarker, MARKER_FILE};
