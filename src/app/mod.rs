pub mod ports;
pub mod repack_use_case;
pub mod validate_config_use_case;

pub use repack_use_case::{BatchReport, RepackUseCase};
pub use validate_config_use_case::ValidateConfigUseCase;
