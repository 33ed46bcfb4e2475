pub mod ftp_client;
pub mod gzip_packer;
pub mod http_client;
pub mod whitelist_file;

pub use ftp_client::{FtpConnector, FtpGateway};
pub use gzip_packer::GzipPacker;
pub use http_client::HttpFetcher;
pub use whitelist_file::FileWhitelistSource;
