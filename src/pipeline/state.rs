use std::path::{Path, PathBuf};

use crate::paths::{is_gzip_path, pick_random_file_path};
use crate::pipeline::run_request::RunRequest;

/// The four ways a filtered document reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRoute {
    /// Filter straight into the result path.
    Direct,
    /// Filter into a temp file, gzip into the result path.
    Pack,
    /// Filter into a temp file, upload it.
    Transfer,
    /// Filter into a temp file, gzip into a temp file named like the result, upload that.
    PackThenTransfer,
}

impl OutputRoute {
    pub fn from_flags(packing: bool, transfer: bool) -> Self {
        match (packing, transfer) {
            (false, false) => OutputRoute::Direct,
            (true, false) => OutputRoute::Pack,
            (false, true) => OutputRoute::Transfer,
            (true, true) => OutputRoute::PackThenTransfer,
        }
    }

    pub fn needs_packing(&self) -> bool {
        matches!(self, OutputRoute::Pack | OutputRoute::PackThenTransfer)
    }

    pub fn needs_transfer(&self) -> bool {
        matches!(self, OutputRoute::Transfer | OutputRoute::PackThenTransfer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputRoute::Direct => "direct",
            OutputRoute::Pack => "pack",
            OutputRoute::Transfer => "transfer",
            OutputRoute::PackThenTransfer => "pack_then_transfer",
        }
    }
}

/// Per-run bookkeeping of working paths and which of them are temporary.
///
/// Owned by one orchestrator invocation and dropped with it.
#[derive(Debug)]
pub struct PipelineState {
    work_dir: PathBuf,
    final_result: PathBuf,
    route: OutputRoute,
    source: Option<PathBuf>,
    source_downloaded: bool,
    parsed: Option<PathBuf>,
    packed: Option<PathBuf>,
}

impl PipelineState {
    /// Fixes the output route from the result extension and the transfer target.
    pub fn new(request: &RunRequest, work_dir: &Path) -> Self {
        let route = OutputRoute::from_flags(is_gzip_path(&request.result), request.transfer.is_some());

        Self {
            work_dir: work_dir.to_path_buf(),
            final_result: request.result.clone(),
            route,
            source: None,
            source_downloaded: false,
            parsed: None,
            packed: None,
        }
    }

    pub fn route(&self) -> OutputRoute {
        self.route
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn source_downloaded(&self) -> bool {
        self.source_downloaded
    }

    pub fn set_source(&mut self, path: PathBuf, downloaded: bool) {
        self.source = Some(path);
        self.source_downloaded = downloaded;
    }

    pub fn parsed_is_temporary(&self) -> bool {
        self.route != OutputRoute::Direct
    }

    pub fn packed_is_temporary(&self) -> bool {
        self.route == OutputRoute::PackThenTransfer
    }

    /// Where the filter writes. Recorded before the file exists so a partial file is
    /// still cleaned up.
    pub fn resolve_parsed(&mut self) -> PathBuf {
        let path = if self.parsed_is_temporary() {
            pick_random_file_path(&self.work_dir, None)
        } else {
            self.final_result.clone()
        };
        self.parsed = Some(path.clone());
        path
    }

    /// Where the packer writes. When an upload follows, the file carries the result's
    /// name so the uploaded artifact matches the name checked before the run.
    pub fn resolve_packed(&mut self) -> PathBuf {
        let path = match (self.packed_is_temporary(), self.final_result.file_name()) {
            (true, Some(name)) => self.work_dir.join(name),
            _ => self.final_result.clone(),
        };
        self.packed = Some(path.clone());
        path
    }

    pub fn parsed(&self) -> Option<&Path> {
        self.parsed.as_deref()
    }

    pub fn packed(&self) -> Option<&Path> {
        self.packed.as_deref()
    }

    /// Packed output wins over the plain filtered file.
    pub fn upload_artifact(&self) -> Option<&Path> {
        self.packed().or_else(|| self.parsed())
    }

    /// Every file this run created that must not outlive it.
    pub fn temporary_artifacts(&self) -> Vec<&Path> {
        let mut artifacts = Vec::new();

        if self.source_downloaded {
            artifacts.extend(self.source());
        }
        if self.parsed_is_temporary() {
            artifacts.extend(self.parsed());
        }
        if self.packed_is_temporary() {
            artifacts.extend(self.packed());
        }

        artifacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::TransferTarget;

    fn target() -> TransferTarget {
        TransferTarget {
            name: "main".into(),
            server: "ftp.example.com".into(),
            port: 21,
            user: "u".into(),
            password: "p".into(),
        }
    }

    #[test]
    fn test_route_follows_extension_and_target() {
        let work = Path::new("/tmp/work");
        let plain = RunRequest::new("g.xml", "c.txt", "out/guide.xml");
        let packed = RunRequest::new("g.xml", "c.txt", "out/guide.xml.gz");

        assert_eq!(PipelineState::new(&plain, work).route(), OutputRoute::Direct);
        assert_eq!(PipelineState::new(&packed, work).route(), OutputRoute::Pack);
        assert_eq!(
            PipelineState::new(&plain.clone().with_transfer(target()), work).route(),
            OutputRoute::Transfer
        );
        assert_eq!(
            PipelineState::new(&packed.clone().with_transfer(target()), work).route(),
            OutputRoute::PackThenTransfer
        );
    }

    #[test]
    fn test_direct_route_has_no_temporaries() {
        let request = RunRequest::new("g.xml", "c.txt", "out/guide.xml");
        let mut state = PipelineState::new(&request, Path::new("/tmp/work"));
        state.set_source(PathBuf::from("g.xml"), false);

        assert_eq!(state.resolve_parsed(), PathBuf::from("out/guide.xml"));
        assert!(state.temporary_artifacts().is_empty());
    }

    #[test]
    fn test_pack_then_transfer_paths() {
        let request = RunRequest::new("https://example.com/g.xml", "c.txt", "/pub/guide.xml.gz")
            .with_transfer(target());
        let mut state = PipelineState::new(&request, Path::new("/tmp/work"));
        state.set_source(PathBuf::from("/tmp/work/download.xml"), true);

        let parsed = state.resolve_parsed();
        let packed = state.resolve_packed();
        assert!(parsed.starts_with("/tmp/work"));
        assert_eq!(packed, PathBuf::from("/tmp/work/guide.xml.gz"));
        assert_eq!(state.upload_artifact(), Some(packed.as_path()));
        assert_eq!(state.temporary_artifacts().len(), 3);
    }

    #[test]
    fn test_pack_only_keeps_packed_result() {
        let request = RunRequest::new("g.xml", "c.txt", "out/guide.xml.gz");
        let mut state = PipelineState::new(&request, Path::new("/tmp/work"));
        state.set_source(PathBuf::from("g.xml"), false);

        let parsed = state.resolve_parsed();
        assert_eq!(state.resolve_packed(), PathBuf::from("out/guide.xml.gz"));
        assert_eq!(state.temporary_artifacts(), vec![parsed.as_path()]);
    }
}
