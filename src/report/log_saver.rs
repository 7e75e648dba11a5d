// File-system log saver - persists test_log streams for one invocation

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use uuid::Uuid;

use super::{read, write};
use crate::error::LogSaverError;
use crate::state::{InputStreamSource, InvocationContext, LogDataType, LogFile};
use crate::utils::FileUtils;

const DEFAULT_TEST_TAG: &str = "stub";

/// Saves log streams under `<root>/<branch>/<build_id>/<test_tag>/inv_<id>/`.
///
/// The branch level is skipped when the build has no branch. Each invocation
/// gets a fresh `inv_` directory so concurrent invocations of the same build
/// never share files.
#[derive(Debug)]
pub struct FileSystemLogSaver {
    root_dir: PathBuf,
    invocation_dir: RwLock<Option<PathBuf>>,
}

impl FileSystemLogSaver {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            invocation_dir: RwLock::new(None),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Directory of the current invocation, once started
    pub fn log_report_dir(&self) -> Option<PathBuf> {
        read(&self.invocation_dir).clone()
    }

    /// Create the invocation directory for `context`
    pub fn invocation_started(
        &self,
        context: &InvocationContext,
    ) -> Result<PathBuf, LogSaverError> {
        let mut dir = self.root_dir.clone();
        if let Some(branch) = &context.build_branch {
            dir.push(FileUtils::sanitize_file_name(branch));
        }
        dir.push(FileUtils::sanitize_file_name(&context.build_id));
        dir.push(FileUtils::sanitize_file_name(
            context.test_tag.as_deref().unwrap_or(DEFAULT_TEST_TAG),
        ));
        dir.push(format!("inv_{}", Uuid::new_v4().simple()));

        let dir = FileUtils::ensure_dir(&dir).map_err(|source| LogSaverError::Io {
            path: dir.clone(),
            source,
        })?;
        tracing::debug!("saving logs to {}", dir.display());
        *write(&self.invocation_dir) = Some(dir.clone());
        Ok(dir)
    }

    /// Copy `source` into the invocation directory
    pub fn save_log_data(
        &self,
        data_name: &str,
        data_type: LogDataType,
        source: &dyn InputStreamSource,
    ) -> Result<LogFile, LogSaverError> {
        let dir = self.log_report_dir().ok_or(LogSaverError::NotStarted)?;
        let suffix = Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "{}_{}.{}",
            FileUtils::sanitize_file_name(data_name),
            &suffix[..8],
            data_type.file_ext()
        );
        let path = dir.join(file_name);

        let copy = || -> io::Result<u64> {
            let mut reader = source.create_input_stream()?;
            let mut file = File::create(&path)?;
            io::copy(&mut reader, &mut file)
        };
        let bytes = copy().map_err(|source| LogSaverError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!("saved {} ({} bytes) to {}", data_name, bytes, path.display());

        Ok(LogFile::new(path.to_string_lossy(), None))
    }

    pub fn invocation_ended(&self) {
        if let Some(dir) = self.log_report_dir() {
            tracing::info!("saved logs for invocation to {}", dir.display());
        }
    }
}
