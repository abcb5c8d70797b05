use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::model::{ExtractionReport, ProcessOutput};
use crate::traits::{ExtractError, Extractor};

/// Extracts by running an external tool (`unzip` unless configured otherwise).
///
/// The tool runs with the destination as its working directory and receives
/// the archive as its last argument. stdout and stderr are captured; stdin is
/// closed so the tool cannot block on a prompt.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
    args: Vec<OsString>,
}

impl Default for CommandExtractor {
    fn default() -> Self {
        Self {
            program: "unzip".to_string(),
            args: Vec::new(),
        }
    }
}

impl CommandExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments passed before the archive path, e.g. `-o` to overwrite.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn resolve_program(&self) -> Result<PathBuf, ExtractError> {
        which::which(&self.program).map_err(|source| ExtractError::ToolNotFound {
            tool: self.program.clone(),
            source,
        })
    }

    fn run(&self, archive: &Path, destination: &Path) -> Result<ProcessOutput, ExtractError> {
        let program = self.resolve_program()?;
        // The tool runs from `destination`, so a relative archive path would
        // resolve against the wrong directory.
        let archive = std::path::absolute(archive)?;

        debug!(program = %program.display(), archive = %archive.display(), "Spawning");
        let output = Command::new(program)
            .args(&self.args)
            .arg(&archive)
            .current_dir(destination)
            .stdin(Stdio::null())
            .output()?;

        Ok(ProcessOutput::from(output))
    }
}

impl Extractor for CommandExtractor {
    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
    ) -> Result<ExtractionReport, ExtractError> {
        let output = self.run(archive, destination)?;

        if !output.success {
            return Err(ExtractError::CommandFailed {
                code: output.code,
                stderr: output.stderr,
            });
        }

        info!(tool = %self.program, "Archive extracted");

        let mut report = ExtractionReport::new(archive, destination);
        report.tool_output = Some(output.stdout);
        Ok(report)
    }

    fn stage_name(&self) -> &'static str {
        "unzip"
    }
}
