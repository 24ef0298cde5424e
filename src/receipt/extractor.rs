//! Runs the external extraction tool against a stored receipt.

use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{process::Command, time::timeout};

use crate::{
    Error,
    receipt::extraction::{ExtractionResult, ProcessOutput, parse_extraction_output},
};

/// How long the extraction tool may run before it is killed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Something that can read the purchase data from a stored receipt file.
#[async_trait]
pub trait Extractor: Send + Sync + Debug {
    /// Extract the purchase data from the receipt at `path`.
    ///
    /// # Errors
    /// Implementers should return one of the `Extraction*` variants of [Error].
    async fn extract(&self, path: &Path) -> Result<ExtractionResult, Error>;
}

/// Runs an external program with the receipt path as its last argument and
/// reads a JSON payload from its standard output.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
    leading_args: Vec<String>,
    timeout: Duration,
}

impl CommandExtractor {
    /// Create an extractor that runs `program` with the default time limit.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Pass `args` to the program before the receipt path, e.g. the script
    /// an interpreter should run.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Kill the program if it has not exited after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the program on the file at `path` and collect everything it writes.
    ///
    /// A non-zero exit is not an error here, see [parse_extraction_output].
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::ExtractionLaunchFailed] if the program could not be started,
    /// - or [Error::ExtractionTimeout] if it did not exit in time, in which case it is killed.
    pub async fn invoke(&self, path: &Path) -> Result<ProcessOutput, Error> {
        let child = Command::new(&self.program)
            .args(&self.leading_args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| {
                tracing::error!(
                    "Could not launch extraction tool {}: {error}",
                    self.program.display()
                );
                Error::ExtractionLaunchFailed(format!("{}: {error}", self.program.display()))
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                tracing::warn!(
                    "Extraction tool did not finish within {:?} for {}",
                    self.timeout,
                    path.display()
                );
                Error::ExtractionTimeout(self.timeout)
            })?
            .map_err(|error| {
                tracing::error!("Could not read output of extraction tool: {error}");
                Error::ExtractionLaunchFailed(error.to_string())
            })?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl Extractor for CommandExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractionResult, Error> {
        let output = self.invoke(path).await?;

        tracing::debug!(
            "Extraction tool exited with {:?} for {}",
            output.exit_code,
            path.display()
        );

        parse_extraction_output(output)
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use crate::{
        Error,
        receipt::extractor::{CommandExtractor, Extractor},
    };

    /// Runs `script` with `sh`, the receipt path is available as `$0`.
    fn shell(script: &str) -> CommandExtractor {
        CommandExtractor::new("sh").with_args(["-c", script])
    }

    #[tokio::test]
    async fn passes_receipt_path_as_last_argument() {
        let output = shell("printf '%s' \"$0\"")
            .invoke(Path::new("/tmp/receipt-1.jpg"))
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout, "/tmp/receipt-1.jpg");
    }

    #[tokio::test]
    async fn extracts_json_payload() {
        let extractor = shell(r#"echo '{"total": "42.50", "merchant": "Cafe X"}'"#);

        let result = extractor.extract(Path::new("receipt.jpg")).await.unwrap();

        assert_eq!(result.amount(), Some(42.5));
        assert_eq!(result.merchant.as_deref(), Some("Cafe X"));
    }

    #[tokio::test]
    async fn missing_program_is_launch_failure() {
        let extractor = CommandExtractor::new("/nonexistent/receipt-extractor");

        let result = extractor.invoke(Path::new("receipt.jpg")).await;

        assert!(
            matches!(result, Err(Error::ExtractionLaunchFailed(_))),
            "{result:?}"
        );
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_stderr() {
        let extractor = shell("echo 'model unavailable' >&2; exit 1");

        let result = extractor.extract(Path::new("receipt.jpg")).await;

        assert_eq!(
            result,
            Err(Error::ExtractionFailed {
                exit_code: Some(1),
                stderr: "model unavailable\n".to_owned(),
            })
        );
    }

    #[tokio::test]
    async fn kills_slow_program() {
        let extractor = shell("sleep 5").with_timeout(Duration::from_millis(100));

        let result = extractor.invoke(Path::new("receipt.jpg")).await;

        assert_eq!(
            result,
            Err(Error::ExtractionTimeout(Duration::from_millis(100)))
        );
    }
}
