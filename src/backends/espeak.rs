use super::{Voice, VoiceError};

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Offline synthesis through the `espeak-ng` command line tool.
///
/// `espeak-ng -w` only writes RIFF/WAV, so the clip keeps its `.mp3` name but
/// holds WAV data. Chat clients sniff the container, not the extension.
pub struct EspeakVoice {
    binary: String,
    rate: u32,
    timeout: Duration,
}

impl EspeakVoice {
    /// Probes the binary with `--version`; a missing or broken install is reported
    /// as [`VoiceError::Unavailable`].
    pub fn new(binary: &str, rate: u32, timeout_secs: u64) -> Result<Self, VoiceError> {
        let status = Command::new(binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| VoiceError::Unavailable(format!("cannot run {}: {}", binary, e)))?;

        if !status.success() {
            return Err(VoiceError::Unavailable(format!(
                "{} --version exited with {}",
                binary, status
            )));
        }

        tracing::debug!(binary, rate, "espeak voice ready");
        Ok(Self {
            binary: binary.to_string(),
            rate,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }
}

impl Voice for EspeakVoice {
    fn id(&self) -> &'static str {
        "espeak-ng"
    }

    fn render(&self, text: &str, out: &Path) -> Result<(), VoiceError> {
        let mut child = Command::new(&self.binary)
            .arg("-s")
            .arg(self.rate.to_string())
            .arg("-w")
            .arg(out)
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let written = stdin
                .write_all(text.as_bytes())
                .and_then(|_| stdin.write_all(b"\n"));
            drop(stdin);
            if let Err(e) = written {
                // the child quit early; reap it before reporting
                let _ = child.kill();
                let output = child.wait_with_output()?;
                let err_msg = String::from_utf8_lossy(&output.stderr);
                return Err(VoiceError::Synthesis(format!(
                    "espeak stopped reading input ({}, {}): {}",
                    e, output.status, err_msg
                )));
            }
        }

        match child.wait_timeout(self.timeout)? {
            Some(status) if status.success() => Ok(()),
            Some(_) => {
                let output = child.wait_with_output()?;
                let err_msg = String::from_utf8_lossy(&output.stderr);
                Err(VoiceError::Synthesis(format!("espeak error: {}", err_msg)))
            }
            None => {
                // Timeout occurred, kill the process
                let _ = child.kill();
                let _ = child.wait();
                Err(VoiceError::TimedOut(self.timeout.as_secs()))
            }
        }
    }
}
