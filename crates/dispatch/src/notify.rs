use async_trait::async_trait;
use promptdock_core::{Error, Result};

/// Desktop notification sink. Dispatch paths log failures instead of
/// propagating them, so a broken notifier never breaks a request.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Native desktop notification via the platform notifier binary.
pub struct DesktopNotifier;

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        let output = if cfg!(target_os = "macos") {
            let script = format!(
                r#"display notification "{}" with title "{}""#,
                escape(body),
                escape(title)
            );
            tokio::process::Command::new("osascript")
                .arg("-e")
                .arg(&script)
                .output()
                .await
        } else {
            tokio::process::Command::new("notify-send")
                .arg(title)
                .arg(body)
                .output()
                .await
        };

        let output = output.map_err(|e| Error::Other(format!("failed to launch notifier: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Other(format!("notifier error: {}", stderr)));
        }
        Ok(())
    }
}
