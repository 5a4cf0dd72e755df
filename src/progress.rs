use serde::Deserialize;
use std::sync::{Arc, Mutex};

/// Download/extract status pushed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProgressInfo {
    #[serde(rename = "downloaded", default)]
    pub downloaded_bytes: u64,
    #[serde(rename = "total", default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub percent: u32,
    #[serde(rename = "downloading", default)]
    pub is_active: bool,
    #[serde(rename = "status", default)]
    pub status_text: String,
}

impl ProgressInfo {
    /// Gauge ratio in `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        f64::from(self.percent.min(100)) / 100.0
    }
}

/// One-slot mailbox: the newest snapshot replaces whatever was there.
#[derive(Debug, Clone, Default)]
pub struct ProgressCell {
    slot: Arc<Mutex<Option<ProgressInfo>>>,
}

impl ProgressCell {
    pub fn publish(&self, info: ProgressInfo) {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(info);
    }

    pub fn snapshot(&self) -> Option<ProgressInfo> {
        match self.slot.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn info(percent: u32, active: bool, status: &str) -> ProgressInfo {
        ProgressInfo {
            downloaded_bytes: u64::from(percent) * 10,
            total_bytes: 1000,
            percent,
            is_active: active,
            status_text: status.to_string(),
        }
    }

    #[test]
    fn empty_until_first_event() {
        assert!(ProgressCell::default().snapshot().is_none());
    }

    #[test]
    fn latest_snapshot_wins() {
        let cell = ProgressCell::default();
        cell.publish(info(10, true, "Downloading: jdk.tar.gz"));
        cell.publish(info(100, false, "Extracting: jdk.tar.gz"));

        assert_eq!(
            cell.snapshot(),
            Some(info(100, false, "Extracting: jdk.tar.gz"))
        );
    }

    #[test]
    fn publish_from_another_thread_is_visible() {
        let cell = ProgressCell::default();
        let writer = cell.clone();
        thread::spawn(move || writer.publish(info(42, true, "Downloading")))
            .join()
            .expect("writer thread");

        assert_eq!(cell.snapshot().map(|info| info.percent), Some(42));
    }

    #[test]
    fn decodes_backend_field_names() {
        let raw = r#"{"downloaded":512,"total":1024,"percent":50,"downloading":true,"status":"Downloading: sdk.zip"}"#;
        let info: ProgressInfo = serde_json::from_str(raw).expect("progress payload");
        assert_eq!(info.downloaded_bytes, 512);
        assert_eq!(info.total_bytes, 1024);
        assert!(info.is_active);
        assert_eq!(info.status_text, "Downloading: sdk.zip");
        assert!((info.ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_is_clamped() {
        assert!((info(250, true, "").ratio() - 1.0).abs() < f64::EPSILON);
    }
}
