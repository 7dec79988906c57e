//! User Feedback
//!
//! Banners for session-level conditions (no renderer, no terrain) and
//! short-lived toasts for individual operations.

use crate::config::UiConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BannerKind {
    /// The lab cannot start
    Fatal,
    /// The lab runs without some data
    Recoverable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    pub duration_ms: u64,
}

#[derive(Debug)]
pub struct Feedback {
    banner: Option<Banner>,
    toasts: Vec<Toast>,
    ui: UiConfig,
}

impl Feedback {
    pub fn new(ui: UiConfig) -> Self {
        Self {
            banner: None,
            toasts: Vec::new(),
            ui,
        }
    }

    pub fn raise_banner(&mut self, kind: BannerKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            BannerKind::Fatal => tracing::error!("{}", message),
            BannerKind::Recoverable => tracing::warn!("{}", message),
        }
        self.banner = Some(Banner { kind, message });
    }

    pub fn clear_banner(&mut self) {
        self.banner = None;
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn toast(&mut self, kind: ToastKind, message: impl Into<String>) {
        let duration_ms = match kind {
            ToastKind::Info => self.ui.toast_duration,
            ToastKind::Success => self.ui.toast_duration_success,
            ToastKind::Error => self.ui.toast_duration_error,
        };
        self.toasts.push(Toast {
            kind,
            message: message.into(),
            duration_ms,
        });
    }

    /// Take every toast raised since the last drain.
    pub fn drain_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    pub fn pending_toasts(&self) -> &[Toast] {
        &self.toasts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_durations_follow_kind() {
        let mut feedback = Feedback::new(UiConfig::default());
        feedback.toast(ToastKind::Info, "a");
        feedback.toast(ToastKind::Success, "b");
        feedback.toast(ToastKind::Error, "c");
        let durations: Vec<u64> = feedback.drain_toasts().iter().map(|t| t.duration_ms).collect();
        assert_eq!(durations, vec![3000, 2000, 5000]);
        assert!(feedback.pending_toasts().is_empty());
    }

    #[test]
    fn test_banner_replace_and_clear() {
        let mut feedback = Feedback::new(UiConfig::default());
        feedback.raise_banner(BannerKind::Recoverable, "no terrain");
        feedback.raise_banner(BannerKind::Fatal, "no renderer");
        assert_eq!(feedback.banner().map(|b| b.kind), Some(BannerKind::Fatal));
        feedback.clear_banner();
        assert!(feedback.banner().is_none());
    }
}
