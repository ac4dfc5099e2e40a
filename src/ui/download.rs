use super::{
    ActiveTheme, AnyElement, AppView, Context, InitProgress, IntoElement, ModelDownloadEvent,
    ParentElement, Styled, StyledExt, Tag, div, h_flex, v_flex,
};

impl InitProgress {
    pub(super) fn new() -> Self {
        Self {
            downloaded: 0,
            total: None,
            message: "Loading gesture recognizer...".to_string(),
            error: None,
        }
    }

    pub(super) fn apply(&mut self, event: ModelDownloadEvent) {
        match event {
            ModelDownloadEvent::AlreadyPresent => {
                self.message = "Model found, loading gesture recognizer...".to_string();
            }
            ModelDownloadEvent::Started { total } => {
                self.total = total;
                self.message = "Downloading handpose model...".to_string();
            }
            ModelDownloadEvent::Progress { downloaded, total } => {
                self.downloaded = downloaded;
                self.total = total;
            }
            ModelDownloadEvent::Finished => {
                self.message = "Model ready, loading gesture recognizer...".to_string();
            }
        }
    }
}

impl AppView {
    pub(super) fn render_init_panel(&self, cx: &mut Context<'_, Self>) -> AnyElement {
        let theme = cx.theme();
        let state = &self.init;

        let (icon, title, color) = if state.error.is_some() {
            ("✗", "Gesture recognizer failed to load", theme.accent)
        } else {
            ("⟳", "Preparing gesture recognizer", theme.foreground)
        };

        let mut panel = v_flex()
            .gap_2()
            .p_4()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.group_box)
            .child(
                h_flex().gap_2().items_center().child(
                    div()
                        .text_color(color)
                        .font_semibold()
                        .child(format!("{icon} {title}")),
                ),
            );

        if state.downloaded > 0 || state.total.is_some() {
            panel = panel.child(
                div()
                    .px_3()
                    .py_1()
                    .rounded_md()
                    .bg(theme.muted)
                    .font_family(theme.mono_font_family.clone())
                    .text_sm()
                    .text_color(theme.foreground)
                    .child(progress_bar_string(state.downloaded, state.total)),
            );
        }

        panel = panel.child(
            div()
                .text_sm()
                .text_color(theme.muted_foreground)
                .child(state.message.clone()),
        );

        if let Some(err) = &state.error {
            panel = panel.child(Tag::danger().rounded_full().child(err.clone()));
        }

        panel.into_any_element()
    }
}

fn progress_bar_string(downloaded: u64, total: Option<u64>) -> String {
    const BAR_LEN: usize = 30;
    match total {
        Some(total) if total > 0 => {
            let fraction = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
            let filled = ((fraction * BAR_LEN as f64).round() as usize).min(BAR_LEN);
            format!(
                "[{}{}] {:>5.1}%",
                "=".repeat(filled),
                " ".repeat(BAR_LEN - filled),
                fraction * 100.0
            )
        }
        _ => format!("[{:<BAR_LEN$}] {} KB", ">", downloaded / 1024),
    }
}
