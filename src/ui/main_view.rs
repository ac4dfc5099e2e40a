use super::render_util::rgba_to_image;
use super::{
    ActiveTheme, AnyElement, AppView, Arc, Button, ButtonVariants, Context, IntoElement,
    ObjectFit, ParentElement, Readiness, RenderImage, SharedString, Styled, StyledImage, Tag,
    Window, div, img, px, v_flex,
};
use crate::display::StatusPanel;

impl AppView {
    pub(super) fn render_main(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let theme = cx.theme();
        let width = px(self.canvas.width() as f32);
        let height = px(self.canvas.height() as f32);

        let mut stage = div()
            .relative()
            .w(width)
            .h(height)
            .overflow_hidden()
            .rounded_lg()
            .bg(gpui::rgb(0x000000));

        if let Some(video) = &self.video_image {
            stage = stage.child(
                img(video.clone())
                    .absolute()
                    .top_0()
                    .left_0()
                    .size_full()
                    .object_fit(ObjectFit::Fill),
            );
        }
        if let Some(canvas) = &self.canvas_image {
            stage = stage.child(
                img(canvas.clone())
                    .absolute()
                    .top_0()
                    .left_0()
                    .size_full()
                    .object_fit(ObjectFit::Fill),
            );
        }

        let status_block = visible_status_lines(&self.status).map(|lines| {
            v_flex()
                .w(width)
                .p_3()
                .gap_1()
                .rounded_lg()
                .bg(theme.group_box)
                .text_sm()
                .text_color(theme.foreground)
                .children(lines.into_iter().map(|line| div().child(line)))
        });

        let mut column = v_flex()
            .gap_3()
            .items_center()
            .child(
                div()
                    .text_xl()
                    .text_color(theme.foreground)
                    .child(super::WINDOW_TITLE),
            );

        if *self.controller.readiness() != Readiness::Ready {
            column = column.child(self.render_init_panel(cx));
        }

        if self.controller.toggle_visible() {
            column = column.child(
                Button::new(SharedString::from("toggle-predictions"))
                    .primary()
                    .label(self.controller.toggle_label())
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.toggle_predictions();
                        cx.notify();
                    })),
            );
        }

        if let Some(notice) = &self.notice {
            column = column.child(Tag::danger().rounded_full().child(notice.clone()));
        }

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(cx.theme().background)
            .child(column.child(stage).children(status_block))
            .into_any_element()
    }

    /// Re-uploads the video frame and the overlay canvas when they changed.
    pub(super) fn refresh_images(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let stamp = self.controller.preview_frame().map(|frame| frame.timestamp);
        if stamp != self.video_stamp {
            self.video_stamp = stamp;
            let image = self
                .controller
                .preview_frame()
                .and_then(|frame| rgba_to_image(&frame.rgba, frame.width, frame.height));
            match image {
                Some(image) => replace_image(&mut self.video_image, image, window, cx),
                None => {
                    if let Some(old) = self.video_image.take() {
                        cx.drop_image(old, Some(window));
                    }
                }
            }
        }

        if self.canvas_revision != Some(self.canvas.revision()) {
            self.canvas_revision = Some(self.canvas.revision());
            if let Some(image) =
                rgba_to_image(self.canvas.pixels(), self.canvas.width(), self.canvas.height())
            {
                replace_image(&mut self.canvas_image, image, window, cx);
            }
        }
    }
}

/// Lines of the status region, or `None` while it is hidden.
fn visible_status_lines(status: &StatusPanel) -> Option<Vec<String>> {
    status
        .is_visible()
        .then(|| status.text().lines().map(str::to_string).collect())
}

fn replace_image(
    slot: &mut Option<Arc<RenderImage>>,
    image: Arc<RenderImage>,
    window: &mut Window,
    cx: &mut Context<'_, AppView>,
) {
    if let Some(old) = slot.replace(image) {
        // The sprite atlas keeps every uploaded frame unless it is dropped.
        cx.drop_image(old, Some(window));
    }
}
