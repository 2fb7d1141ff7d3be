use iced::widget::container::bordered_box;
use iced::widget::image::Handle;
use iced::widget::{column, container, image, row, scrollable, text};
use iced::{Color, Element, Length, Theme, border};

use crate::models::{ColorLegendEntry, DetailRow, DetectionStats};
use crate::render::PaletteColor;
use crate::views::ViewModel;

fn swatch<'a, Message: 'a>(color: PaletteColor) -> Element<'a, Message> {
    let [r, g, b] = color.rgb;
    container(text(""))
        .width(14)
        .height(14)
        .style(move |_theme: &Theme| {
            container::Style::default()
                .background(Color::from_rgb8(r, g, b))
                .border(border::rounded(3))
        })
        .into()
}

fn panel<'a, Message: 'a>(
    title: &'a str,
    body: impl Into<Element<'a, Message>>,
) -> Element<'a, Message> {
    container(column![text(title).size(18), body.into()].spacing(8))
        .style(|theme: &Theme| bordered_box(theme).border(border::width(1).rounded(6)))
        .padding(10)
        .width(Length::Fill)
        .into()
}

pub fn stats_panel<'a, Message: 'a>(stats: &DetectionStats) -> Element<'a, Message> {
    let mut lines = column![
        text(format!("Objects: {}", stats.object_count)),
        text(format!("Avg confidence: {}%", stats.average_confidence_pct)),
        text(format!("Processing: {} ms", stats.processing_millis)),
    ]
    .spacing(4);
    if let Some(fps) = stats.fps {
        lines = lines.push(text(format!("FPS: {fps}")));
    }
    if stats.source_width > 0 {
        lines = lines.push(text(format!(
            "Resolution: {}x{}",
            stats.source_width, stats.source_height
        )));
    }
    panel("Statistics", lines)
}

pub fn legend<'a, Message: 'a>(entries: &[ColorLegendEntry]) -> Element<'a, Message> {
    let body = if entries.is_empty() {
        column![text("No objects detected")]
    } else {
        column(entries.iter().map(|entry| {
            row![
                swatch(entry.color),
                text(format!("{} ({})", entry.label, entry.count))
            ]
            .spacing(8)
            .into()
        }))
        .spacing(4)
    };
    panel("Legend", body)
}

pub fn detail_list<'a, Message: 'a>(rows: &[DetailRow]) -> Element<'a, Message> {
    let items = column(rows.iter().map(|row| {
        let mut line = row![].spacing(8);
        if let Some(color) = row.color {
            line = line.push(swatch(color));
        }
        line.push(text(format!(
            "{}  {}%  {}x{}",
            row.label, row.confidence_pct, row.width, row.height
        )))
        .into()
    }))
    .spacing(4);
    panel("Detections", scrollable(items).height(Length::Fixed(240.0)))
}

/// Statistics, legend and detail list stacked for a sidebar.
pub fn results<'a, Message: 'a>(view: &ViewModel) -> Element<'a, Message> {
    column![
        stats_panel(&view.stats),
        legend(&view.legend),
        detail_list(&view.details),
    ]
    .spacing(12)
    .into()
}

/// The annotated frame, or a placeholder line when there is none yet.
pub fn frame<'a, Message: 'a>(handle: Option<&Handle>, placeholder: &'a str) -> Element<'a, Message> {
    let content: Element<'a, Message> = match handle {
        Some(handle) => image(handle.clone()).width(Length::Fill).into(),
        None => text(placeholder).into(),
    };
    container(content)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

pub fn error_line<'a, Message: 'a>(message: String) -> Element<'a, Message> {
    text(message)
        .style(|theme: &Theme| text::Style {
            color: Some(theme.palette().danger),
        })
        .into()
}

pub fn layout<'a, Message>(
    controls: impl Into<Element<'a, Message>>,
    main_content: impl Into<Element<'a, Message>>,
    sidebar: impl Into<Element<'a, Message>>,
) -> Element<'a, Message>
where
    Message: 'a,
{
    container(row![
        container(column![controls.into(), main_content.into()].spacing(12))
            .width(Length::FillPortion(3)),
        container(sidebar.into()).width(Length::FillPortion(1)),
    ]
    .spacing(16))
    .padding(16)
    .center_x(Length::Fill)
    .center_y(Length::Fill)
    .into()
}

pub fn to_handle(image: ::image::RgbaImage) -> Handle {
    Handle::from_rgba(image.width(), image.height(), image.into_raw())
}
