use crate::stats::AmplitudeClass;
use crossterm::style::{Attribute, Color};

/// Foreground color plus optional attribute for one piece of output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Style {
    pub fg: Color,
    pub attr: Option<Attribute>,
}

impl Style {
    const fn plain(fg: Color) -> Self {
        Self { fg, attr: None }
    }

    const fn with(fg: Color, attr: Attribute) -> Self {
        Self { fg, attr: Some(attr) }
    }
}

// Standard (0-7) terminal colors so the output matches any palette
pub const TITLE: Style = Style::plain(Color::DarkBlue);
/// Styles for the summary fields, peak then RMS
pub const SUMMARY: [Style; 2] = [
    Style::plain(Color::DarkCyan),
    Style::plain(Color::DarkMagenta),
];

/// Style for a sample in the given amplitude band
pub fn class_style(class: AmplitudeClass) -> Style {
    match class {
        AmplitudeClass::Quiet => Style::with(Color::Grey, Attribute::Dim),
        AmplitudeClass::Low => Style::plain(Color::DarkGreen),
        AmplitudeClass::Medium => Style::plain(Color::DarkYellow),
        AmplitudeClass::High => Style::with(Color::DarkRed, Attribute::Bold),
    }
}

/// Bands shown in the startup color key, in order
pub const LEGEND: [(&str, AmplitudeClass); 3] = [
    ("Low", AmplitudeClass::Low),
    ("Medium", AmplitudeClass::Medium),
    ("High", AmplitudeClass::High),
];
