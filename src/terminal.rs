use crate::colors::{self, Style};
use crate::config::VisualizerConfig;
use crate::stats::{classify, StatsEngine};
use crossterm::{
    cursor::{Hide, Show},
    event::{poll, read, Event, KeyCode, KeyModifiers},
    execute, queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::{self, stdout, Write};
use std::time::Duration;

/// Raw-mode guard for the controlling terminal.
///
/// In raw mode Ctrl+C is delivered as a key event instead of SIGINT, which
/// lets the capture loop shut the stream down in order. Restored on drop.
pub struct Terminal {
    raw: bool,
}

impl Terminal {
    /// Enter raw mode when `interactive`, otherwise leave the terminal alone
    pub fn new(interactive: bool) -> io::Result<Self> {
        if interactive {
            enable_raw_mode()?;
            execute!(stdout(), Hide)?;
        }
        Ok(Self { raw: interactive })
    }

    pub fn is_interactive(&self) -> bool {
        self.raw
    }

    /// Check for keypress (non-blocking), returns (code, modifiers)
    pub fn check_key(&self) -> io::Result<Option<(KeyCode, KeyModifiers)>> {
        if !self.raw {
            return Ok(None);
        }
        if poll(Duration::from_millis(0))? {
            if let Event::Key(key_event) = read()? {
                return Ok(Some((key_event.code, key_event.modifiers)));
            }
        }
        Ok(None)
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.raw {
            let _ = execute!(stdout(), Show);
            let _ = disable_raw_mode();
        }
    }
}

/// Writes the banner, one status line per block, and the exit message.
///
/// Lines end in `\r\n` because raw mode disables output newline translation.
pub struct LineRenderer<W: Write> {
    out: W,
    color: bool,
    display_samples: usize,
}

impl<W: Write> LineRenderer<W> {
    pub fn new(out: W, config: &VisualizerConfig) -> Self {
        Self {
            out,
            color: config.color,
            display_samples: config.display_samples,
        }
    }

    fn styled(&mut self, style: Style, text: &str) -> io::Result<()> {
        if !self.color {
            return self.out.write_all(text.as_bytes());
        }
        queue!(self.out, SetForegroundColor(style.fg))?;
        if let Some(attr) = style.attr {
            queue!(self.out, SetAttribute(attr))?;
        }
        queue!(self.out, Print(text), SetAttribute(Attribute::Reset), ResetColor)
    }

    /// Title, capture parameters, and the color key.
    /// `buffer` is `None` when the device picks its own callback size.
    pub fn banner(&mut self, sample_rate: u32, buffer: Option<usize>) -> io::Result<()> {
        self.styled(colors::TITLE, "Raw Audio Visualizer (Ctrl+C to stop)")?;
        write!(self.out, "\r\nSample Rate: {}Hz | Buffer: ", sample_rate)?;
        match buffer {
            Some(frames) => write!(self.out, "{} samples", frames)?,
            None => self.out.write_all(b"device default")?,
        }
        self.out.write_all(b"\r\nColor Key: ")?;
        for (i, (label, class)) in colors::LEGEND.iter().enumerate() {
            if i > 0 {
                self.out.write_all(b"/")?;
            }
            self.styled(colors::class_style(*class), label)?;
        }
        self.out.write_all(b" amplitude\r\n")?;
        self.out.flush()
    }

    /// Overwrite the status line with the head of `block` and the engine averages
    pub fn frame(&mut self, block: &[f32], engine: &StatsEngine) -> io::Result<()> {
        use std::fmt::Write as _;

        self.out.write_all(b"\r")?;
        let mut text = String::with_capacity(16);
        for &sample in block.iter().take(self.display_samples) {
            text.clear();
            let _ = write!(text, "{:+.3}", sample);
            self.styled(colors::class_style(classify(sample)), &text)?;
            self.out.write_all(b" ")?;
        }

        self.out.write_all(b"| ")?;
        let fields = engine.summary().fields();
        for (i, (field, style)) in fields.iter().zip(colors::SUMMARY).enumerate() {
            if i > 0 {
                self.out.write_all(b" ")?;
            }
            text.clear();
            let _ = write!(text, "{}", field);
            self.styled(style, &text)?;
        }
        self.out.flush()
    }

    pub fn farewell(&mut self) -> io::Result<()> {
        self.out.write_all(b"\r\nExiting...\r\n")?;
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}
