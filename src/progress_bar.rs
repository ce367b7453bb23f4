use log::LevelFilter;

/// Progress indicator for a stage fan-out
pub trait Progress {
    /// Advance the progress by `n` work units
    fn inc(&self, n: u64);
    /// Signal that the stage is done
    fn finish(&self);
}

enum Bar {
    Terminal(indicatif::ProgressBar),
    Log(logbar::ProgressBar),
}

/// A progress bar drawn to the terminal, or to a log stream when
/// stderr is not attended
///
/// Only active at `info` log level. Logging is suspended while a bar
/// is drawn so the bar is not overwritten.
#[derive(Default)]
pub struct ProgressBar {
    bar: Option<Bar>,
}

impl ProgressBar {
    pub fn new(len: u64, message: &str) -> Self {
        if log::max_level().to_level() != Some(log::Level::Info) {
            return ProgressBar::default();
        }
        let bar = if console::Term::stderr().features().is_attended() {
            let bar = indicatif::ProgressBar::new(len);
            if let Ok(style) = indicatif::ProgressStyle::default_bar()
                .template("{bar:50.cyan/cyan} {msg} {pos}/{len} [{elapsed}]")
            {
                bar.set_style(style);
            }
            bar.set_message(message.to_owned());
            Bar::Terminal(bar)
        } else {
            eprintln!("{message}");
            let style = logbar::Style::new().indicator('█');
            Bar::Log(logbar::ProgressBar::with_style(len as usize, style))
        };
        log::set_max_level(LevelFilter::Off);
        ProgressBar { bar: Some(bar) }
    }
}

impl Progress for ProgressBar {
    fn inc(&self, n: u64) {
        match &self.bar {
            Some(Bar::Terminal(bar)) => bar.inc(n),
            Some(Bar::Log(bar)) => bar.inc(n as usize),
            None => {}
        }
    }

    fn finish(&self) {
        match &self.bar {
            Some(Bar::Terminal(bar)) => bar.finish(),
            Some(Bar::Log(bar)) => bar.finish(),
            None => return,
        }
        // restore logging
        log::set_max_level(LevelFilter::Info);
    }
}
