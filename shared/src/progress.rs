#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Unit {
    Items,
    Bytes,
}

pub trait ProgressBar<M>: Sync + Send {
    fn set_message(&self, message: M);

    fn set_length(&self, length: u64);

    fn inc(&self, amount: u64);

    fn finish(&self);

    fn set_unit(&self, _unit: Unit) {}

    fn reset(&self) {
        self.set_length(0);
    }
}

pub struct TerminalProgressBar {
    bar: indicatif::ProgressBar,
}

const ITEMS_TEMPLATE: &str = "{msg} {bar:40.cyan/blue} {pos}/{len}";
const BYTES_TEMPLATE: &str = "{msg} {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec})";

fn style(template: &str) -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
}

impl TerminalProgressBar {
    pub fn new() -> Self {
        let bar = indicatif::ProgressBar::new(0);
        bar.set_style(style(ITEMS_TEMPLATE));
        Self { bar }
    }
}

impl Default for TerminalProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: std::fmt::Display> ProgressBar<M> for TerminalProgressBar {
    fn set_message(&self, message: M) {
        self.bar.set_message(message.to_string());
    }

    fn set_length(&self, length: u64) {
        self.bar.set_length(length);
    }

    fn inc(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn finish(&self) {
        self.bar.finish();
    }

    fn set_unit(&self, unit: Unit) {
        match unit {
            Unit::Items => self.bar.set_style(style(ITEMS_TEMPLATE)),
            Unit::Bytes => self.bar.set_style(style(BYTES_TEMPLATE)),
        }
    }

    fn reset(&self) {
        self.bar.set_length(0);
        self.bar.set_position(0);
    }
}

/// Reports nothing.
pub struct SilentProgressBar;

impl<M> ProgressBar<M> for SilentProgressBar {
    fn set_message(&self, _message: M) {}

    fn set_length(&self, _length: u64) {}

    fn inc(&self, _amount: u64) {}

    fn finish(&self) {}
}
