use crossterm::style::Stylize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Green,
    Red,
    Yellow,
    Cyan,
    Bold,
    Dim,
    Banner,
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    color: bool,
}

impl Palette {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.color {
            return text.to_string();
        }
        match tone {
            Tone::Green => text.green().to_string(),
            Tone::Red => text.red().to_string(),
            Tone::Yellow => text.yellow().to_string(),
            Tone::Cyan => text.cyan().to_string(),
            Tone::Bold => text.bold().to_string(),
            Tone::Dim => text.dim().to_string(),
            Tone::Banner => text.black().on_white().to_string(),
        }
    }
}
