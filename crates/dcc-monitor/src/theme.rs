use dcc_core::Phase;
use ratatui::style::{Color, Modifier, Style};

/// One color per phase, in `Phase::ALL` order. Hosts borrow from it too.
const PHASE_PALETTE: [Color; 9] = [
    Color::Rgb(131, 165, 152), // startup
    Color::Rgb(254, 128, 25),  // blocked
    Color::Rgb(104, 157, 106), // connect
    Color::Rgb(250, 189, 47),  // preprocess
    Color::Rgb(69, 133, 136),  // send
    Color::Rgb(184, 187, 38),  // compile
    Color::Rgb(83, 146, 190),  // receive
    Color::Rgb(142, 192, 124), // done
    Color::Rgb(146, 131, 116), // unknown
];

pub const WARN: Color = PHASE_PALETTE[1];
pub const MUTED: Color = PHASE_PALETTE[8];
pub const HEADER_STYLE: Style = Style::new()
    .fg(PHASE_PALETTE[5])
    .add_modifier(Modifier::BOLD.union(Modifier::UNDERLINED));
pub const SELECTED_STYLE: Style = Style::new()
    .fg(Color::Rgb(29, 32, 33))
    .bg(PHASE_PALETTE[3]);

const STRIPE: Color = Color::Rgb(40, 40, 40);

/// Odd rows get a faint band; even rows keep the terminal background.
pub fn stripe_style(index: usize) -> Style {
    if index % 2 == 1 {
        Style::new().bg(STRIPE)
    } else {
        Style::new()
    }
}

/// Stable per-host accent so rows from one worker read as a group.
pub fn host_style(host: &str) -> Style {
    // unknown (muted) is left out so no host looks inactive
    let accents = &PHASE_PALETTE[..PHASE_PALETTE.len() - 1];
    let mut hash: u64 = 1469598103934665603;
    for c in host.chars().flat_map(char::to_lowercase) {
        hash ^= u64::from(c);
        hash = hash.wrapping_mul(1099511628211);
    }
    let color = accents[(hash % accents.len() as u64) as usize];
    Style::new().fg(color).add_modifier(Modifier::BOLD)
}

pub fn phase_color(phase: Phase) -> Color {
    Phase::ALL
        .iter()
        .position(|candidate| *candidate == phase)
        .map(|index| PHASE_PALETTE[index])
        .unwrap_or(MUTED)
}
