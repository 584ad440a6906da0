//! Weekday color palettes.

use chrono::{Datelike, Local, Weekday};
use serde::Serialize;

use crate::Rgba;

/// Palette used for cards, badges and text on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyTheme {
    pub name: &'static str,
    pub primary: Rgba,
    pub background: Rgba,
    pub text: Rgba,
}

const fn theme(name: &'static str, primary: u32, background: u32, text: u32) -> DailyTheme {
    const fn c(hex: u32) -> Rgba {
        Rgba::rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }
    DailyTheme {
        name,
        primary: c(primary),
        background: c(background),
        text: c(text),
    }
}

const MONDAY: DailyTheme = theme("Pop", 0xFF6B9D, 0xFFF5E4, 0x2C3E50);
const TUESDAY: DailyTheme = theme("Retro", 0xFF6B35, 0x6A4C93, 0xFFFFFF);
const WEDNESDAY: DailyTheme = theme("Cool", 0x4A90E2, 0x1E3A8A, 0xFFFFFF);
const THURSDAY: DailyTheme = theme("Natural", 0x2ECC71, 0xECF0F1, 0x2C3E50);
const FRIDAY: DailyTheme = theme("Elegant", 0x000000, 0x1A1A1A, 0xFFFFFF);
const SATURDAY: DailyTheme = theme("Colorful", 0xE74C3C, 0xFFFFFF, 0x2C3E50);
const SUNDAY: DailyTheme = theme("Simple", 0x333333, 0xFFFFFF, 0x000000);

impl DailyTheme {
    pub fn for_weekday(day: Weekday) -> Self {
        match day {
            Weekday::Mon => MONDAY,
            Weekday::Tue => TUESDAY,
            Weekday::Wed => WEDNESDAY,
            Weekday::Thu => THURSDAY,
            Weekday::Fri => FRIDAY,
            Weekday::Sat => SATURDAY,
            Weekday::Sun => SUNDAY,
        }
    }

    /// Theme for the local calendar day.
    pub fn today() -> Self {
        Self::for_weekday(Local::now().weekday())
    }

    /// Text color that reads on top of `primary` (badges, title boxes).
    pub fn on_primary(&self) -> Rgba {
        let luma = 0.299 * self.primary.r as f32
            + 0.587 * self.primary.g as f32
            + 0.114 * self.primary.b as f32;
        if luma > 160.0 {
            Rgba::BLACK
        } else {
            Rgba::WHITE
        }
    }
}

impl Default for DailyTheme {
    fn default() -> Self {
        SUNDAY
    }
}
