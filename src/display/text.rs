//! Plain-text rendering of a [`DisplayModel`], used by the CLI and for
//! terminals standing in for the screen.

use super::{DisplayModel, MenuView};
use crate::chip::Badge;
use chrono_tz::Tz;
use std::fmt::Write;

pub fn render_text(model: &DisplayModel, tz: Tz) -> String {
    let mut out = String::new();

    for warning in &model.warnings {
        let _ = writeln!(out, "! {}", warning);
    }
    if !model.warnings.is_empty() {
        out.push('\n');
    }

    for group in &model.events {
        let _ = writeln!(out, "== {} ==", group.subtitle);
        if group.events.is_empty() {
            let _ = writeln!(out, "  (no upcoming events)");
        }
        for row in &group.events {
            let _ = write!(out, "  {}{}", chips(&row.chips), row.title);
            if let Some(location) = &row.location {
                let _ = write!(out, " @ {}", location);
            }
            out.push('\n');
        }
        out.push('\n');
    }

    match &model.menu {
        MenuView::Closed { visible_from } => {
            match visible_from {
                Some(at) => {
                    let _ = writeln!(out, "Lunch menus from {}", at.with_timezone(&tz).format("%H:%M"));
                }
                None => {
                    let _ = writeln!(out, "Restaurants are closed");
                }
            }
        }
        MenuView::Carousel { active, slides, .. } => {
            if slides.is_empty() {
                let _ = writeln!(out, "No menus today");
            }
            for (index, slide) in slides.iter().enumerate() {
                let marker = if index == *active { ">" } else { " " };
                let _ = write!(out, "{} {}", marker, slide.title);
                if let Some(hours) = &slide.lunch_hours {
                    let _ = write!(out, " ({})", hours);
                }
                out.push('\n');

                for category in &slide.categories {
                    let _ = writeln!(out, "    {}", category.title);
                    for item in &category.items {
                        let climate = if item.climate_choice { " *" } else { "" };
                        let _ = writeln!(out, "      - {}{} {}", item.name, climate, chips(&item.chips).trim_end());
                    }
                }
            }
        }
    }

    if let Some(turnout) = &model.election {
        out.push('\n');
        let _ = writeln!(
            out,
            "Turnout: total {}, {} {}",
            percent(turnout.total),
            turnout.faculty_name,
            percent(turnout.faculty)
        );
    }

    out
}

fn chips(badges: &[Badge]) -> String {
    badges.iter().map(|b| format!("[{}] ", b.label)).collect()
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1} %", v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::{Badge, BadgeKind, ChipColor};
    use crate::display::{CategoryView, EventGroupView, EventRow, FoodRow, RestaurantSlide, TurnoutView};
    use crate::window::Classification;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Europe::Helsinki;

    #[test]
    fn test_render_text() {
        let model = DisplayModel {
            generated_at: Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
            revision: 1,
            warnings: vec!["Failed to load TKO-äly events, this list may be out of date.".to_string()],
            events: vec![EventGroupView {
                subtitle: "TKO-äly".to_string(),
                stale: true,
                events: vec![EventRow {
                    id: "1".to_string(),
                    title: "Sitsit".to_string(),
                    location: Some("Klusteri".to_string()),
                    registration: Classification::Countdown,
                    chips: vec![
                        Badge::new(BadgeKind::Countdown, ChipColor::Warning, "📝 01:30:00"),
                        Badge::new(BadgeKind::Date, ChipColor::Default, "18:00"),
                    ],
                }],
            }],
            menu: MenuView::Carousel {
                active: 0,
                interval_secs: 10,
                show_indicators: false,
                slides: vec![RestaurantSlide {
                    slug: "chemicum".to_string(),
                    title: "Unicafe Chemicum".to_string(),
                    lunch_hours: Some("10:30–14:00".to_string()),
                    stale: false,
                    categories: vec![CategoryView {
                        title: "EDULLISESTI".to_string(),
                        items: vec![FoodRow {
                            name: "Lentil curry".to_string(),
                            climate_choice: true,
                            chips: vec![Badge::tag("VE", ChipColor::Secondary)],
                        }],
                    }],
                }],
            },
            election: Some(TurnoutView {
                total: Some(29.94),
                faculty_name: "Matlu".to_string(),
                faculty: None,
                stale: false,
            }),
        };

        let text = render_text(&model, Helsinki);
        assert!(text.starts_with("! Failed to load TKO-äly events"));
        assert!(text.contains("  [📝 01:30:00] [18:00] Sitsit @ Klusteri\n"));
        assert!(text.contains("> Unicafe Chemicum (10:30–14:00)\n"));
        assert!(text.contains("      - Lentil curry * [VE]\n"));
        assert!(text.contains("Turnout: total 29.9 %, Matlu -\n"));
    }

    #[test]
    fn test_render_closed_menu() {
        let model = DisplayModel {
            generated_at: Utc.with_ymd_and_hms(2024, 3, 4, 5, 0, 0).unwrap(),
            revision: 0,
            warnings: Vec::new(),
            events: Vec::new(),
            menu: MenuView::Closed {
                visible_from: Some(Utc.with_ymd_and_hms(2024, 3, 4, 7, 30, 0).unwrap()),
            },
            election: None,
        };

        assert_eq!(render_text(&model, Helsinki), "Lunch menus from 09:30\n");
    }
}
