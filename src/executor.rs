//! Action execution against the edited page
//!
//! The orchestrator only sees the [`ActionExecutor`] contract. [`PageEditor`]
//! is the in-memory page model shipped with the crate: every action mutates
//! it and answers with a short spoken confirmation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rand::Rng;
use serde::Serialize;

use crate::intent::{Action, Intent};

/// Outcome of applying one intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Execution {
    /// Text shown and spoken back to the user
    pub confirmation: String,
    /// Whether visible state was mutated
    pub changed: bool,
}

impl Execution {
    fn changed(confirmation: impl Into<String>) -> Self {
        Self {
            confirmation: confirmation.into(),
            changed: true,
        }
    }

    fn unchanged(confirmation: impl Into<String>) -> Self {
        Self {
            confirmation: confirmation.into(),
            changed: false,
        }
    }
}

/// Applies a structured intent to visible state
///
/// Implementations must not fail: internal problems are reported through
/// the confirmation text. `Action::Unknown` is never sent by the
/// orchestrator.
pub trait ActionExecutor: Send + Sync {
    fn apply(&self, intent: &Intent) -> Execution;
}

/// Light or dark page mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
}

/// Accent colour palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Accent {
    Blue,
    Green,
    Purple,
}

impl Accent {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "blue" => Some(Self::Blue),
            "green" => Some(Self::Green),
            "purple" => Some(Self::Purple),
            _ => None,
        }
    }

    /// `(primary, secondary, accent)` colours
    #[must_use]
    pub const fn palette(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Blue => ("#3B82F6", "#60A5FA", "#1E40AF"),
            Self::Green => ("#10B981", "#34D399", "#059669"),
            Self::Purple => ("#8B5CF6", "#A78BFA", "#6D28D9"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Theme {
    pub mode: ThemeMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<Accent>,
}

/// Page backdrop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backdrop {
    #[default]
    Default,
    Dark,
    Light,
    Blue,
    Green,
    Purple,
}

/// Part of the page the viewport is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollPosition {
    #[default]
    Top,
    Features,
    Stats,
    Bottom,
}

/// Which optional sections are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sections {
    pub nav: bool,
    pub stats: bool,
    pub features: bool,
}

impl Default for Sections {
    fn default() -> Self {
        Self {
            nav: true,
            stats: true,
            features: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureCard {
    pub icon: String,
    pub title: String,
    pub description: String,
}

impl FeatureCard {
    fn from_catalogue(entry: &(&str, &str, &str)) -> Self {
        Self {
            icon: entry.0.to_string(),
            title: entry.1.to_string(),
            description: entry.2.to_string(),
        }
    }
}

/// Cards offered by "add a feature"
pub const FEATURE_CATALOGUE: [(&str, &str, &str); 6] = [
    ("✨", "AI-Powered", "Leverage cutting-edge AI technology to enhance your workflow"),
    ("🔥", "Real-time Sync", "Keep your data synchronized across all devices in real-time"),
    ("💡", "Analytics", "Get detailed insights and analytics about your website performance"),
    ("⭐", "Collaboration", "Work together with your team in real-time collaboration"),
    ("🎯", "Automation", "Automate repetitive tasks and focus on what matters"),
    ("🏆", "Integration", "Connect with your favorite tools and services seamlessly"),
];

/// Snapshot of the edited page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub title: String,
    pub subtitle: String,
    pub logo: String,
    pub badge: String,
    pub primary_button: String,
    pub secondary_button: String,
    pub cta: String,
    pub stats: BTreeMap<String, String>,
    pub title_gradient: bool,
    pub background: Backdrop,
    pub features: Vec<FeatureCard>,
    /// Animations played so far
    pub animations: u32,
    pub sections: Sections,
    pub scroll: ScrollPosition,
    pub theme: Theme,
}

impl Default for Page {
    fn default() -> Self {
        let stats = [("users", "10K+"), ("uptime", "99.9%"), ("support", "24/7")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            title: "Build Something Amazing".to_string(),
            subtitle: "Edit this page with nothing but your voice".to_string(),
            logo: "Sentauri".to_string(),
            badge: "Now with voice editing".to_string(),
            primary_button: "Get Started".to_string(),
            secondary_button: "Learn More".to_string(),
            cta: "Ready to get started?".to_string(),
            stats,
            title_gradient: false,
            background: Backdrop::Default,
            features: FEATURE_CATALOGUE[..3].iter().map(FeatureCard::from_catalogue).collect(),
            animations: 0,
            sections: Sections::default(),
            scroll: ScrollPosition::Top,
            theme: Theme::default(),
        }
    }
}

const HELP_TEXT: &str = "Hello! I can help you edit this website. Try commands like 'Change the title to...', 'Add a gradient', 'Change the logo to...', 'Hide the stats', 'Switch to light theme', 'Apply blue theme', or 'Scroll to features'";

/// In-memory page model driven by intents
#[derive(Debug, Default)]
pub struct PageEditor {
    page: Mutex<Page>,
}

impl PageEditor {
    #[must_use]
    pub fn new(page: Page) -> Self {
        Self {
            page: Mutex::new(page),
        }
    }

    /// Current page state
    #[must_use]
    pub fn snapshot(&self) -> Page {
        self.page.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ActionExecutor for PageEditor {
    fn apply(&self, intent: &Intent) -> Execution {
        let mut page = self.page.lock().unwrap_or_else(|e| e.into_inner());
        let value = intent.value.as_deref().map(str::trim).unwrap_or_default();
        let target = intent.target.as_deref().unwrap_or_default();
        let modifier = intent.modifier.as_deref().unwrap_or_default();

        let execution = match intent.action {
            Action::Title => {
                page.title = value.to_string();
                Execution::changed(format!("I've updated the title to \"{value}\""))
            }
            Action::Subtitle => {
                page.subtitle = value.to_string();
                Execution::changed(format!("Perfect! The subtitle now reads \"{value}\""))
            }
            Action::Logo => {
                page.logo = value.to_string();
                Execution::changed(format!("The brand name is now \"{value}\""))
            }
            Action::Badge => {
                page.badge = value.to_string();
                Execution::changed(format!("Badge updated to \"{value}\""))
            }
            Action::Cta => {
                page.cta = value.to_string();
                Execution::changed(format!("Call-to-action updated to \"{value}\""))
            }
            Action::Button => set_button(&mut page, target, value),
            Action::Stat => set_stat(&mut page, target, value),
            Action::Gradient => set_gradient(&mut page, modifier),
            Action::Background => set_background(&mut page, modifier),
            Action::FeatureAdd => {
                let index = rand::thread_rng().gen_range(0..FEATURE_CATALOGUE.len());
                page.features.push(FeatureCard::from_catalogue(&FEATURE_CATALOGUE[index]));
                Execution::changed("I've added a new feature card for you")
            }
            Action::FeatureRemove => {
                if page.features.len() > 1 {
                    page.features.pop();
                    Execution::changed("I've removed the last feature card")
                } else {
                    Execution::unchanged("There's only one feature card left, so I kept it")
                }
            }
            Action::Animate => {
                page.animations = page.animations.saturating_add(1);
                Execution::changed("Here's a smooth animation for your page")
            }
            Action::Visibility => set_visibility(&mut page, target, modifier),
            Action::Scroll => scroll(&mut page, target),
            Action::Theme => set_theme(&mut page, modifier),
            Action::Help => Execution::unchanged(HELP_TEXT),
            Action::Unknown => Execution::unchanged(intent.clarification()),
        };

        drop(page);
        tracing::debug!(action = %intent.action, changed = execution.changed, "intent applied");
        execution
    }
}

fn set_button(page: &mut Page, target: &str, value: &str) -> Execution {
    if target == "secondary" {
        page.secondary_button = value.to_string();
        Execution::changed(format!("Secondary button updated to \"{value}\""))
    } else {
        page.primary_button = value.to_string();
        Execution::changed(format!("Primary button now says \"{value}\""))
    }
}

fn set_stat(page: &mut Page, target: &str, value: &str) -> Execution {
    page.stats.insert(target.to_string(), value.to_string());
    if target == "users" {
        Execution::changed(format!("User count updated to {value}"))
    } else {
        Execution::changed(format!("The {target} stat is now {value}"))
    }
}

fn set_gradient(page: &mut Page, modifier: &str) -> Execution {
    let enable = modifier != "remove";
    let changed = page.title_gradient != enable;
    page.title_gradient = enable;
    let confirmation = if enable {
        "I've applied a beautiful gradient effect to the title"
    } else {
        "I've removed the gradient effect"
    };
    Execution {
        confirmation: confirmation.to_string(),
        changed,
    }
}

fn set_background(page: &mut Page, modifier: &str) -> Execution {
    let (backdrop, confirmation) = match modifier {
        "dark" => (Backdrop::Dark, "I've made the background darker for you"),
        "light" => (Backdrop::Light, "I've lightened the background"),
        "blue" => (Backdrop::Blue, "I've added a blue tint to the background"),
        "green" => (Backdrop::Green, "I've added a green tint to the background"),
        "purple" => (Backdrop::Purple, "I've added a purple tint to the background"),
        _ => {
            return Execution::unchanged(
                "I can make the background dark, light, blue, green or purple",
            );
        }
    };
    let changed = page.background != backdrop;
    page.background = backdrop;
    Execution {
        confirmation: confirmation.to_string(),
        changed,
    }
}

fn set_visibility(page: &mut Page, target: &str, modifier: &str) -> Execution {
    let (flag, label) = match target {
        "nav" => (&mut page.sections.nav, "navigation bar"),
        "stats" => (&mut page.sections.stats, "statistics section"),
        "features" => (&mut page.sections.features, "features section"),
        _ => return Execution::unchanged("I can hide or show the navigation, stats or features"),
    };

    let visible = match modifier {
        "hide" => false,
        "show" => true,
        _ => !*flag,
    };
    let changed = *flag != visible;
    *flag = visible;

    let confirmation = if visible {
        format!("The {label} is now visible")
    } else {
        format!("I've hidden the {label}")
    };
    Execution {
        confirmation,
        changed,
    }
}

fn scroll(page: &mut Page, target: &str) -> Execution {
    let (position, confirmation) = match target {
        "top" => (ScrollPosition::Top, "Scrolling to the top of the page"),
        "bottom" => (ScrollPosition::Bottom, "Scrolling to the bottom of the page"),
        "features" => (ScrollPosition::Features, "Navigating to the features section"),
        "stats" => (ScrollPosition::Stats, "Showing the statistics section"),
        _ => return Execution::unchanged("I can scroll to the top, bottom, features or stats"),
    };
    let changed = page.scroll != position;
    page.scroll = position;
    Execution {
        confirmation: confirmation.to_string(),
        changed,
    }
}

fn set_theme(page: &mut Page, modifier: &str) -> Execution {
    let mode = match modifier {
        "light" => Some(ThemeMode::Light),
        "dark" => Some(ThemeMode::Dark),
        _ => None,
    };

    if let Some(mode) = mode {
        if page.theme.mode == mode {
            return Execution::unchanged(match mode {
                ThemeMode::Light => "Already using light theme",
                ThemeMode::Dark => "Already using dark theme",
            });
        }
        page.theme.mode = mode;
        return Execution::changed(match mode {
            ThemeMode::Light => "I've switched to light theme for better daytime viewing",
            ThemeMode::Dark => {
                "I've switched to dark theme for a more comfortable viewing experience"
            }
        });
    }

    if modifier == "toggle" {
        page.theme.mode = match page.theme.mode {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        };
        return Execution::changed(match page.theme.mode {
            ThemeMode::Light => "Switched to light theme",
            ThemeMode::Dark => "Switched to dark theme",
        });
    }

    let Some(accent) = Accent::parse(modifier) else {
        return Execution::unchanged(
            "I can switch to light or dark mode, or apply a blue, green or purple theme",
        );
    };
    let changed = page.theme.accent != Some(accent);
    page.theme.accent = Some(accent);
    let confirmation = match accent {
        Accent::Blue => "I've applied a blue color theme",
        Accent::Green => "I've switched to a green color theme",
        Accent::Purple => "I've applied a purple color theme",
    };
    Execution {
        confirmation: confirmation.to_string(),
        changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme(modifier: &str) -> Intent {
        Intent::new(Action::Theme).with_modifier(modifier)
    }

    #[test]
    fn test_title_confirmation_quotes_value() {
        let editor = PageEditor::default();
        let execution = editor.apply(&Intent::new(Action::Title).with_value("Hello World"));
        assert_eq!(execution.confirmation, "I've updated the title to \"Hello World\"");
        assert!(execution.changed);
        assert_eq!(editor.snapshot().title, "Hello World");
    }

    #[test]
    fn test_light_theme_is_idempotent() {
        let editor = PageEditor::default();
        assert_eq!(editor.snapshot().theme.mode, ThemeMode::Dark);

        let first = editor.apply(&theme("light"));
        assert!(first.changed);
        assert_eq!(editor.snapshot().theme.mode, ThemeMode::Light);

        let before = editor.snapshot();
        let second = editor.apply(&theme("light"));
        assert!(!second.changed);
        assert_eq!(second.confirmation, "Already using light theme");
        assert_eq!(editor.snapshot(), before);
    }

    #[test]
    fn test_toggle_flips_mode() {
        let editor = PageEditor::default();
        assert_eq!(editor.apply(&theme("toggle")).confirmation, "Switched to light theme");
        assert_eq!(editor.apply(&theme("toggle")).confirmation, "Switched to dark theme");
    }

    #[test]
    fn test_accent_palette() {
        let editor = PageEditor::default();
        editor.apply(&theme("green"));
        let accent = editor.snapshot().theme.accent.unwrap();
        assert_eq!(accent, Accent::Green);
        assert_eq!(accent.palette().0, "#10B981");
    }

    #[test]
    fn test_keeps_last_feature_card() {
        let editor = PageEditor::default();
        let remove = Intent::new(Action::FeatureRemove);
        for _ in 0..5 {
            editor.apply(&remove);
        }
        assert_eq!(editor.snapshot().features.len(), 1);
        assert!(!editor.apply(&remove).changed);
    }

    #[test]
    fn test_added_feature_comes_from_catalogue() {
        let editor = PageEditor::default();
        let before = editor.snapshot().features.len();
        editor.apply(&Intent::new(Action::FeatureAdd));
        let page = editor.snapshot();
        assert_eq!(page.features.len(), before + 1);
        let added = page.features.last().unwrap();
        assert!(FEATURE_CATALOGUE.iter().any(|(_, title, _)| *title == added.title));
    }

    #[test]
    fn test_hide_and_show_sections() {
        let editor = PageEditor::default();
        let hide = Intent::new(Action::Visibility)
            .with_target("stats")
            .with_modifier("hide");
        assert_eq!(editor.apply(&hide).confirmation, "I've hidden the statistics section");
        assert!(!editor.snapshot().sections.stats);
        assert!(!editor.apply(&hide).changed);

        let show = Intent::new(Action::Visibility)
            .with_target("nav")
            .with_modifier("show");
        assert_eq!(editor.apply(&show).confirmation, "The navigation bar is now visible");
    }

    #[test]
    fn test_buttons_and_stats() {
        let editor = PageEditor::default();
        let secondary = Intent::new(Action::Button)
            .with_target("secondary")
            .with_value("Docs");
        editor.apply(&secondary);
        let stat = Intent::new(Action::Stat).with_target("users").with_value("50K+");
        assert_eq!(editor.apply(&stat).confirmation, "User count updated to 50K+");

        let page = editor.snapshot();
        assert_eq!(page.secondary_button, "Docs");
        assert_eq!(page.primary_button, "Get Started");
        assert_eq!(page.stats["users"], "50K+");
    }

    #[test]
    fn test_unrecognized_modifiers_do_not_mutate() {
        let editor = PageEditor::default();
        let before = editor.snapshot();
        editor.apply(&Intent::new(Action::Background).with_modifier("plaid"));
        editor.apply(&Intent::new(Action::Scroll).with_target("sideways"));
        editor.apply(&Intent::new(Action::Help));
        assert_eq!(editor.snapshot(), before);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(PageEditor::default().snapshot()).unwrap();
        assert_eq!(json["theme"]["mode"], "dark");
        assert_eq!(json["sections"]["nav"], true);
        assert!(json["theme"].get("accent").is_none());
    }
}
