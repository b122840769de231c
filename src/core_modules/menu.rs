// THEORY:
// The `menu` module holds the user-facing mode toggles (aim assist on/off, trigger
// assist on/off, aim point cycling). Each item is a tagged variant rather than a
// class hierarchy. The selector never looks at an item's shape, only at the
// resolved boolean or choice it exposes.
//
// Items advance when their bound key goes *down*; releases are ignored. Changes arrive
// as a diff of per-frame key snapshots (see `input`), never as callbacks.

use crate::core_modules::config::KeyBindings;
use crate::core_modules::detection::TargetMode;
use crate::core_modules::input::{KeyChange, KeyCode};
use serde::Serialize;
use tracing::debug;

pub const AIM_ITEM: &str = "Aim";
pub const TRIGGER_ITEM: &str = "Trigger";
pub const TARGET_ITEM: &str = "Target";
pub const BOXES_ITEM: &str = "Boxes";

#[derive(Debug, Clone, PartialEq)]
pub enum MenuItemKind {
    Toggle { enabled: bool },
    Cycle { options: Vec<String>, index: usize },
}

/// The resolved value of a menu item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuValue<'a> {
    Bool(bool),
    Choice(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub name: String,
    pub key: KeyCode,
    pub kind: MenuItemKind,
}

impl MenuItem {
    pub fn toggle(name: impl Into<String>, key: KeyCode, enabled: bool) -> Self {
        Self {
            name: name.into(),
            key,
            kind: MenuItemKind::Toggle { enabled },
        }
    }

    /// A cycling item starting at its first option. `options` must not be empty.
    pub fn cycle(name: impl Into<String>, key: KeyCode, options: Vec<String>) -> Self {
        assert!(!options.is_empty(), "cycle menu item needs at least one option");
        Self {
            name: name.into(),
            key,
            kind: MenuItemKind::Cycle { options, index: 0 },
        }
    }

    pub fn current_value(&self) -> MenuValue<'_> {
        match &self.kind {
            MenuItemKind::Toggle { enabled } => MenuValue::Bool(*enabled),
            MenuItemKind::Cycle { options, index } => MenuValue::Choice(&options[*index]),
        }
    }

    /// Flips a toggle or moves a cycle to its next option, wrapping around.
    pub fn advance(&mut self) {
        match &mut self.kind {
            MenuItemKind::Toggle { enabled } => *enabled = !*enabled,
            MenuItemKind::Cycle { options, index } => *index = (*index + 1) % options.len(),
        }
    }

    /// Display label, e.g. `"Aim On"` or `"Target head"`.
    pub fn label(&self) -> String {
        match self.current_value() {
            MenuValue::Bool(true) => format!("{} On", self.name),
            MenuValue::Bool(false) => format!("{} Off", self.name),
            MenuValue::Choice(choice) => format!("{} {choice}", self.name),
        }
    }
}

/// A read-only view of one menu item for the overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuEntry {
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Menu {
    items: Vec<MenuItem>,
}

impl Menu {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard targeting menu: aim on, trigger on, aim point cycle, trigger boxes off.
    pub fn from_bindings(bindings: &KeyBindings) -> Self {
        let mut menu = Menu::new();
        menu.add_item(MenuItem::toggle(AIM_ITEM, bindings.aim_toggle.clone(), true));
        menu.add_item(MenuItem::toggle(TRIGGER_ITEM, bindings.trigger_toggle.clone(), true));
        menu.add_item(MenuItem::cycle(
            TARGET_ITEM,
            bindings.mode_cycle.clone(),
            TargetMode::ALL.iter().map(|m| m.as_str().to_string()).collect(),
        ));
        menu.add_item(MenuItem::toggle(BOXES_ITEM, bindings.boxes_toggle.clone(), false));
        menu
    }

    /// Adds an item, replacing any existing item of the same name.
    pub fn add_item(&mut self, item: MenuItem) {
        match self.items.iter_mut().find(|i| i.name == item.name) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn get(&self, name: &str) -> Option<&MenuItem> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Advances every item whose key was pressed in `changes`.
    pub fn apply(&mut self, changes: &[KeyChange]) {
        for change in changes.iter().filter(|c| c.pressed) {
            for item in self.items.iter_mut().filter(|i| i.key == change.key) {
                item.advance();
                debug!(item = %item.name, label = %item.label(), "menu item changed");
            }
        }
    }

    /// False for unknown items and for cycle items.
    pub fn is_enabled(&self, name: &str) -> bool {
        matches!(self.get(name).map(MenuItem::current_value), Some(MenuValue::Bool(true)))
    }

    pub fn choice(&self, name: &str) -> Option<&str> {
        match self.get(name)?.current_value() {
            MenuValue::Choice(choice) => Some(choice),
            MenuValue::Bool(_) => None,
        }
    }

    /// The aim point chosen by the target cycle item, or centre if it is absent.
    pub fn target_mode(&self) -> TargetMode {
        self.choice(TARGET_ITEM)
            .and_then(|c| c.parse().ok())
            .unwrap_or_default()
    }

    pub fn entries(&self) -> Vec<MenuEntry> {
        self.items
            .iter()
            .map(|item| MenuEntry {
                label: item.label(),
                active: !matches!(item.current_value(), MenuValue::Bool(false)),
            })
            .collect()
    }
}
