//! Static registry of the dietary filters the analysis service supports,
//! plus the presentation layer's checked/unchecked selection over it.

use crate::error::ClientError;
use crate::models::filter::Filter;

/// Every supported filter, in display order.
static FILTERS: [Filter; 6] = [
    Filter {
        id: "lactose",
        key: "lactose-intolerant",
        display_name: "Lactose Intolerant",
        icon: "lactose.png",
    },
    Filter {
        id: "vegan",
        key: "vegan",
        display_name: "Vegan",
        icon: "vegan.png",
    },
    Filter {
        id: "vegetarian",
        key: "vegetarian",
        display_name: "Vegetarian",
        icon: "vegetarian.png",
    },
    Filter {
        id: "halal",
        key: "halal",
        display_name: "Halal",
        icon: "halal.png",
    },
    Filter {
        id: "lowsugar",
        key: "low-sugar",
        display_name: "Low-Sugar",
        icon: "low-sugar.png",
    },
    Filter {
        id: "glutenfree",
        key: "gluten-free",
        display_name: "Gluten-Free",
        icon: "gluten-free.png",
    },
];

/// All supported filters in registry order.
pub fn list_filters() -> &'static [Filter] {
    &FILTERS
}

/// Find a filter by identifier.
pub fn lookup(id: &str) -> Result<&'static Filter, ClientError> {
    FILTERS
        .iter()
        .find(|filter| filter.id == id)
        .ok_or_else(|| ClientError::UnknownFilter(id.to_string()))
}

/// One registry entry with its checked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterToggle {
    pub filter: &'static Filter,
    pub checked: bool,
}

/// Checked state of every registry filter. Values are immutable: `toggle`
/// and `clear` return a new selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSelection {
    entries: Vec<FilterToggle>,
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            entries: FILTERS
                .iter()
                .map(|filter| FilterToggle {
                    filter,
                    checked: false,
                })
                .collect(),
        }
    }
}

impl FilterSelection {
    /// Every filter unchecked.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection with exactly the given identifiers checked.
    pub fn with_checked<'a, I>(ids: I) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut selection = Self::new();
        for id in ids {
            lookup(id)?;
            if !selection.is_checked(id) {
                selection = selection.toggle(id)?;
            }
        }
        Ok(selection)
    }

    /// Invert one filter's checked state, leaving order and every other
    /// entry unchanged.
    pub fn toggle(&self, id: &str) -> Result<Self, ClientError> {
        lookup(id)?;
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                if entry.filter.id == id {
                    FilterToggle {
                        filter: entry.filter,
                        checked: !entry.checked,
                    }
                } else {
                    *entry
                }
            })
            .collect();
        Ok(Self { entries })
    }

    /// Uncheck everything.
    pub fn clear(&self) -> Self {
        Self::new()
    }

    pub fn entries(&self) -> &[FilterToggle] {
        &self.entries
    }

    pub fn is_checked(&self, id: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.filter.id == id && entry.checked)
    }

    /// Checked filters in registry order.
    pub fn selected(&self) -> Vec<Filter> {
        self.entries
            .iter()
            .filter(|entry| entry.checked)
            .map(|entry| *entry.filter)
            .collect()
    }

    pub fn has_selection(&self) -> bool {
        self.entries.iter().any(|entry| entry.checked)
    }
}
