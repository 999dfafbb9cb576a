//! Registry of loaded series
//!
//! Owns a shared handle to every series by name and groups the names by
//! category (a manual-log panel or an integration such as "Oura Ring").

use std::collections::BTreeMap;
use std::rc::Rc;

use super::error::{SeriesError, SeriesResult};
use super::pair::{shared, SharedSeries};
use super::series::Series;

#[derive(Debug, Default)]
pub struct SeriesRegistry {
    series: BTreeMap<String, SharedSeries>,
    /// Category name -> series names, in registration order
    categories: BTreeMap<String, Vec<String>>,
}

impl SeriesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a series, rejecting a name that is already taken
    pub fn register(&mut self, series: Series) -> SeriesResult<SharedSeries> {
        let name = series.name().to_string();
        if self.series.contains_key(&name) {
            return Err(SeriesError::DuplicateName(name));
        }
        let handle = shared(series);
        self.series.insert(name, Rc::clone(&handle));
        Ok(handle)
    }

    /// Register a series and file it under `category`
    pub fn add_to_category(&mut self, category: &str, series: Series) -> SeriesResult<SharedSeries> {
        let name = series.name().to_string();
        let handle = self.register(series)?;
        self.categories
            .entry(category.to_string())
            .or_default()
            .push(name);
        Ok(handle)
    }

    pub fn get(&self, name: &str) -> SeriesResult<SharedSeries> {
        self.series
            .get(name)
            .cloned()
            .ok_or_else(|| SeriesError::NotFound(name.to_string()))
    }

    /// Remove a series from the registry and from its category
    pub fn remove(&mut self, name: &str) -> Option<SharedSeries> {
        let removed = self.series.remove(name)?;
        for names in self.categories.values_mut() {
            names.retain(|n| n != name);
        }
        self.categories.retain(|_, names| !names.is_empty());
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// All series names, sorted
    pub fn names(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }

    pub fn all(&self) -> Vec<SharedSeries> {
        self.series.values().cloned().collect()
    }

    /// Series filed under `category`, in registration order
    pub fn category(&self, category: &str) -> Vec<SharedSeries> {
        self.categories
            .get(category)
            .map(|names| names.iter().filter_map(|n| self.series.get(n).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn categories(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    /// Series with enough processed points for analysis
    pub fn analyzable(&self) -> Vec<SharedSeries> {
        self.series
            .values()
            .filter(|s| s.borrow().is_analyzable())
            .cloned()
            .collect()
    }

    pub fn analyzable_in(&self, category: &str) -> Vec<SharedSeries> {
        self.category(category)
            .into_iter()
            .filter(|s| s.borrow().is_analyzable())
            .collect()
    }
}
