//! The recipe registry, loaded once per process.
//!
//! Recipes keep their load order so that seeded offer draws are
//! reproducible. Per-run state sits beside each recipe and is wiped by
//! [`RecipeCatalog::reset_run_state`] at the start of every run.

use crate::recipe::{Recipe, RecipeCategory, RecipeId, RecipeKind, RecipeRunState};
use std::collections::HashMap;

/// What happened while loading a catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Ids seen more than once; every copy after the first was skipped.
    pub duplicates: Vec<RecipeId>,
    /// Weapons whose ammo recipe is not in the catalog.
    pub missing_ammo: Vec<RecipeId>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.missing_ammo.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecipeCatalog {
    recipes: Vec<Recipe>,
    run_state: Vec<RecipeRunState>,
    index: HashMap<RecipeId, usize>,
}

impl RecipeCatalog {
    /// Build the registry. Duplicate ids are logged and skipped.
    pub fn load(recipes: impl IntoIterator<Item = Recipe>) -> (Self, LoadReport) {
        let mut catalog = Self::default();
        let mut report = LoadReport::default();

        for recipe in recipes {
            if let Some(&existing) = catalog.index.get(&recipe.id) {
                log::error!(
                    "duplicate recipe id {}: '{}' conflicts with '{}', skipping",
                    recipe.id,
                    recipe.display_name,
                    catalog.recipes[existing].display_name
                );
                report.duplicates.push(recipe.id);
                continue;
            }
            catalog.index.insert(recipe.id.clone(), catalog.recipes.len());
            catalog.recipes.push(recipe);
            catalog.run_state.push(RecipeRunState::default());
        }

        for recipe in &catalog.recipes {
            if let RecipeKind::Weapon { ammo_recipe: Some(ammo), .. } = &recipe.kind {
                if !catalog.contains(ammo) {
                    log::error!("weapon recipe {} references unknown ammo recipe {}", recipe.id, ammo);
                    report.missing_ammo.push(recipe.id.clone());
                }
            }
        }

        report.loaded = catalog.recipes.len();
        log::info!(
            "loaded {} recipes ({} power-ups)",
            report.loaded,
            catalog.power_ups().count()
        );
        (catalog, report)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn contains(&self, id: &RecipeId) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a recipe, logging an error for unknown ids.
    pub fn get(&self, id: &RecipeId) -> Option<&Recipe> {
        match self.index.get(id) {
            Some(&i) => Some(&self.recipes[i]),
            None => {
                log::error!("no recipe found for id {id}");
                None
            }
        }
    }

    /// Look up a recipe without logging.
    pub fn find(&self, id: &RecipeId) -> Option<&Recipe> {
        self.index.get(id).map(|&i| &self.recipes[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter()
    }

    pub fn power_ups(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter().filter(|r| r.is_power_up)
    }

    pub fn of_category(&self, category: RecipeCategory) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter().filter(move |r| r.category() == category)
    }

    /// Per-run state; unknown ids read as cleared state.
    pub fn run_state(&self, id: &RecipeId) -> &RecipeRunState {
        static CLEAR: RecipeRunState = RecipeRunState {
            builds: 0,
            applications: 0,
            accumulated_modifier: 0.0,
        };
        self.index.get(id).map_or(&CLEAR, |&i| &self.run_state[i])
    }

    pub fn run_state_mut(&mut self, id: &RecipeId) -> Option<&mut RecipeRunState> {
        let i = *self.index.get(id)?;
        self.run_state.get_mut(i)
    }

    /// Reset a single recipe's per-run state.
    pub fn reset(&mut self, id: &RecipeId) {
        if let Some(state) = self.run_state_mut(id) {
            state.reset();
        }
    }

    /// Clear every recipe's per-run state. The recipes themselves stay.
    pub fn reset_run_state(&mut self) {
        self.run_state.iter_mut().for_each(RecipeRunState::reset);
    }
}
