//! Recipes available to the nanobots during the current run.
//!
//! Registration is driven by [`REGISTRATION_TABLE`], which maps each
//! category to one [`RegistrationRule`]. Stat and passive effects are
//! reported back as [`Registration`] values for the caller to apply.

use crate::catalog::RecipeCatalog;
use crate::recipe::{RecipeCategory, RecipeId, RecipeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a category joins the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationRule {
    /// Add to the category list once.
    Collect,
    /// Apply the effect; nothing is listed.
    Apply,
    /// Apply the effect and list every copy.
    ApplyAndCollect,
    /// Apply and list only while under the recipe's max stack.
    ApplyUnderStack,
}

pub const REGISTRATION_TABLE: [(RecipeCategory, RegistrationRule); 10] = [
    (RecipeCategory::Ammo, RegistrationRule::Collect),
    (RecipeCategory::Armour, RegistrationRule::Collect),
    (RecipeCategory::Health, RegistrationRule::Collect),
    (RecipeCategory::Weapon, RegistrationRule::Collect),
    (RecipeCategory::Tool, RegistrationRule::Collect),
    (RecipeCategory::Shield, RegistrationRule::Collect),
    (RecipeCategory::Item, RegistrationRule::Collect),
    (RecipeCategory::Stat, RegistrationRule::Apply),
    (RecipeCategory::AmmoUpgrade, RegistrationRule::ApplyAndCollect),
    (RecipeCategory::Passive, RegistrationRule::ApplyUnderStack),
];

pub fn rule_for(category: RecipeCategory) -> RegistrationRule {
    REGISTRATION_TABLE
        .iter()
        .find(|(c, _)| *c == category)
        .map_or(RegistrationRule::Collect, |(_, rule)| *rule)
}

/// Outcome of registering one recipe.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Collected { id: RecipeId, category: RecipeCategory },
    AlreadyListed { id: RecipeId },
    /// The caller applies the stat now and, if set, every `repeat_every` seconds.
    ApplyStat { id: RecipeId, repeat_every: Option<f32> },
    ApplyAmmoUpgrade { id: RecipeId },
    ApplyPassive { id: RecipeId },
    PassiveAtMaxStack { id: RecipeId },
    Unknown { id: RecipeId },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecipes {
    lists: BTreeMap<RecipeCategory, Vec<RecipeId>>,
}

impl RunRecipes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recipes of one category in registration order.
    pub fn list(&self, category: RecipeCategory) -> &[RecipeId] {
        self.lists.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &RecipeId) -> bool {
        self.lists.values().any(|l| l.contains(id))
    }

    /// Times `id` appears in its list (passives stack).
    pub fn count(&self, id: &RecipeId) -> usize {
        self.lists.values().flatten().filter(|r| *r == id).count()
    }

    pub fn clear(&mut self) {
        self.lists.clear();
    }

    /// Register a recipe for this run. Weapons also register their ammo.
    pub fn add(&mut self, catalog: &RecipeCatalog, id: &RecipeId) -> Vec<Registration> {
        let mut out = Vec::new();
        self.add_into(catalog, id, &mut out);
        out
    }

    fn add_into(&mut self, catalog: &RecipeCatalog, id: &RecipeId, out: &mut Vec<Registration>) {
        let Some(recipe) = catalog.get(id) else {
            out.push(Registration::Unknown { id: id.clone() });
            return;
        };
        let category = recipe.category();

        match rule_for(category) {
            RegistrationRule::Collect => {
                let list = self.lists.entry(category).or_default();
                if list.contains(id) {
                    out.push(Registration::AlreadyListed { id: id.clone() });
                    return;
                }
                list.push(id.clone());
                out.push(Registration::Collected { id: id.clone(), category });

                if let RecipeKind::Weapon { ammo_recipe: Some(ammo), .. } = &recipe.kind {
                    self.add_into(catalog, ammo, out);
                }
            }
            RegistrationRule::Apply => {
                let repeat_every = match &recipe.kind {
                    RecipeKind::Stat { repeat_every, .. } => repeat_every.filter(|s| *s > 0.0),
                    _ => None,
                };
                out.push(Registration::ApplyStat { id: id.clone(), repeat_every });
            }
            RegistrationRule::ApplyAndCollect => {
                self.lists.entry(category).or_default().push(id.clone());
                out.push(Registration::ApplyAmmoUpgrade { id: id.clone() });
            }
            RegistrationRule::ApplyUnderStack => {
                let max_stack = match &recipe.kind {
                    RecipeKind::Passive { max_stack } => *max_stack as usize,
                    _ => usize::MAX,
                };
                if self.count(id) >= max_stack {
                    out.push(Registration::PassiveAtMaxStack { id: id.clone() });
                    return;
                }
                self.lists.entry(category).or_default().push(id.clone());
                out.push(Registration::ApplyPassive { id: id.clone() });
            }
        }
    }
}
