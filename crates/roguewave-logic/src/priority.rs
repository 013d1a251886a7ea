//! The nanobot build waterfall.
//!
//! Steps are tried strictly in [`BUILD_PRIORITY`] order and the first step
//! that yields a buildable recipe wins. A recipe is buildable when the
//! balance covers its build cost and its own `should_build` holds.

use crate::catalog::RecipeCatalog;
use crate::recipe::{PlayerSnapshot, Recipe, RecipeCategory, RecipeId, RecipeKind};
use crate::run_recipes::RunRecipes;
use std::collections::BTreeSet;

/// One rung of the waterfall. Thresholds are fractions of capacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuildStep {
    Ammo(f32),
    Health(f32),
    Shield(f32),
    Armour(f32),
    Weapon,
    Item,
}

pub const BUILD_PRIORITY: [BuildStep; 11] = [
    BuildStep::Ammo(0.2),
    BuildStep::Health(0.7),
    BuildStep::Shield(0.4),
    BuildStep::Armour(0.2),
    BuildStep::Weapon,
    BuildStep::Health(0.85),
    BuildStep::Ammo(0.9),
    BuildStep::Item,
    BuildStep::Shield(0.8),
    BuildStep::Armour(0.9),
    BuildStep::Health(1.0),
];

/// Everything the waterfall reads.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub catalog: &'a RecipeCatalog,
    pub run: &'a RunRecipes,
    pub player: &'a PlayerSnapshot,
    pub resources: u32,
    /// Persisted weapon build order.
    pub build_order: &'a [RecipeId],
    /// Recipes acquired during this run, in acquisition order.
    pub acquired_this_run: &'a [RecipeId],
    pub permanently_owned: &'a BTreeSet<RecipeId>,
    /// False while generic items are rate limited.
    pub item_ready: bool,
}

/// A step and the recipe it chose.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildChoice {
    pub step: BuildStep,
    pub recipe: RecipeId,
}

impl<'a> BuildContext<'a> {
    fn recipes(&self, category: RecipeCategory) -> impl Iterator<Item = &'a Recipe> + 'a {
        let (catalog, run) = (self.catalog, self.run);
        run.list(category)
            .iter()
            .filter_map(move |id| catalog.get(id))
    }

    fn affordable(&self, recipe: &Recipe) -> bool {
        self.resources >= recipe.build_cost
    }

    fn buildable(&self, recipe: &Recipe) -> bool {
        self.affordable(recipe) && recipe.should_build(self.player, self.catalog.run_state(&recipe.id))
    }
}

/// Walk the waterfall and return the first buildable choice.
pub fn choose_build(ctx: &BuildContext<'_>) -> Option<BuildChoice> {
    BUILD_PRIORITY.iter().find_map(|step| {
        try_step(ctx, *step).map(|recipe| BuildChoice { step: *step, recipe })
    })
}

/// Evaluate a single step.
pub fn try_step(ctx: &BuildContext<'_>, step: BuildStep) -> Option<RecipeId> {
    match step {
        BuildStep::Ammo(threshold) => try_ammo(ctx, threshold),
        BuildStep::Health(threshold) => try_health(ctx, threshold),
        BuildStep::Shield(threshold) => try_gauge(ctx, RecipeCategory::Shield, threshold),
        BuildStep::Armour(threshold) => try_gauge(ctx, RecipeCategory::Armour, threshold),
        BuildStep::Weapon => try_weapon(ctx),
        BuildStep::Item => try_item(ctx),
    }
}

/// Best health recipe: the largest heal share capped at 1, cheaper buy
/// cost on ties. Nothing is built while health is at or above `threshold`.
fn try_health(ctx: &BuildContext<'_>, threshold: f32) -> Option<RecipeId> {
    let mut chosen: Option<(&Recipe, f32)> = None;
    for recipe in ctx.recipes(RecipeCategory::Health) {
        if recipe.has_amount(ctx.player, threshold) {
            return None;
        }
        if !ctx.buildable(recipe) {
            continue;
        }
        let amount = recipe.heal_fraction(ctx.player).min(1.0);
        let better = match chosen {
            None => true,
            Some((best, best_amount)) => {
                amount > best_amount || (amount == best_amount && recipe.buy_cost < best.buy_cost)
            }
        };
        if better {
            chosen = Some((recipe, amount));
        }
    }
    chosen.map(|(r, _)| r.id.clone())
}

fn try_gauge(ctx: &BuildContext<'_>, category: RecipeCategory, threshold: f32) -> Option<RecipeId> {
    ctx.recipes(category)
        .filter(|r| !r.has_amount(ctx.player, threshold))
        .find(|r| ctx.buildable(r))
        .map(|r| r.id.clone())
}

fn ammo_recipe_for<'a>(
    ctx: &BuildContext<'a>,
    ammo_type: &str,
    held: u32,
    threshold: Option<f32>,
) -> Option<&'a Recipe> {
    ctx.recipes(RecipeCategory::Ammo).find(|r| match &r.kind {
        RecipeKind::Ammo { ammo_type: t, max_quantity, .. } => {
            t == ammo_type
                && threshold.map_or(true, |f| held as f32 <= *max_quantity as f32 * f)
                && ctx.buildable(r)
        }
        _ => false,
    })
}

/// Ammo for the wielded weapon when at or below `threshold`, else ammo for
/// any other carried weapon that is completely empty.
fn try_ammo(ctx: &BuildContext<'_>, threshold: f32) -> Option<RecipeId> {
    let selected = ctx.player.selected_weapon;
    if let Some(ammo_type) = ctx.player.selected().and_then(|w| w.ammo_type.as_deref()) {
        let held = ctx.player.ammo_of(ammo_type);
        if let Some(r) = ammo_recipe_for(ctx, ammo_type, held, Some(threshold)) {
            return Some(r.id.clone());
        }
    }

    ctx.player
        .weapons
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != selected)
        .filter_map(|(_, w)| w.ammo_type.as_deref())
        .filter(|t| ctx.player.ammo_of(t) == 0)
        .find_map(|t| ammo_recipe_for(ctx, t, 0, None))
        .map(|r| r.id.clone())
}

/// Build-order weapons first, then weapons picked up this run that the
/// profile does not own yet.
fn try_weapon(ctx: &BuildContext<'_>) -> Option<RecipeId> {
    let is_weapon = |r: &&Recipe| r.category() == RecipeCategory::Weapon;

    let ordered = ctx
        .build_order
        .iter()
        .filter_map(|id| ctx.catalog.get(id))
        .filter(is_weapon)
        .find(|r| ctx.buildable(r));
    if let Some(r) = ordered {
        return Some(r.id.clone());
    }

    ctx.acquired_this_run
        .iter()
        .filter(|id| !ctx.permanently_owned.contains(*id))
        .filter_map(|id| ctx.catalog.get(id))
        .filter(is_weapon)
        .find(|r| ctx.buildable(r))
        .map(|r| r.id.clone())
}

fn try_item(ctx: &BuildContext<'_>) -> Option<RecipeId> {
    if !ctx.item_ready {
        return None;
    }
    ctx.recipes(RecipeCategory::Item)
        .find(|r| ctx.buildable(r))
        .map(|r| r.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{Gauge, OwnedWeapon, RecipeClips};

    fn recipe(id: &str, kind: RecipeKind, build_cost: u32, buy_cost: u32) -> Recipe {
        Recipe {
            id: RecipeId::new(id),
            display_name: id.into(),
            kind,
            build_cost,
            buy_cost,
            time_to_build: 1.0,
            level: 0,
            weight: 1.0,
            is_power_up: false,
            available: true,
            unique: false,
            clips: RecipeClips::default(),
        }
    }

    struct Fixture {
        catalog: RecipeCatalog,
        run: RunRecipes,
        player: PlayerSnapshot,
        owned: BTreeSet<RecipeId>,
        order: Vec<RecipeId>,
        acquired: Vec<RecipeId>,
    }

    impl Fixture {
        fn new(recipes: Vec<Recipe>) -> Self {
            let ids: Vec<RecipeId> = recipes.iter().map(|r| r.id.clone()).collect();
            let (catalog, _) = RecipeCatalog::load(recipes);
            let mut run = RunRecipes::new();
            for id in &ids {
                run.add(&catalog, id);
            }
            Self {
                catalog,
                run,
                player: PlayerSnapshot {
                    health: Gauge::full(100.0),
                    shield: Gauge::full(50.0),
                    armour: Gauge::full(50.0),
                    ..PlayerSnapshot::default()
                },
                owned: BTreeSet::new(),
                order: Vec::new(),
                acquired: Vec::new(),
            }
        }

        fn ctx(&self, resources: u32) -> BuildContext<'_> {
            BuildContext {
                catalog: &self.catalog,
                run: &self.run,
                player: &self.player,
                resources,
                build_order: &self.order,
                acquired_this_run: &self.acquired,
                permanently_owned: &self.owned,
                item_ready: true,
            }
        }
    }

    fn health(id: &str, heal: f32, buy: u32) -> Recipe {
        recipe(id, RecipeKind::Health { heal_amount: heal }, 20, buy)
    }

    // --- health ---

    #[test]
    fn test_larger_heal_share_wins() {
        let mut f = Fixture::new(vec![health("small", 12.0, 10), health("big", 20.0, 10)]);
        f.player.health = Gauge::new(60.0, 100.0);
        // small heals 0.3 of the missing 40, big heals 0.5.
        let choice = choose_build(&f.ctx(100));
        assert_eq!(
            choice,
            Some(BuildChoice { step: BuildStep::Health(0.7), recipe: RecipeId::new("big") })
        );
    }

    #[test]
    fn test_heal_tie_goes_to_cheaper_buy_cost() {
        let mut f = Fixture::new(vec![health("pricey", 95.0, 90), health("cheap", 90.0, 30)]);
        f.player.health = Gauge::new(10.0, 100.0);
        // Both cap at a full share.
        let choice = try_step(&f.ctx(100), BuildStep::Health(0.7));
        assert_eq!(choice, Some(RecipeId::new("cheap")));
    }

    #[test]
    fn test_healthy_enough_aborts_health_step() {
        let mut f = Fixture::new(vec![health("small", 12.0, 10)]);
        f.player.health = Gauge::new(75.0, 100.0);
        assert_eq!(try_step(&f.ctx(100), BuildStep::Health(0.7)), None);
        assert_eq!(
            try_step(&f.ctx(100), BuildStep::Health(0.85)),
            Some(RecipeId::new("small"))
        );
    }

    // --- ammo ---

    fn armed_fixture() -> Fixture {
        let mut f = Fixture::new(vec![
            recipe("9mm", RecipeKind::Ammo { ammo_type: "9mm".into(), quantity: 30, max_quantity: 100 }, 10, 10),
            recipe("shells", RecipeKind::Ammo { ammo_type: "shell".into(), quantity: 8, max_quantity: 40 }, 10, 10),
        ]);
        f.player.weapons = vec![
            OwnedWeapon { weapon: "pistol".into(), ammo_type: Some("9mm".into()) },
            OwnedWeapon { weapon: "shotgun".into(), ammo_type: Some("shell".into()) },
        ];
        f.player.selected_weapon = Some(0);
        f.player.ammo.insert("9mm".into(), 50);
        f.player.ammo.insert("shell".into(), 10);
        f
    }

    #[test]
    fn test_low_selected_ammo_is_first_priority() {
        let mut f = armed_fixture();
        f.player.ammo.insert("9mm".into(), 20);
        f.player.health = Gauge::new(10.0, 100.0);
        let choice = choose_build(&f.ctx(100));
        assert_eq!(
            choice,
            Some(BuildChoice { step: BuildStep::Ammo(0.2), recipe: RecipeId::new("9mm") })
        );
    }

    #[test]
    fn test_empty_holstered_weapon_gets_ammo() {
        let mut f = armed_fixture();
        assert_eq!(try_step(&f.ctx(100), BuildStep::Ammo(0.2)), None);
        f.player.ammo.insert("shell".into(), 0);
        assert_eq!(try_step(&f.ctx(100), BuildStep::Ammo(0.2)), Some(RecipeId::new("shells")));
    }

    // --- gating ---

    #[test]
    fn test_unaffordable_recipes_are_skipped() {
        let mut f = Fixture::new(vec![health("small", 12.0, 10)]);
        f.player.health = Gauge::new(10.0, 100.0);
        assert_eq!(choose_build(&f.ctx(19)), None);
        assert!(choose_build(&f.ctx(20)).is_some());
    }

    #[test]
    fn test_weapon_build_order_then_run_acquisitions() {
        let gun = |id: &str| recipe(id, RecipeKind::Weapon { weapon: id.into(), ammo_recipe: None }, 30, 30);
        let mut f = Fixture::new(vec![gun("rifle"), gun("launcher")]);
        f.acquired = vec![RecipeId::new("launcher")];
        assert_eq!(try_step(&f.ctx(100), BuildStep::Weapon), Some(RecipeId::new("launcher")));

        f.order = vec![RecipeId::new("rifle")];
        assert_eq!(try_step(&f.ctx(100), BuildStep::Weapon), Some(RecipeId::new("rifle")));

        f.player.weapons.push(OwnedWeapon { weapon: "rifle".into(), ammo_type: None });
        f.owned.insert(RecipeId::new("launcher"));
        assert_eq!(try_step(&f.ctx(100), BuildStep::Weapon), None);
    }

    #[test]
    fn test_item_step_is_rate_limited() {
        let f = Fixture::new(vec![recipe("mine", RecipeKind::Item { item: "mine".into() }, 5, 5)]);
        let mut ctx = f.ctx(100);
        assert_eq!(try_step(&ctx, BuildStep::Item), Some(RecipeId::new("mine")));
        ctx.item_ready = false;
        assert_eq!(try_step(&ctx, BuildStep::Item), None);
    }

    #[test]
    fn test_shield_before_armour() {
        let mut f = Fixture::new(vec![
            recipe("plate", RecipeKind::Armour { amount: 25.0 }, 10, 10),
            recipe("bubble", RecipeKind::Shield { amount: 25.0 }, 10, 10),
        ]);
        f.player.shield = Gauge::new(10.0, 50.0);
        f.player.armour = Gauge::new(5.0, 50.0);
        assert_eq!(
            choose_build(&f.ctx(100)).map(|c| c.recipe),
            Some(RecipeId::new("bubble"))
        );
    }
}
