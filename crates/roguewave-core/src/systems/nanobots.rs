//! Nanobot manager - the player's build economy.
//!
//! Each tick the nanobots either level up (presenting an offer of new
//! recipes) or, when idle and off cooldown, walk the build waterfall and
//! start the first affordable build. Everything that takes time (build
//! timers, announcement chains, the request/receive sequence of a chosen
//! offer, repeating stat modifiers) runs as a task on the manager's
//! [`Scheduler`].

use crate::context::{GameContext, MAX_NANOBOT_LEVEL, RECIPES_CALLED_IN, RESOURCES_COLLECTED};
use crate::events::{EventQueue, GameEvent};
use crate::scheduler::{Resume, Scheduler};
use rand::Rng;
use roguewave_logic::curve::Curve;
use roguewave_logic::geometry::Vec3;
use roguewave_logic::offers::{get_offers, OfferContext};
use roguewave_logic::priority::{choose_build, BuildContext, BuildStep};
use roguewave_logic::recipe::{PlayerSnapshot, Recipe, RecipeId, RecipeKind};
use roguewave_logic::run_recipes::{Registration, RunRecipes};
use roguewave_logic::spatial::{sphere_blocked, SpatialQuery, ALL_LAYERS};
use roguewave_logic::steering::Pose;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Pause after each recipe name clip.
const NAME_CLIP_GAP: f32 = 0.3;
/// Pickup placement steps back at most this many times.
const MAX_PLACEMENT_STEPS: u32 = 10;
const ITEM_FREQUENCY_JITTER: (f32, f32) = (0.7, 1.3);
/// Floor on the interval of repeating stat modifiers.
pub const MIN_STAT_REPEAT: f32 = 0.1;

/// Where the offer/request cycle is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NanobotStatus {
    #[default]
    Collecting,
    OfferingRecipe,
    Requesting,
    RequestReceived,
}

/// How chatty the nanobots are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VoiceLevel {
    Silent,
    Low,
    #[default]
    Medium,
    High,
}

/// Generic announcer clips, used when a recipe has none of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncerClips {
    pub build_started: Vec<String>,
    pub build_complete: Vec<String>,
    pub recipe_request_prefix: Vec<String>,
    pub recipe_requested: Vec<String>,
    pub recipe_received: Vec<String>,
    /// Spoken in place of a recipe name that has no clip
    pub default_recipe_name: Option<String>,
    pub default_pickup_particles: Option<String>,
    /// Clip lengths in seconds; unknown clips use `default_length`
    pub lengths: HashMap<String, f32>,
    pub default_length: f32,
}

impl AnnouncerClips {
    pub fn length_of(&self, clip: &str) -> f32 {
        self.lengths.get(clip).copied().unwrap_or(self.default_length).max(0.0)
    }
}

fn pick(clips: &[String], rng: &mut impl Rng) -> Option<String> {
    if clips.is_empty() {
        None
    } else {
        Some(clips[rng.gen_range(0..clips.len())].clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NanobotConfig {
    pub build_time_modifier: f32,
    /// Seconds between the end of one build and the start of the next
    pub building_cooldown: f32,
    /// How far ahead of the player pickups appear
    pub pickup_spawn_distance: f32,
    pub pickup_clearance: f32,
    /// Recipes offered per level-up
    pub offer_count: usize,
    /// A weapon is always offered while the build order is shorter than this
    pub weapon_slot_limit: usize,
    /// Resources needed to reach a level
    pub resources_for_level: Curve,
    pub difficulty: f32,
    /// Build time and cooldown scale, evaluated at `difficulty`
    pub difficulty_modifier: Curve,
    /// Average seconds between generic item builds
    pub item_frequency: f32,
    pub first_level_up_delay: f32,
    pub level_up_delay: f32,
    /// Requests this long after the offer opened are announced
    pub request_delay: f32,
    /// Offers close unanswered after this many seconds
    pub offer_timeout: Option<f32>,
    pub voice: VoiceLevel,
    pub clips: AnnouncerClips,
    /// Registered at the start of every run
    pub starting_recipes: Vec<RecipeId>,
}

impl Default for NanobotConfig {
    fn default() -> Self {
        Self {
            build_time_modifier: 1.0,
            building_cooldown: 4.0,
            pickup_spawn_distance: 3.0,
            pickup_clearance: 0.5,
            offer_count: 3,
            weapon_slot_limit: 3,
            resources_for_level: Curve::new([(1.0, 150.0), (10.0, 1500.0), (50.0, 20000.0)]),
            difficulty: 0.5,
            difficulty_modifier: Curve::constant(1.0),
            item_frequency: 10.0,
            first_level_up_delay: 10.0,
            level_up_delay: 5.0,
            request_delay: 5.0,
            offer_timeout: None,
            voice: VoiceLevel::default(),
            clips: AnnouncerClips { default_length: 1.0, ..AnnouncerClips::default() },
            starting_recipes: Vec::new(),
        }
    }
}

impl NanobotConfig {
    fn difficulty_scale(&self) -> f32 {
        self.difficulty_modifier.evaluate(self.difficulty).max(0.0)
    }

    pub fn build_duration(&self, recipe: &Recipe) -> f32 {
        recipe.time_to_build * self.build_time_modifier * self.difficulty_scale()
    }

    pub fn cooldown(&self) -> f32 {
        self.building_cooldown * self.difficulty_scale()
    }

    fn resources_for(&self, level: u32) -> i64 {
        self.resources_for_level.evaluate(level as f32).round() as i64
    }
}

/// Mutable build and level-up state for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildState {
    pub building: Option<RecipeId>,
    pub next_build_time: f32,
    pub next_item_time: f32,
    pub next_level_up_time: f32,
    pub stacked_level_ups: u32,
    /// Counts down as resources are collected; a level-up is due at zero
    pub resources_for_next_level: i64,
    pub status: NanobotStatus,
    pub offers: Vec<RecipeId>,
    pub offer_open: bool,
    pub offer_serial: u64,
    pub offer_opened_at: f32,
    pub in_victory: bool,
    pub player_alive: bool,
}

impl BuildState {
    pub fn is_building(&self) -> bool {
        self.building.is_some()
    }
}

/// One clip in an announcement and how long to wait after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedClip {
    pub clip: String,
    pub wait: f32,
}

/// Suspended steps of the nanobots' timed sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NanobotTask {
    /// Build a recipe once nothing else is building
    QueuedBuild { recipe: RecipeId },
    /// Build timer elapsed
    FinishBuild { recipe: RecipeId },
    /// Completion announcement done; free the builder
    ReleaseBuild { recipe: RecipeId },
    /// Play the next clip of an announcement, then continue with `then`
    PlayClips { clips: VecDeque<TimedClip>, then: Option<Box<NanobotTask>> },
    /// Request timer elapsed for a chosen offer
    DeliverOffer { recipe: RecipeId },
    /// Received announcement done; register the recipe
    RegisterOffer { recipe: RecipeId },
    ExpireOffer { serial: u64 },
    RepeatStat { recipe: RecipeId, every: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NanobotCondition {
    BuildIdle,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NanobotManager {
    pub config: NanobotConfig,
    pub state: BuildState,
    /// Recipes available to the builder this run
    pub run: RunRecipes,
    /// Latest view of the player, pushed by the host
    pub player: PlayerSnapshot,
    pub player_pose: Pose,
    scheduler: Scheduler<NanobotTask, NanobotCondition>,
}

impl NanobotManager {
    pub fn new(config: NanobotConfig) -> Self {
        Self {
            config,
            state: BuildState { player_alive: true, ..BuildState::default() },
            ..Self::default()
        }
    }

    pub fn scheduler(&self) -> &Scheduler<NanobotTask, NanobotCondition> {
        &self.scheduler
    }

    /// Resources needed for the level after the current one plus any
    /// stacked level-ups.
    pub fn required_resources(&self, ctx: &GameContext) -> i64 {
        self.config
            .resources_for(ctx.profile.nanobot_level + self.state.stacked_level_ups + 1)
    }

    /// Reset for a new run: clear per-run recipe state, stack level-ups
    /// from banked resources when starting from level 1, register the
    /// starting and owned recipes and queue the weapon build order.
    pub fn start_session(&mut self, ctx: &mut GameContext, events: &mut EventQueue, rng: &mut impl Rng) {
        let now = ctx.now();
        self.scheduler = Scheduler::new();
        self.run.clear();
        ctx.run.clear();
        ctx.catalog.reset_run_state();
        self.state = BuildState { player_alive: true, ..BuildState::default() };

        if ctx.profile.nanobot_level == 1 {
            let mut available = ctx.profile.resources as i64;
            let mut needed = self.config.resources_for(self.state.stacked_level_ups + 1);
            while needed > 0 && available > needed {
                available -= needed;
                self.state.stacked_level_ups += 1;
                needed = self.config.resources_for(self.state.stacked_level_ups + 1);
            }
        }
        self.state.resources_for_next_level = self.required_resources(ctx);
        self.state.next_level_up_time = now + self.config.first_level_up_delay;

        let mut initial: Vec<RecipeId> = self.config.starting_recipes.clone();
        initial.extend(ctx.profile.recipe_ids.iter().cloned());
        initial.extend(ctx.profile.weapon_build_order.iter().cloned());
        for id in &initial {
            let registrations = self.run.add(&ctx.catalog, id);
            self.dispatch(ctx, events, registrations);
        }

        for id in ctx.profile.weapon_build_order.clone() {
            let Some(recipe) = ctx.catalog.get(&id) else {
                continue;
            };
            ctx.profile.resources += recipe.build_cost;
            self.scheduler
                .schedule(NanobotTask::QueuedBuild { recipe: id }, Resume::When(NanobotCondition::BuildIdle));
        }

        log::info!(
            "nanobots ready at level {} with {} stacked level-ups",
            ctx.profile.nanobot_level,
            self.state.stacked_level_ups
        );
    }

    /// Run every task whose suspension point has been reached. Zero-delay
    /// follow-ups run in the same call.
    pub fn run_tasks(
        &mut self,
        ctx: &mut GameContext,
        events: &mut EventQueue,
        spatial: &dyn SpatialQuery,
        rng: &mut impl Rng,
    ) {
        let now = ctx.now();
        for _ in 0..16 {
            let idle = !self.state.is_building();
            let ready = self.scheduler.take_ready(now, |c| match c {
                NanobotCondition::BuildIdle => idle,
            });
            if ready.is_empty() {
                return;
            }
            for task in ready {
                self.run_task(task, ctx, events, spatial, rng);
            }
        }
    }

    fn run_task(
        &mut self,
        task: NanobotTask,
        ctx: &mut GameContext,
        events: &mut EventQueue,
        spatial: &dyn SpatialQuery,
        rng: &mut impl Rng,
    ) {
        let now = ctx.now();
        match task {
            NanobotTask::QueuedBuild { recipe } => {
                if self.state.is_building() {
                    self.scheduler.schedule(
                        NanobotTask::QueuedBuild { recipe },
                        Resume::When(NanobotCondition::BuildIdle),
                    );
                } else if !self.try_recipe(ctx, events, &recipe, rng) {
                    log::debug!("queued build of {recipe} skipped");
                }
            }
            NanobotTask::FinishBuild { recipe } => self.finish_build(ctx, events, spatial, recipe, rng),
            NanobotTask::ReleaseBuild { recipe } => self.release_build(ctx, events, recipe),
            NanobotTask::PlayClips { clips, then } => self.play_clips(now, events, clips, then),
            NanobotTask::DeliverOffer { recipe } => {
                self.set_status(NanobotStatus::RequestReceived, events);
                let clip = pick(&self.config.clips.recipe_received, rng);
                self.announce(now, events, clip, Vec::new(), Some(NanobotTask::RegisterOffer { recipe }));
            }
            NanobotTask::RegisterOffer { recipe } => self.register_offer(ctx, events, recipe),
            NanobotTask::ExpireOffer { serial } => {
                if self.state.offer_open
                    && self.state.offer_serial == serial
                    && self.state.status == NanobotStatus::OfferingRecipe
                {
                    log::info!("offer expired without a choice");
                    self.close_offer(now, events);
                }
            }
            NanobotTask::RepeatStat { recipe, every } => {
                self.apply_stat(ctx, events, &recipe);
                let every = every.max(MIN_STAT_REPEAT);
                self.scheduler.after(now, every, NanobotTask::RepeatStat { recipe, every });
            }
        }
    }

    /// Per-tick decision: level up if due, otherwise start the next build.
    pub fn tick(&mut self, ctx: &mut GameContext, events: &mut EventQueue, rng: &mut impl Rng) {
        if !self.state.player_alive {
            return;
        }
        let now = ctx.now();

        if self.state.resources_for_next_level <= 0 {
            self.state.stacked_level_ups += 1;
            self.level_up(ctx, events, rng);
        } else if self.state.stacked_level_ups > 0 && now > self.state.next_level_up_time {
            self.level_up(ctx, events, rng);
        }

        if self.state.in_victory || self.state.is_building() || self.state.next_build_time > now {
            return;
        }

        let owned = ctx.profile.recipe_ids.clone();
        let choice = choose_build(&BuildContext {
            catalog: &ctx.catalog,
            run: &self.run,
            player: &self.player,
            resources: ctx.profile.resources,
            build_order: &ctx.profile.weapon_build_order,
            acquired_this_run: &ctx.run.acquired,
            permanently_owned: &owned,
            item_ready: now >= self.state.next_item_time,
        });
        let Some(choice) = choice else {
            return;
        };
        if self.try_recipe(ctx, events, &choice.recipe, rng) && choice.step == BuildStep::Item {
            let (lo, hi) = ITEM_FREQUENCY_JITTER;
            self.state.next_item_time = now + self.config.item_frequency * rng.gen_range(lo..hi);
        }
    }

    /// Credit collected resources toward the balance and the next level.
    pub fn collect(&mut self, ctx: &mut GameContext, amount: u32) {
        self.state.resources_for_next_level -= amount as i64;
        ctx.profile.resources += amount;
        ctx.stats.add(RESOURCES_COLLECTED, amount as i64);
    }

    /// Death sends the nanobots back to level 1.
    pub fn set_player_alive(&mut self, ctx: &mut GameContext, alive: bool) {
        self.state.player_alive = alive;
        if !alive {
            ctx.profile.nanobot_level = 1;
            self.state.stacked_level_ups = 0;
        }
    }

    /// Level complete or portal entered: no more builds or offers.
    pub fn enter_victory(&mut self) {
        self.state.in_victory = true;
    }

    fn level_up(&mut self, ctx: &mut GameContext, events: &mut EventQueue, rng: &mut impl Rng) {
        if self.state.offer_open || self.state.stacked_level_ups == 0 {
            self.state.resources_for_next_level = self.required_resources(ctx);
            return;
        }

        self.state.stacked_level_ups -= 1;
        ctx.profile.nanobot_level += 1;
        let level = ctx.profile.nanobot_level;
        self.state.resources_for_next_level = self.required_resources(ctx);
        events.push(GameEvent::NanobotLevelUp {
            level,
            resources_for_next_level: self.state.resources_for_next_level,
        });

        if !self.state.in_victory {
            self.open_offer(ctx, events, rng);
        }
        ctx.stats.raise_to(MAX_NANOBOT_LEVEL, level as i64);
        log::info!("nanobot level up to {level}");
    }

    fn open_offer(&mut self, ctx: &GameContext, events: &mut EventQueue, rng: &mut impl Rng) {
        let now = ctx.now();
        let weapon_slots =
            usize::from(ctx.profile.weapon_build_order.len() < self.config.weapon_slot_limit);
        let owned = ctx.owned_recipes();
        let offers = get_offers(
            &ctx.catalog,
            &OfferContext {
                nanobot_level: ctx.profile.nanobot_level,
                resources: ctx.profile.resources,
                player: &self.player,
                owned: &owned,
            },
            self.config.offer_count,
            weapon_slots,
            rng,
        );
        if offers.is_empty() {
            log::info!("no recipes to offer at level {}", ctx.profile.nanobot_level);
            self.state.next_level_up_time = now + self.config.level_up_delay;
            return;
        }

        let mut names = Vec::with_capacity(offers.len());
        for id in &offers {
            if let Some(recipe) = ctx.catalog.find(id) {
                log::info!("offering in-run recipe {}", recipe.display_name);
                names.push(self.name_clip(recipe));
            }
        }

        self.state.offers = offers.clone();
        self.state.offer_open = true;
        self.state.offer_serial += 1;
        self.state.offer_opened_at = now;
        self.set_status(NanobotStatus::OfferingRecipe, events);
        events.push(GameEvent::OffersPresented(offers));

        let prefix = pick(&self.config.clips.recipe_request_prefix, rng);
        self.announce(now, events, prefix, names, None);
        if let Some(timeout) = self.config.offer_timeout {
            let serial = self.state.offer_serial;
            self.scheduler.after(now, timeout, NanobotTask::ExpireOffer { serial });
        }
    }

    /// The player picks offer `index`. The recipe arrives after its build
    /// time; no other build starts before `time_to_build + request_delay`.
    pub fn choose_offer(
        &mut self,
        ctx: &GameContext,
        events: &mut EventQueue,
        index: usize,
        rng: &mut impl Rng,
    ) -> Option<RecipeId> {
        if !self.state.offer_open || self.state.status != NanobotStatus::OfferingRecipe {
            return None;
        }
        let id = self.state.offers.get(index)?.clone();
        let recipe = ctx.catalog.get(&id)?;
        let now = ctx.now();

        self.set_status(NanobotStatus::Requesting, events);
        self.state.next_build_time = now + recipe.time_to_build + self.config.request_delay;
        log::info!("requesting in-run recipe {}", recipe.display_name);
        if now - self.state.offer_opened_at > self.config.request_delay {
            let clip = pick(&self.config.clips.recipe_requested, rng);
            self.announce(now, events, clip, Vec::new(), None);
        }
        events.push(GameEvent::RecipeRequested { recipe: id.clone() });
        self.scheduler
            .after(now, recipe.time_to_build, NanobotTask::DeliverOffer { recipe: id.clone() });
        Some(id)
    }

    fn register_offer(&mut self, ctx: &mut GameContext, events: &mut EventQueue, id: RecipeId) {
        ctx.run.add(id.clone());
        let registrations = self.run.add(&ctx.catalog, &id);
        self.dispatch(ctx, events, registrations);
        ctx.stats.increment(RECIPES_CALLED_IN);
        events.push(GameEvent::RecipeReceived { recipe: id });
        self.close_offer(ctx.now(), events);
    }

    fn close_offer(&mut self, now: f32, events: &mut EventQueue) {
        self.state.offer_open = false;
        self.state.offers.clear();
        self.set_status(NanobotStatus::Collecting, events);
        self.state.next_level_up_time = now + self.config.level_up_delay;
    }

    fn set_status(&mut self, status: NanobotStatus, events: &mut EventQueue) {
        if self.state.status != status {
            self.state.status = status;
            events.push(GameEvent::NanobotStatusChanged(status));
        }
    }

    /// Apply the effects reported by run-recipe registration.
    fn dispatch(&mut self, ctx: &mut GameContext, events: &mut EventQueue, registrations: Vec<Registration>) {
        let now = ctx.now();
        for registration in registrations {
            match registration {
                Registration::ApplyStat { id, repeat_every } => {
                    self.apply_stat(ctx, events, &id);
                    if let Some(every) = repeat_every {
                        let every = every.max(MIN_STAT_REPEAT);
                        self.scheduler.after(now, every, NanobotTask::RepeatStat { recipe: id, every });
                    }
                }
                Registration::ApplyAmmoUpgrade { id } => {
                    if let Some(state) = ctx.catalog.run_state_mut(&id) {
                        state.applications += 1;
                    }
                    events.push(GameEvent::AmmoUpgradeApplied { recipe: id });
                }
                Registration::ApplyPassive { id } => {
                    if let Some(state) = ctx.catalog.run_state_mut(&id) {
                        state.applications += 1;
                    }
                    events.push(GameEvent::PassiveApplied { recipe: id });
                }
                Registration::PassiveAtMaxStack { id } => {
                    log::debug!("passive {id} already at max stack");
                }
                Registration::Unknown { id } => {
                    log::error!("cannot register unknown recipe {id}");
                }
                Registration::Collected { .. } | Registration::AlreadyListed { .. } => {}
            }
        }
    }

    fn apply_stat(&mut self, ctx: &mut GameContext, events: &mut EventQueue, id: &RecipeId) {
        let Some(RecipeKind::Stat { stat, modifier, .. }) = ctx.catalog.find(id).map(|r| r.kind.clone())
        else {
            log::error!("{id} is not a stat recipe");
            return;
        };
        if let Some(state) = ctx.catalog.run_state_mut(id) {
            state.applications += 1;
            state.accumulated_modifier += modifier;
        }
        events.push(GameEvent::StatApplied { recipe: id.clone(), stat, modifier });
    }

    fn try_recipe(
        &mut self,
        ctx: &mut GameContext,
        events: &mut EventQueue,
        id: &RecipeId,
        rng: &mut impl Rng,
    ) -> bool {
        let Some(recipe) = ctx.catalog.get(id) else {
            return false;
        };
        if ctx.profile.resources < recipe.build_cost
            || !recipe.should_build(&self.player, ctx.catalog.run_state(id))
        {
            return false;
        }
        let recipe = recipe.clone();
        self.start_build(ctx, events, &recipe, rng)
    }

    /// Deduct the cost and start the build timer. Fails without side
    /// effects if a build is already running or the balance is short.
    pub fn start_build(
        &mut self,
        ctx: &mut GameContext,
        events: &mut EventQueue,
        recipe: &Recipe,
        rng: &mut impl Rng,
    ) -> bool {
        if self.state.is_building() {
            return false;
        }
        let Some(balance) = ctx.profile.resources.checked_sub(recipe.build_cost) else {
            return false;
        };
        ctx.profile.resources = balance;
        self.state.building = Some(recipe.id.clone());

        let now = ctx.now();
        match &recipe.clips.build_started {
            Some(clip) => self.announce(now, events, Some(clip.clone()), Vec::new(), None),
            None => {
                let clip = pick(&self.config.clips.build_started, rng);
                let name = self.name_clip(recipe);
                self.announce(now, events, clip, vec![name], None);
            }
        }
        log::info!("building {}", recipe.display_name);
        events.push(GameEvent::BuildStarted { recipe: recipe.id.clone() });

        let duration = self.config.build_duration(recipe);
        self.scheduler
            .after(now, duration, NanobotTask::FinishBuild { recipe: recipe.id.clone() });
        true
    }

    fn finish_build(
        &mut self,
        ctx: &mut GameContext,
        events: &mut EventQueue,
        spatial: &dyn SpatialQuery,
        id: RecipeId,
        rng: &mut impl Rng,
    ) {
        let now = ctx.now();
        let Some(recipe) = ctx.catalog.get(&id) else {
            self.release_build(ctx, events, id);
            return;
        };

        if !recipe.category().spawns_pickup() {
            log::error!("no build handling for {:?} recipe {}", recipe.category(), recipe.display_name);
            self.release_build(ctx, events, id);
            return;
        }

        let position = self.pickup_position(spatial);
        events.push(GameEvent::PickupSpawned { recipe: id.clone(), position });
        let particles = recipe
            .clips
            .pickup_particles
            .clone()
            .or_else(|| self.config.clips.default_pickup_particles.clone());
        if let Some(effect) = particles {
            events.push(GameEvent::ParticleEffect { effect, position });
        }

        let clip = recipe
            .clips
            .build_complete
            .clone()
            .or_else(|| pick(&self.config.clips.build_complete, rng));
        self.announce(now, events, clip, Vec::new(), Some(NanobotTask::ReleaseBuild { recipe: id }));
    }

    /// Ahead of the player and one unit up, stepping back toward the
    /// player while the spot is blocked.
    fn pickup_position(&self, spatial: &dyn SpatialQuery) -> Vec3 {
        let forward = self.player_pose.forward;
        let mut position = self.player_pose.position + forward * self.config.pickup_spawn_distance + Vec3::UP;
        let mut steps = 0;
        while steps < MAX_PLACEMENT_STEPS
            && sphere_blocked(spatial, position, self.config.pickup_clearance, ALL_LAYERS)
        {
            steps += 1;
            position -= forward;
        }
        position
    }

    fn release_build(&mut self, ctx: &mut GameContext, events: &mut EventQueue, id: RecipeId) {
        let kind = ctx.catalog.find(&id).map(|r| r.kind.clone());
        match kind {
            Some(RecipeKind::Weapon { ammo_recipe: Some(ammo), .. }) => {
                let registrations = self.run.add(&ctx.catalog, &ammo);
                self.dispatch(ctx, events, registrations);
            }
            Some(RecipeKind::Stat { .. }) => self.apply_stat(ctx, events, &id),
            _ => {}
        }
        if let Some(state) = ctx.catalog.run_state_mut(&id) {
            state.builds += 1;
        }

        self.state.building = None;
        self.state.next_build_time = ctx.now() + self.config.cooldown();
        events.push(GameEvent::BuildCompleted { recipe: id });
    }

    fn name_clip(&self, recipe: &Recipe) -> String {
        match (&recipe.clips.name, &self.config.clips.default_recipe_name) {
            (Some(name), _) => name.clone(),
            (None, Some(default)) => {
                log::warn!("recipe {} has no name clip, using the default", recipe.display_name);
                default.clone()
            }
            (None, None) => {
                log::warn!("recipe {} has no name clip and there is no default", recipe.display_name);
                String::new()
            }
        }
    }

    /// Start an announcement: the main clip, then (at Medium voice or
    /// above) each name clip. `then` runs once the last clip has played,
    /// or straight away if nothing is said.
    fn announce(
        &mut self,
        now: f32,
        events: &mut EventQueue,
        main: Option<String>,
        names: Vec<String>,
        then: Option<NanobotTask>,
    ) {
        let then = then.map(Box::new);
        let Some(main) = main.filter(|_| self.config.voice != VoiceLevel::Silent) else {
            if let Some(task) = then {
                self.scheduler.schedule(*task, Resume::At(now));
            }
            return;
        };

        let clips = &self.config.clips;
        let mut queue = VecDeque::with_capacity(names.len() + 1);
        queue.push_back(TimedClip { wait: clips.length_of(&main), clip: main });
        if self.config.voice >= VoiceLevel::Medium {
            for name in names.into_iter().filter(|n| !n.is_empty()) {
                queue.push_back(TimedClip { wait: clips.length_of(&name) + NAME_CLIP_GAP, clip: name });
            }
        }
        self.play_clips(now, events, queue, then);
    }

    fn play_clips(
        &mut self,
        now: f32,
        events: &mut EventQueue,
        mut clips: VecDeque<TimedClip>,
        then: Option<Box<NanobotTask>>,
    ) {
        let Some(current) = clips.pop_front() else {
            if let Some(task) = then {
                self.scheduler.schedule(*task, Resume::At(now));
            }
            return;
        };
        events.push(GameEvent::Announce { clip: current.clip });
        let next = if clips.is_empty() {
            then.map(|task| *task)
        } else {
            Some(NanobotTask::PlayClips { clips, then })
        };
        if let Some(task) = next {
            self.scheduler.after(now, current.wait, task);
        }
    }
}
