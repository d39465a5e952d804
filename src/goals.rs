//! Delivery goals on the road network
//!
//! Goal positions are drawn from candidate points (usually road samples or
//! grid road cells). A [`GoalTracker`] is driven by the caller once per frame
//! with the player position and reports progress as [`GoalEvent`]s.

use glam::{Vec2, Vec3};
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "spatial-index")]
use crate::generation::RoadGraph;
use crate::geometry::flat;
use crate::terrain::AreaBounds;

/// Goal spawning and completion rules
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GoalConfig {
    /// Number of goals to spawn
    pub count: usize,
    /// XZ distance within which the player counts as inside a goal
    pub goal_radius: f32,
    /// Shortest time the player must stay inside a goal
    pub min_dwell: f32,
    /// Longest time the player must stay inside a goal
    pub max_dwell: f32,
    pub min_distance_from_player: f32,
    pub min_distance_between_goals: f32,
    /// Random draws per goal before it is skipped
    pub max_attempts: usize,
    /// Area sampled when there are no candidate points
    pub spawn_area: Option<AreaBounds>,
    /// Height of goals sampled from `spawn_area`
    pub spawn_height: f32,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            count: 5,
            goal_radius: 5.0,
            min_dwell: 2.0,
            max_dwell: 5.0,
            min_distance_from_player: 15.0,
            min_distance_between_goals: 10.0,
            max_attempts: 25,
            spawn_area: None,
            spawn_height: 0.0,
        }
    }
}

/// Pick up to `config.count` goal positions
///
/// Each goal gets `max_attempts` random draws from `candidates` (or from
/// `spawn_area` when there are none). Draws too close to the player or to an
/// already chosen goal are rejected; a goal without a valid draw is skipped.
pub fn choose_goal_positions<R: Rng>(
    candidates: &[Vec3],
    player: Vec3,
    config: &GoalConfig,
    rng: &mut R,
) -> Vec<Vec3> {
    let mut goals: Vec<Vec3> = Vec::with_capacity(config.count);

    if candidates.is_empty() && config.spawn_area.is_none() {
        tracing::warn!("no goal candidates and no spawn area, no goals placed");
        return goals;
    }

    for index in 0..config.count {
        let mut chosen = None;
        for _ in 0..config.max_attempts {
            let candidate = match (candidates.is_empty(), config.spawn_area) {
                (false, _) => candidates[rng.gen_range(0..candidates.len())],
                (true, Some(area)) => Vec3::new(
                    sample_range(rng, area.min.x, area.max.x),
                    config.spawn_height,
                    sample_range(rng, area.min.y, area.max.y),
                ),
                (true, None) => break,
            };

            if candidate.distance(player) < config.min_distance_from_player {
                continue;
            }
            if goals
                .iter()
                .any(|goal| goal.distance(candidate) < config.min_distance_between_goals)
            {
                continue;
            }
            chosen = Some(candidate);
            break;
        }

        match chosen {
            Some(position) => goals.push(position),
            None => tracing::warn!(
                goal = index + 1,
                attempts = config.max_attempts,
                "no valid goal position found, skipping goal"
            ),
        }
    }

    goals
}

/// Move every goal within `max_distance` of a graph node onto that node
///
/// Goals drawn from road samples then sit exactly on junctions and road
/// ends where one is close by. Returns how many goals moved.
#[cfg(feature = "spatial-index")]
pub fn snap_to_graph(goals: &mut [Vec3], graph: &RoadGraph, max_distance: f32) -> usize {
    let mut moved = 0;
    for goal in goals.iter_mut() {
        let Some(node) = graph.snap_to_node(*goal, max_distance).and_then(|id| graph.node(id)) else {
            continue;
        };
        if node.position != *goal {
            *goal = node.position;
            moved += 1;
        }
    }
    if moved > 0 {
        tracing::debug!(moved, "goals snapped onto road graph nodes");
    }
    moved
}

fn sample_range<R: Rng>(rng: &mut R, low: f32, high: f32) -> f32 {
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}

/// One active goal
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub position: Vec3,
    /// Seconds the player must stay inside
    pub required_dwell: f32,
    /// Seconds spent inside so far in the current visit
    pub dwell_timer: f32,
}

impl Goal {
    /// Fraction of the required dwell time already spent, in `[0, 1]`
    pub fn progress(&self) -> f32 {
        if self.required_dwell <= 0.0 {
            1.0
        } else {
            (self.dwell_timer / self.required_dwell).clamp(0.0, 1.0)
        }
    }
}

/// What happened during one [`GoalTracker::update`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GoalEvent {
    /// Nothing changed
    Idle,
    /// The player is inside goal `index` and its timer advanced
    Dwelling { index: usize, progress: f32 },
    /// The player left goal `index` before finishing; its timer was reset
    Left { index: usize },
    /// Goal at `position` was completed and removed
    Completed { position: Vec3, remaining: usize },
    /// The last goal was completed
    StageCleared,
}

/// Dwell-timer state machine over the active goals
#[derive(Debug, Clone, PartialEq)]
pub struct GoalTracker {
    goals: Vec<Goal>,
    goal_radius: f32,
    cleared: bool,
}

impl GoalTracker {
    /// Track `positions`, giving each a random dwell time from the config range
    pub fn new<R: Rng>(positions: &[Vec3], config: &GoalConfig, rng: &mut R) -> Self {
        let goals = positions
            .iter()
            .map(|&position| Goal {
                position,
                required_dwell: sample_range(rng, config.min_dwell, config.max_dwell),
                dwell_timer: 0.0,
            })
            .collect();
        Self {
            goals,
            goal_radius: config.goal_radius,
            cleared: false,
        }
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    /// Positions of the goals still active
    pub fn positions(&self) -> Vec<Vec3> {
        self.goals.iter().map(|g| g.position).collect()
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Advance timers by `dt` seconds for a player at `player`
    ///
    /// Distance is measured on the XZ plane. Leaving a goal resets its timer.
    /// The first goal reaching its required time is completed; once none
    /// remain the tracker reports [`GoalEvent::StageCleared`] a single time.
    pub fn update(&mut self, dt: f32, player: Vec3) -> GoalEvent {
        if self.cleared {
            return GoalEvent::Idle;
        }
        if self.goals.is_empty() {
            self.cleared = true;
            return GoalEvent::StageCleared;
        }

        let player_xz: Vec2 = flat(player);
        let mut event = GoalEvent::Idle;
        let mut completed = None;

        for (index, goal) in self.goals.iter_mut().enumerate() {
            let inside = flat(goal.position).distance(player_xz) < self.goal_radius;
            if inside {
                goal.dwell_timer += dt;
                if goal.dwell_timer >= goal.required_dwell && completed.is_none() {
                    completed = Some(index);
                } else if matches!(event, GoalEvent::Idle) {
                    event = GoalEvent::Dwelling {
                        index,
                        progress: goal.progress(),
                    };
                }
            } else if goal.dwell_timer > 0.0 {
                goal.dwell_timer = 0.0;
                if matches!(event, GoalEvent::Idle) {
                    event = GoalEvent::Left { index };
                }
            }
        }

        if let Some(index) = completed {
            let goal = self.goals.remove(index);
            if self.goals.is_empty() {
                self.cleared = true;
                tracing::info!("all goals completed");
                return GoalEvent::StageCleared;
            }
            return GoalEvent::Completed {
                position: goal.position,
                remaining: self.goals.len(),
            };
        }

        event
    }
}
