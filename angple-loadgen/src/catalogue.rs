//! Weighted action mix for the default entry point.
use crate::error::LoadError;
use crate::request::Request;
use rand::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeightedAction {
    pub request: Request,
    pub weight: u32,
}

impl WeightedAction {
    pub const fn new(request: Request, weight: u32) -> Self {
        Self { request, weight }
    }
}

pub const DEFAULT_ACTIONS: [WeightedAction; 6] = [
    WeightedAction::new(Request::BrowsePosts, 10),
    WeightedAction::new(Request::ViewPost, 5),
    WeightedAction::new(Request::ViewComments, 3),
    WeightedAction::new(Request::ListBoards, 2),
    WeightedAction::new(Request::ListUsers, 1),
    WeightedAction::new(Request::HealthCheck, 1),
];

/// A non-empty, fixed list of actions with positive weights.
#[derive(Clone, Debug)]
pub struct Catalogue {
    actions: Vec<WeightedAction>,
    total_weight: u64,
}

impl Catalogue {
    pub fn new(actions: Vec<WeightedAction>) -> Result<Self, LoadError> {
        if actions.is_empty() {
            return Err(LoadError::EmptyCatalogue);
        }

        if let Some(action) = actions.iter().find(|a| a.weight == 0) {
            return Err(LoadError::ZeroWeight(action.request.name()));
        }

        let total_weight = actions.iter().map(|a| u64::from(a.weight)).sum();
        Ok(Self {
            actions,
            total_weight,
        })
    }

    pub fn actions(&self) -> &[WeightedAction] {
        &self.actions
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Maps a draw in `[0, total_weight)` to an action.
    ///
    /// Weights are subtracted in declaration order and the first action that takes the remainder
    /// to `<= 0` wins, so a draw landing exactly on a boundary goes to the earlier action.
    pub fn select(&self, draw: f64) -> Request {
        let mut remainder = draw;
        self.actions
            .iter()
            .find(|action| {
                remainder -= f64::from(action.weight);
                remainder <= 0.
            })
            .unwrap_or(&self.actions[self.actions.len() - 1])
            .request
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Request {
        self.select(rng.gen_range(0. ..self.total_weight as f64))
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self {
            actions: DEFAULT_ACTIONS.to_vec(),
            total_weight: DEFAULT_ACTIONS.iter().map(|a| u64::from(a.weight)).sum(),
        }
    }
}
