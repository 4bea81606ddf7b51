use crate::input::{ActionParams, GameAction, GameActionContext};
use crate::state::{
    Alliance, AllianceTerms, GameState, PendingAlliance, PlayerId, PlayerState, Resources,
    Timestamp, UnitId,
};

pub const TEST_GAME: &str = "game1";
pub const TEST_PLAYER: &str = "player1";

/// An action from [`TEST_PLAYER`] in [`TEST_GAME`], cycle 1, at time zero.
pub fn action(params: ActionParams) -> GameAction {
    GameAction::new(TEST_GAME, TEST_PLAYER, 1, params, Timestamp::from_millis(0))
}

pub struct PlayerStateBuilder {
    state: PlayerState,
}

impl PlayerStateBuilder {
    /// A mid-game player: well stocked, one territory, two units.
    pub fn new() -> Self {
        Self {
            state: PlayerState {
                resources: Resources {
                    energy: 1000.0,
                    materials: 1000.0,
                    technology: 1.0,
                    intelligence: 0.0,
                    morale: 100.0,
                },
                territories: ["territory1".to_string()].into_iter().collect(),
                units: [UnitId(1), UnitId(2)].into_iter().collect(),
                alliances: Vec::new(),
                pending_alliances: Vec::new(),
                turns_remaining: 50,
            },
        }
    }

    pub fn resources(mut self, resources: Resources) -> Self {
        self.state.resources = resources;
        self
    }

    pub fn energy(mut self, energy: f64) -> Self {
        self.state.resources.energy = energy;
        self
    }

    pub fn technology(mut self, technology: f64) -> Self {
        self.state.resources.technology = technology;
        self
    }

    pub fn territories(mut self, ids: &[&str]) -> Self {
        self.state.territories = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn units(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.state.units = ids.into_iter().map(UnitId).collect();
        self
    }

    pub fn turns_remaining(mut self, turns: u32) -> Self {
        self.state.turns_remaining = turns;
        self
    }

    pub fn allied_with(mut self, player: &str) -> Self {
        self.state.alliances.push(Alliance {
            player_id: player.to_string(),
            terms: None,
            formed_at: Timestamp::default(),
        });
        self
    }

    pub fn pending_with(mut self, player: &str, terms: Option<AllianceTerms>) -> Self {
        self.state.pending_alliances.push(PendingAlliance {
            target_player_id: player.to_string(),
            terms,
            proposed_at: Timestamp::default(),
        });
        self
    }

    pub fn build(self) -> PlayerState {
        self.state
    }
}

impl Default for PlayerStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Context for [`TEST_PLAYER`] wrapping a [`PlayerStateBuilder`].
pub struct ContextBuilder {
    player: PlayerStateBuilder,
    player_id: PlayerId,
    game_state: GameState,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            player: PlayerStateBuilder::new(),
            player_id: TEST_PLAYER.to_string(),
            game_state: GameState {
                players: vec![TEST_PLAYER.to_string(), "player2".to_string()],
                ..Default::default()
            },
        }
    }

    pub fn player(mut self, f: impl FnOnce(PlayerStateBuilder) -> PlayerStateBuilder) -> Self {
        self.player = f(self.player);
        self
    }

    pub fn turns_remaining(self, turns: u32) -> Self {
        self.player(|p| p.turns_remaining(turns))
    }

    pub fn territory_owner(mut self, territory: &str, owner: &str) -> Self {
        self.game_state
            .territory_owners
            .insert(territory.to_string(), owner.to_string());
        self
    }

    pub fn build(self) -> GameActionContext {
        GameActionContext {
            game_id: TEST_GAME.to_string(),
            player_id: self.player_id,
            current_cycle: 1,
            player_state: self.player.build(),
            game_state: self.game_state,
        }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
