use serde::{Deserialize, Serialize};

/// Game rules supplied by the caller.
///
/// Every numeric constant a handler or system consults lives here; the
/// defaults reproduce the standard ruleset. Sections missing from a
/// deserialized document fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GameConfig {
    pub combat: CombatConfig,
    pub technology: TechnologyConfig,
    pub diplomacy: DiplomacyConfig,
    pub resources: ResourceConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Turn cost of an attack.
    pub base_attack_cost: u32,
    /// Turn cost of a defensive stance.
    pub base_defend_cost: u32,
    pub min_attack_strength: f64,
    pub strength_per_unit: f64,
    /// Strength multiplier gained per technology level.
    pub tech_strength_factor: f64,
    /// Fraction of attacking units destroyed after a won attack.
    pub success_loss_ratio: f64,
    /// Fraction of attacking units destroyed after a lost attack.
    pub failure_loss_ratio: f64,
    pub energy_per_unit: f64,
    pub materials_per_lost_unit: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            base_attack_cost: 2,
            base_defend_cost: 1,
            min_attack_strength: 50.0,
            strength_per_unit: 10.0,
            tech_strength_factor: 0.05,
            success_loss_ratio: 0.2,
            failure_loss_ratio: 0.4,
            energy_per_unit: 10.0,
            materials_per_lost_unit: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnologyConfig {
    pub max_tech_level: f64,
    pub research_cost: u32,
    /// Technology gained per unit of energy invested at level zero.
    pub base_efficiency: f64,
}

impl Default for TechnologyConfig {
    fn default() -> Self {
        Self {
            max_tech_level: 10.0,
            research_cost: 1,
            base_efficiency: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiplomacyConfig {
    pub alliance_formation_cost: u32,
    /// Alliance entries a single player may hold.
    pub max_alliance_size: usize,
    pub alliance_trust_threshold: f64,
    pub trade_trust_threshold: f64,
    pub non_aggression_trust_threshold: f64,
    /// `None` leaves research agreements ungated.
    pub research_trust_threshold: Option<f64>,
    /// Active alliance agreements a player may be party to.
    pub max_active_alliances: usize,
    pub accept_trust_bonus: f64,
    pub break_trust_penalty: f64,
    /// Idle days before trust starts to decay.
    pub decay_after_days: u64,
    pub accept_morale_bonus: f64,
    pub break_morale_penalty: f64,
    /// Energy and materials granted on accepting a resource-sharing alliance.
    pub resource_sharing_bonus: f64,
}

impl Default for DiplomacyConfig {
    fn default() -> Self {
        Self {
            alliance_formation_cost: 1,
            max_alliance_size: 3,
            alliance_trust_threshold: 50.0,
            trade_trust_threshold: 0.0,
            non_aggression_trust_threshold: 25.0,
            research_trust_threshold: None,
            max_active_alliances: 3,
            accept_trust_bonus: 10.0,
            break_trust_penalty: 30.0,
            decay_after_days: 7,
            accept_morale_bonus: 10.0,
            break_morale_penalty: 20.0,
            resource_sharing_bonus: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub collection_cost: u32,
    pub collection_efficiency: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            collection_cost: 1,
            collection_efficiency: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Action budget granted to each player at the start of a cycle.
    pub turns_per_cycle: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turns_per_cycle: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.combat.base_attack_cost, 2);
        assert_eq!(config.combat.min_attack_strength, 50.0);
        assert_eq!(config.technology.max_tech_level, 10.0);
        assert_eq!(config.diplomacy.max_alliance_size, 3);
        assert_eq!(config.diplomacy.research_trust_threshold, None);
        assert_eq!(config.session.turns_per_cycle, 50);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let json = r#"{ "combat": { "min_attack_strength": 120.0 } }"#;
        let config: GameConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.combat.min_attack_strength, 120.0);
        assert_eq!(config.combat.base_attack_cost, 2);
        assert_eq!(config.diplomacy, DiplomacyConfig::default());
    }
}
