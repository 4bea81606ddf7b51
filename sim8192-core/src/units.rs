//! Combat units, their special abilities and timed status effects.
//!
//! Units live in a single arena keyed by [`UnitId`]. Everything else in
//! the game (player state, combat actions) refers to units by id only.

use crate::state::{PlayerId, ResourceImpact, ResourceKind, UnitId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitType {
    Infantry,
    Mechanized,
    Aerial,
    Naval,
    Special,
}

impl UnitType {
    pub const ALL: [UnitType; 5] = [
        UnitType::Infantry,
        UnitType::Mechanized,
        UnitType::Aerial,
        UnitType::Naval,
        UnitType::Special,
    ];

    pub fn base_stats(&self) -> CombatStats {
        let (attack, defense, mobility, range) = match self {
            UnitType::Infantry => (3, 2, 2, 1),
            UnitType::Mechanized => (4, 4, 3, 2),
            UnitType::Aerial => (5, 2, 5, 4),
            UnitType::Naval => (6, 5, 2, 5),
            UnitType::Special => (4, 3, 3, 3),
        };
        CombatStats {
            attack,
            defense,
            mobility,
            range,
        }
    }

    pub fn abilities(&self) -> Vec<SpecialAbility> {
        use ResourceKind::*;
        let ability = match self {
            UnitType::Infantry => SpecialAbility::new(
                "entrench",
                "Entrench",
                2,
                &[(Morale, 1.0)],
                EffectKind::Buff,
                2,
                2,
            ),
            UnitType::Mechanized => SpecialAbility::new(
                "breakthrough",
                "Breakthrough",
                3,
                &[(Energy, 2.0)],
                EffectKind::Buff,
                2,
                1,
            ),
            UnitType::Aerial => SpecialAbility::new(
                "surgical_strike",
                "Surgical Strike",
                3,
                &[(Intelligence, 2.0)],
                EffectKind::Damage,
                3,
                1,
            ),
            UnitType::Naval => SpecialAbility::new(
                "coastal_bombardment",
                "Coastal Bombardment",
                4,
                &[(Materials, 3.0)],
                EffectKind::Damage,
                2,
                1,
            ),
            UnitType::Special => SpecialAbility::new(
                "sabotage",
                "Sabotage",
                3,
                &[(Intelligence, 2.0), (Morale, 1.0)],
                EffectKind::Debuff,
                2,
                2,
            ),
        };
        vec![ability]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombatStats {
    pub attack: i32,
    pub defense: i32,
    pub mobility: i32,
    pub range: i32,
}

impl CombatStats {
    fn map(self, f: impl Fn(i32) -> i32) -> Self {
        Self {
            attack: f(self.attack),
            defense: f(self.defense),
            mobility: f(self.mobility),
            range: f(self.range),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Damage,
    Buff,
    Debuff,
    /// Reserved; has no effect yet.
    Utility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialAbility {
    pub id: String,
    pub name: String,
    /// Turns before the ability can fire again.
    pub cooldown: u32,
    pub resource_cost: ResourceImpact,
    pub effect: EffectKind,
    pub magnitude: i32,
    pub duration: u32,
}

impl SpecialAbility {
    fn new(
        id: &str,
        name: &str,
        cooldown: u32,
        cost: &[(ResourceKind, f64)],
        effect: EffectKind,
        magnitude: i32,
        duration: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            cooldown,
            resource_cost: cost.iter().copied().collect(),
            effect,
            magnitude,
            duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Id of the ability that applied it.
    pub source: String,
    pub magnitude: i32,
    pub remaining_turns: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UnitStatus {
    pub buffs: Vec<StatusEffect>,
    pub debuffs: Vec<StatusEffect>,
    pub is_engaged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerUnit {
    pub id: UnitId,
    pub unit_type: UnitType,
    pub owner_id: PlayerId,
    pub position: Position,
    pub stats: CombatStats,
    /// 0..=100; a unit at 0 is destroyed.
    pub health: i32,
    pub experience: u32,
    pub level: u32,
    pub special_abilities: Vec<SpecialAbility>,
    pub ability_cooldowns: FxHashMap<String, u32>,
    pub status: UnitStatus,
}

impl ServerUnit {
    pub fn ability(&self, ability_id: &str) -> Option<&SpecialAbility> {
        self.special_abilities.iter().find(|a| a.id == ability_id)
    }

    pub fn cooldown(&self, ability_id: &str) -> u32 {
        self.ability_cooldowns.get(ability_id).copied().unwrap_or(0)
    }

    pub fn is_destroyed(&self) -> bool {
        self.health <= 0
    }

    /// Base stats plus active buffs minus active debuffs, each floored at 1.
    pub fn effective_stats(&self) -> CombatStats {
        let buffs: i32 = self.status.buffs.iter().map(|b| b.magnitude).sum();
        let debuffs: i32 = self.status.debuffs.iter().map(|d| d.magnitude).sum();
        self.stats.map(|s| (s + buffs - debuffs).max(1))
    }

    fn apply(&mut self, ability: &SpecialAbility) {
        let effect = StatusEffect {
            source: ability.id.clone(),
            magnitude: ability.magnitude,
            remaining_turns: ability.duration,
        };
        match ability.effect {
            EffectKind::Damage => self.health = (self.health - ability.magnitude).max(0),
            EffectKind::Buff => self.status.buffs.push(effect),
            EffectKind::Debuff => self.status.debuffs.push(effect),
            EffectKind::Utility => {}
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("Unknown unit: {0}")]
    UnknownUnit(UnitId),
    #[error("Unit {unit} has no ability '{ability}'")]
    UnknownAbility { unit: UnitId, ability: String },
    #[error("Ability '{ability}' on cooldown for {remaining} more turns")]
    OnCooldown { ability: String, remaining: u32 },
}

/// Outcome of a fired ability.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityUse {
    pub ability: SpecialAbility,
    /// Targets that resolved to live units; unknown ids are skipped.
    pub affected: Vec<UnitId>,
}

#[derive(Debug, Clone, Default)]
pub struct UnitManager {
    units: FxHashMap<UnitId, ServerUnit>,
    next_id: u64,
}

impl UnitManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_unit(
        &mut self,
        unit_type: UnitType,
        owner_id: impl Into<PlayerId>,
        position: Position,
    ) -> &ServerUnit {
        self.next_id += 1;
        let id = UnitId(self.next_id);
        let unit = ServerUnit {
            id,
            unit_type,
            owner_id: owner_id.into(),
            position,
            stats: unit_type.base_stats(),
            health: 100,
            experience: 0,
            level: 1,
            special_abilities: unit_type.abilities(),
            ability_cooldowns: FxHashMap::default(),
            status: UnitStatus::default(),
        };
        log::debug!("Created {:?} {} for {}", unit_type, id, unit.owner_id);
        self.units.entry(id).or_insert(unit)
    }

    pub fn get_unit(&self, id: UnitId) -> Option<&ServerUnit> {
        self.units.get(&id)
    }

    /// Replace a unit wholesale. Returns false if the id is unknown.
    pub fn update_unit(&mut self, unit: ServerUnit) -> bool {
        match self.units.get_mut(&unit.id) {
            Some(slot) => {
                *slot = unit;
                true
            }
            None => false,
        }
    }

    pub fn delete_unit(&mut self, id: UnitId) -> bool {
        self.units.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Ids owned by `owner`, ascending.
    pub fn units_owned_by(&self, owner: &str) -> Vec<UnitId> {
        let mut ids: Vec<_> = self
            .units
            .values()
            .filter(|u| u.owner_id == owner)
            .map(|u| u.id)
            .collect();
        ids.sort();
        ids
    }

    /// The ability if it exists and is off cooldown.
    pub fn ready_ability(
        &self,
        unit_id: UnitId,
        ability_id: &str,
    ) -> Result<&SpecialAbility, UnitError> {
        let unit = self
            .units
            .get(&unit_id)
            .ok_or(UnitError::UnknownUnit(unit_id))?;
        let ability = unit
            .ability(ability_id)
            .ok_or_else(|| UnitError::UnknownAbility {
                unit: unit_id,
                ability: ability_id.to_string(),
            })?;
        let remaining = unit.cooldown(ability_id);
        if remaining > 0 {
            return Err(UnitError::OnCooldown {
                ability: ability_id.to_string(),
                remaining,
            });
        }
        Ok(ability)
    }

    /// Fire an ability at `targets` and start its cooldown.
    ///
    /// On error nothing is mutated.
    pub fn use_special_ability(
        &mut self,
        unit_id: UnitId,
        ability_id: &str,
        targets: &[UnitId],
    ) -> Result<AbilityUse, UnitError> {
        let ability = self.ready_ability(unit_id, ability_id)?.clone();

        let mut affected = Vec::with_capacity(targets.len());
        for target in targets {
            if let Some(unit) = self.units.get_mut(target) {
                unit.apply(&ability);
                affected.push(*target);
            }
        }

        if let Some(unit) = self.units.get_mut(&unit_id) {
            unit.ability_cooldowns
                .insert(ability.id.clone(), ability.cooldown);
        }

        Ok(AbilityUse { ability, affected })
    }

    /// Tick every cooldown and status effect down by one turn.
    pub fn process_turn_end(&mut self) {
        for unit in self.units.values_mut() {
            for cooldown in unit.ability_cooldowns.values_mut() {
                *cooldown = cooldown.saturating_sub(1);
            }
            for effects in [&mut unit.status.buffs, &mut unit.status.debuffs] {
                effects.retain_mut(|e| {
                    e.remaining_turns = e.remaining_turns.saturating_sub(1);
                    e.remaining_turns > 0
                });
            }
        }
    }

    /// Remove every unit at zero health, returning the removed ids ascending.
    pub fn remove_destroyed(&mut self) -> Vec<UnitId> {
        let mut destroyed: Vec<_> = self
            .units
            .values()
            .filter(|u| u.is_destroyed())
            .map(|u| u.id)
            .collect();
        destroyed.sort();
        for id in &destroyed {
            self.units.remove(id);
        }
        destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(manager: &mut UnitManager, unit_type: UnitType, owner: &str) -> UnitId {
        manager.create_unit(unit_type, owner, Position::default()).id
    }

    #[test]
    fn test_infantry_creation() {
        let mut manager = UnitManager::new();
        let id = spawn(&mut manager, UnitType::Infantry, "p1");
        let unit = manager.get_unit(id).unwrap();

        assert_eq!(
            unit.stats,
            CombatStats {
                attack: 3,
                defense: 2,
                mobility: 2,
                range: 1
            }
        );
        assert_eq!(unit.health, 100);
        assert_eq!(unit.level, 1);
        assert!(unit.status.buffs.is_empty());
        assert!(unit.status.debuffs.is_empty());
        assert_eq!(unit.special_abilities[0].id, "entrench");
    }

    #[test]
    fn test_ids_never_collide() {
        let mut manager = UnitManager::new();
        let ids: Vec<_> = (0..100)
            .map(|_| spawn(&mut manager, UnitType::Naval, "p1"))
            .collect();
        let unique: std::collections::BTreeSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 100);
        assert_eq!(manager.len(), 100);
    }

    #[test]
    fn test_damage_floors_at_zero() {
        let mut manager = UnitManager::new();
        let bomber = spawn(&mut manager, UnitType::Aerial, "p1");
        let target = spawn(&mut manager, UnitType::Infantry, "p2");

        let mut unit = manager.get_unit(target).unwrap().clone();
        unit.health = 2;
        assert!(manager.update_unit(unit));

        let used = manager
            .use_special_ability(bomber, "surgical_strike", &[target, UnitId(999)])
            .unwrap();
        assert_eq!(used.affected, vec![target]);
        assert_eq!(manager.get_unit(target).unwrap().health, 0);

        assert_eq!(manager.remove_destroyed(), vec![target]);
        assert!(manager.get_unit(target).is_none());
    }

    #[test]
    fn test_cooldown_blocks_without_mutation() {
        let mut manager = UnitManager::new();
        let saboteur = spawn(&mut manager, UnitType::Special, "p1");
        let target = spawn(&mut manager, UnitType::Mechanized, "p2");

        manager
            .use_special_ability(saboteur, "sabotage", &[target])
            .unwrap();
        let before = manager.get_unit(target).unwrap().clone();

        let err = manager
            .use_special_ability(saboteur, "sabotage", &[target])
            .unwrap_err();
        assert_eq!(
            err,
            UnitError::OnCooldown {
                ability: "sabotage".into(),
                remaining: 3
            }
        );
        assert_eq!(manager.get_unit(target).unwrap(), &before);
    }

    #[test]
    fn test_unknown_unit_and_ability() {
        let mut manager = UnitManager::new();
        let id = spawn(&mut manager, UnitType::Infantry, "p1");

        assert!(matches!(
            manager.use_special_ability(UnitId(42), "entrench", &[]),
            Err(UnitError::UnknownUnit(_))
        ));
        assert!(matches!(
            manager.use_special_ability(id, "sabotage", &[]),
            Err(UnitError::UnknownAbility { .. })
        ));
    }

    #[test]
    fn test_turn_end_expires_effects_and_cooldowns() {
        let mut manager = UnitManager::new();
        let tank = spawn(&mut manager, UnitType::Mechanized, "p1");

        manager
            .use_special_ability(tank, "breakthrough", &[tank])
            .unwrap();
        assert_eq!(
            manager.get_unit(tank).unwrap().effective_stats().attack,
            6
        );

        manager.process_turn_end();
        let unit = manager.get_unit(tank).unwrap();
        assert!(unit.status.buffs.is_empty());
        assert_eq!(unit.cooldown("breakthrough"), 2);

        manager.process_turn_end();
        manager.process_turn_end();
        assert!(manager.ready_ability(tank, "breakthrough").is_ok());
    }

    #[test]
    fn test_effective_stats_floor_at_one() {
        let mut manager = UnitManager::new();
        let saboteur = spawn(&mut manager, UnitType::Special, "p1");
        let target = spawn(&mut manager, UnitType::Infantry, "p2");

        manager
            .use_special_ability(saboteur, "sabotage", &[target])
            .unwrap();
        let stats = manager.get_unit(target).unwrap().effective_stats();

        assert_eq!(stats.attack, 1);
        assert_eq!(stats.defense, 1);
        assert_eq!(stats.range, 1);
    }

    #[test]
    fn test_units_owned_by_sorted() {
        let mut manager = UnitManager::new();
        let a = spawn(&mut manager, UnitType::Infantry, "p1");
        spawn(&mut manager, UnitType::Infantry, "p2");
        let c = spawn(&mut manager, UnitType::Naval, "p1");

        assert_eq!(manager.units_owned_by("p1"), vec![a, c]);
        assert!(manager.delete_unit(a));
        assert!(!manager.delete_unit(a));
        assert_eq!(manager.units_owned_by("p1"), vec![c]);
    }
}
