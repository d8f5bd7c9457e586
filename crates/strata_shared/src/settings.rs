use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    None,
    Mix,
    Add,
    Subtract,
}

/// One noise layer of the terrain stack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainPass {
    pub horizontal_scale: Vec2,
    pub vertical_scale: f32,
    pub octaves: u32,
    pub frequency: f32,
    pub contrast: f32,
    /// Lower edge of the elevation band this pass acts on.
    pub min_height: f32,
    pub max_height: f32,
    pub blend_mode: BlendMode,
    pub blend_weight: f32,
    /// Row-major per-cell weights; must cover the whole heightfield when present.
    pub mask: Option<Vec<f32>>,
}

impl Default for TerrainPass {
    fn default() -> Self {
        Self {
            horizontal_scale: Vec2::new(2.0, 2.0),
            vertical_scale: 50.0,
            octaves: 1,
            frequency: 1.0,
            contrast: 1.0,
            min_height: -200.0,
            max_height: 200.0,
            blend_mode: BlendMode::None,
            blend_weight: 0.5,
            mask: None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    #[default]
    Gameplay,
    Static,
}

/// A placement rule from the item catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldItemSettings {
    pub name: String,
    pub model: String,
    pub category: ItemCategory,
    pub levitation: f32,
    pub min_size: f32,
    pub max_size: f32,
    pub randomize_y_rotation: bool,
    /// Upper bound in degrees for the X and Z tilt; zero disables tilting.
    pub randomize_tilt_angle: f32,
    pub minimum_spawn_altitude: f32,
    pub maximum_spawn_altitude: f32,
    /// Above 1: target sample count for blue-noise placement. At or below 1: chance of one item.
    pub concentration: f32,
    pub max_slope_degrees: Option<f32>,
}

impl Default for WorldItemSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            model: String::new(),
            category: ItemCategory::Gameplay,
            levitation: 2.0,
            min_size: 0.9,
            max_size: 1.1,
            randomize_y_rotation: true,
            randomize_tilt_angle: 10.0,
            minimum_spawn_altitude: 0.0,
            maximum_spawn_altitude: 100.0,
            concentration: 1.0,
            max_slope_degrees: None,
        }
    }
}

impl WorldItemSettings {
    pub fn new(name: &str, model: &str, category: ItemCategory) -> Self {
        Self {
            name: name.to_owned(),
            model: model.to_owned(),
            category,
            ..Self::default()
        }
    }
}

/// Terrain passes, item catalog, and the elevation range used for quantization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub lowest_point: f32,
    pub highest_point: f32,
    pub passes: Vec<TerrainPass>,
    pub items: Vec<WorldItemSettings>,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            lowest_point: -200.0,
            highest_point: 200.0,
            passes: default_passes(),
            items: default_item_catalog(),
        }
    }
}

pub fn default_passes() -> Vec<TerrainPass> {
    vec![
        TerrainPass {
            horizontal_scale: Vec2::splat(3000.0),
            vertical_scale: 120.0,
            octaves: 2,
            frequency: 3.0,
            blend_mode: BlendMode::Mix,
            ..TerrainPass::default()
        },
        TerrainPass {
            horizontal_scale: Vec2::splat(700.0),
            vertical_scale: 50.0,
            octaves: 3,
            blend_mode: BlendMode::Mix,
            ..TerrainPass::default()
        },
        TerrainPass {
            horizontal_scale: Vec2::splat(300.0),
            vertical_scale: 15.0,
            octaves: 2,
            frequency: 5.0,
            min_height: -20.0,
            max_height: 10.0,
            blend_mode: BlendMode::Add,
            blend_weight: 0.3,
            ..TerrainPass::default()
        },
        TerrainPass {
            horizontal_scale: Vec2::splat(150.0),
            vertical_scale: 70.0,
            octaves: 2,
            frequency: 5.0,
            min_height: 20.0,
            max_height: 200.0,
            blend_mode: BlendMode::Add,
            ..TerrainPass::default()
        },
    ]
}

pub fn default_item_catalog() -> Vec<WorldItemSettings> {
    let static_item = |name: &str| WorldItemSettings {
        levitation: 0.0,
        ..WorldItemSettings::new(name, &format!("static/{name}"), ItemCategory::Static)
    };

    vec![
        WorldItemSettings {
            concentration: 3.0,
            randomize_tilt_angle: 5.0,
            min_size: 0.8,
            max_size: 1.2,
            minimum_spawn_altitude: 15.0,
            ..static_item("tree_2")
        },
        WorldItemSettings {
            concentration: 1.0,
            ..static_item("wall")
        },
        WorldItemSettings {
            concentration: 3.0,
            min_size: 0.8,
            max_size: 1.3,
            ..static_item("bush_berries")
        },
        WorldItemSettings {
            concentration: 5.0,
            ..static_item("stoneandplant")
        },
        WorldItemSettings {
            concentration: 0.1,
            min_size: 0.8,
            max_size: 2.0,
            ..static_item("schroom")
        },
        WorldItemSettings {
            concentration: 1.7,
            randomize_tilt_angle: 5.0,
            minimum_spawn_altitude: 8.0,
            min_size: 0.8,
            max_size: 1.7,
            ..static_item("tree_3")
        },
        WorldItemSettings {
            concentration: 0.01,
            minimum_spawn_altitude: 30.0,
            ..static_item("pine_tree_1")
        },
        WorldItemSettings {
            concentration: 0.01,
            min_size: 0.7,
            max_size: 0.7,
            minimum_spawn_altitude: 10.0,
            randomize_y_rotation: false,
            randomize_tilt_angle: 0.0,
            ..static_item("tower")
        },
        WorldItemSettings {
            concentration: 2.2,
            randomize_tilt_angle: 3.0,
            minimum_spawn_altitude: -0.2,
            maximum_spawn_altitude: 6.0,
            min_size: 1.5,
            max_size: 1.8,
            ..static_item("palm_tree_1")
        },
        WorldItemSettings {
            concentration: 3.0,
            min_size: 2.0,
            max_size: 2.0,
            levitation: 6.0,
            ..WorldItemSettings::new("power_up", "gameplay/power_up", ItemCategory::Gameplay)
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::{BlendMode, ItemCategory, MapSettings, TerrainPass, WorldItemSettings};

    #[test]
    fn default_map_has_ordered_passes() {
        let map = MapSettings::default();
        assert_eq!(map.passes.len(), 4);
        assert_eq!(map.passes[0].vertical_scale, 120.0);
        assert_eq!(map.passes[2].blend_mode, BlendMode::Add);
        assert_eq!(map.passes[2].min_height, -20.0);
        assert!(map.passes.iter().all(|pass| pass.mask.is_none()));
        assert!(map.lowest_point < map.highest_point);
    }

    #[test]
    fn catalog_names_are_unique() {
        let map = MapSettings::default();
        let mut names: Vec<&str> = map.items.iter().map(|item| item.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), map.items.len());
        assert_eq!(
            map.items
                .iter()
                .filter(|item| item.category == ItemCategory::Gameplay)
                .count(),
            1
        );
    }

    #[test]
    fn struct_defaults_match_rule_defaults() {
        let pass = TerrainPass::default();
        assert_eq!(pass.blend_mode, BlendMode::None);
        assert_eq!(pass.blend_weight, 0.5);

        let rule = WorldItemSettings::default();
        assert_eq!(rule.concentration, 1.0);
        assert_eq!(rule.maximum_spawn_altitude, 100.0);
        assert!(rule.randomize_y_rotation);
    }
}
