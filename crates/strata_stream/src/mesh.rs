use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use strata_shared::heightfield::Heightfield;

use crate::lod::skip_increment;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// Renderable geometry for one chunk at one LOD, in chunk-local space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerrainMesh {
    pub lod: u8,
    pub vertices: Vec<TerrainVertex>,
    pub indices: Vec<u32>,
}

impl TerrainMesh {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Height and slope thresholds for vertex colouring.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColorRamp {
    pub lowest: f32,
    pub highest: f32,
    /// Below this height vertices fade toward the shore tint.
    pub shore_height: f32,
    /// Multiplier applied to `1 - |n.y|` before it dims the flat channel.
    pub slope_sensitivity: f32,
}

impl Default for ColorRamp {
    fn default() -> Self {
        Self {
            lowest: -200.0,
            highest: 200.0,
            shore_height: 5.0,
            slope_sensitivity: 250.0,
        }
    }
}

impl ColorRamp {
    /// Red marks flat ground, green marks height, blue marks shoreline.
    /// A channel at or above 0.9 suppresses the others so the shader sees a clean mask.
    pub fn color(&self, slope: f32, height: f32) -> [f32; 4] {
        let mut red = (1.0 - slope * self.slope_sensitivity).clamp(0.0, 1.0);
        let mut green = if height < 0.0 {
            1.0
        } else {
            ((height - self.lowest) / (self.highest - self.lowest)).clamp(0.0, 1.0)
        };
        let mut blue = ((self.shore_height - height) / 2.0).clamp(0.0, 1.0);

        if blue >= 0.9 {
            red = 0.0;
            green = 0.0;
        }
        if red >= 0.9 {
            green = 0.0;
            blue = 0.0;
        }
        if green >= 0.9 {
            red = 0.0;
            blue = 0.0;
        }
        [red, green, blue, 1.0]
    }
}

/// Turns a padded heightfield into a stitched mesh.
///
/// The outermost ring of samples is never rendered and only feeds normals. The next
/// ring is always emitted at full resolution, so neighbouring chunks meet on identical
/// vertices whatever their LOD. The ring after that interpolates between coarse main
/// vertices, which keeps the inner grid free of T-junctions.
#[derive(Debug, Clone, Copy)]
pub struct ChunkMeshBuilder {
    mesh_scale: f32,
    ramp: ColorRamp,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Slot {
    Skipped,
    Border(usize),
    Mesh(usize),
}

impl ChunkMeshBuilder {
    pub fn new(mesh_scale: f32) -> Self {
        Self {
            mesh_scale,
            ramp: ColorRamp::default(),
        }
    }

    pub fn with_ramp(mesh_scale: f32, ramp: ColorRamp) -> Self {
        Self { mesh_scale, ramp }
    }

    pub fn build(&self, heightfield: &Heightfield, lod: u8) -> TerrainMesh {
        let n = heightfield.size();
        if n < 6 {
            return TerrainMesh {
                lod,
                ..TerrainMesh::default()
            };
        }

        let skip = skip_increment(lod);
        let span = (n - 3) as f32;
        let world_size = span * self.mesh_scale;
        let top_left = Vec2::new(-1.0, 1.0) * world_size / 2.0;

        let slots = classify(n, skip);
        let mesh_count = slots.iter().filter(|slot| matches!(slot, Slot::Mesh(_))).count();
        let border_count = slots.iter().filter(|slot| matches!(slot, Slot::Border(_))).count();

        let mut positions = vec![Vec3::ZERO; mesh_count];
        let mut uvs = vec![Vec2::ZERO; mesh_count];
        let mut border_positions = vec![Vec3::ZERO; border_count];
        let mut triangles: Vec<[Slot; 3]> = Vec::new();

        for y in 0..n {
            for x in 0..n {
                let slot = slots[y * n + x];
                if slot == Slot::Skipped {
                    continue;
                }
                let kind = VertexKind::of(x, y, n, skip);

                let percent = Vec2::new((x as f32 - 1.0) / span, (y as f32 - 1.0) / span);
                let planar = top_left + Vec2::new(percent.x, -percent.y) * world_size;

                let height = if kind == VertexKind::EdgeConnection {
                    connection_height(heightfield, x, y, n, skip)
                } else {
                    heightfield.at(x, y)
                };
                let position = Vec3::new(planar.x, height, planar.y);

                match slot {
                    Slot::Mesh(index) => {
                        positions[index] = position;
                        uvs[index] = percent;
                    }
                    Slot::Border(index) => border_positions[index] = position,
                    Slot::Skipped => {}
                }

                let emits = x < n - 1
                    && y < n - 1
                    && (kind != VertexKind::EdgeConnection || (x != 2 && y != 2));
                if emits {
                    let step = if kind == VertexKind::Main && x != n - 3 && y != n - 3 {
                        skip
                    } else {
                        1
                    };
                    let a = slots[y * n + x];
                    let b = slots[y * n + x + step];
                    let c = slots[(y + step) * n + x];
                    let d = slots[(y + step) * n + x + step];
                    triangles.push([a, d, b]);
                    triangles.push([a, c, d]);
                }
            }
        }

        let lookup = |slot: Slot| -> Vec3 {
            match slot {
                Slot::Mesh(index) => positions[index],
                Slot::Border(index) => border_positions[index],
                Slot::Skipped => Vec3::ZERO,
            }
        };

        let mut normals = vec![Vec3::ZERO; mesh_count];
        let mut indices = Vec::with_capacity(triangles.len() * 3);
        for triangle in &triangles {
            let [a, b, c] = triangle.map(lookup);
            let normal = (c - a).cross(b - a).normalize_or_zero();
            let mut rendered = true;
            for slot in triangle {
                match *slot {
                    Slot::Mesh(index) => normals[index] += normal,
                    _ => rendered = false,
                }
            }
            if rendered {
                for slot in triangle {
                    if let Slot::Mesh(index) = *slot {
                        indices.push(index as u32);
                    }
                }
            }
        }

        let vertices = positions
            .iter()
            .zip(&normals)
            .zip(&uvs)
            .map(|((position, normal), uv)| {
                let normal = normal.normalize_or_zero();
                let slope = 1.0 - normal.dot(Vec3::Y).abs();
                TerrainVertex {
                    position: position.to_array(),
                    normal: normal.to_array(),
                    uv: uv.to_array(),
                    color: self.ramp.color(slope, position.y),
                }
            })
            .collect();

        TerrainMesh {
            lod,
            vertices,
            indices,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum VertexKind {
    Border,
    MeshEdge,
    Main,
    EdgeConnection,
    Inner,
}

impl VertexKind {
    fn of(x: usize, y: usize, n: usize, skip: usize) -> Self {
        if x == 0 || y == 0 || x == n - 1 || y == n - 1 {
            return VertexKind::Border;
        }
        if x == 1 || y == 1 || x == n - 2 || y == n - 2 {
            return VertexKind::MeshEdge;
        }
        if (x - 2) % skip == 0 && (y - 2) % skip == 0 {
            return VertexKind::Main;
        }
        if x == 2 || y == 2 || x == n - 3 || y == n - 3 {
            return VertexKind::EdgeConnection;
        }
        VertexKind::Inner
    }
}

/// Assigns border vertices and rendered vertices their own index ranges, row-major.
fn classify(n: usize, skip: usize) -> Vec<Slot> {
    let mut slots = Vec::with_capacity(n * n);
    let mut mesh_index = 0;
    let mut border_index = 0;
    for y in 0..n {
        for x in 0..n {
            let slot = match VertexKind::of(x, y, n, skip) {
                VertexKind::Border => {
                    border_index += 1;
                    Slot::Border(border_index - 1)
                }
                VertexKind::Inner => Slot::Skipped,
                _ => {
                    mesh_index += 1;
                    Slot::Mesh(mesh_index - 1)
                }
            };
            slots.push(slot);
        }
    }
    slots
}

/// Height on the straight line between the two main vertices bracketing `(x, y)`.
fn connection_height(heightfield: &Heightfield, x: usize, y: usize, n: usize, skip: usize) -> f32 {
    let vertical = x == 2 || x == n - 3;
    let along = if vertical { y - 2 } else { x - 2 };
    let to_a = along % skip;
    let to_b = skip - to_a;
    let t = to_a as f32 / skip as f32;

    let (height_a, height_b) = if vertical {
        (heightfield.at(x, y - to_a), heightfield.at(x, y + to_b))
    } else {
        (heightfield.at(x - to_a, y), heightfield.at(x + to_b, y))
    };
    height_a * (1.0 - t) + height_b * t
}

#[cfg(test)]
mod tests {
    use glam::{IVec2, Vec3};
    use strata_shared::blend::TerrainPassBlender;
    use strata_shared::coords::{ChunkGeometry, GridPos};
    use strata_shared::heightfield::Heightfield;
    use strata_shared::noise_field::NoiseField;
    use strata_shared::settings::default_passes;

    use super::{ChunkMeshBuilder, ColorRamp, TerrainMesh};
    use crate::lod::{skip_increment, MAX_LOD};

    fn terrain(geometry: &ChunkGeometry, pos: GridPos) -> Heightfield {
        TerrainPassBlender::new(NoiseField::new(1234))
            .blend(
                &default_passes(),
                geometry.num_verts_per_line(),
                geometry.sample_offset(pos),
            )
            .expect("blend succeeds")
    }

    fn expected_counts(n: usize, skip: usize) -> (usize, usize) {
        let edge = (n - 2) * 4 - 4;
        let connection = (skip - 1) * (n - 5) / skip * 4;
        let main_per_line = (n - 5) / skip + 1;
        let vertices = edge + connection + main_per_line * main_per_line;
        let triangles = 8 * (n - 4) + (main_per_line - 1) * (main_per_line - 1) * 2;
        (vertices, triangles)
    }

    /// Heights of the vertices lying on `position[axis] == at`, ordered along the other axis.
    fn edge_heights(mesh: &TerrainMesh, axis: usize, at: f32) -> Vec<(i64, f32)> {
        let along = 2 - axis;
        let mut heights: Vec<(i64, f32)> = mesh
            .vertices
            .iter()
            .filter(|vertex| vertex.position[axis] == at)
            .map(|vertex| ((vertex.position[along] * 1000.0).round() as i64, vertex.position[1]))
            .collect();
        heights.sort_by_key(|entry| entry.0);
        heights
    }

    #[test]
    fn vertex_and_triangle_counts_match_lod_layout() {
        let geometry = ChunkGeometry::new(48, 1.0).expect("supported size");
        let field = terrain(&geometry, GridPos::ZERO);
        let builder = ChunkMeshBuilder::new(1.0);
        for lod in 0..=MAX_LOD {
            let mesh = builder.build(&field, lod);
            let (vertices, triangles) = expected_counts(53, skip_increment(lod));
            assert_eq!(mesh.vertices.len(), vertices, "lod {lod}");
            assert_eq!(mesh.triangle_count(), triangles, "lod {lod}");
            assert!(mesh.indices.iter().all(|index| (*index as usize) < mesh.vertices.len()));
            assert_eq!(mesh.lod, lod);
        }
    }

    #[test]
    fn shared_edges_match_across_different_lods() {
        let geometry = ChunkGeometry::new(48, 1.0).expect("supported size");
        let builder = ChunkMeshBuilder::new(geometry.mesh_scale());
        let half = geometry.mesh_world_size() / 2.0;
        let west = terrain(&geometry, GridPos::new(0, 0));
        let east = terrain(&geometry, GridPos::new(1, 0));

        for (lod_a, lod_b) in [(0, 2), (2, 3), (4, 0), (3, 3)] {
            let west_edge = edge_heights(&builder.build(&west, lod_a), 0, half);
            let east_edge = edge_heights(&builder.build(&east, lod_b), 0, -half);
            assert_eq!(west_edge.len(), 51);
            assert_eq!(west_edge, east_edge, "lods {lod_a}/{lod_b}");
        }
    }

    #[test]
    fn shared_edges_match_between_north_and_south_neighbours() {
        let geometry = ChunkGeometry::new(48, 1.0).expect("supported size");
        let builder = ChunkMeshBuilder::new(geometry.mesh_scale());
        let half = geometry.mesh_world_size() / 2.0;
        let south = terrain(&geometry, GridPos::new(0, 0));
        let north = terrain(&geometry, GridPos::new(0, 1));

        for (lod_a, lod_b) in [(0, 4), (2, 3), (4, 0), (1, 1)] {
            let south_edge = edge_heights(&builder.build(&south, lod_a), 2, half);
            let north_edge = edge_heights(&builder.build(&north, lod_b), 2, -half);
            assert_eq!(south_edge.len(), 51);
            assert_eq!(south_edge, north_edge, "lods {lod_a}/{lod_b}");
        }
    }

    #[test]
    fn connection_vertices_lie_on_coarse_edges() {
        let size = 53;
        let samples = (0..size * size).map(|i| ((i * 7919) % 113) as f32).collect();
        let field = Heightfield::from_samples(size, samples).expect("sample count matches");
        let mesh = ChunkMeshBuilder::new(1.0).build(&field, 2);
        let skip = skip_increment(2);

        // Interior of column x = 2, ordered by row.
        let first_column = 1.0 / 50.0;
        let mut column: Vec<(f32, f32)> = mesh
            .vertices
            .iter()
            .filter(|vertex| vertex.uv[0] == first_column && vertex.uv[1] > 0.0 && vertex.uv[1] < 1.0)
            .map(|vertex| (vertex.uv[1], vertex.position[1]))
            .collect();
        column.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert_eq!(column.len(), 49);

        for window in column.windows(skip + 1).step_by(skip) {
            let (start, end) = (window[0].1, window[skip].1);
            for (offset, entry) in window.iter().enumerate() {
                let t = offset as f32 / skip as f32;
                let expected = start * (1.0 - t) + end * t;
                assert!((entry.1 - expected).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn flat_terrain_has_upward_normals() {
        let field = Heightfield::new_filled(53, 10.0);
        let mesh = ChunkMeshBuilder::new(1.0).build(&field, 1);
        for vertex in &mesh.vertices {
            assert!((Vec3::from(vertex.normal) - Vec3::Y).length() < 1e-5);
        }
        assert!(mesh.vertices.iter().all(|vertex| vertex.color[0] == 1.0));
    }

    #[test]
    fn building_leaves_heightfield_untouched() {
        let geometry = ChunkGeometry::new(72, 2.0).expect("supported size");
        let field = TerrainPassBlender::new(NoiseField::new(3))
            .blend(&default_passes(), geometry.num_verts_per_line(), IVec2::ZERO)
            .expect("blend succeeds");
        let snapshot = field.clone();
        let builder = ChunkMeshBuilder::new(2.0);
        let a = builder.build(&field, 3);
        let b = builder.build(&field, 3);
        assert_eq!(field, snapshot);
        assert_eq!(a, b);
        let extent = a
            .vertices
            .iter()
            .map(|vertex| vertex.position[0].abs())
            .fold(0.0f32, f32::max);
        assert_eq!(extent, geometry.mesh_world_size() / 2.0);
    }

    #[test]
    fn ramp_channels_are_exclusive_at_extremes() {
        let ramp = ColorRamp::default();
        assert_eq!(ramp.color(0.0, 50.0), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(ramp.color(0.5, -10.0)[2], 1.0);
        assert_eq!(ramp.color(0.5, -10.0)[1], 0.0);
        let steep_peak = ramp.color(0.5, 190.0);
        assert_eq!(steep_peak, [0.0, 0.975, 0.0, 1.0]);
    }
}
