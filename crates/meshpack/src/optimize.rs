//! In-place mesh optimization, delegated to meshoptimizer.
//!
//! These only reorder or shrink the core buffers; encoding always reflects
//! the buffers as they are when the mesh is encoded. Extra per-vertex
//! arrays are not remapped by [`Mesh::optimize_vertex_fetch`].

use meshopt::VertexDataAdapter;

use crate::error::{MeshpackError, Result};
use crate::mesh::{Mesh, VERTEX_SIZE};

/// Default overdraw threshold: allow 5% worse vertex cache efficiency.
pub const DEFAULT_OVERDRAW_THRESHOLD: f32 = 1.05;

/// Default simplification error, relative to the mesh extents.
pub const DEFAULT_SIMPLIFY_ERROR: f32 = 0.01;

/// Index count `simplify` aims for at `ratio`: `floor(index_count * ratio)`,
/// clamped to `index_count` and rounded down to whole triangles.
///
/// The ratio is passed through unchecked; meshoptimizer decides how close
/// it gets.
pub fn simplify_target(index_count: usize, ratio: f32) -> usize {
    let target = (index_count as f64 * f64::from(ratio)) as usize;
    target.min(index_count) / 3 * 3
}

impl Mesh {
    fn position_adapter(&self) -> Result<VertexDataAdapter<'_>> {
        VertexDataAdapter::new(bytemuck::cast_slice(&self.vertices), VERTEX_SIZE, 0)
            .map_err(|e| MeshpackError::Optimization(format!("{e:?}")))
    }

    /// Reorder triangles for vertex cache locality.
    pub fn optimize_vertex_cache(&mut self) -> Result<()> {
        self.validate()?;
        if self.indices.is_empty() {
            return Ok(());
        }
        self.indices = meshopt::optimize_vertex_cache(&self.indices, self.vertices.len());
        Ok(())
    }

    /// Reorder triangles to reduce overdraw.
    ///
    /// Run after [`optimize_vertex_cache`](Self::optimize_vertex_cache);
    /// `threshold` bounds how much cache efficiency may be traded away.
    pub fn optimize_overdraw(&mut self, threshold: f32) -> Result<()> {
        self.validate()?;
        if self.indices.is_empty() {
            return Ok(());
        }
        let mut indices = std::mem::take(&mut self.indices);
        let result = self
            .position_adapter()
            .map(|adapter| meshopt::optimize_overdraw_in_place(&mut indices, &adapter, threshold));
        self.indices = indices;
        result
    }

    /// Reorder vertices into first-use order and drop unreferenced ones.
    pub fn optimize_vertex_fetch(&mut self) -> Result<()> {
        self.validate()?;
        if self.indices.is_empty() {
            return Ok(());
        }
        self.vertices = meshopt::optimize_vertex_fetch(&mut self.indices, &self.vertices);
        Ok(())
    }

    /// Simplify to roughly `ratio` of the current triangle count.
    ///
    /// Only the index buffer shrinks; follow with
    /// [`optimize_vertex_fetch`](Self::optimize_vertex_fetch) to drop
    /// vertices no longer referenced.
    pub fn simplify(&mut self, ratio: f32, target_error: f32) -> Result<()> {
        self.validate()?;
        if self.indices.is_empty() {
            return Ok(());
        }
        let target = simplify_target(self.indices.len(), ratio);
        let simplified = {
            let adapter = self.position_adapter()?;
            meshopt::simplify(&self.indices, &adapter, target, target_error)
        };
        tracing::debug!(
            before = self.indices.len(),
            after = simplified.len(),
            target,
            "Simplified mesh"
        );
        self.indices = simplified;
        Ok(())
    }

    /// Full pipeline: vertex cache, overdraw, vertex fetch.
    pub fn optimize(&mut self) -> Result<()> {
        self.optimize_vertex_cache()?;
        self.optimize_overdraw(DEFAULT_OVERDRAW_THRESHOLD)?;
        self.optimize_vertex_fetch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-triangle-per-face grid of `n` x `n` quads in the XY plane.
    fn grid(n: u32) -> Mesh {
        let mut vertices = Vec::new();
        for y in 0..=n {
            for x in 0..=n {
                vertices.push([x as f32, y as f32, 0.0]);
            }
        }
        let mut indices = Vec::new();
        let row = n + 1;
        for y in 0..n {
            for x in 0..n {
                let i = y * row + x;
                indices.extend_from_slice(&[i, i + 1, i + row, i + 1, i + row + 1, i + row]);
            }
        }
        Mesh::new(vertices, indices).unwrap()
    }

    fn sorted_triangles(mesh: &Mesh) -> Vec<[[u32; 3]; 3]> {
        // Compare triangles by position so vertex reordering does not matter.
        let mut tris: Vec<[[u32; 3]; 3]> = mesh
            .indices
            .chunks_exact(3)
            .map(|t| {
                let mut corners = [0usize, 1, 2].map(|k| {
                    let v = mesh.vertices[t[k] as usize];
                    [v[0].to_bits(), v[1].to_bits(), v[2].to_bits()]
                });
                corners.sort();
                corners
            })
            .collect();
        tris.sort();
        tris
    }

    #[test]
    fn vertex_cache_keeps_triangles() {
        let mut mesh = grid(8);
        let before = sorted_triangles(&mesh);
        mesh.optimize_vertex_cache().unwrap();
        assert_eq!(mesh.index_count(), 8 * 8 * 6);
        assert_eq!(sorted_triangles(&mesh), before);
    }

    #[test]
    fn full_pipeline_keeps_triangles() {
        let mut mesh = grid(6);
        let before = sorted_triangles(&mesh);
        mesh.optimize().unwrap();
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.vertex_count(), 7 * 7);
        assert_eq!(sorted_triangles(&mesh), before);
    }

    #[test]
    fn vertex_fetch_orders_by_first_use() {
        let mut mesh = Mesh::new(
            vec![[9.0; 3], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![1, 2, 3],
        )
        .unwrap();
        mesh.optimize_vertex_fetch().unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(
            &mesh.vertices[..3],
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        );
        assert!(mesh.vertex_count() <= 4);
    }

    #[test]
    fn simplify_never_grows() {
        let mut mesh = grid(10);
        let before = mesh.index_count();
        mesh.simplify(0.25, DEFAULT_SIMPLIFY_ERROR).unwrap();
        assert!(mesh.index_count() <= before);
        assert_eq!(mesh.index_count() % 3, 0);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn simplify_target_rounds_to_triangles() {
        assert_eq!(simplify_target(36, 0.5), 18);
        assert_eq!(simplify_target(36, 0.4), 12);
        assert_eq!(simplify_target(36, 0.49), 15);
        assert_eq!(simplify_target(36, 1.0), 36);
        assert_eq!(simplify_target(36, 2.0), 36);
        assert_eq!(simplify_target(36, 0.0), 0);
    }

    #[test]
    fn invalid_mesh_is_rejected() {
        let mut mesh = Mesh {
            vertices: vec![[0.0; 3]; 2],
            indices: vec![0, 1, 2],
        };
        assert!(mesh.optimize_vertex_cache().unwrap_err().validation().is_some());
        assert!(mesh.simplify(0.5, 0.01).is_err());
    }

    #[test]
    fn empty_mesh_is_a_no_op() {
        let mut mesh = Mesh::default();
        mesh.optimize().unwrap();
        mesh.simplify(0.5, 0.01).unwrap();
        assert_eq!(mesh, Mesh::default());
    }
}
