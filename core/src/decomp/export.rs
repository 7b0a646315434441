//! Collider export: OBJ geometry and the JSON rig document

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use hashbrown::HashMap;
use tracing::info;

use crate::draw::{DrawMesh, DrawObject};
use crate::import::parts::{Part, PartBone, PartsDocument};
use crate::skeleton::Skeleton;

/// Index width for `Collider_NN` names: at least two digits.
fn pad_width(count: usize) -> usize {
    count.saturating_sub(1).to_string().len().max(2)
}

/// Weld identical corners of a triangle-list object into indexed geometry.
fn indexed(object: &DrawObject) -> (Vec<glam::Vec3>, Vec<[u32; 3]>) {
    let mut vertices = Vec::new();
    let mut lookup: HashMap<[u32; 3], u32> = HashMap::new();

    let corners: Vec<u32> = object
        .shape
        .attributes
        .positions
        .iter()
        .map(|p| {
            *lookup
                .entry(p.to_array().map(f32::to_bits))
                .or_insert_with(|| {
                    vertices.push(*p);
                    vertices.len() as u32 - 1
                })
        })
        .collect();
    let faces = corners.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();

    (vertices, faces)
}

/// Write every object as `o Collider_NN` with 1-based global indices.
pub fn write_collider_obj(mesh: &DrawMesh, path: &Path) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    let width = pad_width(mesh.len());

    writeln!(out, "# Collider with {} parts", mesh.len())?;
    let mut base = 1u32;
    for (index, object) in mesh.objects().iter().enumerate() {
        let (vertices, faces) = indexed(object);

        writeln!(out, "o Collider_{index:0width$}")?;
        for v in &vertices {
            writeln!(out, "v {} {} {}", v.x, v.y, v.z)?;
        }
        for [a, b, c] in &faces {
            writeln!(out, "f {} {} {}", a + base, b + base, c + base)?;
        }
        base += vertices.len() as u32;
    }
    out.flush()?;

    info!("Wrote {} collider parts to {}", mesh.len(), path.display());
    Ok(())
}

/// Exchange document for a skeletal collider: one part per object, with the
/// owning bone's name, id and offset matrix.
pub fn collider_rig(mesh: &DrawMesh, skeleton: &Skeleton) -> PartsDocument {
    let parts = mesh
        .objects()
        .iter()
        .map(|object| {
            let (vertices, faces) = indexed(object);
            Part {
                name: Some(object.name.clone()),
                bone: object.bone.and_then(|id| skeleton.bone(id)).map(|bone| PartBone {
                    name: bone.name.clone(),
                    id: bone.id,
                    offset_matrix: bone.offset_matrix.to_cols_array(),
                }),
                color: Some(object.material.diffuse.to_array()),
                ..Part::from_geometry(&vertices, &faces)
            }
        })
        .collect();
    PartsDocument { parts }
}

/// Write [`collider_rig`] as pretty-printed JSON.
pub fn write_collider_rig(mesh: &DrawMesh, skeleton: &Skeleton, path: &Path) -> io::Result<()> {
    let document = collider_rig(mesh, skeleton);
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, &document)?;
    out.flush()?;

    info!("Wrote collider rig ({} parts) to {}", document.parts.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomp::skeletal::decompose_skeleton;
    use crate::import::{obj, parts};
    use crate::skeleton::build_skeleton;
    use crate::test_utils::scenario_scene;
    use tempfile::tempdir;

    #[test]
    fn test_pad_width() {
        assert_eq!(pad_width(0), 2);
        assert_eq!(pad_width(10), 2);
        assert_eq!(pad_width(101), 3);
    }

    #[test]
    fn test_obj_round_trip() {
        let skeleton = build_skeleton(&scenario_scene()).unwrap();
        let mesh = decompose_skeleton(&skeleton);
        let dir = tempdir().unwrap();
        let path = dir.path().join("rig_collider.obj");

        write_collider_obj(&mesh, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("o Collider_00"));

        let scene = obj::parse(&text, "rig_collider").unwrap();
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(
            scene.meshes[0].faces.len(),
            mesh.objects()[0].shape.attributes.triangle_count()
        );
    }

    #[test]
    fn test_rig_document() {
        let skeleton = build_skeleton(&scenario_scene()).unwrap();
        let mesh = decompose_skeleton(&skeleton);
        let dir = tempdir().unwrap();
        let path = dir.path().join("rig_collider.json");

        write_collider_rig(&mesh, &skeleton, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let document: PartsDocument = serde_json::from_str(&text).unwrap();

        let bone = document.parts[0].bone.as_ref().unwrap();
        assert_eq!(bone.name, "Spine");
        assert_eq!(Some(bone.id), skeleton.bone_id("Spine"));

        // Plain exchange readers accept rig documents
        let scene = parts::parse(&text).unwrap();
        assert_eq!(scene.meshes.len(), 1);
    }
}
