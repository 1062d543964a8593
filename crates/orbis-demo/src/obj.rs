//! Wavefront OBJ export of the current leaf mesh.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use orbis_roam::{PointId, Sphere};
use rustc_hash::FxHashMap;

/// Records written by an export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjCounts {
    pub vertices: usize,
    pub faces: usize,
}

/// Write every leaf triangle as a face with per-vertex normals.
///
/// Shared corners are written once. Faces wind counter-clockwise seen from
/// outside the globe.
pub fn write_obj<W: Write>(sphere: &Sphere, out: &mut W) -> io::Result<ObjCounts> {
    let mut index: FxHashMap<PointId, usize> = FxHashMap::default();
    let mut faces = Vec::with_capacity(sphere.polys());

    writeln!(out, "# orbis globe, {} triangles", sphere.polys())?;
    for leaf in sphere.leaves() {
        let Some(triangle) = sphere.triangle(leaf) else {
            continue;
        };
        let vertices = triangle.vertices();
        let mut face = [0; 3];
        // Apex first: (l - m) x (r - m) is the outward normal.
        for (slot, id) in [vertices.middle, vertices.left, vertices.right]
            .into_iter()
            .enumerate()
        {
            let next = index.len() + 1;
            let obj_index = match index.get(&id) {
                Some(&i) => i,
                None => {
                    let Some(point) = sphere.point(id) else {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("triangle {leaf:?} names missing point {id:?}"),
                        ));
                    };
                    let p = point.position();
                    let n = point.normal().normalize_or_zero();
                    writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
                    writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
                    index.insert(id, next);
                    next
                }
            };
            face[slot] = obj_index;
        }
        faces.push(face);
    }

    for [a, b, c] in &faces {
        writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
    }
    Ok(ObjCounts {
        vertices: index.len(),
        faces: faces.len(),
    })
}

/// Export to a file, replacing it if present.
pub fn export_obj(path: &Path, sphere: &Sphere) -> io::Result<ObjCounts> {
    let mut out = BufWriter::new(File::create(path)?);
    let counts = write_obj(sphere, &mut out)?;
    out.flush()?;
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octahedron_export() {
        let sphere = Sphere::new();
        let mut buf = Vec::new();
        let counts = write_obj(&sphere, &mut buf).unwrap();
        assert_eq!(counts, ObjCounts { vertices: 6, faces: 8 });

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 6);
        assert_eq!(text.lines().filter(|l| l.starts_with("vn ")).count(), 6);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 8);
    }

    #[test]
    fn test_faces_reference_written_vertices() {
        let mut sphere = Sphere::new();
        let root = sphere.roots()[0];
        sphere.split(root);

        let mut buf = Vec::new();
        let counts = write_obj(&sphere, &mut buf).unwrap();
        assert_eq!(counts.faces, 10);
        assert_eq!(counts.vertices, 7);

        let text = String::from_utf8(buf).unwrap();
        for line in text.lines().filter(|l| l.starts_with("f ")) {
            for corner in line.split_whitespace().skip(1) {
                let i: usize = corner.split("//").next().unwrap().parse().unwrap();
                assert!((1..=counts.vertices).contains(&i));
            }
        }
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("globe.obj");
        let counts = export_obj(&path, &Sphere::new()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# orbis globe, 8 triangles"));
        assert_eq!(text.lines().count(), 1 + 2 * counts.vertices + counts.faces);
    }
}
