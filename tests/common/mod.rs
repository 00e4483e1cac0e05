#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Field layout of a cryoSPARC particle export, in record order.
pub const CS_DESCR: &str = "[('uid', '<u8'), ('blob/path', '|S16'), ('blob/idx', '<u4'), \
('blob/shape', '<u4', (2,)), ('blob/psize_A', '<f4'), ('blob/sign', '<f4'), \
('blob/import_sig', '<u8'), ('location/micrograph_uid', '<u8'), \
('location/micrograph_path', '|S32'), ('location/micrograph_shape', '<u4', (2,)), \
('location/center_x_frac', '<f4'), ('location/center_y_frac', '<f4')]";

/// One particle of a cryoSPARC export.
#[derive(Clone, Debug)]
pub struct CsParticle {
    pub box_size: u32,
    /// Micrograph shape as (rows, cols).
    pub micrograph: (u32, u32),
    /// Center as fractions of (width, height).
    pub center: (f32, f32),
    pub micrograph_path: &'static str,
}

fn padded(text: &str, len: usize) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(len, 0);
    bytes
}

/// Encodes particles as an NPY version 1.0 record array.
pub fn cs_bytes(particles: &[CsParticle]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (i, p) in particles.iter().enumerate() {
        payload.extend_from_slice(&(i as u64 + 1).to_le_bytes());
        payload.extend_from_slice(&padded("J12/extract.mrc", 16));
        payload.extend_from_slice(&(i as u32).to_le_bytes());
        payload.extend_from_slice(&p.box_size.to_le_bytes());
        payload.extend_from_slice(&p.box_size.to_le_bytes());
        payload.extend_from_slice(&1.06f32.to_le_bytes());
        payload.extend_from_slice(&(-1.0f32).to_le_bytes());
        payload.extend_from_slice(&0u64.to_le_bytes());
        payload.extend_from_slice(&77u64.to_le_bytes());
        payload.extend_from_slice(&padded(p.micrograph_path, 32));
        payload.extend_from_slice(&p.micrograph.0.to_le_bytes());
        payload.extend_from_slice(&p.micrograph.1.to_le_bytes());
        payload.extend_from_slice(&p.center.0.to_le_bytes());
        payload.extend_from_slice(&p.center.1.to_le_bytes());
    }
    npy_bytes(CS_DESCR, particles.len(), &payload)
}

/// Wraps a payload in an NPY version 1.0 header, padded to 64 bytes.
pub fn npy_bytes(descr: &str, count: usize, payload: &[u8]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': {}, 'fortran_order': False, 'shape': ({},), }}",
        descr, count
    );
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut bytes = b"\x93NUMPY\x01\x00".to_vec();
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

pub fn write_cs(path: &Path, particles: &[CsParticle]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, cs_bytes(particles)).expect("write cs file");
}

/// Copies a file from `tests/fixtures` into `dir`, returning the new path.
pub fn copy_fixture(name: &str, dir: &Path) -> PathBuf {
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let target = dir.join(name);
    fs::copy(&source, &target).expect("copy fixture");
    target
}

/// Lines of a written output file.
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("read output")
        .lines()
        .map(str::to_string)
        .collect()
}

/// Parses the tab-separated numeric cells of a data line.
pub fn numbers(line: &str) -> Vec<f64> {
    line.split('\t')
        .map(|cell| cell.parse().expect("numeric cell"))
        .collect()
}
