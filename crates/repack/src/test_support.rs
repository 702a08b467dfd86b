//! Zip fixtures shared by the extraction, layout and pipeline tests

use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub(crate) struct FixtureEntry {
    pub name: &'static str,
    pub contents: Option<&'static [u8]>,
    pub mode: u32,
}

impl FixtureEntry {
    pub fn file(name: &'static str, contents: &'static [u8], mode: u32) -> Self {
        Self { name, contents: Some(contents), mode }
    }

    pub fn dir(name: &'static str) -> Self {
        Self { name, contents: None, mode: 0o755 }
    }
}

pub(crate) fn zip_bytes(entries: &[FixtureEntry]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in entries {
        let options = SimpleFileOptions::default().unix_permissions(entry.mode);
        match entry.contents {
            Some(contents) => {
                writer.start_file(entry.name, options).unwrap();
                writer.write_all(contents).unwrap();
            }
            None => {
                writer.add_directory(entry.name, options).unwrap();
            }
        }
    }

    writer.finish().unwrap().into_inner()
}

pub(crate) fn write_zip(path: &Path, entries: &[FixtureEntry]) {
    std::fs::write(path, zip_bytes(entries)).unwrap();
}

/// Runtime bundle shaped like the upstream 4.2.1 mono headless build
pub(crate) fn runtime_bundle() -> Vec<u8> {
    zip_bytes(&[
        FixtureEntry::dir("Godot_v4.2.1-stable_mono_linux_headless_64/"),
        FixtureEntry::file(
            "Godot_v4.2.1-stable_mono_linux_headless_64/Godot_v4.2.1-stable_mono_linux_headless.64",
            b"\x7fELF engine",
            0o644,
        ),
        FixtureEntry::dir("Godot_v4.2.1-stable_mono_linux_headless_64/GodotSharp/"),
        FixtureEntry::file(
            "Godot_v4.2.1-stable_mono_linux_headless_64/GodotSharp/Api/GodotSharp.dll",
            b"MZ api",
            0o644,
        ),
    ])
}

/// Export templates bundle with a single top-level `templates/` directory
pub(crate) fn templates_bundle() -> Vec<u8> {
    zip_bytes(&[
        FixtureEntry::dir("templates/"),
        FixtureEntry::file("templates/version.txt", b"4.2.1.stable.mono", 0o644),
        FixtureEntry::file("templates/linux_release.x86_64", b"\x7fELF template", 0o755),
    ])
}
