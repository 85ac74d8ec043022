// build.rs
// Compiles GLSL shaders to SPIR-V next to their sources when glslc is available

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn find_glslc() -> Option<PathBuf> {
    if let Ok(sdk) = env::var("VULKAN_SDK") {
        let candidate = if cfg!(target_os = "windows") {
            Path::new(&sdk).join("Bin").join("glslc.exe")
        } else {
            Path::new(&sdk).join("bin").join("glslc")
        };
        if candidate.exists() {
            return Some(candidate);
        }
    }

    // Fall back to PATH
    let name = if cfg!(target_os = "windows") { "glslc.exe" } else { "glslc" };
    if Command::new(name).arg("--version").output().is_ok() {
        return Some(PathBuf::from(name));
    }

    None
}

fn main() {
    println!("cargo:rerun-if-changed=shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    let glslc = match find_glslc() {
        Some(path) => path,
        None => {
            eprintln!("warning: glslc not found, shader compilation skipped");
            eprintln!("hint: install the Vulkan SDK or ship prebuilt .spv files");
            return;
        }
    };

    let shader_dir = PathBuf::from("shaders");
    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: no shader directory at {:?}", shader_dir);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext @ ("vert" | "frag")) => ext,
            _ => continue,
        };

        let out_file = path.with_extension(format!("{}.spv", ext));

        let up_to_date = match (std::fs::metadata(&path), std::fs::metadata(&out_file)) {
            (Ok(src), Ok(dst)) => {
                matches!((src.modified(), dst.modified()), (Ok(s), Ok(d)) if s <= d)
            }
            _ => false,
        };
        if up_to_date {
            continue;
        }

        let status = Command::new(&glslc)
            .arg(&path)
            .arg("-o")
            .arg(&out_file)
            .status();

        match status {
            Ok(s) if s.success() => {
                eprintln!("info: compiled {:?}", path.file_name().unwrap());
            }
            Ok(s) => {
                panic!("glslc failed for {:?} with exit code {}", path, s.code().unwrap_or(-1));
            }
            Err(e) => {
                panic!("failed to run glslc for {:?}: {}", path, e);
            }
        }
    }
}
