use std::io;
use std::path::Path;
use std::process::{Command, Output};

const SHADER_EXTENSIONS: [&str; 6] = ["rgen", "rmiss", "rchit", "comp", "vert", "frag"];
const OUT_DIR: &str = "../../../spv";

fn main() -> io::Result<()> {
    // Tell the build script to only run again if we change our source shaders
    println!("cargo:rerun-if-changed=shaders");
    println!("cargo:rerun-if-env-changed=SKIP_SHADER_COMPILATION");

    if std::env::var_os("SKIP_SHADER_COMPILATION").is_some() {
        println!("cargo:warning=Skipping shader compilation");
        return Ok(());
    }

    std::fs::create_dir_all(OUT_DIR)?;

    for entry in std::fs::read_dir("shaders")? {
        let entry = entry?;
        let in_path = entry.path();

        if !entry.file_type()?.is_file() || !is_shader(&in_path) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        let result = Command::new("glslc")
            .arg(&in_path)
            .args(["--target-env=vulkan1.2", "-o"])
            .arg(format!("{OUT_DIR}/{file_name}.spv"))
            .output();

        handle_program_result(&file_name, result);
    }

    Ok(())
}

fn is_shader(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| SHADER_EXTENSIONS.contains(&ext))
}

fn handle_program_result(file_name: &str, result: io::Result<Output>) {
    match result {
        Ok(output) if output.status.success() => {
            println!("Compiled {file_name}");
        }
        Ok(output) => {
            eprint!("stdout: {}", String::from_utf8_lossy(&output.stdout));
            eprint!("stderr: {}", String::from_utf8_lossy(&output.stderr));
            panic!("Shader compilation of {file_name} failed. Status: {}", output.status);
        }
        Err(error) => {
            panic!("Failed to run glslc on {file_name}. Cause: {error}");
        }
    }
}
