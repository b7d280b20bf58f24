use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Select the board program and put the linker script somewhere the linker can find it.
fn main() {
    println!("cargo:rerun-if-env-changed=EMBEDDED_DEMO_MAIN");
    for name in [
        "PROJECT_LED",
        "MINOR_BLINK_NUMBER",
        "MINOR_BLINK_DELAY_MS",
        "MAJOR_BLINK_DELAY_MS",
        "GREENTEA_TIMEOUT",
        "TIMER_FREQUENCY",
    ] {
        println!("cargo:rerun-if-env-changed={name}");
    }
    let out_dir = env::var("OUT_DIR").expect("No out dir");
    let embedded_demo_main = env::var("EMBEDDED_DEMO_MAIN").unwrap_or_else(|_| "blinky".to_string());
    let dest_path = Path::new(&out_dir);

    // generate embedded_demo_main.name
    std::fs::write(
        dest_path.join("embedded_demo_main.name"),
        format!("mains::{embedded_demo_main}::main()"),
    )
    .unwrap();
    println!("cargo:rustc-env=EMBEDDED_DEMO_MAIN_NAME={embedded_demo_main}");

    let target_arch = env::var("CARGO_CFG_TARGET_ARCH");
    if target_arch == Ok("riscv32".to_string()) {
        // riscv32 specific settings
        let mut f = File::create(dest_path.join("memory.x")).expect("Could not create file");

        f.write_all(include_bytes!("riscv-memory.x")).expect("Could not write file");

        println!("cargo:rustc-link-search={}", dest_path.display());
        println!("cargo:rustc-link-arg-bins=-Tlink.x");

        println!("cargo:rerun-if-changed=riscv-memory.x");
        println!("cargo:rerun-if-changed=build.rs");
    }
}
